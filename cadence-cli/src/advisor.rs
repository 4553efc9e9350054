//! Chat advisor: sends the user's message plus pending task context to an LLM
//! and extracts at most one structured task proposal from the reply.
//!
//! Reply grammar: free text, optionally containing exactly one block
//!
//! ```text
//! [[task-proposal]]
//! { ...TaskProposal JSON... }
//! [[/task-proposal]]
//! ```
//!
//! Anything else that looks like a block (two of them, a missing closing tag,
//! invalid JSON) is rejected rather than guessed at.

use anyhow::Result;
use cadence_core::{Category, Priority, Task, TaskProposal};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::auth::SecretProvider;
use crate::llm::{chat_complete, ChatTurn, LlmConfig};

pub const PROPOSAL_OPEN: &str = "[[task-proposal]]";
pub const PROPOSAL_CLOSE: &str = "[[/task-proposal]]";

pub const SYSTEM_PROMPT: &str = "You are Cadence, a concise planning assistant. \
You help the user decide what to work on and when, given their pending tasks. \
Answer in plain text. If, and only if, the user asks you to add or create a task, \
include exactly one block of the form\n\
[[task-proposal]]\n\
{\"title\": \"...\", \"description\": \"...\", \"priority\": \"low|medium|high|urgent\", \
\"category\": \"deep_work|creative|meetings|administrative|routine|learning\", \
\"estimated_duration\": <minutes>, \"energy_required\": <0-100>, \"deadline\": \"<RFC 3339, optional>\"}\n\
[[/task-proposal]]\n\
Use only those fields. Never include more than one block.";

#[derive(Debug, Clone, PartialEq)]
pub enum ProposalParse {
    None,
    Found(TaskProposal),
    Rejected(String),
}

pub fn extract_proposal(reply: &str) -> ProposalParse {
    let opens = reply.matches(PROPOSAL_OPEN).count();
    let closes = reply.matches(PROPOSAL_CLOSE).count();

    match (opens, closes) {
        (0, 0) => return ProposalParse::None,
        (1, 1) => {}
        (1, 0) => return ProposalParse::Rejected("unterminated task-proposal block".into()),
        (0, _) => return ProposalParse::Rejected("closing tag without a task-proposal block".into()),
        _ => {
            return ProposalParse::Rejected(format!(
                "expected one task-proposal block ({opens} opening, {closes} closing tags)"
            ));
        }
    }

    let Some(start) = reply.find(PROPOSAL_OPEN) else {
        return ProposalParse::None;
    };
    let body_start = start + PROPOSAL_OPEN.len();
    let Some(len) = reply[body_start..].find(PROPOSAL_CLOSE) else {
        return ProposalParse::Rejected("closing tag precedes the opening tag".into());
    };

    match TaskProposal::from_json(reply[body_start..body_start + len].trim()) {
        Ok(p) => ProposalParse::Found(p),
        Err(e) => ProposalParse::Rejected(e.to_string()),
    }
}

/// Reply text with any proposal block cut out, for display.
pub fn visible_text(reply: &str) -> String {
    let (Some(start), Some(end)) = (reply.find(PROPOSAL_OPEN), reply.rfind(PROPOSAL_CLOSE)) else {
        return reply.trim().to_string();
    };
    if end < start {
        return reply.trim().to_string();
    }
    let mut out = reply[..start].trim_end().to_string();
    let tail = reply[end + PROPOSAL_CLOSE.len()..].trim_start();
    if !tail.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(tail);
    }
    out
}

#[derive(Serialize)]
struct TaskSummary<'a> {
    id: &'a str,
    title: &'a str,
    priority: Priority,
    category: Category,
    estimated_duration: u32,
    energy_required: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    deadline: Option<DateTime<Utc>>,
}

/// Pending tasks as a JSON array for the prompt.
pub fn task_context(pending: &[&Task]) -> Result<String> {
    let summaries: Vec<TaskSummary<'_>> = pending
        .iter()
        .map(|t| TaskSummary {
            id: &t.id,
            title: &t.title,
            priority: t.priority,
            category: t.category,
            estimated_duration: t.estimated_duration,
            energy_required: t.energy_required,
            deadline: t.deadline,
        })
        .collect();
    Ok(serde_json::to_string(&summaries)?)
}

#[derive(Debug, Clone)]
pub struct AdvisorReply {
    pub text: String,
    pub proposal: ProposalParse,
}

pub struct Advisor<'a> {
    llm: LlmConfig,
    secrets: &'a dyn SecretProvider,
}

impl<'a> Advisor<'a> {
    pub fn new(llm: LlmConfig, secrets: &'a dyn SecretProvider) -> Self {
        Self { llm, secrets }
    }

    pub async fn ask(&self, message: &str, pending: &[&Task]) -> Result<AdvisorReply> {
        let prompt = format!(
            "Pending tasks (JSON): {}\n\nUser: {}",
            task_context(pending)?,
            message.trim()
        );
        let reply = chat_complete(&self.llm, self.secrets, SYSTEM_PROMPT, &[ChatTurn::user(prompt)]).await?;

        let proposal = extract_proposal(&reply);
        if let ProposalParse::Rejected(reason) = &proposal {
            warn!(%reason, "ignoring malformed task proposal");
        }
        Ok(AdvisorReply {
            text: visible_text(&reply),
            proposal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"title":"Prep slides","priority":"high","category":"creative","estimated_duration":45}"#;

    fn wrap(body: &str) -> String {
        format!("Sure, adding it.\n{PROPOSAL_OPEN}\n{body}\n{PROPOSAL_CLOSE}\nAnything else?")
    }

    #[test]
    fn plain_reply_has_no_proposal() {
        assert_eq!(extract_proposal("Do the report first."), ProposalParse::None);
    }

    #[test]
    fn single_block_is_parsed() {
        match extract_proposal(&wrap(BODY)) {
            ProposalParse::Found(p) => {
                assert_eq!(p.title, "Prep slides");
                assert_eq!(p.estimated_duration, 45);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn two_blocks_are_rejected() {
        let reply = format!("{}\n{}", wrap(BODY), wrap(BODY));
        assert!(matches!(extract_proposal(&reply), ProposalParse::Rejected(_)));
    }

    #[test]
    fn unterminated_block_is_rejected() {
        let reply = format!("{PROPOSAL_OPEN}\n{BODY}");
        assert!(matches!(extract_proposal(&reply), ProposalParse::Rejected(_)));
    }

    #[test]
    fn reversed_tags_are_rejected() {
        let reply = format!("{PROPOSAL_CLOSE}\n{BODY}\n{PROPOSAL_OPEN}");
        assert!(matches!(extract_proposal(&reply), ProposalParse::Rejected(_)));
    }

    #[test]
    fn schema_violations_are_rejected() {
        let extra = r#"{"title":"x","priority":"low","category":"routine","estimated_duration":10,"color":"red"}"#;
        assert!(matches!(extract_proposal(&wrap(extra)), ProposalParse::Rejected(_)));
        assert!(matches!(extract_proposal(&wrap("not json")), ProposalParse::Rejected(_)));
    }

    #[test]
    fn visible_text_drops_block() {
        assert_eq!(visible_text(&wrap(BODY)), "Sure, adding it.\nAnything else?");
        assert_eq!(visible_text("  just text "), "just text");
    }

    #[test]
    fn context_lists_pending_tasks() {
        let t = Task::new("t1", "Write memo").with_priority(Priority::Urgent);
        let ctx = task_context(&[&t]).unwrap();
        assert!(ctx.contains(r#""id":"t1""#));
        assert!(ctx.contains(r#""priority":"urgent""#));
        assert!(!ctx.contains("deadline"));
    }
}
