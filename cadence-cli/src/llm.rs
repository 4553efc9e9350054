use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::auth::{Secret, SecretProvider};
use crate::config::LlmSection;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const MAX_TOKENS: u32 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            other => bail!("unknown llm provider '{other}' (expected openai or anthropic)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn from_section(section: &LlmSection) -> Result<Self> {
        let provider = Provider::parse(&section.provider)?;
        // The default base_url points at OpenAI; an anthropic provider left on it
        // means "use the vendor default".
        let base_url = match provider {
            Provider::Anthropic if section.base_url.trim_end_matches('/') == OPENAI_BASE_URL => {
                ANTHROPIC_BASE_URL.to_string()
            }
            _ => section.base_url.trim_end_matches('/').to_string(),
        };
        Ok(Self {
            provider,
            model: section.model.clone(),
            base_url,
            temperature: section.temperature,
        })
    }

    fn endpoint(&self) -> String {
        match self.provider {
            Provider::Anthropic => format!("{}/v1/messages", self.base_url),
            Provider::OpenAI => format!("{}/v1/chat/completions", self.base_url),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct AnthropicReq<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [ChatTurn],
}

#[derive(Deserialize)]
struct AnthropicResp {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    t: String,
    text: Option<String>,
}

#[derive(Serialize)]
struct OpenAiReq<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: Option<String>,
}

pub async fn chat_complete(
    config: &LlmConfig,
    secrets: &dyn SecretProvider,
    system: &str,
    turns: &[ChatTurn],
) -> Result<String> {
    match config.provider {
        Provider::Anthropic => anthropic_complete(config, secrets, system, turns).await,
        Provider::OpenAI => openai_complete(config, secrets, system, turns).await,
    }
}

async fn anthropic_complete(
    config: &LlmConfig,
    secrets: &dyn SecretProvider,
    system: &str,
    turns: &[ChatTurn],
) -> Result<String> {
    let token = secrets.require(Secret::AnthropicToken)?;

    let body = AnthropicReq {
        model: &config.model,
        max_tokens: MAX_TOKENS,
        temperature: config.temperature,
        system,
        messages: turns,
    };

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_str(&token)?);
    headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::new();
    let resp = client
        .post(config.endpoint())
        .headers(headers)
        .json(&body)
        .send()
        .await
        .context("anthropic request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("anthropic error: {status} {txt}");
    }

    let out: AnthropicResp = resp.json().await.context("parse anthropic response")?;
    Ok(anthropic_text(out))
}

fn anthropic_text(out: AnthropicResp) -> String {
    let mut s = String::new();
    for b in out.content {
        if b.t == "text" {
            if let Some(t) = b.text {
                s.push_str(&t);
            }
        }
    }
    s.trim().to_string()
}

async fn openai_complete(
    config: &LlmConfig,
    secrets: &dyn SecretProvider,
    system: &str,
    turns: &[ChatTurn],
) -> Result<String> {
    let key = secrets.require(Secret::OpenAiApiKey)?;

    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(ChatTurn {
        role: "system".to_string(),
        content: system.to_string(),
    });
    messages.extend(turns.iter().cloned());

    let body = OpenAiReq {
        model: &config.model,
        messages,
        temperature: config.temperature,
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(config.endpoint())
        .header(AUTHORIZATION, format!("Bearer {key}"))
        .json(&body)
        .send()
        .await
        .context("openai request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("openai error: {status} {txt}");
    }

    let out: OpenAiResp = resp.json().await.context("parse openai response")?;
    Ok(openai_text(out))
}

fn openai_text(out: OpenAiResp) -> String {
    out.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_keeps_vendor_default_url() {
        let section = LlmSection {
            provider: "anthropic".into(),
            ..LlmSection::default()
        };
        let cfg = LlmConfig::from_section(&section).unwrap();
        assert_eq!(cfg.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn custom_base_url_is_respected() {
        let section = LlmSection {
            base_url: "http://localhost:11434/".into(),
            ..LlmSection::default()
        };
        let cfg = LlmConfig::from_section(&section).unwrap();
        assert_eq!(cfg.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Provider::parse("mystery").is_err());
    }

    #[test]
    fn response_text_is_extracted() {
        let a: AnthropicResp = serde_json::from_str(
            r#"{"content":[{"type":"text","text":" hello "},{"type":"tool_use"},{"type":"text","text":"there"}]}"#,
        )
        .unwrap();
        assert_eq!(anthropic_text(a), "hello there");

        let o: OpenAiResp =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  ok \n"}}]}"#).unwrap();
        assert_eq!(openai_text(o), "ok");

        let empty: OpenAiResp = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(openai_text(empty), "");
    }
}
