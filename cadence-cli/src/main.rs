use anyhow::{bail, Context, Result};
use cadence_core::{
    parse_local_deadline_to_utc, score_schedule, BlockOrigin, BlockType, Category,
    CompletionFeedback, CoreError, DayContext, DynamicScheduler, Priority, RecommendationEngine,
    Schedule, Task, WorkWindow,
};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

mod advisor;
mod auth;
mod calendar;
mod config;
mod llm;
mod state;

use crate::advisor::{Advisor, ProposalParse};
use crate::auth::{AuthFileSecrets, ChainedSecrets, EnvSecrets, SecretProvider};
use crate::config::Config;
use crate::state::{load_state, save_state, state_path};

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CADENCE_BUILD_SHA"), ")"),
    about = "Energy-aware daily planner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a task
    Add {
        title: String,

        #[arg(long, default_value = "medium")]
        priority: Priority,

        #[arg(long, default_value = "routine")]
        category: Category,

        /// Estimated minutes
        #[arg(long, default_value_t = 30)]
        duration: u32,

        /// Energy required (0-100); suggested from priority when omitted
        #[arg(long)]
        energy: Option<u8>,

        /// Local deadline, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        deadline: Option<String>,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List tasks (pending only unless --all)
    List {
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Mark a task in progress
    Start { id: String },

    /// Mark a task complete and record how it went
    Complete {
        id: String,

        /// Actual minutes spent
        #[arg(long)]
        actual_duration: Option<u32>,

        /// Actual energy it took (0-100)
        #[arg(long)]
        actual_energy: Option<u8>,

        /// 1-10
        #[arg(long)]
        satisfaction: Option<u8>,
    },

    /// Delete a task
    Delete { id: String },

    /// Build (or rebuild) the schedule for a day
    Schedule {
        /// YYYY-MM-DD (default: today in the configured timezone)
        #[arg(long)]
        date: Option<String>,

        /// Write generated blocks to an .ics file
        #[arg(long)]
        export_ics: Option<PathBuf>,

        /// Push generated blocks to Google Calendar via gcalcli
        #[arg(long, default_value_t = false)]
        push: bool,

        /// gcalcli calendar name
        #[arg(long)]
        calendar: Option<String>,
    },

    /// Toggle the completed flag of a block in the last schedule (1-based)
    Check { index: usize },

    /// Completion stats and estimate accuracy from history
    Insights,

    /// Show the energy curve
    Energy,

    /// Import fixed blocks (meetings) from an .ics file
    Sync {
        #[arg(long)]
        ics: PathBuf,

        /// Keep only events on this day (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Ask the planning assistant; it may propose a task
    Chat {
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,

        /// Add a proposed task without asking
        #[arg(long, default_value_t = false)]
        accept: bool,
    },

    /// Config helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Store API credentials in ~/.cadence/auth.json
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.cadence/config.toml with defaults
    Init,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    PasteOpenaiApiKey,
    PasteAnthropicToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_logging(&cfg.logging.level);

    match cli.command {
        Command::Add {
            title,
            priority,
            category,
            duration,
            energy,
            deadline,
            description,
        } => cmd_add(&cfg, title, priority, category, duration, energy, deadline, description)?,
        Command::List { all } => cmd_list(&cfg, all)?,
        Command::Start { id } => {
            let path = state_path()?;
            let mut st = load_state(&path)?;
            let mut book = st.book()?;
            book.start(&id)?;
            st.set_book(book);
            save_state(&path, &st)?;
            info!(task_id = %id, "task started");
            println!("Started {id}");
        }
        Command::Complete {
            id,
            actual_duration,
            actual_energy,
            satisfaction,
        } => {
            let feedback = CompletionFeedback {
                actual_duration,
                actual_energy,
                satisfaction,
            };
            cmd_complete(&id, feedback)?;
        }
        Command::Delete { id } => {
            let path = state_path()?;
            let mut st = load_state(&path)?;
            let mut book = st.book()?;
            let removed = book.remove(&id)?;
            st.set_book(book);
            save_state(&path, &st)?;
            info!(task_id = %id, "task deleted");
            println!("Deleted {} ({})", removed.id, removed.title);
        }
        Command::Schedule {
            date,
            export_ics,
            push,
            calendar,
        } => cmd_schedule(&cfg, date, export_ics, push, calendar)?,
        Command::Check { index } => cmd_check(&cfg, index)?,
        Command::Insights => cmd_insights()?,
        Command::Energy => {
            let profile = cfg.energy_profile()?;
            let (hour, energy) = profile.peak();
            print!("{}", profile.render_ascii_chart());
            println!("\nPeak: {hour:02}:00 ({energy})");
            let deep: Vec<String> = profile
                .deep_work_windows()
                .iter()
                .map(|h| format!("{h:02}:00"))
                .collect();
            println!("Deep work hours: {}", deep.join(", "));
        }
        Command::Sync { ics, date } => cmd_sync(&cfg, ics, date)?,
        Command::Chat { message, accept } => cmd_chat(&cfg, &message.join(" "), accept).await?,
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
        },
        Command::Auth { command } => match command {
            AuthCommand::PasteOpenaiApiKey => auth::openai_paste_api_key()?,
            AuthCommand::PasteAnthropicToken => auth::anthropic_paste_token()?,
        },
    }

    Ok(())
}

fn init_logging(default_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn resolve_date(date: Option<&str>, tz: Tz) -> Result<NaiveDate> {
    match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("bad date '{d}' (expected YYYY-MM-DD)")),
        None => Ok(Utc::now().with_timezone(&tz).date_naive()),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    cfg: &Config,
    title: String,
    priority: Priority,
    category: Category,
    duration: u32,
    energy: Option<u8>,
    deadline: Option<String>,
    description: String,
) -> Result<()> {
    let path = state_path()?;
    let mut st = load_state(&path)?;
    let mut book = st.book()?;

    let energy = energy.unwrap_or_else(|| RecommendationEngine::suggest_energy(priority, duration));
    let mut task = Task::new(book.next_id(), title)
        .with_priority(priority)
        .with_category(category)
        .with_duration(duration)
        .with_energy(energy)
        .with_description(description);
    if let Some(d) = deadline {
        task = task.with_deadline(parse_local_deadline_to_utc(&d, &cfg.schedule.timezone)?);
    }

    let id = task.id.clone();
    book.add(task)?;
    st.set_book(book);
    save_state(&path, &st)?;
    info!(task_id = %id, "task added");
    println!("Added {id}");
    Ok(())
}

fn cmd_list(cfg: &Config, all: bool) -> Result<()> {
    let st = load_state(&state_path()?)?;
    let book = st.book()?;
    let tz = cfg.timezone()?;
    let tasks = book.list(all);
    if tasks.is_empty() {
        println!("No tasks. Add one: cadence add \"Write report\" --priority high");
        return Ok(());
    }
    for t in tasks {
        let deadline = t
            .deadline
            .map(|d| format!(" due {}", d.with_timezone(&tz).format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        println!(
            "{:<5} [{:?}] {:<7} {:<14} {:>4}m e{:<3} {}{}",
            t.id, t.status, t.priority, t.category, t.estimated_duration, t.energy_required, t.title, deadline
        );
    }
    Ok(())
}

fn cmd_complete(id: &str, feedback: CompletionFeedback) -> Result<()> {
    let path = state_path()?;
    let mut st = load_state(&path)?;
    let mut book = st.book()?;
    let entry = book.complete(id, feedback, Utc::now())?;
    info!(
        task_id = %id,
        overrun = entry.duration_overrun(),
        "task completed"
    );
    println!(
        "Completed {id}: {}m (estimated {}m)",
        entry.actual_duration, entry.estimated_duration
    );
    st.history.push(entry);
    st.set_book(book);
    save_state(&path, &st)?;
    Ok(())
}

fn day_context(cfg: &Config, tz: Tz) -> DayContext {
    DayContext {
        sleep_hours: cfg.schedule.sleep_hours,
        tz,
    }
}

fn cmd_schedule(
    cfg: &Config,
    date: Option<String>,
    export_ics: Option<PathBuf>,
    push: bool,
    calendar: Option<String>,
) -> Result<()> {
    let path = state_path()?;
    let mut st = load_state(&path)?;
    let tz = cfg.timezone()?;
    let date = resolve_date(date.as_deref(), tz)?;
    let window = WorkWindow::new(date, cfg.schedule.work_start_hour, cfg.schedule.work_end_hour, tz)
        .context("config [schedule] work hours")?;
    let profile = cfg.energy_profile()?;
    let engine = st.engine();
    let external = calendar::blocks_for_date(st.external_blocks.clone(), date, tz)?;
    let pending: Vec<Task> = st.book()?.pending().into_iter().cloned().collect();

    let out = DynamicScheduler::with_estimates(cfg.scheduler(), &engine)
        .schedule(&pending, &external, &profile, &window)?;
    for w in &out.warnings {
        warn!(warning = ?w, "external block ignored");
    }

    let scores = score_schedule(&out.schedule, &profile, day_context(cfg, tz), cfg.weights());
    let schedule = out.schedule.with_scores(scores);

    print_schedule(&schedule, tz);
    if !out.unscheduled.is_empty() {
        println!("\nDid not fit today:");
        for u in &out.unscheduled {
            println!("  {} {} ({}m, {:?})", u.task.id, u.task.title, u.task.estimated_duration, u.reason);
        }
    }

    if export_ics.is_some() || push {
        let ics = calendar::schedule_to_ics(&schedule);
        if let Some(p) = &export_ics {
            fs::write(p, &ics).with_context(|| format!("write {}", p.display()))?;
            println!("\nWrote {}", p.display());
        }
        if push {
            calendar::push_ics_via_gcalcli(&ics, calendar.as_deref())?;
            println!("\nPushed schedule via gcalcli");
        }
    }

    info!(
        date = %date,
        blocks = schedule.blocks.len(),
        unscheduled = out.unscheduled.len(),
        overall = schedule.scores.overall,
        "schedule built"
    );
    st.last_schedule = Some(schedule);
    save_state(&path, &st)?;
    Ok(())
}

fn print_schedule(schedule: &Schedule, tz: Tz) {
    println!("# Schedule for {}\n", schedule.date);
    if schedule.blocks.is_empty() {
        println!("(nothing scheduled)");
    }
    for (i, b) in schedule.blocks.iter().enumerate() {
        let mark = if b.completed { "x" } else { " " };
        let origin = match b.origin {
            BlockOrigin::External => " (fixed)",
            BlockOrigin::Generated => "",
        };
        let label = match b.kind {
            BlockType::Task => b.title.clone(),
            other => format!("{other:?}: {}", b.title),
        };
        println!(
            "{:>2}. [{mark}] {}-{} {}{origin}",
            i + 1,
            b.start.with_timezone(&tz).format("%H:%M"),
            b.end.with_timezone(&tz).format("%H:%M"),
            label
        );
    }
    let s = schedule.scores;
    println!(
        "\nScores: productivity {:.0}  health {:.1}  overall {:.1}",
        s.productivity, s.health, s.overall
    );
}

fn cmd_check(cfg: &Config, index: usize) -> Result<()> {
    let path = state_path()?;
    let mut st = load_state(&path)?;
    let Some(mut schedule) = st.last_schedule.take() else {
        bail!("no schedule yet; run: cadence schedule");
    };
    let done = index
        .checked_sub(1)
        .and_then(|i| schedule.toggle_completed(i))
        .with_context(|| format!("no block #{index} in the last schedule"))?;

    let tz = cfg.timezone()?;
    let scores = score_schedule(&schedule, &cfg.energy_profile()?, day_context(cfg, tz), cfg.weights());
    schedule = schedule.with_scores(scores);
    print_schedule(&schedule, tz);
    info!(index, completed = done, "block toggled");

    st.last_schedule = Some(schedule);
    save_state(&path, &st)?;
    Ok(())
}

fn cmd_insights() -> Result<()> {
    let st = load_state(&state_path()?)?;
    let book = st.book()?;
    let report = st.engine().insights(book.tasks());

    println!("# Insights\n");
    println!(
        "Tasks: {} total, {} completed, {} pending ({:.0}% done)",
        report.total_tasks,
        report.completed_tasks,
        report.pending_tasks,
        report.completion_rate * 100.0
    );
    println!("Average estimate: {:.0}m", report.avg_task_duration);
    println!("High-priority pending: {}", report.high_priority_pending);
    if let Some(s) = report.mean_satisfaction {
        println!("Mean satisfaction: {s:.1}/10");
    }
    if let Some(o) = &report.largest_overrun {
        println!("Largest overrun: {} (+{:.0}m on average)", o.category, o.mean_minutes);
    }

    if !report.categories.is_empty() {
        println!("\n## By category\n");
        for c in &report.categories {
            println!(
                "- {}: {} done, avg {:.0}m (±{:.0}), overrun {:+.0}m, energy {:.0}",
                c.category,
                c.samples,
                c.mean_actual_duration,
                c.duration_stddev.unwrap_or(0.0),
                c.mean_overrun,
                c.mean_energy
            );
        }
    }

    if !report.recommendations.is_empty() {
        println!("\n## Recommendations\n");
        for r in &report.recommendations {
            println!("- {r}");
        }
    }
    Ok(())
}

fn cmd_sync(cfg: &Config, ics: PathBuf, date: Option<String>) -> Result<()> {
    let tz = cfg.timezone()?;
    let date = resolve_date(date.as_deref(), tz)?;
    let path = state_path()?;
    let mut st = load_state(&path)?;

    let parsed = fs::read_to_string(&ics)
        .map_err(|e| CoreError::ExternalSyncFailure(format!("read {}: {e}", ics.display())))
        .and_then(|text| calendar::parse_ics(&text, tz));
    let import = match parsed {
        Ok(i) => i,
        Err(e) => {
            // Scheduling keeps working from whatever blocks are stored.
            warn!(error = %e, file = %ics.display(), "calendar sync failed");
            println!("Sync failed: {e}. Keeping {} stored blocks.", st.external_blocks.len());
            return Ok(());
        }
    };
    for w in &import.warnings {
        warn!(warning = %w, "skipped calendar event");
    }

    let blocks = calendar::blocks_for_date(import.blocks, date, tz)?;
    let day_start = WorkWindow::new(date, 0, 24, tz)?;
    let (from, to) = (day_start.start_utc()?, day_start.end_utc()?);
    st.external_blocks.retain(|b| !(b.start < to && from < b.end));
    let count = blocks.len();
    st.external_blocks.extend(blocks);
    save_state(&path, &st)?;

    info!(date = %date, imported = count, skipped = import.warnings.len(), "calendar synced");
    println!("Imported {count} blocks for {date} ({} skipped)", import.warnings.len());
    Ok(())
}

async fn cmd_chat(cfg: &Config, message: &str, accept: bool) -> Result<()> {
    let path = state_path()?;
    let mut st = load_state(&path)?;
    let mut book = st.book()?;

    let providers: Vec<Box<dyn SecretProvider + Send + Sync>> = vec![
        Box::new(EnvSecrets),
        Box::new(AuthFileSecrets::default_location()?),
    ];
    let secrets = ChainedSecrets::new(providers);
    let advisor = Advisor::new(llm::LlmConfig::from_section(&cfg.llm)?, &secrets);

    let reply = advisor.ask(message, &book.pending()).await?;
    println!("{}", reply.text);

    match reply.proposal {
        ProposalParse::None => {}
        ProposalParse::Rejected(reason) => {
            println!("\n(ignored a malformed task proposal: {reason})");
        }
        ProposalParse::Found(p) => {
            let task = p.into_task(book.next_id())?;
            println!(
                "\nProposed: {} [{} / {}] {}m, energy {}",
                task.title, task.priority, task.category, task.estimated_duration, task.energy_required
            );
            if accept {
                let id = task.id.clone();
                book.add(task)?;
                st.set_book(book);
                save_state(&path, &st)?;
                info!(task_id = %id, "proposal accepted");
                println!("Added {id}");
            } else {
                println!("Re-run with --accept to add proposals automatically.");
            }
        }
    }
    Ok(())
}
