use anyhow::{bail, Context, Result};
use cadence_core::{
    time::local_to_utc, BlockOrigin, BlockType, CoreError, ExternalBlock, Schedule,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::io::Write;

/// Events read from an ICS file, plus per-event problems that were skipped.
#[derive(Debug, Default)]
pub struct IcsImport {
    pub blocks: Vec<ExternalBlock>,
    pub warnings: Vec<CoreError>,
}

#[derive(Default)]
struct RawEvent {
    start: Option<String>,
    start_tzid: Option<String>,
    end: Option<String>,
    end_tzid: Option<String>,
    summary: Option<String>,
}

/// Parse VEVENTs into external blocks.
///
/// DTSTART/DTEND may be UTC (`...Z`), carry a `TZID` parameter, or be floating
/// local time, which is read in `tz`. All-day events are skipped.
pub fn parse_ics(ics: &str, tz: Tz) -> Result<IcsImport, CoreError> {
    if !ics.contains("BEGIN:VCALENDAR") {
        return Err(CoreError::ExternalSyncFailure(
            "not an iCalendar document (missing BEGIN:VCALENDAR)".into(),
        ));
    }

    let mut out = IcsImport::default();
    let mut current: Option<RawEvent> = None;

    for line in unfold(ics) {
        let Some((name_params, value)) = line.split_once(':') else {
            continue;
        };
        let mut parts = name_params.split(';');
        let name = parts.next().unwrap_or_default().to_ascii_uppercase();
        let tzid = parts
            .find_map(|p| p.strip_prefix("TZID="))
            .map(|s| s.trim_matches('"').to_string());

        match (name.as_str(), value) {
            ("BEGIN", "VEVENT") => current = Some(RawEvent::default()),
            ("END", "VEVENT") => {
                if let Some(ev) = current.take() {
                    match event_to_block(ev, tz) {
                        Ok(Some(b)) => out.blocks.push(b),
                        Ok(None) => {}
                        Err(e) => out.warnings.push(e),
                    }
                }
            }
            ("DTSTART", v) => {
                if let Some(ev) = current.as_mut() {
                    ev.start = Some(v.trim().to_string());
                    ev.start_tzid = tzid;
                }
            }
            ("DTEND", v) => {
                if let Some(ev) = current.as_mut() {
                    ev.end = Some(v.trim().to_string());
                    ev.end_tzid = tzid;
                }
            }
            ("SUMMARY", v) => {
                if let Some(ev) = current.as_mut() {
                    ev.summary = Some(unescape_ics(v));
                }
            }
            _ => {}
        }
    }

    Ok(out)
}

/// RFC 5545 line unfolding: a line starting with space/tab continues the previous one.
fn unfold(ics: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in ics.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(cont) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(cont);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

fn event_to_block(ev: RawEvent, tz: Tz) -> Result<Option<ExternalBlock>, CoreError> {
    let title = ev.summary.unwrap_or_else(|| "(busy)".to_string());
    let (Some(start), Some(end)) = (ev.start, ev.end) else {
        return Err(CoreError::ExternalSyncFailure(format!(
            "event '{title}' is missing DTSTART or DTEND"
        )));
    };
    // VALUE=DATE (all-day) has no time component.
    if !start.contains('T') {
        return Ok(None);
    }

    let start = parse_ics_datetime(&start, ev.start_tzid.as_deref(), tz)?;
    let end = parse_ics_datetime(&end, ev.end_tzid.as_deref(), tz)?;
    if end <= start {
        return Err(CoreError::ExternalSyncFailure(format!(
            "event '{title}' ends before it starts"
        )));
    }
    Ok(Some(ExternalBlock::meeting(start, end, title)))
}

fn parse_ics_datetime(value: &str, tzid: Option<&str>, fallback: Tz) -> Result<DateTime<Utc>, CoreError> {
    let bad = |reason: String| CoreError::ExternalSyncFailure(format!("bad date-time '{value}': {reason}"));

    if let Some(utc) = value.strip_suffix('Z') {
        let ndt = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|e| bad(e.to_string()))?;
        return Ok(ndt.and_utc());
    }

    let ndt = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|e| bad(e.to_string()))?;
    let zone = match tzid {
        Some(id) => id.parse::<Tz>().map_err(|_| bad(format!("unknown TZID {id}")))?,
        None => fallback,
    };
    local_to_utc(ndt, zone).map_err(|e| bad(e.to_string()))
}

/// Keep blocks that touch the local calendar day `date` in `tz`.
pub fn blocks_for_date(blocks: Vec<ExternalBlock>, date: NaiveDate, tz: Tz) -> Result<Vec<ExternalBlock>> {
    let midnight = |d: NaiveDate| -> Result<DateTime<Utc>> {
        let ndt = d
            .and_hms_opt(0, 0, 0)
            .context("midnight is always representable")?;
        Ok(local_to_utc(ndt, tz)?)
    };
    let day_start = midnight(date)?;
    let day_end = midnight(date + Duration::days(1))?;
    Ok(blocks
        .into_iter()
        .filter(|b| b.start < day_end && day_start < b.end)
        .collect())
}

fn unescape_ics(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape_ics(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Emit the generated blocks of a schedule as an ICS calendar.
///
/// External blocks already live in the user's calendar and are not repeated.
pub fn schedule_to_ics(schedule: &Schedule) -> String {
    let mut s = String::new();
    s.push_str("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//Cadence//EN\n");

    let generated = schedule
        .blocks
        .iter()
        .filter(|b| b.origin == BlockOrigin::Generated);
    for (i, b) in generated.enumerate() {
        let dtstart = b.start.format("%Y%m%dT%H%M%SZ");
        let dtend = b.end.format("%Y%m%dT%H%M%SZ");
        let summary = match b.kind {
            BlockType::Break => "Break".to_string(),
            _ => b.title.clone(),
        };
        let mut description = format!("Kind: {:?}\n", b.kind);
        if let Some(id) = &b.task_id {
            description.push_str(&format!("TaskId: {id}\n"));
        }
        if let Some(e) = b.energy_required {
            description.push_str(&format!("Energy: {e}\n"));
        }

        s.push_str("BEGIN:VEVENT\n");
        s.push_str(&format!("UID:cadence-{}-{}@cadence\n", schedule.date.format("%Y%m%d"), i));
        s.push_str(&format!("DTSTART:{}\n", dtstart));
        s.push_str(&format!("DTEND:{}\n", dtend));
        s.push_str(&format!("SUMMARY:{}\n", escape_ics(&summary)));
        s.push_str(&format!("DESCRIPTION:{}\n", escape_ics(&description)));
        s.push_str("END:VEVENT\n");
    }

    s.push_str("END:VCALENDAR\n");
    s
}

/// Push ICS to Google Calendar using gcalcli import.
///
/// This requires `gcalcli` installed and authenticated on the machine.
pub fn push_ics_via_gcalcli(ics: &str, calendar: Option<&str>) -> Result<()> {
    if which::which("gcalcli").is_err() {
        bail!(
            "gcalcli is not installed. Install it, authenticate, then retry.\n\nmacOS (brew):  brew install gcalcli\nUbuntu (pipx): pipx install gcalcli\n\nOr use: cadence schedule --export-ics schedule.ics"
        );
    }

    let mut cmd = std::process::Command::new("gcalcli");
    cmd.arg("import");
    if let Some(cal) = calendar {
        cmd.args(["--calendar", cal]);
    }

    let mut child = cmd
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .spawn()
        .context("spawning gcalcli import")?;

    {
        let stdin = child.stdin.as_mut().context("no stdin")?;
        stdin
            .write_all(ics.as_bytes())
            .context("writing ICS to gcalcli")?;
    }

    let status = child.wait().context("waiting on gcalcli")?;
    if !status.success() {
        bail!("gcalcli import failed: {status}");
    }

    Ok(())
}
