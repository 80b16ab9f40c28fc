//! Report command for summarizing tracked browsing time.
//!
//! Implements `wt report` with period options (--day, --last-day, --week,
//! --last-week) and output formats (human-readable, JSON). All numbers come
//! from the persisted session/focus records at the moment the command runs;
//! nothing is precomputed or cached.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use wt_core::Tracking;
use wt_core::report::{self, DomainVisits, TimeRange};
use wt_store::{KeyValue, Store};

/// Report period type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    LastWeek,
    Day,
    LastDay,
}

/// Hour-level breakdown for one domain.
#[derive(Debug, Serialize)]
pub struct DomainBreakdown {
    pub domain: String,
    /// Focus ms per hour of day.
    pub hours: [i64; 24],
    /// Focus ms per day-of-week (Sunday first) and hour of day.
    pub week: [[i64; 24]; 7],
}

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub period_label: String,
    pub period_start_ms: i64,
    pub period_end_ms: i64,
    pub total_focus_ms: i64,
    pub average_focus_ms: i64,
    pub distinct_domains: usize,
    pub focus_by_domain: BTreeMap<String, i64>,
    pub top_sites: Vec<DomainVisits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<DomainBreakdown>,
}

// ========== Period Date Calculation ==========

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc(local_date: NaiveDate) -> DateTime<Utc> {
    let midnight = local_date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        // Single or ambiguous (DST fall-back): use the earlier time
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // DST spring-forward gap at midnight is rare but possible.
            // Use 1am local which is guaranteed to exist.
            let one_am = local_date.and_time(NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN));
            match Local.from_local_datetime(&one_am) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc::now(),
            }
        }
    }
}

/// Calculates period boundaries as a half-open local-midnight interval.
/// Weeks run Monday to Monday.
pub fn period_boundaries(period: Period, today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let days_since_monday = today.weekday().num_days_from_monday();
    let monday = today - chrono::Duration::days(i64::from(days_since_monday));

    let (start_date, end_date) = match period {
        Period::Week => (monday, monday + chrono::Duration::days(7)),
        Period::LastWeek => (monday - chrono::Duration::days(7), monday),
        Period::Day => (today, today + chrono::Duration::days(1)),
        Period::LastDay => (today - chrono::Duration::days(1), today),
    };
    (local_midnight_to_utc(start_date), local_midnight_to_utc(end_date))
}

/// Formats the period description for the report header.
fn period_label(period: Period, start: DateTime<Utc>) -> String {
    let start_date = start.with_timezone(&Local).date_naive();
    match period {
        Period::Week | Period::LastWeek => format!("Week of {}", start_date.format("%b %-d, %Y")),
        Period::Day | Period::LastDay => format!("{}", start_date.format("%A, %b %-d, %Y")),
    }
}

// ========== Duration Formatting ==========

/// Formats milliseconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
/// Negative durations are treated as 0m (defensive).
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar. Values below 5% of max still get a
/// single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

// ========== Report Generation ==========

/// Computes report data from a tracking snapshot.
///
/// Pure so it can be tested with a fixed range and timezone; `tz` only
/// affects the hour/week bucketing of the optional domain breakdown.
pub fn generate_report_data<Tz: TimeZone>(
    tracking: &Tracking,
    range: TimeRange,
    label: String,
    top: usize,
    domain: Option<&str>,
    tz: &Tz,
) -> ReportData {
    let breakdown = domain.map(|domain| DomainBreakdown {
        domain: domain.to_string(),
        hours: report::hour_histogram(tracking, domain, range, tz),
        week: report::week_histogram(tracking, domain, range, tz),
    });

    ReportData {
        period_label: label,
        period_start_ms: range.start,
        period_end_ms: range.end,
        total_focus_ms: report::focus_total_ms(tracking, range),
        average_focus_ms: report::average_focus_ms(tracking, range),
        distinct_domains: report::distinct_domains(tracking, range),
        focus_by_domain: report::focus_by_domain(tracking, range),
        top_sites: report::most_visited(tracking, range, top),
        breakdown,
    }
}

/// Formats the human-readable report output.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "BROWSING REPORT: {}", data.period_label);

    if data.top_sites.is_empty() && data.total_focus_ms == 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "No browsing recorded in this period.");
        let _ = writeln!(output);
        let _ = writeln!(output, "Hint: run 'wt status' to check tracking health.");
        return output;
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "SUMMARY");
    let _ = writeln!(output, "  Focus time:    {}", format_duration(data.total_focus_ms));
    let _ = writeln!(output, "  Average focus: {}", format_duration(data.average_focus_ms));
    let _ = writeln!(output, "  Sites visited: {}", data.distinct_domains);

    if !data.top_sites.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "TOP SITES");
        let max_focus = data.focus_by_domain.values().copied().max().unwrap_or(0);
        for (rank, site) in data.top_sites.iter().enumerate() {
            let focus = data.focus_by_domain.get(&site.domain).copied().unwrap_or(0);
            let noun = if site.sessions == 1 { "session" } else { "sessions" };
            let _ = writeln!(
                output,
                "  {}. {:<24} {:>3} {noun:<8} {:>7}  {}",
                rank + 1,
                site.domain,
                site.sessions,
                format_duration(focus),
                progress_bar(focus, max_focus),
            );
        }
    }

    if let Some(breakdown) = &data.breakdown {
        let _ = writeln!(output);
        let _ = writeln!(output, "HOURLY FOCUS: {}", breakdown.domain);
        let max_hour = breakdown.hours.iter().copied().max().unwrap_or(0);
        if max_hour == 0 {
            let _ = writeln!(output, "  (no completed focus intervals)");
        } else {
            for (hour, &ms) in breakdown.hours.iter().enumerate() {
                if ms > 0 {
                    let _ = writeln!(
                        output,
                        "  {hour:02}:00  {:>7}  {}",
                        format_duration(ms),
                        progress_bar(ms, max_hour),
                    );
                }
            }

            let _ = writeln!(output);
            let _ = writeln!(output, "BY DAY");
            const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
            let day_totals: Vec<i64> =
                breakdown.week.iter().map(|hours| hours.iter().sum()).collect();
            let max_day = day_totals.iter().copied().max().unwrap_or(0);
            for (day, &ms) in day_totals.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "  {}  {:>7}  {}",
                    DAYS[day],
                    format_duration(ms),
                    progress_bar(ms, max_day),
                );
            }
        }
    }

    output
}

/// Runs the report command against a store snapshot.
pub async fn run<W: Write, S: KeyValue>(
    writer: &mut W,
    store: &Store<S>,
    period: Period,
    json: bool,
    top: usize,
    domain: Option<&str>,
) -> Result<()> {
    let tracking = store.snapshot().await?;

    let today = Local::now().date_naive();
    let (start, end) = period_boundaries(period, today);
    // Half-open boundaries, inclusive range filter.
    let range = TimeRange::new(start.timestamp_millis(), end.timestamp_millis() - 1);
    let label = period_label(period, start);

    let data = generate_report_data(&tracking, range, label, top, domain, &Local);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }
    Ok(())
}
