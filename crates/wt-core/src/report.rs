//! Read-only aggregation over the tracking document.
//!
//! Every query takes an inclusive `[start, end]` epoch-ms range and filters
//! on each record's `start` field. Still-open intervals have no known
//! duration and contribute zero to time sums; only completed records
//! (`total` present) count.

use std::collections::BTreeMap;

use chrono::{Datelike, TimeZone, Timelike};
use serde::Serialize;

use crate::record::{Focus, Tracking};

const HOUR_MS: i64 = 3_600_000;

/// An inclusive timestamp range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// A domain ranked by how many sessions started in the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainVisits {
    pub domain: String,
    pub sessions: usize,
}

fn completed_focus<'a>(
    tracking: &'a Tracking,
    range: TimeRange,
) -> impl Iterator<Item = (&'a String, &'a Focus)> {
    tracking.domains.iter().flat_map(move |(domain, sessions)| {
        sessions.values().flat_map(move |session| {
            session
                .focus
                .values()
                .filter(move |f| f.total.is_some() && range.contains(f.start))
                .map(move |f| (domain, f))
        })
    })
}

/// Total completed focus time in the range, across all domains.
#[must_use]
pub fn focus_total_ms(tracking: &Tracking, range: TimeRange) -> i64 {
    completed_focus(tracking, range)
        .filter_map(|(_, f)| f.total)
        .sum()
}

/// Completed focus time per domain; domains with zero focus are omitted.
#[must_use]
pub fn focus_by_domain(tracking: &Tracking, range: TimeRange) -> BTreeMap<String, i64> {
    let mut by_domain = BTreeMap::new();
    for (domain, focus) in completed_focus(tracking, range) {
        if let Some(total) = focus.total {
            *by_domain.entry(domain.clone()).or_insert(0) += total;
        }
    }
    by_domain.retain(|_, total| *total > 0);
    by_domain
}

/// Mean duration of completed focus intervals in the range, or 0 with none.
#[must_use]
pub fn average_focus_ms(tracking: &Tracking, range: TimeRange) -> i64 {
    let (count, sum) = completed_focus(tracking, range)
        .filter_map(|(_, f)| f.total)
        .fold((0_i64, 0_i64), |(count, sum), total| (count + 1, sum + total));
    if count == 0 { 0 } else { sum / count }
}

/// The top `n` domains by number of sessions started in the range,
/// descending, ties broken by domain name.
#[must_use]
pub fn most_visited(tracking: &Tracking, range: TimeRange, n: usize) -> Vec<DomainVisits> {
    let mut visits: Vec<DomainVisits> = tracking
        .domains
        .iter()
        .filter_map(|(domain, sessions)| {
            let count = sessions.values().filter(|s| range.contains(s.start)).count();
            (count > 0).then(|| DomainVisits {
                domain: domain.clone(),
                sessions: count,
            })
        })
        .collect();
    visits.sort_by(|a, b| b.sessions.cmp(&a.sessions).then_with(|| a.domain.cmp(&b.domain)));
    visits.truncate(n);
    visits
}

/// Number of distinct domains with at least one session start in the range.
#[must_use]
pub fn distinct_domains(tracking: &Tracking, range: TimeRange) -> usize {
    tracking
        .domains
        .values()
        .filter(|sessions| sessions.values().any(|s| range.contains(s.start)))
        .count()
}

/// Hour-of-day focus histogram for one domain.
///
/// Each completed focus interval starting in the range has its duration
/// split proportionally across the wall-clock hours it spans, in `tz`.
#[must_use]
pub fn hour_histogram<Tz: TimeZone>(
    tracking: &Tracking,
    domain: &str,
    range: TimeRange,
    tz: &Tz,
) -> [i64; 24] {
    let mut buckets = [0_i64; 24];
    for_each_focus_chunk(tracking, domain, range, tz, |_, hour, ms| {
        buckets[hour] += ms;
    });
    buckets
}

/// Day-of-week × hour-of-day focus histogram for one domain (Sunday first).
#[must_use]
pub fn week_histogram<Tz: TimeZone>(
    tracking: &Tracking,
    domain: &str,
    range: TimeRange,
    tz: &Tz,
) -> [[i64; 24]; 7] {
    let mut buckets = [[0_i64; 24]; 7];
    for_each_focus_chunk(tracking, domain, range, tz, |day, hour, ms| {
        buckets[day][hour] += ms;
    });
    buckets
}

fn for_each_focus_chunk<Tz: TimeZone>(
    tracking: &Tracking,
    domain: &str,
    range: TimeRange,
    tz: &Tz,
    mut add: impl FnMut(usize, usize, i64),
) {
    let Some(sessions) = tracking.domains.get(domain) else {
        return;
    };
    for session in sessions.values() {
        for focus in session.focus.values() {
            if focus.total.is_none() || !range.contains(focus.start) {
                continue;
            }
            let Some(end) = focus.end else { continue };
            split_across_hours(focus.start, end, tz, &mut add);
        }
    }
}

/// Walks `[start, end)` hour chunk by hour chunk in `tz`, reporting
/// `(day_of_week, hour_of_day, chunk_ms)` for each piece. Recomputing the
/// local time at every chunk boundary keeps buckets right across DST shifts.
fn split_across_hours<Tz: TimeZone>(
    start: i64,
    end: i64,
    tz: &Tz,
    add: &mut impl FnMut(usize, usize, i64),
) {
    let mut cur = start;
    while cur < end {
        let Some(local) = tz.timestamp_millis_opt(cur).single() else {
            return;
        };
        let into_hour = i64::from(local.minute()) * 60_000
            + i64::from(local.second()) * 1_000
            + i64::from(local.timestamp_subsec_millis());
        let chunk_end = (cur + (HOUR_MS - into_hour)).min(end);
        add(
            local.weekday().num_days_from_sunday() as usize,
            local.hour() as usize,
            chunk_end - cur,
        );
        cur = chunk_end;
    }
}
