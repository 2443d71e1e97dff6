//! Statistics derived from a finished keystroke log.
//!
//! Everything here is a pure function of an event slice, so results can be
//! recomputed from a persisted log at any time.
//!
//! Two different mistake counts live here and must not be merged:
//! [`num_mistakes`] counts wrong keystrokes (every attempt), while
//! [`num_incorrect`] counts positions whose final keystroke was wrong.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;

use crate::event::Event;

pub const DEFAULT_MISSED_KEYS_LIMIT: usize = 3;
const CHARS_PER_WORD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    /// Seconds since the first keystroke
    pub t: f64,
    pub wpm: f64,
}

impl TimeSeriesPoint {
    pub fn new(t: f64, wpm: f64) -> Self {
        Self { t, wpm }
    }
}

impl From<TimeSeriesPoint> for (f64, f64) {
    fn from(p: TimeSeriesPoint) -> Self {
        (p.t, p.wpm)
    }
}

pub fn duration(start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    (end - start).max(Duration::zero())
}

/// Elapsed time rendered to the millisecond, e.g. `"9.250s"`
pub fn duration_string(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format_duration(duration(start, end))
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.num_milliseconds().max(0);
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}

fn keystrokes(events: &[Event]) -> impl Iterator<Item = &Event> {
    events.iter().filter(|e| !e.is_backspace())
}

/// Share of non-backspace keystrokes that matched, in `[0, 100]`
pub fn accuracy_percent(events: &[Event]) -> f64 {
    let total = keystrokes(events).count();
    if total == 0 {
        return 0.0;
    }
    let mismatched = num_mistakes(events);
    (total - mismatched) as f64 / total as f64 * 100.0
}

pub fn accuracy(events: &[Event]) -> String {
    format!("{:.2}", accuracy_percent(events))
}

/// Wrong keystrokes, counting every attempt at a position
pub fn num_mistakes(events: &[Event]) -> usize {
    events.iter().filter(|e| e.is_mistake()).count()
}

/// Whether the last keystroke at each touched position was right.
///
/// A backspace at cursor `i` undoes position `i - 1`, which then counts as
/// correct until it is typed again. Presses past the end of the exercise
/// have no position and are left out.
pub fn correctness_by_position(events: &[Event]) -> BTreeMap<usize, bool> {
    let mut table = BTreeMap::new();
    for e in events {
        if e.is_backspace() {
            if let Some(undone) = e.index.checked_sub(1) {
                table.insert(undone, true);
            }
        } else if !e.expected.is_empty() {
            table.insert(e.index, e.typed == e.expected);
        }
    }
    table
}

/// Positions left wrong at the end of the session
pub fn num_incorrect(events: &[Event]) -> usize {
    correctness_by_position(events)
        .values()
        .filter(|ok| !**ok)
        .count()
}

/// Same table as [`num_incorrect`], under the name the rep record uses
pub fn num_uncorrected_errors(events: &[Event]) -> usize {
    num_incorrect(events)
}

fn words_and_minutes(events: &[Event]) -> Option<(f64, f64)> {
    if events.len() < 2 {
        return None;
    }
    let (first, last) = (events.first()?, events.last()?);
    let words = (last.index as f64 - first.index as f64 + 1.0) / CHARS_PER_WORD;
    let minutes = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;
    if minutes <= 0.0 {
        return None;
    }
    Some((words, minutes))
}

/// Net words per minute, penalised by positions left wrong
pub fn wpm(events: &[Event]) -> f64 {
    match words_and_minutes(events) {
        Some((words, minutes)) => ((words - num_incorrect(events) as f64) / minutes).max(0.0),
        None => 0.0,
    }
}

pub fn wpm_raw(events: &[Event]) -> f64 {
    match words_and_minutes(events) {
        Some((words, minutes)) => (words / minutes).max(0.0),
        None => 0.0,
    }
}

/// Mismatch counts per expected key, most missed first, ties alphabetical
pub fn missed_key_counts(events: &[Event], limit: usize) -> Vec<(String, usize)> {
    events
        .iter()
        .filter(|e| e.is_mistake() && !e.expected.is_empty())
        .map(|e| e.expected.clone())
        .counts()
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .take(limit)
        .collect()
}

/// e.g. `"y (2 times), h (1 time)"`
pub fn most_missed_keys(events: &[Event], limit: usize) -> String {
    format_missed_keys(&missed_key_counts(events, limit))
}

pub fn format_missed_keys(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(key, n)| {
            let unit = if *n == 1 { "time" } else { "times" };
            format!("{key} ({n} {unit})")
        })
        .join(", ")
}

/// Raw typing speed over a sliding window, sampled every `step`.
///
/// Near the start of the session the window is shortened to the time
/// elapsed so far.
pub fn wpm_series(events: &[Event], window: Duration, step: Duration) -> Vec<TimeSeriesPoint> {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Vec::new();
    };
    let total = (last.timestamp - first.timestamp).num_milliseconds();
    let window = window.num_milliseconds().max(1);
    let step = step.num_milliseconds().max(1);
    if total <= 0 {
        return Vec::new();
    }

    let offsets: Vec<i64> = keystrokes(events)
        .map(|e| (e.timestamp - first.timestamp).num_milliseconds())
        .collect();

    let mut points = Vec::new();
    let mut t = step;
    loop {
        let end = t.min(total);
        let span = window.min(end);
        let count = offsets
            .iter()
            .filter(|&&o| o <= end && (o > end - window || end <= window))
            .count();
        let minutes = span as f64 / 60_000.0;
        let wpm = count as f64 / CHARS_PER_WORD / minutes;
        points.push(TimeSeriesPoint::new(end as f64 / 1000.0, wpm));
        if t >= total {
            break;
        }
        t += step;
    }
    points
}

/// Standard deviation of the sampled speeds; lower is steadier
pub fn consistency(series: &[TimeSeriesPoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().map(|p| p.wpm).sum::<f64>() / n;
    let variance = series.iter().map(|p| (p.wpm - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Every statistic for a finished session, computed in one pass over the API above
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetrics {
    pub wpm: f64,
    pub raw_wpm: f64,
    pub accuracy: f64,
    pub duration: Duration,
    pub mistakes: usize,
    pub uncorrected_errors: usize,
    pub most_missed: String,
    pub series: Vec<TimeSeriesPoint>,
    pub consistency: f64,
}

impl SessionMetrics {
    pub fn compute(
        events: &[Event],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        missed_limit: usize,
    ) -> Self {
        let series = wpm_series(events, Duration::seconds(5), Duration::seconds(1));
        Self {
            wpm: wpm(events),
            raw_wpm: wpm_raw(events),
            accuracy: accuracy_percent(events),
            duration: duration(start, end),
            mistakes: num_mistakes(events),
            uncorrected_errors: num_uncorrected_errors(events),
            most_missed: most_missed_keys(events, missed_limit),
            consistency: consistency(&series),
            series,
        }
    }
}
