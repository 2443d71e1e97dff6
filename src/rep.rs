use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec;
use crate::error::{Error, Result};
use crate::metrics::{self, SessionMetrics};
use crate::session::{Clock, Session, SessionStatus};

/// Summary of one completed session, as handed to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rep {
    /// SHA-256 of the exercise text, hex encoded
    pub hash: String,
    /// Unix milliseconds
    pub start: i64,
    pub end: i64,
    pub name: String,
    pub lang: String,
    pub wpm: f64,
    pub raw: f64,
    /// Nanoseconds
    pub dur: i64,
    pub acc: f64,
    /// Wrong keystrokes, every attempt counted
    pub miss: i64,
    /// Positions still wrong at the end
    pub errs: i64,
    /// Event log in codec form
    pub events: String,
}

impl Rep {
    /// Only completed sessions produce a rep; abandoned ones are discarded.
    pub fn from_session<C: Clock>(session: &Session<C>, lang: &str) -> Result<Self> {
        let (Some(started), Some(ended)) = (session.started_at(), session.ended_at()) else {
            return Err(Error::SessionNotCompleted);
        };
        let stats = SessionMetrics::compute(
            session.events().snapshot(),
            started,
            ended,
            metrics::DEFAULT_MISSED_KEYS_LIMIT,
        );
        Self::from_metrics(session, lang, &stats)
    }

    /// Build the rep from statistics already computed for the results screen,
    /// so the two always agree.
    pub fn from_metrics<C: Clock>(
        session: &Session<C>,
        lang: &str,
        stats: &SessionMetrics,
    ) -> Result<Self> {
        let (Some(started), Some(ended)) = (session.started_at(), session.ended_at()) else {
            return Err(Error::SessionNotCompleted);
        };
        if session.status() != SessionStatus::Completed {
            return Err(Error::SessionNotCompleted);
        }

        Ok(Self {
            hash: text_hash(session.exercise().text()),
            start: started.timestamp_millis(),
            end: ended.timestamp_millis(),
            name: session.exercise().name().to_string(),
            lang: lang.to_string(),
            wpm: stats.wpm,
            raw: stats.raw_wpm,
            dur: stats.duration.num_nanoseconds().unwrap_or(i64::MAX),
            acc: stats.accuracy,
            miss: stats.mistakes as i64,
            errs: stats.uncorrected_errors as i64,
            events: codec::join(session.events().snapshot()),
        })
    }
}

pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::Exercise;
    use crate::keys::Key;
    use crate::session::ManualClock;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn typed_session(text: &str, keys: &[Key]) -> Session<ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let mut s = Session::with_clock(Exercise::new("demo.rs", text).unwrap(), clock.clone());
        for key in keys {
            s.apply_key(*key);
            clock.advance(Duration::milliseconds(250));
        }
        s
    }

    #[test]
    fn test_text_hash() {
        assert_eq!(
            text_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_rep_from_completed_session() {
        let keys = [
            Key::Rune('x'),
            Key::Backspace,
            Key::Rune('a'),
            Key::Rune('b'),
        ];
        let s = typed_session("ab", &keys);
        let rep = Rep::from_session(&s, "rust").unwrap();

        assert_eq!(rep.hash, text_hash("ab"));
        assert_eq!(rep.name, "demo.rs");
        assert_eq!(rep.lang, "rust");
        assert_eq!(rep.end - rep.start, 750);
        assert_eq!(rep.dur, 750_000_000);
        assert_eq!(rep.miss, 1);
        assert_eq!(rep.errs, 0);
        assert!((rep.acc - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(rep.events.lines().count(), 4);
        assert!(rep.wpm > 0.0);
        assert!(rep.raw >= rep.wpm);
    }

    #[test]
    fn test_rep_carries_precomputed_metrics() {
        let keys = [
            Key::Rune('a'),
            Key::Rune('x'),
            Key::Backspace,
            Key::Rune('b'),
            Key::Rune('c'),
        ];
        let s = typed_session("abc", &keys);
        let stats = SessionMetrics::compute(
            s.events().snapshot(),
            s.started_at().unwrap(),
            s.ended_at().unwrap(),
            1,
        );
        let rep = Rep::from_metrics(&s, "text", &stats).unwrap();

        assert_eq!(rep.wpm, stats.wpm);
        assert_eq!(rep.raw, stats.raw_wpm);
        assert_eq!(rep.acc, stats.accuracy);
        assert_eq!(rep.miss, stats.mistakes as i64);
        assert_eq!(rep.errs, stats.uncorrected_errors as i64);
        assert_eq!(rep.dur, stats.duration.num_nanoseconds().unwrap());
        assert_eq!(rep, Rep::from_session(&s, "text").unwrap());
    }

    #[test]
    fn test_rep_rejects_unfinished_sessions() {
        let in_progress = typed_session("abc", &[Key::Rune('a')]);
        assert_matches!(
            Rep::from_session(&in_progress, "text"),
            Err(Error::SessionNotCompleted)
        );

        let abandoned = typed_session("abc", &[Key::Rune('a'), Key::Interrupt]);
        assert_matches!(
            Rep::from_session(&abandoned, "text"),
            Err(Error::SessionNotCompleted)
        );
    }
}
