use chrono::{DateTime, Utc};

use crate::keys::BACKSPACE;

/// One recorded keystroke
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    /// Label of the key pressed
    pub typed: String,
    /// Label of the exercise char at `index`; empty for backspace
    pub expected: String,
    /// Buffer cursor before the keystroke was applied
    pub index: usize,
}

impl Event {
    pub fn new(
        timestamp: DateTime<Utc>,
        index: usize,
        typed: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            typed: typed.into(),
            expected: expected.into(),
            index,
        }
    }

    pub fn backspace(timestamp: DateTime<Utc>, index: usize) -> Self {
        Self::new(timestamp, index, BACKSPACE, "")
    }

    pub fn is_backspace(&self) -> bool {
        self.typed == BACKSPACE
    }

    /// A non-backspace keystroke whose label differs from the expected one
    pub fn is_mistake(&self) -> bool {
        !self.is_backspace() && self.typed != self.expected
    }

    /// Equality at the precision the event codec persists (milliseconds)
    pub fn matches(&self, other: &Event) -> bool {
        self.timestamp.timestamp_millis() == other.timestamp.timestamp_millis()
            && self.index == other.index
            && self.typed == other.typed
            && self.expected == other.expected
    }
}

/// Append-only, chronologically ordered keystroke log
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Read-only view for the metrics engine
    pub fn snapshot(&self) -> &[Event] {
        &self.events
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
