use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, trace};

use crate::event::{Event, EventLog};
use crate::exercise::Exercise;
use crate::keys::{is_indent, label_for_char, Key};

/// Source of keystroke timestamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for headless runs and tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
    AbandonedEarly,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::AbandonedEarly)
    }
}

/// One attempt at an exercise
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock> {
    exercise: Exercise,
    target: Vec<char>,
    typed: Vec<char>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    quit_early: bool,
    status: SessionStatus,
    events: EventLog,
    clock: C,
}

impl Session<SystemClock> {
    pub fn new(exercise: Exercise) -> Self {
        Self::with_clock(exercise, SystemClock)
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(exercise: Exercise, clock: C) -> Self {
        let target = exercise.text().chars().collect();
        Self {
            exercise,
            target,
            typed: Vec::new(),
            started_at: None,
            ended_at: None,
            quit_early: false,
            status: SessionStatus::NotStarted,
            events: EventLog::new(),
            clock,
        }
    }

    pub fn apply_key(&mut self, key: Key) {
        match key {
            Key::Backspace => self.apply_backspace(),
            Key::Interrupt => self.abandon(),
            other => {
                if let Some(c) = other.as_char() {
                    self.apply_rune(c)
                }
            }
        }
    }

    /// Type one character at the cursor.
    ///
    /// At a newline in the exercise, the indentation that follows it is
    /// absorbed into the buffer along with the pressed key. Once the buffer is
    /// as long as the exercise nothing is appended, but the press is still
    /// logged.
    pub fn apply_rune(&mut self, r: char) {
        if self.status.is_terminal() {
            return;
        }

        let now = self.clock.now();
        let idx = self.typed.len();

        let Some(&expected) = self.target.get(idx) else {
            trace!(index = idx, typed = ?r, "keystroke past end of exercise");
            self.events.push(Event::new(now, idx, label_for_char(r), ""));
            return;
        };

        if self.started_at.is_none() {
            self.started_at = Some(now);
            self.status = SessionStatus::InProgress;
            info!(exercise = self.exercise.name(), "session started");
        }

        self.typed.push(r);
        if expected == '\n' {
            while let Some(&next) = self.target.get(self.typed.len()) {
                if !is_indent(next) {
                    break;
                }
                self.typed.push(next);
            }
        }

        trace!(index = idx, typed = ?r, expected = ?expected, "keystroke");
        self.events
            .push(Event::new(now, idx, label_for_char(r), label_for_char(expected)));

        if self.finished() {
            self.ended_at = Some(now);
            self.status = SessionStatus::Completed;
            info!(
                exercise = self.exercise.name(),
                events = self.events.len(),
                "session completed"
            );
        }
    }

    /// Delete one logical character.
    ///
    /// Deleting indentation keeps going through the whole indent run and the
    /// newline before it, undoing exactly what an auto-indenting enter added.
    pub fn apply_backspace(&mut self) {
        if self.status.is_terminal() {
            return;
        }

        let now = self.clock.now();
        self.events.push(Event::backspace(now, self.typed.len()));

        let Some(removed) = self.typed.pop() else {
            return;
        };
        if !is_indent(removed) {
            return;
        }

        while self.expected_before_cursor().is_some_and(is_indent) {
            self.typed.pop();
        }
        if self.expected_before_cursor() == Some('\n') {
            self.typed.pop();
        }
    }

    /// Buffer is full and ends on the right character
    pub fn finished(&self) -> bool {
        self.typed.len() == self.target.len() && self.typed.last() == self.target.last()
    }

    pub fn abandon(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.quit_early = true;
        self.status = SessionStatus::AbandonedEarly;
        info!(
            exercise = self.exercise.name(),
            typed = self.typed.len(),
            "session abandoned"
        );
    }

    fn expected_before_cursor(&self) -> Option<char> {
        self.typed
            .len()
            .checked_sub(1)
            .and_then(|i| self.target.get(i).copied())
    }

    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    pub fn typed_text(&self) -> String {
        self.typed.iter().collect()
    }

    pub fn typed_chars(&self) -> &[char] {
        &self.typed
    }

    pub fn target_chars(&self) -> &[char] {
        &self.target
    }

    pub fn cursor(&self) -> usize {
        self.typed.len()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn quit_early(&self) -> bool {
        self.quit_early
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Time since the first keystroke, frozen once the session completes
    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(start) => (self.ended_at.unwrap_or_else(|| self.clock.now()) - start)
                .max(Duration::zero()),
            None => Duration::zero(),
        }
    }
}
