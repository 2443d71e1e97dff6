use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::exercise::{language_for_path, load_exercise, pick_random, Exercise, LineRange};
use crate::metrics::SessionMetrics;
use crate::rep::{text_hash, Rep};
use crate::runtime::key_from_event;
use crate::session::{Clock, Session, SessionStatus};
use crate::store::RepStore;

/// Where the next exercise comes from
#[derive(Debug, Clone)]
pub enum ExerciseSource {
    File { path: PathBuf, range: LineRange },
    RandomFrom { dir: PathBuf },
    Fixed(Exercise),
}

impl ExerciseSource {
    /// Produce an exercise and the language tag to store with its reps
    pub fn next(&self, lang_override: Option<&str>) -> Result<(Exercise, String)> {
        let (exercise, detected) = match self {
            ExerciseSource::File { path, range } => {
                (load_exercise(path, *range)?, language_for_path(path))
            }
            ExerciseSource::RandomFrom { dir } => {
                let path = pick_random(dir, &mut rand::thread_rng())?;
                (load_exercise(&path, LineRange::default())?, language_for_path(&path))
            }
            ExerciseSource::Fixed(exercise) => (exercise.clone(), "text"),
        };
        let lang = lang_override.unwrap_or(detected).to_string();
        Ok((exercise, lang))
    }

    /// Whether `next` can yield a different exercise than the current one
    pub fn can_change(&self) -> bool {
        matches!(self, ExerciseSource::RandomFrom { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Continue,
    Quit,
}

/// What the results screen shows
#[derive(Debug, Clone)]
pub struct Outcome {
    pub metrics: SessionMetrics,
    pub rep: Rep,
    pub best_wpm: Option<f64>,
    pub saved: bool,
}

pub struct App<C: Clock + Clone> {
    pub config: Config,
    pub state: AppState,
    pub session: Session<C>,
    pub lang: String,
    pub outcome: Option<Outcome>,
    source: ExerciseSource,
    lang_override: Option<String>,
    store: Option<RepStore>,
    clock: C,
}

impl<C: Clock + Clone> App<C> {
    pub fn new(
        config: Config,
        source: ExerciseSource,
        lang_override: Option<String>,
        store: Option<RepStore>,
        clock: C,
    ) -> Result<Self> {
        let (exercise, lang) = source.next(lang_override.as_deref())?;
        info!(exercise = exercise.name(), lang = %lang, "starting exercise");
        Ok(Self {
            config,
            state: AppState::Typing,
            session: Session::with_clock(exercise, clock.clone()),
            lang,
            outcome: None,
            source,
            lang_override,
            store,
            clock,
        })
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        match self.state {
            AppState::Typing => self.handle_typing_key(key),
            AppState::Results => self.handle_results_key(key),
        }
    }

    fn handle_typing_key(&mut self, key: KeyEvent) -> AppAction {
        let Some(key) = key_from_event(key) else {
            return AppAction::Continue;
        };
        self.session.apply_key(key);

        match self.session.status() {
            SessionStatus::AbandonedEarly => AppAction::Quit,
            SessionStatus::Completed => {
                self.finish();
                AppAction::Continue
            }
            SessionStatus::NotStarted | SessionStatus::InProgress => AppAction::Continue,
        }
    }

    fn handle_results_key(&mut self, key: KeyEvent) -> AppAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppAction::Quit;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => AppAction::Quit,
            KeyCode::Char('r') => {
                self.restart();
                AppAction::Continue
            }
            KeyCode::Char('n') if self.source.can_change() => {
                if let Err(e) = self.next_exercise() {
                    warn!(error = %e, "could not load next exercise, retrying current one");
                    self.restart();
                }
                AppAction::Continue
            }
            _ => AppAction::Continue,
        }
    }

    /// Compute metrics for the completed session and persist its rep
    fn finish(&mut self) {
        let (Some(start), Some(end)) = (self.session.started_at(), self.session.ended_at()) else {
            return;
        };
        let metrics = SessionMetrics::compute(
            self.session.events().snapshot(),
            start,
            end,
            self.config.missed_keys_limit,
        );
        let rep = match Rep::from_metrics(&self.session, &self.lang, &metrics) {
            Ok(rep) => rep,
            Err(e) => {
                warn!(error = %e, "no rep for session");
                return;
            }
        };

        let mut saved = false;
        let mut best_wpm = None;
        if let Some(store) = &self.store {
            if self.config.save_reps {
                match store.save_rep(&rep) {
                    Ok(()) => saved = true,
                    Err(e) => warn!(error = %e, "failed to save rep"),
                }
            }
            best_wpm = store
                .best_wpm(&text_hash(self.session.exercise().text()))
                .unwrap_or_else(|e| {
                    warn!(error = %e, "failed to look up best wpm");
                    None
                });
        }

        self.outcome = Some(Outcome {
            metrics,
            rep,
            best_wpm,
            saved,
        });
        self.state = AppState::Results;
    }

    pub fn source_can_change(&self) -> bool {
        self.source.can_change()
    }

    pub fn restart(&mut self) {
        let exercise = self.session.exercise().clone();
        self.reset_with(exercise);
    }

    pub fn next_exercise(&mut self) -> Result<()> {
        let (exercise, lang) = self.source.next(self.lang_override.as_deref())?;
        self.lang = lang;
        self.reset_with(exercise);
        Ok(())
    }

    fn reset_with(&mut self, exercise: Exercise) {
        info!(exercise = exercise.name(), "new session");
        self.session = Session::with_clock(exercise, self.clock.clone());
        self.outcome = None;
        self.state = AppState::Typing;
    }
}
