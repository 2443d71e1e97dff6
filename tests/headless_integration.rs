use std::sync::mpsc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tapdrill::app::{App, AppAction, AppState, ExerciseSource};
use tapdrill::codec;
use tapdrill::config::Config;
use tapdrill::exercise::{Exercise, LineRange};
use tapdrill::rep::text_hash;
use tapdrill::runtime::{ChannelInputSource, FixedTicker, InputEvent, Runner};
use tapdrill::session::{ManualClock, SessionStatus};
use tapdrill::store::RepStore;

fn press(code: KeyCode) -> InputEvent {
    InputEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
}

/// Feed `keys` through a channel-backed runner, advancing the clock on every
/// keystroke. Returns the number of keys handled before the app quit.
fn drive(app: &mut App<ManualClock>, clock: &ManualClock, keys: Vec<InputEvent>) -> usize {
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        ChannelInputSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    let expected = keys.len();
    for key in keys {
        tx.send(key).unwrap();
    }
    drop(tx);

    let mut handled = 0;
    for _ in 0..(expected * 4 + 10) {
        match runner.step() {
            InputEvent::Key(key) => {
                clock.advance(chrono::Duration::milliseconds(250));
                handled += 1;
                if app.handle_key(key) == AppAction::Quit {
                    break;
                }
            }
            InputEvent::Resize | InputEvent::Tick => {
                if handled == expected {
                    break;
                }
            }
        }
    }
    handled
}

#[test]
fn headless_drill_is_scored_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state").join("reps.db");
    let text = "ab\n  c";

    let clock = clock();
    let source = ExerciseSource::Fixed(Exercise::new("snippet.rs", text).unwrap());
    let store = RepStore::open(&db_path).unwrap();
    let mut app = App::new(Config::default(), source, None, Some(store), clock.clone()).unwrap();

    let keys = vec![
        press(KeyCode::Char('a')),
        press(KeyCode::Char('x')),
        press(KeyCode::Backspace),
        press(KeyCode::Char('b')),
        press(KeyCode::Enter),
        press(KeyCode::Char('c')),
    ];
    assert_eq!(drive(&mut app, &clock, keys), 6);

    assert_eq!(app.state, AppState::Results);
    assert_eq!(app.session.status(), SessionStatus::Completed);
    assert_eq!(app.session.typed_text(), text);

    let outcome = app.outcome.as_ref().unwrap();
    assert!(outcome.saved);
    assert_eq!(outcome.rep.miss, 1);
    assert_eq!(outcome.rep.errs, 0);
    assert_eq!(outcome.metrics.most_missed, "b (1 time)");
    assert_eq!(outcome.best_wpm, Some(outcome.rep.wpm));
    drop(app);

    // A fresh connection sees the rep, and its log decodes back to the keystrokes
    let store = RepStore::open(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let reps = store.reps_for_hash(&text_hash(text)).unwrap();
    assert_eq!(reps.len(), 1);

    let events = codec::split_strict(&reps[0].events).unwrap();
    let typed: Vec<&str> = events.iter().map(|e| e.typed.as_str()).collect();
    assert_eq!(typed, ["a", "x", "backspace", "b", "enter", "c"]);
    assert_eq!(events[4].expected, "enter");
    assert_eq!(events[5].index, 5);
}

#[test]
fn headless_retry_starts_a_fresh_session() {
    let clock = clock();
    let source = ExerciseSource::Fixed(Exercise::new("hi", "hi").unwrap());
    let mut app = App::new(Config::default(), source, None, None, clock.clone()).unwrap();

    drive(
        &mut app,
        &clock,
        vec![press(KeyCode::Char('h')), press(KeyCode::Char('i'))],
    );
    assert_eq!(app.state, AppState::Results);
    assert!(!app.outcome.as_ref().unwrap().saved);

    drive(&mut app, &clock, vec![press(KeyCode::Char('r'))]);
    assert_eq!(app.state, AppState::Typing);
    assert_eq!(app.session.status(), SessionStatus::NotStarted);
    assert!(app.session.events().is_empty());
    assert!(app.outcome.is_none());
}

#[test]
fn headless_escape_abandons_without_saving() {
    let clock = clock();
    let source = ExerciseSource::Fixed(Exercise::new("hi", "hello").unwrap());
    let store = RepStore::open_in_memory().unwrap();
    let mut app = App::new(Config::default(), source, None, Some(store), clock.clone()).unwrap();

    let handled = drive(
        &mut app,
        &clock,
        vec![
            press(KeyCode::Char('h')),
            press(KeyCode::Esc),
            press(KeyCode::Char('e')),
        ],
    );

    assert_eq!(handled, 2);
    assert_eq!(app.session.status(), SessionStatus::AbandonedEarly);
    assert!(app.session.quit_early());
    assert!(app.session.ended_at().is_none());
    assert!(app.outcome.is_none());
}

#[test]
fn headless_next_exercise_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.py"), "one").unwrap();
    std::fs::write(dir.path().join("two.py"), "two").unwrap();

    let clock = clock();
    let source = ExerciseSource::RandomFrom {
        dir: dir.path().to_path_buf(),
    };
    let mut app = App::new(Config::default(), source, None, None, clock.clone()).unwrap();
    assert!(app.source_can_change());
    assert_eq!(app.lang, "python");

    let keys = app
        .session
        .target_chars()
        .iter()
        .map(|&c| press(KeyCode::Char(c)))
        .collect();
    drive(&mut app, &clock, keys);
    assert_eq!(app.state, AppState::Results);

    drive(&mut app, &clock, vec![press(KeyCode::Char('n'))]);
    assert_eq!(app.state, AppState::Typing);
    assert_matches!(app.session.exercise().name(), "one.py" | "two.py");

    let handled = drive(&mut app, &clock, vec![press(KeyCode::Esc)]);
    assert_eq!(handled, 1);
}

#[test]
fn headless_line_range_and_language_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.rs");
    std::fs::write(&path, "// header\nfn a() {}\nfn b() {}\n").unwrap();

    let source = ExerciseSource::File {
        path,
        range: LineRange::new(Some(2), Some(2)),
    };
    let app = App::new(
        Config::default(),
        source,
        Some("rust-2021".to_string()),
        None,
        clock(),
    )
    .unwrap();

    assert_eq!(app.session.exercise().text(), "fn a() {}\n");
    assert_eq!(app.lang, "rust-2021");
    assert!(!app.source_can_change());
}
