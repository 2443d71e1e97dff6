use assert_cmd::Command;

use tapdrill::rep::Rep;
use tapdrill::store::RepStore;

fn rep(name: &str, start: i64, wpm: f64) -> Rep {
    Rep {
        hash: format!("hash-{name}"),
        start,
        end: start + 5_000,
        name: name.to_string(),
        lang: "go".to_string(),
        wpm,
        raw: wpm + 4.0,
        dur: 5_000_000_000,
        acc: 95.0,
        miss: 1,
        errs: 0,
        events: "2024-03-01 12:00:00.000\t0\tx\tz".to_string(),
    }
}

fn tapdrill(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("tapdrill").unwrap();
    cmd.env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("TAPDRILL_LOG");
    cmd
}

#[test]
fn history_prints_recent_reps_and_missed_keys() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("reps.db");
    {
        let store = RepStore::open(&db).unwrap();
        store.save_rep(&rep("old.go", 1_700_000_000_000, 30.0)).unwrap();
        store.save_rep(&rep("new.go", 1_700_000_100_000, 55.0)).unwrap();
    }

    let output = tapdrill(dir.path())
        .args(["--db", db.to_str().unwrap(), "--history", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("new.go"));
    assert!(!stdout.contains("old.go"));
    assert!(stdout.contains("most missed overall: z (2 times)"));
}

#[test]
fn export_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("reps.db");
    let csv = dir.path().join("reps.csv");
    {
        let store = RepStore::open(&db).unwrap();
        store.save_rep(&rep("main.go", 1_700_000_000_000, 42.0)).unwrap();
    }

    tapdrill(dir.path())
        .args([
            "--db",
            db.to_str().unwrap(),
            "--export",
            csv.to_str().unwrap(),
        ])
        .assert()
        .success();

    let written = std::fs::read_to_string(&csv).unwrap();
    let mut lines = written.lines();
    assert!(lines.next().unwrap().starts_with("hash,"));
    assert!(lines.next().unwrap().contains("main.go"));
    assert_eq!(lines.next(), None);
}

#[test]
fn missing_exercise_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    tapdrill(dir.path()).assert().failure();
}
