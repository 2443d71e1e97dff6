use std::{
    error::Error,
    fs::File,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use chrono::{Local, TimeZone, Utc};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{info, warn};

use tapdrill::{
    app::{App, AppAction, ExerciseSource},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    exercise::LineRange,
    logging, metrics,
    runtime::{CrosstermInputSource, FixedTicker, InputEvent, Runner},
    session::SystemClock,
    store::RepStore,
    ui, TICK_RATE_MS,
};

#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Typing drills over real source files. Every keystroke is logged, and each finished drill is scored and saved so you can see which keys keep tripping you up."
)]
pub struct Cli {
    /// file to type; without it a random file is picked from --dir or the configured exercise_dir
    file: Option<PathBuf>,

    /// directory to pick a random exercise from
    #[clap(short = 'd', long)]
    dir: Option<PathBuf>,

    /// first line of FILE to include (1-based)
    #[clap(short = 's', long)]
    start_line: Option<usize>,

    /// last line of FILE to include (inclusive)
    #[clap(short = 'e', long)]
    end_line: Option<usize>,

    /// language tag to store with results, instead of guessing from the file extension
    #[clap(short = 'l', long)]
    lang: Option<String>,

    /// print the N most recent results and exit
    #[clap(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    history: Option<usize>,

    /// export all results as CSV to PATH and exit
    #[clap(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// do not save this drill's result
    #[clap(long)]
    no_save: bool,

    /// results database to use instead of the default one
    #[clap(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

impl Cli {
    fn exercise_source(&self, config: &Config) -> Result<ExerciseSource, String> {
        if let Some(path) = &self.file {
            return Ok(ExerciseSource::File {
                path: path.clone(),
                range: LineRange::new(self.start_line, self.end_line),
            });
        }
        if self.start_line.is_some() || self.end_line.is_some() {
            return Err("--start-line and --end-line require a FILE".to_string());
        }
        match self.dir.clone().or_else(|| config.exercise_dir.clone()) {
            Some(dir) => Ok(ExerciseSource::RandomFrom { dir }),
            None => Err(
                "no exercise given: pass a FILE or --dir, or set exercise_dir in the config"
                    .to_string(),
            ),
        }
    }

    fn is_report(&self) -> bool {
        self.history.is_some() || self.export.is_some()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = FileConfigStore::new().load();
    if cli.no_save {
        config.save_reps = false;
    }
    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = logging::init(&log_path, &config.log_level) {
            eprintln!("tapdrill: logging disabled: {e}");
        }
    }

    let db_path = cli.db.clone().or_else(AppDirs::db_path);

    if cli.is_report() {
        return run_report(&cli, db_path, &config);
    }

    let source = match cli.exercise_source(&config) {
        Ok(source) => source,
        Err(msg) => Cli::command()
            .error(ErrorKind::MissingRequiredArgument, msg)
            .exit(),
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = match db_path.as_deref().map(RepStore::open) {
        Some(Ok(store)) => Some(store),
        Some(Err(e)) => {
            warn!(error = %e, "results will not be saved");
            None
        }
        None => None,
    };

    let mut app = match App::new(config, source, cli.lang.clone(), store, SystemClock) {
        Ok(app) => app,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<SystemClock>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermInputSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            InputEvent::Key(key) => {
                if app.handle_key(key) == AppAction::Quit {
                    break;
                }
            }
            // The elapsed-time header needs a redraw on every tick
            InputEvent::Resize | InputEvent::Tick => {}
        }
    }

    info!(status = %app.session.status(), "exiting");
    Ok(())
}

fn run_report(cli: &Cli, db_path: Option<PathBuf>, config: &Config) -> Result<(), Box<dyn Error>> {
    let Some(db_path) = db_path else {
        return Err("no results database path could be determined; pass --db".into());
    };
    let store = RepStore::open(&db_path)?;

    if let Some(path) = &cli.export {
        let n = store.export_csv(File::create(path)?)?;
        println!("exported {n} results to {}", path.display());
    }

    if let Some(limit) = cli.history {
        for line in history_lines(&store, limit, config.missed_keys_limit)? {
            println!("{line}");
        }
    }

    Ok(())
}

fn history_lines(
    store: &RepStore,
    limit: usize,
    missed_limit: usize,
) -> Result<Vec<String>, Box<dyn Error>> {
    let reps = store.recent_reps(limit)?;
    if reps.is_empty() {
        return Ok(vec!["no results yet".to_string()]);
    }

    let mut lines = vec![format!(
        "{:<16}  {:<24} {:<10} {:>7} {:>7} {:>7} {:>10} {:>5} {:>5}",
        "when", "exercise", "lang", "wpm", "raw", "acc", "time", "miss", "errs"
    )];
    for rep in &reps {
        let when = Utc
            .timestamp_millis_opt(rep.start)
            .single()
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        let time = metrics::format_duration(chrono::Duration::nanoseconds(rep.dur));
        lines.push(format!(
            "{:<16}  {:<24} {:<10} {:>7.1} {:>7.1} {:>6.2}% {:>10} {:>5} {:>5}",
            when, rep.name, rep.lang, rep.wpm, rep.raw, rep.acc, time, rep.miss, rep.errs
        ));
    }

    let missed = store.most_missed_overall(missed_limit)?;
    if !missed.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "most missed overall: {}",
            metrics::format_missed_keys(&missed)
        ));
    }
    Ok(lines)
}
