use std::path::PathBuf;

use thiserror::Error;

use crate::codec::ParseError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("exercise {0:?} has no text to type")]
    EmptyExercise(String),
    #[error("invalid line range {start:?}..{end:?}: {reason}")]
    InvalidLineRange {
        start: Option<usize>,
        end: Option<usize>,
        reason: &'static str,
    },
    #[error("no exercise files found in {0}")]
    NoExercises(PathBuf),
    #[error("session has not been completed")]
    SessionNotCompleted,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
