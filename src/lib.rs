// Library surface shared by the binary and the integration tests.
pub mod app;
pub mod app_dirs;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod exercise;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod rep;
pub mod runtime;
pub mod session;
pub mod store;
pub mod ui;

pub use error::{Error, Result};

pub const TICK_RATE_MS: u64 = 100;
