//! Configuration module for the emotion monitor.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the
//! classification API, audio capture, and session reporting, `AppPaths` for
//! cross-platform config directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{ApiConfig, AppConfig, AudioConfig, SessionConfig};
