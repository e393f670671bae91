//! Command modules for the scoreboard CLI
//!
//! Each command module implements a single top-level command:
//! - `reduce` - Reduce raw marks to a computed score
//! - `schema` - Describe the raw-mark fields per discipline
//! - `watch` - Follow a competition channel
//! - `config` - Show or initialize the daemon configuration
//!
//! All command handlers take their respective `Args` struct from `cli.rs`
//! and a shared `CommandContext` for output format and verbosity.

pub mod config;
pub mod reduce;
pub mod schema;
pub mod watch;

pub use config::run_config;
pub use reduce::run_reduce;
pub use schema::run_schema;
pub use watch::run_watch;

use crate::cli::OutputFormat;

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Output format (text or json)
    pub format: OutputFormat,
    /// Show verbose output
    pub verbose: bool,
}

impl CommandContext {
    /// Create a new CommandContext from CLI args
    pub fn from_cli(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}
