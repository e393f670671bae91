//! CLI argument definitions using clap with subcommand architecture
//!
//! The `scoreboard` binary is the offline companion of the daemon: it reduces
//! raw marks exactly as the server would, documents the per-discipline
//! fields and follows a competition channel from a terminal.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::discipline::Discipline;
use crate::round::RoundId;
use crate::schema::CompetitionId;
use crate::socket_server::gate::DEFAULT_COOKIE_NAME;

/// Live scoring engine for shooting competitions
#[derive(Parser, Debug)]
#[command(name = "scoreboard")]
#[command(about = "Score reduction, field schemas and live standings for shooting competitions")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================
// Main Commands Enum
// ============================================

/// Available subcommands for scoreboard
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reduce raw marks to a computed score
    #[command(visible_alias = "r")]
    Reduce(ReduceArgs),

    /// Show the raw-mark fields of each discipline
    Schema(SchemaArgs),

    /// Follow a competition's live standings
    #[command(visible_alias = "w")]
    Watch(WatchArgs),

    /// Manage daemon configuration
    Config(ConfigArgs),
}

// ============================================
// Reduce Subcommand
// ============================================

/// Arguments for the reduce command
#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Discipline ruleset (e.g. fbi, clay, precision_pistol)
    #[arg(short, long, value_parser = parse_discipline)]
    pub discipline: Discipline,

    /// Round label (e.g. "Ronda 1", "Serie 2", "Final")
    #[arg(short, long, value_parser = parse_round)]
    pub round: RoundId,

    /// Raw marks as a JSON object
    #[arg(value_name = "JSON", conflicts_with = "file")]
    pub marks: Option<String>,

    /// Read raw marks from a JSON file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

// ============================================
// Schema Subcommand
// ============================================

/// Arguments for the schema command
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Only show this discipline
    #[arg(value_parser = parse_discipline)]
    pub discipline: Option<Discipline>,
}

// ============================================
// Watch Subcommand
// ============================================

/// Arguments for the watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Competition to follow
    #[arg(value_name = "COMPETITION_ID")]
    pub competition_id: CompetitionId,

    /// Daemon address
    #[arg(long, default_value = "ws://127.0.0.1:9300")]
    pub server: String,

    /// Session token
    #[arg(long, env = "SCOREBOARD_SESSION")]
    pub session: Option<String>,

    /// Name of the session cookie
    #[arg(long, default_value = DEFAULT_COOKIE_NAME)]
    pub cookie_name: String,

    /// Print the table once and exit
    #[arg(long)]
    pub once: bool,
}

// ============================================
// Config Subcommand
// ============================================

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub operation: ConfigOperation,
}

#[derive(Subcommand, Debug)]
pub enum ConfigOperation {
    /// Print the effective configuration
    Show {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
    /// Write a default configuration file
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ============================================
// Output Format
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default for terminal)
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// JSON for machine parsing
    Json,
}

// ============================================
// Value Parsers
// ============================================

fn parse_discipline(s: &str) -> Result<Discipline, String> {
    s.parse().map_err(|e: crate::error::ScoringError| e.to_string())
}

fn parse_round(s: &str) -> Result<RoundId, String> {
    s.parse().map_err(|e: crate::error::ScoringError| e.to_string())
}
