//! scoreboard CLI entry point

use std::process::ExitCode;

use clap::Parser;

use scoreboard_engine::cli::{Cli, Commands};
use scoreboard_engine::commands::{run_config, run_reduce, run_schema, run_watch, CommandContext};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so text and JSON output stay clean
    let level = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("scoreboard_engine={}", level))),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let ctx = CommandContext::from_cli(cli.format, cli.verbose);
    let result = match &cli.command {
        Commands::Reduce(args) => run_reduce(args, &ctx),
        Commands::Schema(args) => run_schema(args, &ctx),
        Commands::Watch(args) => run_watch(args, &ctx),
        Commands::Config(args) => run_config(args, &ctx),
    };

    match result {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}
