//! Watch command handler
//!
//! Follows one competition channel and reprints the standings table on every
//! change. Exits when the server closes the channel.

use super::CommandContext;
use crate::cli::WatchArgs;
use crate::error::{Result, ScoringError};
use crate::socket_server::protocol::ServerMessage;
use crate::viewer::{ViewerClient, ViewerStatus};

/// Run the watch command
pub fn run_watch(args: &WatchArgs, ctx: &CommandContext) -> Result<String> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| ScoringError::Config {
        message: format!("Failed to create tokio runtime: {}", e),
    })?;
    runtime.block_on(watch(args, ctx))
}

async fn watch(args: &WatchArgs, ctx: &CommandContext) -> Result<String> {
    let mut client = ViewerClient::new(args.server.clone()).with_cookie_name(args.cookie_name.clone());
    if let Some(token) = &args.session {
        client = client.with_session(token.clone());
    }

    let info = client.select_competition(args.competition_id).await?;
    if ctx.verbose {
        eprintln!(
            "Connected to '{}' as {} ({})",
            info.competition.name, info.username, info.client_id
        );
    }

    loop {
        let Some(msg) = client.next_message().await? else {
            break;
        };
        if !matches!(msg, ServerMessage::Snapshot { .. } | ServerMessage::Update(_)) {
            continue;
        }

        if ctx.is_json() {
            let rows = client.standings().ranked();
            println!("{}", serde_json::to_string(&rows)?);
        } else {
            println!("{}", client.standings().render());
        }

        if args.once {
            client.disconnect().await;
            return Ok(String::new());
        }
    }

    match client.status() {
        ViewerStatus::Disconnected => Ok(String::new()),
        status => Err(ScoringError::connectivity(status.to_string())),
    }
}
