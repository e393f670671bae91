//! In-process daemon for end-to-end tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use scoreboard_engine::config::EngineConfig;
use scoreboard_engine::schema::{ChannelEvent, ScoreEvent};
use scoreboard_engine::session::SessionRegistry;
use scoreboard_engine::socket_server::protocol::{ClientMessage, ServerMessage};
use scoreboard_engine::socket_server::{handle_connection, ServerContext};
use scoreboard_engine::{MemoryRoster, MemoryScoreStore, ViewerClient};

use super::fixtures;

/// How long a test waits for channel traffic before failing
pub const WAIT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub ctx: Arc<ServerContext>,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<MemoryScoreStore>,
}

impl TestServer {
    /// Start a daemon with the fixture roster and sessions
    pub async fn start() -> Self {
        Self::start_with(fixtures::roster()).await
    }

    pub async fn start_with(roster: MemoryRoster) -> Self {
        let config = EngineConfig::default();
        let sessions = Arc::new(fixtures::sessions());
        let store = Arc::new(MemoryScoreStore::new());
        let ctx = Arc::new(ServerContext::new(
            &config,
            store.clone(),
            Arc::new(roster),
            sessions.clone(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("No local address");
        let accept_ctx = ctx.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, accept_ctx.clone()));
            }
        });

        Self {
            addr,
            ctx,
            sessions,
            store,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client carrying `token` as its session cookie
    pub fn client(&self, token: &str) -> ViewerClient {
        ViewerClient::new(self.url()).with_session(token)
    }

    /// Client subscribed to `competition_id`, past the initial snapshot
    pub async fn connected(&self, token: &str, competition_id: u64) -> ViewerClient {
        let mut client = self.client(token);
        tokio::time::timeout(WAIT, client.select_competition(competition_id))
            .await
            .expect("Timed out connecting")
            .expect("Failed to connect");
        match next_message(&mut client).await {
            ServerMessage::Snapshot { .. } => {}
            other => panic!("Expected snapshot after connect, got {:?}", other),
        }
        client
    }

    /// Wait until the server has no channel for `competition_id`
    pub async fn wait_for_eviction(&self, competition_id: u64) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            if self.ctx.registry.get(competition_id).is_none() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

/// Next message, failing the test on timeout or close
pub async fn next_message(client: &mut ViewerClient) -> ServerMessage {
    tokio::time::timeout(WAIT, client.next_message())
        .await
        .expect("Timed out waiting for a message")
        .expect("Connection error")
        .expect("Connection closed")
}

/// Next score update, skipping anything else
pub async fn next_score(client: &mut ViewerClient) -> ScoreEvent {
    loop {
        if let ServerMessage::Update(ChannelEvent::Score(event)) = next_message(client).await {
            return event;
        }
    }
}

/// Next channel update of any kind
pub async fn next_update(client: &mut ViewerClient) -> ChannelEvent {
    loop {
        if let ServerMessage::Update(event) = next_message(client).await {
            return event;
        }
    }
}

/// Send a request and wait for its reply
pub async fn request(client: &mut ViewerClient, msg: ClientMessage) -> ServerMessage {
    tokio::time::timeout(WAIT, client.request(msg))
        .await
        .expect("Timed out waiting for a reply")
        .expect("Request failed")
}

/// Error code of an `error` reply
pub fn error_code(reply: &ServerMessage) -> &str {
    match reply {
        ServerMessage::Error { code, .. } => code,
        other => panic!("Expected error reply, got {:?}", other),
    }
}
