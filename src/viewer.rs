//! Viewer-side channel client
//!
//! Connects to one competition at a time, keeps its own [`StandingsSnapshot`]
//! up to date from the channel and exposes a status suitable for an on-screen
//! indicator. There is no automatic reconnect: after a failure the caller
//! decides when to select a competition again.
//!
//! ```text
//! Disconnected ──select──► Connecting ──connected──► Connected
//!      ▲                       │                        │
//!      └────── close / error / competition change ──────┘
//! ```

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{AuthFailure, Result, ScoringError};
use crate::schema::CompetitionId;
use crate::socket_server::gate::{channel_path, DEFAULT_COOKIE_NAME};
use crate::socket_server::protocol::{
    ClientMessage, ConnectionInfo, ServerMessage, CLOSE_UNAUTHORIZED, CLOSE_UNKNOWN_COMPETITION,
};
use crate::standings::StandingsSnapshot;

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Connection status shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Session missing, unknown or expired
    NotAuthenticated { reason: String },
    UnknownCompetition,
    /// Retryable by selecting the competition again
    TransportError { message: String },
}

impl fmt::Display for ViewerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::NotAuthenticated { reason } => write!(f, "not authenticated ({})", reason),
            Self::UnknownCompetition => f.write_str("unknown competition"),
            Self::TransportError { message } => write!(f, "connection error ({})", message),
        }
    }
}

pub struct ViewerClient {
    /// Base address, e.g. `ws://127.0.0.1:9300`
    server_url: String,
    cookie_name: String,
    session_token: Option<String>,
    ws: Option<ClientStream>,
    competition_id: Option<CompetitionId>,
    connection: Option<ConnectionInfo>,
    status: ViewerStatus,
    standings: StandingsSnapshot,
}

impl ViewerClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            session_token: None,
            ws: None,
            competition_id: None,
            connection: None,
            status: ViewerStatus::Disconnected,
            standings: StandingsSnapshot::new(),
        }
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Session token sent as the handshake cookie
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn standings(&self) -> &StandingsSnapshot {
        &self.standings
    }

    pub fn competition_id(&self) -> Option<CompetitionId> {
        self.competition_id
    }

    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some() && self.status == ViewerStatus::Connected
    }

    /// Subscribe to a competition, closing any previous subscription first
    pub async fn select_competition(&mut self, competition_id: CompetitionId) -> Result<ConnectionInfo> {
        if self.ws.is_some() {
            self.disconnect().await;
        }

        self.status = ViewerStatus::Connecting;
        self.standings = StandingsSnapshot::new();
        self.competition_id = Some(competition_id);

        let url = format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            channel_path(competition_id)
        );
        let mut request = url
            .into_client_request()
            .map_err(|e| self.transport_error(e.to_string()))?;
        if let Some(token) = &self.session_token {
            let cookie = HeaderValue::from_str(&format!("{}={}", self.cookie_name, token))
                .map_err(|e| ScoringError::validation("session", e.to_string()))?;
            request.headers_mut().insert(COOKIE, cookie);
        }

        tracing::debug!(competition = competition_id, "Connecting viewer");
        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| self.transport_error(e.to_string()))?;
        self.ws = Some(ws);

        loop {
            match self.next_message().await? {
                Some(ServerMessage::Connected(info)) => return Ok(info),
                Some(_) => continue,
                None => return Err(self.closed_error()),
            }
        }
    }

    /// Next message from the channel, applied to the local standings
    ///
    /// `Ok(None)` once the connection is closed; see [`status`](Self::status)
    /// for why.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>> {
        loop {
            let frame = match self.ws.as_mut() {
                Some(ws) => ws.next().await,
                None => return Ok(None),
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let msg: ServerMessage = serde_json::from_str(&text)?;
                    self.apply(&msg);
                    return Ok(Some(msg));
                }
                Some(Ok(Message::Close(frame))) => {
                    self.on_close(frame);
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(self.transport_error(e.to_string())),
                None => {
                    self.ws = None;
                    if matches!(self.status, ViewerStatus::Connected | ViewerStatus::Connecting) {
                        self.status = ViewerStatus::Disconnected;
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Send a message on the current connection
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| ScoringError::connectivity("not connected"))?;
        let sent = ws.send(Message::Text(json)).await;
        if let Err(e) = sent {
            return Err(self.transport_error(e.to_string()));
        }
        Ok(())
    }

    /// Send a request and wait for its reply, applying channel traffic meanwhile
    pub async fn request(&mut self, msg: ClientMessage) -> Result<ServerMessage> {
        let expected = msg.id();
        self.send(&msg).await?;
        loop {
            match self.next_message().await? {
                Some(reply) if reply.is_reply() => {
                    if expected.is_none() || reply.request_id() == expected {
                        return Ok(reply);
                    }
                }
                Some(_) => {}
                None => return Err(self.closed_error()),
            }
        }
    }

    /// Close the current subscription, if any
    pub async fn disconnect(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            let closed = ws.close(None).await;
            if let Err(e) = closed {
                tracing::debug!("Viewer close failed: {}", e);
            } else {
                let _ = tokio::time::timeout(CLOSE_GRACE, async {
                    while let Some(Ok(_)) = ws.next().await {}
                })
                .await;
            }
        }
        self.status = ViewerStatus::Disconnected;
        self.competition_id = None;
        self.connection = None;
    }

    fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::Connected(info) => {
                self.status = ViewerStatus::Connected;
                self.connection = Some(info.clone());
            }
            ServerMessage::Snapshot { events, .. } => {
                self.standings.reset(events.iter().cloned());
            }
            ServerMessage::Update(event) => {
                self.standings.apply(event);
            }
            _ => {}
        }
    }

    fn on_close(&mut self, frame: Option<CloseFrame<'_>>) {
        self.ws = None;
        self.connection = None;
        let Some(frame) = frame else {
            self.status = ViewerStatus::Disconnected;
            return;
        };
        let code = u16::from(frame.code);
        let reason = frame.reason.to_string();
        tracing::info!(code, %reason, "Channel closed by server");
        self.status = match code {
            CLOSE_UNAUTHORIZED => ViewerStatus::NotAuthenticated { reason },
            CLOSE_UNKNOWN_COMPETITION => ViewerStatus::UnknownCompetition,
            1000 | 1001 => ViewerStatus::Disconnected,
            _ => ViewerStatus::TransportError { message: reason },
        };
    }

    fn transport_error(&mut self, message: String) -> ScoringError {
        tracing::warn!("Viewer transport error: {}", message);
        self.ws = None;
        self.status = ViewerStatus::TransportError {
            message: message.clone(),
        };
        ScoringError::connectivity(message)
    }

    /// Error describing why the connection ended
    fn closed_error(&self) -> ScoringError {
        match &self.status {
            ViewerStatus::NotAuthenticated { reason } => ScoringError::Authorization {
                reason: reason.parse().unwrap_or(AuthFailure::MissingSession),
            },
            ViewerStatus::UnknownCompetition => ScoringError::NotFound {
                what: format!("competition {}", self.competition_id.unwrap_or_default()),
            },
            ViewerStatus::TransportError { message } => ScoringError::connectivity(message.clone()),
            _ => ScoringError::connectivity("connection closed"),
        }
    }
}
