//! WebSocket connection handler
//!
//! Runs the session gate during the handshake, then streams one competition's
//! channel to the client and routes judge actions to the submission service.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message, WebSocketStream};

use crate::error::{AuthFailure, Result, ScoringError};
use crate::rotation::SquadRotation;
use crate::schema::{ChannelEvent, CompetitionInfo, ParticipationId, PROTOCOL_VERSION};
use crate::session::{CurrentUser, UserSession};
use crate::socket_server::competition_registry::CompetitionChannel;
use crate::socket_server::context::ServerContext;
use crate::socket_server::gate::Admission;
use crate::socket_server::protocol::{
    ClientMessage, ConnectionInfo, ServerMessage, CLOSE_INTERNAL_ERROR, CLOSE_UNAUTHORIZED,
    CLOSE_UNKNOWN_COMPETITION,
};
use crate::submission::SubmitRequest;

/// How long to wait for the peer's close reply
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Handle a single WebSocket connection
pub async fn handle_connection(stream: TcpStream, ctx: Arc<ServerContext>) {
    let addr = stream.peer_addr().ok();
    tracing::info!("New connection from {:?}", addr);

    // Gate decision is taken while the upgrade request is in hand
    let mut admission = None;
    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        match ctx.gate.admit(request) {
            Some(decision) => {
                admission = Some(decision);
                Ok(response)
            }
            None => {
                tracing::info!("Rejected handshake for {}", request.uri().path());
                let mut error = ErrorResponse::new(Some("unknown channel".to_string()));
                *error.status_mut() = StatusCode::NOT_FOUND;
                Err(error)
            }
        }
    };

    let mut ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (competition_id, session) = match admission {
        Some(Admission::Admitted {
            competition_id,
            session,
        }) => (competition_id, session),
        Some(Admission::Refused { failure, .. }) => {
            close_with(&mut ws, CLOSE_UNAUTHORIZED, failure.to_string()).await;
            return;
        }
        None => return,
    };

    let Some(competition) = ctx.roster().competition(competition_id) else {
        tracing::info!(competition = competition_id, "Connection to unknown competition");
        close_with(&mut ws, CLOSE_UNKNOWN_COMPETITION, "unknown competition").await;
        return;
    };

    let (channel, created) = ctx.registry.attach(competition_id);
    let ready = if created {
        match ctx.service.rebuild_standings(competition_id).await {
            Ok(events) => {
                channel.seed(events);
                true
            }
            Err(e) => {
                tracing::error!(competition = competition_id, "Failed to rebuild standings: {}", e);
                channel.fail_load();
                ctx.registry.discard(&channel);
                false
            }
        }
    } else {
        channel.wait_ready().await
    };
    if !ready {
        ctx.registry.detach(&channel);
        close_with(&mut ws, CLOSE_INTERNAL_ERROR, "standings unavailable").await;
        return;
    }

    let mut conn = ConnectionState::new(ws, ctx, competition, session, channel);
    conn.run().await;

    tracing::info!("Connection closed from {:?}", addr);
}

/// Send a close frame and wait briefly for the peer to acknowledge it
async fn close_with(ws: &mut WebSocketStream<TcpStream>, code: u16, reason: impl Into<String>) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: Cow::Owned(reason.into()),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        tracing::debug!("Close frame not delivered: {}", e);
        return;
    }
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}

/// State for a single connection
struct ConnectionState {
    ws: WebSocketStream<TcpStream>,
    ctx: Arc<ServerContext>,
    client_id: String,
    competition: CompetitionInfo,
    channel: Arc<CompetitionChannel>,
    event_rx: broadcast::Receiver<ChannelEvent>,
    token: String,
    user: CurrentUser,
    /// Rotation run by this judge, if any
    rotation: Option<SquadRotation>,
    /// Snapshot taken when subscribing, sent right after `connected`
    initial: Option<ServerMessage>,
}

/// What the loop should do after a client message
enum Flow {
    Continue,
    Close { code: u16, reason: String },
}

impl ConnectionState {
    fn new(
        ws: WebSocketStream<TcpStream>,
        ctx: Arc<ServerContext>,
        competition: CompetitionInfo,
        session: UserSession,
        channel: Arc<CompetitionChannel>,
    ) -> Self {
        let short = uuid::Uuid::new_v4().simple().to_string();
        let client_id = format!("cli_{}", &short[..8]);
        let (event_rx, events, sequence) = channel.subscribe();
        let initial = ServerMessage::Snapshot {
            competition_id: competition.id,
            sequence,
            events,
        };
        Self {
            ws,
            ctx,
            client_id,
            competition,
            channel,
            event_rx,
            token: session.token,
            user: session.user,
            rotation: None,
            initial: Some(initial),
        }
    }

    async fn run(&mut self) {
        if let Err(e) = self.greet().await {
            tracing::warn!("Client {} did not receive greeting: {}", self.client_id, e);
            self.cleanup();
            return;
        }

        loop {
            tokio::select! {
                // Handle incoming WebSocket messages
                msg = self.ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match self.handle_text(&text).await {
                                Flow::Continue => {}
                                Flow::Close { code, reason } => {
                                    close_with(&mut self.ws, code, reason).await;
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Client {} requested close", self.client_id);
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = self.ws.send(Message::Pong(data)).await;
                        }
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }

                // Forward channel events
                event = self.event_rx.recv() => {
                    match event {
                        Ok(event) => {
                            if self.send(&ServerMessage::Update(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Client {} lagged by {} events, resending snapshot",
                                self.client_id,
                                skipped
                            );
                            if self.send_snapshot().await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        // Cleanup on disconnect
        self.cleanup();
    }

    async fn greet(&mut self) -> Result<()> {
        let info = ConnectionInfo {
            client_id: self.client_id.clone(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            competition: self.competition.clone(),
            username: self.user.username.clone(),
            roles: self.user.roles.clone(),
        };
        self.send(&ServerMessage::Connected(info)).await?;
        if let Some(snapshot) = self.initial.take() {
            self.send(&snapshot).await?;
        }
        tracing::info!(
            client = %self.client_id,
            competition = self.competition.id,
            user = %self.user.username,
            "Client connected"
        );
        Ok(())
    }

    async fn handle_text(&mut self, text: &str) -> Flow {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                // Echo the request id when the envelope itself was readable
                let id = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("id").and_then(|id| id.as_u64()));
                let _ = self
                    .send_error(id, "invalid_message", &e.to_string(), None)
                    .await;
                return Flow::Continue;
            }
        };
        let id = msg.id();

        match self.handle_message(msg).await {
            Ok(()) => Flow::Continue,
            Err(ScoringError::Authorization { reason })
                if matches!(reason, AuthFailure::SessionExpired | AuthFailure::UnknownSession) =>
            {
                tracing::info!(client = %self.client_id, %reason, "Closing connection");
                Flow::Close {
                    code: CLOSE_UNAUTHORIZED,
                    reason: reason.to_string(),
                }
            }
            Err(e) => {
                tracing::debug!(client = %self.client_id, "Request failed: {}", e);
                let field = e.field().map(str::to_string);
                match self.send_error(id, e.code(), &e.to_string(), field).await {
                    Ok(()) => Flow::Continue,
                    Err(_) => Flow::Close {
                        code: CLOSE_INTERNAL_ERROR,
                        reason: "send failed".to_string(),
                    },
                }
            }
        }
    }

    async fn handle_message(&mut self, msg: ClientMessage) -> Result<()> {
        if msg.is_judge_action() {
            self.authorize_judge()?;
        }

        match msg {
            ClientMessage::Ping => {
                self.send(&ServerMessage::Pong).await?;
            }

            ClientMessage::Resync => {
                self.send_snapshot().await?;
            }

            ClientMessage::SubmitScore {
                id,
                participation_id,
                round,
                score,
                expected_version,
            } => {
                self.ensure_in_competition(participation_id)?;
                let mut request =
                    SubmitRequest::new(participation_id, round, score).judge(self.user.username.clone());
                request.expected_version = expected_version;
                let receipt = self.ctx.service.submit(request).await?;
                self.send(&ServerMessage::Accepted { id, receipt }).await?;
            }

            ClientMessage::ClearDisqualification {
                id,
                participation_id,
                round,
            } => {
                self.ensure_in_competition(participation_id)?;
                let delivery = self
                    .ctx
                    .service
                    .clear_disqualification(participation_id, round)
                    .await?;
                self.send(&ServerMessage::Cleared { id, delivery }).await?;
            }

            ClientMessage::StartRotation {
                id,
                round,
                category_id,
                squad_group,
            } => {
                let squad: Vec<_> = self
                    .ctx
                    .roster()
                    .list_approved_participations(self.competition.id)
                    .into_iter()
                    .filter(|p| p.category_id == category_id && p.squad_group == squad_group)
                    .collect();
                let rotation = SquadRotation::start(round, squad)?;
                let step = rotation.step();
                self.rotation = Some(rotation);
                self.send(&ServerMessage::Rotation { id, step }).await?;
            }

            ClientMessage::RecordOutcome { id, hit } => {
                let step = self.active_rotation()?.record_outcome(hit)?;
                self.send(&ServerMessage::Rotation { id, step }).await?;
            }

            ClientMessage::UndoOutcome { id } => {
                let step = self.active_rotation()?.undo_last()?;
                self.send(&ServerMessage::Rotation { id, step }).await?;
            }

            ClientMessage::SaveRound { id, confirm } => {
                let service = self.ctx.service.clone();
                let judge = Some(self.user.username.clone());
                let rotation = self
                    .rotation
                    .as_mut()
                    .ok_or_else(|| ScoringError::rotation("no rotation in progress"))?;
                let receipts = service.save_squad_round(rotation, confirm, judge).await?;
                self.send(&ServerMessage::RoundSaved { id, receipts }).await?;
            }
        }

        Ok(())
    }

    /// Re-validate the session and require a scoring role
    fn authorize_judge(&mut self) -> Result<()> {
        let session = self.ctx.sessions.validate(&self.token)?;
        self.user = session.user;
        if !self.user.can_score() {
            return Err(ScoringError::Authorization {
                reason: AuthFailure::Forbidden,
            });
        }
        Ok(())
    }

    fn ensure_in_competition(&self, participation_id: ParticipationId) -> Result<()> {
        match self.ctx.roster().participation(participation_id) {
            Some(p) if p.competition_id == self.competition.id => Ok(()),
            _ => Err(ScoringError::NotFound {
                what: format!(
                    "participation {} in competition {}",
                    participation_id, self.competition.id
                ),
            }),
        }
    }

    fn active_rotation(&mut self) -> Result<&mut SquadRotation> {
        self.rotation
            .as_mut()
            .ok_or_else(|| ScoringError::rotation("no rotation in progress"))
    }

    async fn send_snapshot(&mut self) -> Result<()> {
        let (events, sequence) = self.channel.snapshot();
        self.send(&ServerMessage::Snapshot {
            competition_id: self.competition.id,
            sequence,
            events,
        })
        .await
    }

    async fn send(&mut self, msg: &ServerMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.ws
            .send(Message::Text(json))
            .await
            .map_err(|e| ScoringError::connectivity(e.to_string()))
    }

    async fn send_error(
        &mut self,
        id: Option<u64>,
        code: &str,
        message: &str,
        field: Option<String>,
    ) -> Result<()> {
        self.send(&ServerMessage::Error {
            id,
            code: code.to_string(),
            message: message.to_string(),
            field,
        })
        .await
    }

    fn cleanup(&mut self) {
        self.ctx.registry.detach(&self.channel);
        tracing::debug!(client = %self.client_id, "Client cleaned up");
    }
}
