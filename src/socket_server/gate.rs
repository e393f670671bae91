//! Viewer session gate
//!
//! Admits a channel connection on the strength of the session cookie sent with
//! the WebSocket handshake. Credentials in the connection address are never
//! consulted: `?token=` and friends are ignored.

use std::sync::Arc;

use tokio_tungstenite::tungstenite::handshake::server::Request;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderMap;

use crate::error::{AuthFailure, ScoringError};
use crate::schema::CompetitionId;
use crate::session::{SessionRegistry, UserSession};

/// Route prefix of a competition channel
pub const CHANNEL_PATH_PREFIX: &str = "/ws/competencia/";

/// Default session cookie name
pub const DEFAULT_COOKIE_NAME: &str = "access_token";

/// Gate decision for a routable handshake
#[derive(Debug, Clone)]
pub enum Admission {
    Admitted {
        competition_id: CompetitionId,
        session: UserSession,
    },
    /// Handshake completes, then the socket is closed with this failure
    Refused {
        competition_id: CompetitionId,
        failure: AuthFailure,
    },
}

pub struct ViewerSessionGate {
    sessions: Arc<SessionRegistry>,
    cookie_name: String,
}

impl ViewerSessionGate {
    pub fn new(sessions: Arc<SessionRegistry>, cookie_name: impl Into<String>) -> Self {
        Self {
            sessions,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Decide on a handshake; `None` when the path is not a channel route
    pub fn admit(&self, request: &Request) -> Option<Admission> {
        let competition_id = competition_from_path(request.uri().path())?;

        let Some(token) = session_cookie(request.headers(), &self.cookie_name) else {
            tracing::info!(competition = competition_id, "Refused channel connection without session");
            return Some(Admission::Refused {
                competition_id,
                failure: AuthFailure::MissingSession,
            });
        };

        match self.sessions.validate(&token) {
            Ok(session) => {
                tracing::debug!(
                    competition = competition_id,
                    user = %session.user.username,
                    "Admitted channel connection"
                );
                Some(Admission::Admitted {
                    competition_id,
                    session,
                })
            }
            Err(ScoringError::Authorization { reason }) => {
                tracing::info!(competition = competition_id, %reason, "Refused channel connection");
                Some(Admission::Refused {
                    competition_id,
                    failure: reason,
                })
            }
            Err(e) => {
                tracing::warn!("Session lookup failed: {}", e);
                Some(Admission::Refused {
                    competition_id,
                    failure: AuthFailure::UnknownSession,
                })
            }
        }
    }
}

/// Parse `/ws/competencia/<id>/` (trailing slash optional)
pub fn competition_from_path(path: &str) -> Option<CompetitionId> {
    let rest = path.strip_prefix(CHANNEL_PATH_PREFIX)?;
    let id = rest.strip_suffix('/').unwrap_or(rest);
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// First non-empty value of cookie `name` across all `Cookie` headers
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| key.trim() == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

/// Channel path for a competition
pub fn channel_path(competition_id: CompetitionId) -> String {
    format!("{}{}/", CHANNEL_PATH_PREFIX, competition_id)
}
