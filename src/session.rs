//! Authenticated sessions
//!
//! Sessions are issued by the identity collaborator at login and destroyed at
//! logout. The engine only needs to look a token up and check that it is still
//! alive, so this registry is the explicit session object handed to the
//! submission path and the viewer gate.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AuthFailure, Result, ScoringError};

/// Federation roles relevant to scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Judge,
    Athlete,
    Viewer,
}

/// `currentUser()` as exposed by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: u64,
    pub username: String,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Judges and admins may submit scores
    pub fn can_score(&self) -> bool {
        self.has_role(Role::Judge) || self.has_role(Role::Admin)
    }
}

/// An established session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub token: String,
    pub user: CurrentUser,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-process session table
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, UserSession>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a new session token
    pub fn login(&self, user: CurrentUser) -> UserSession {
        let session = UserSession {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user,
            expires_at: Utc::now() + self.ttl,
        };
        tracing::info!(user = %session.user.username, "Session established");
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Register a session issued elsewhere (pre-shared token)
    pub fn insert(&self, session: UserSession) {
        self.sessions.write().insert(session.token.clone(), session);
    }

    /// Destroy a session; returns false if it did not exist
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(session) = &removed {
            tracing::info!(user = %session.user.username, "Session destroyed");
        }
        removed.is_some()
    }

    /// Look up a live session
    pub fn validate(&self, token: &str) -> Result<UserSession> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserSession> {
        if token.is_empty() {
            return Err(ScoringError::Authorization {
                reason: AuthFailure::MissingSession,
            });
        }
        let sessions = self.sessions.read();
        let session = sessions.get(token).ok_or(ScoringError::Authorization {
            reason: AuthFailure::UnknownSession,
        })?;
        if session.is_expired_at(now) {
            return Err(ScoringError::Authorization {
                reason: AuthFailure::SessionExpired,
            });
        }
        Ok(session.clone())
    }

    /// `currentUser()` for a token
    pub fn current_user(&self, token: &str) -> Result<CurrentUser> {
        self.validate(token).map(|s| s.user)
    }

    /// Drop expired sessions, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::minutes(60))
    }
}
