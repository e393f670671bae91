//! Socket server protocol message types
//!
//! Defines the JSON message format for viewer and judge connections.

use serde::{Deserialize, Serialize};

use crate::round::RoundId;
use crate::rotation::RotationStep;
use crate::schema::{
    CategoryId, ChannelEvent, CompetitionId, CompetitionInfo, ParticipationId, ScoreEvent,
    ScoreInput,
};
use crate::session::Role;
use crate::submission::{Delivery, SubmissionReceipt};

/// Close code for a missing, unknown or expired session
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Close code for a competition that does not exist
pub const CLOSE_UNKNOWN_COMPETITION: u16 = 4404;

/// Close code for a failure on the server side
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Client-to-server message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping to check connection
    Ping,
    /// Ask for a fresh standings snapshot
    Resync,
    /// Judge: submit raw marks or a disqualification
    SubmitScore {
        #[serde(default)]
        id: Option<u64>,
        participation_id: ParticipationId,
        round: RoundId,
        score: ScoreInput,
        #[serde(default)]
        expected_version: Option<u64>,
    },
    /// Judge: remove a disqualification
    ClearDisqualification {
        #[serde(default)]
        id: Option<u64>,
        participation_id: ParticipationId,
        round: RoundId,
    },
    /// Judge: fix the firing order of a clay squad
    StartRotation {
        #[serde(default)]
        id: Option<u64>,
        round: RoundId,
        category_id: CategoryId,
        squad_group: u32,
    },
    /// Judge: hit or miss for the shooter on the line
    RecordOutcome {
        #[serde(default)]
        id: Option<u64>,
        hit: bool,
    },
    /// Judge: revert the last outcome
    UndoOutcome {
        #[serde(default)]
        id: Option<u64>,
    },
    /// Judge: persist the rotation grids
    SaveRound {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        confirm: bool,
    },
}

impl ClientMessage {
    /// Request id echoed back in the reply
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Ping | Self::Resync => None,
            Self::SubmitScore { id, .. }
            | Self::ClearDisqualification { id, .. }
            | Self::StartRotation { id, .. }
            | Self::RecordOutcome { id, .. }
            | Self::UndoOutcome { id }
            | Self::SaveRound { id, .. } => *id,
        }
    }

    /// Whether the message needs a judge session
    pub fn is_judge_action(&self) -> bool {
        !matches!(self, Self::Ping | Self::Resync)
    }
}

/// Server-to-client message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected(ConnectionInfo),
    /// Full standings of the channel at `sequence`
    Snapshot {
        competition_id: CompetitionId,
        sequence: u64,
        events: Vec<ScoreEvent>,
    },
    /// A live channel event
    Update(ChannelEvent),
    /// Judge submission accepted
    Accepted {
        id: Option<u64>,
        receipt: SubmissionReceipt,
    },
    /// Disqualification cleared
    Cleared {
        id: Option<u64>,
        delivery: Delivery,
    },
    /// Rotation cursor after a judge action
    Rotation {
        id: Option<u64>,
        step: RotationStep,
    },
    /// Rotation grids persisted
    RoundSaved {
        id: Option<u64>,
        receipts: Vec<SubmissionReceipt>,
    },
    /// Error response
    Error {
        id: Option<u64>,
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },
    /// Pong response
    Pong,
}

impl ServerMessage {
    /// Whether this answers a client request rather than streaming the channel
    pub fn is_reply(&self) -> bool {
        !matches!(self, Self::Connected(_) | Self::Snapshot { .. } | Self::Update(_))
    }

    /// Request id this reply echoes
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Accepted { id, .. }
            | Self::Cleared { id, .. }
            | Self::Rotation { id, .. }
            | Self::RoundSaved { id, .. }
            | Self::Error { id, .. } => *id,
            _ => None,
        }
    }
}

/// Connection info returned after the gate admitted a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub client_id: String,
    pub protocol_version: String,
    pub competition: CompetitionInfo,
    pub username: String,
    pub roles: Vec<Role>,
}
