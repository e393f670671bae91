//! Scoring data model shared by the submission service, broadcast channel and viewers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::discipline::{Discipline, RawMarks, Reduction, TieBreakDetail};
use crate::error::ScoringError;
use crate::round::RoundId;

/// Wire protocol version reported to connecting clients
pub const PROTOCOL_VERSION: &str = "1.0";

pub type CompetitionId = u64;
pub type ParticipationId = u64;
pub type CategoryId = u64;

// ============================================================================
// Reference data (from master-data and roster collaborators)
// ============================================================================

/// Lifecycle of a competition as seen by scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Scheduled,
    Open,
    /// Results are final; no further scores accepted
    Closed,
}

impl CompetitionStatus {
    pub fn accepts_scores(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionInfo {
    pub id: CompetitionId,
    pub name: String,
    pub status: CompetitionStatus,
}

/// A category offered in a competition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub category_id: CategoryId,
    pub discipline: Discipline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_info: Option<String>,
}

/// One competitor entered in one category of one competition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub participation_id: ParticipationId,
    pub competition_id: CompetitionId,
    pub discipline: Discipline,
    pub category_id: CategoryId,
    /// Firing position
    pub lane: u32,
    pub squad_group: u32,
    pub display_name: String,
    #[serde(default)]
    pub equipment_label: String,
}

// ============================================================================
// Raw and computed scores
// ============================================================================

/// What a judge submits for one (participation, round)
///
/// On the wire this is either the raw-mark object or
/// `{"disqualified": true, "reason": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub enum ScoreInput {
    Marks(RawMarks),
    Disqualified { reason: String },
}

impl ScoreInput {
    pub fn disqualified(reason: impl Into<String>) -> Self {
        Self::Disqualified {
            reason: reason.into(),
        }
    }

    pub fn is_disqualification(&self) -> bool {
        matches!(self, Self::Disqualified { .. })
    }

    /// Parse a submission payload
    pub fn from_payload(mut map: Map<String, Value>) -> Result<Self, ScoringError> {
        let flagged = match map.remove("disqualified") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(_) => {
                return Err(ScoringError::validation("disqualified", "expected true or false"));
            }
        };

        if !flagged {
            map.remove("reason");
            return Ok(Self::Marks(RawMarks::from_map(map)));
        }

        let reason = match map.get("reason") {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        };
        if reason.is_empty() {
            return Err(ScoringError::validation(
                "reason",
                "a disqualification requires a reason",
            ));
        }
        Ok(Self::Disqualified { reason })
    }
}

impl TryFrom<Map<String, Value>> for ScoreInput {
    type Error = ScoringError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_payload(map)
    }
}

impl From<ScoreInput> for Map<String, Value> {
    fn from(input: ScoreInput) -> Self {
        match input {
            ScoreInput::Marks(marks) => marks.as_map().clone(),
            ScoreInput::Disqualified { reason } => {
                let mut map = Map::new();
                map.insert("disqualified".to_string(), Value::Bool(true));
                map.insert("reason".to_string(), Value::String(reason));
                map
            }
        }
    }
}

/// Stored judge input for one (participation, round)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    pub participation_id: ParticipationId,
    pub round: RoundId,
    pub input: ScoreInput,
    /// Per-pair write counter, assigned by the store
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl RawScore {
    pub fn new(participation_id: ParticipationId, round: RoundId, input: ScoreInput) -> Self {
        Self {
            participation_id,
            round,
            input,
            version: 0,
            recorded_by: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn recorded_by(mut self, judge: Option<String>) -> Self {
        self.recorded_by = judge;
        self
    }

    pub fn is_disqualified(&self) -> bool {
        self.input.is_disqualification()
    }
}

/// Rankable reduction of a RawScore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedScore {
    pub total: f64,
    pub tie_break: bool,
    pub disqualified: bool,
    #[serde(default)]
    pub detail: TieBreakDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ComputedScore {
    pub fn from_reduction(reduction: Reduction) -> Self {
        Self {
            total: reduction.total,
            tie_break: reduction.tie_break,
            disqualified: false,
            detail: reduction.detail,
            reason: None,
        }
    }

    /// Non-ranking result: total suppressed, sorted after every other entry
    pub fn disqualification(reason: impl Into<String>) -> Self {
        Self {
            total: 0.0,
            tie_break: false,
            disqualified: true,
            detail: TieBreakDetail::None,
            reason: Some(reason.into()),
        }
    }

    /// Compute from a stored input
    pub fn compute(
        discipline: Discipline,
        round: &RoundId,
        input: &ScoreInput,
    ) -> Result<Self, ScoringError> {
        match input {
            ScoreInput::Disqualified { reason } => Ok(Self::disqualification(reason.clone())),
            ScoreInput::Marks(marks) => discipline
                .reduce(round, marks)
                .map(Self::from_reduction),
        }
    }
}

// ============================================================================
// Channel events
// ============================================================================

/// Score update pushed to every viewer of a competition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub competition_id: CompetitionId,
    pub participation_id: ParticipationId,
    pub display_name: String,
    pub equipment_label: String,
    pub discipline: Discipline,
    pub round: RoundId,
    /// Numeric on the wire, but older publishers send decimal strings
    #[serde(deserialize_with = "coerce_total")]
    pub total: f64,
    pub disqualified: bool,
    pub tie_break: bool,
    #[serde(default)]
    pub detail: TieBreakDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub new_record: bool,
    /// Per-channel ordering, stamped at publish
    #[serde(default)]
    pub sequence: u64,
}

impl ScoreEvent {
    pub fn new(participation: &Participation, round: RoundId, score: &ComputedScore) -> Self {
        Self {
            competition_id: participation.competition_id,
            participation_id: participation.participation_id,
            display_name: participation.display_name.clone(),
            equipment_label: participation.equipment_label.clone(),
            discipline: participation.discipline,
            round,
            total: score.total,
            disqualified: score.disqualified,
            tie_break: score.tie_break,
            detail: score.detail,
            reason: score.reason.clone(),
            new_record: false,
            sequence: 0,
        }
    }
}

/// Everything that flows through a competition channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    Score(ScoreEvent),
    /// A round's record was removed (disqualification cleared)
    Retracted {
        competition_id: CompetitionId,
        participation_id: ParticipationId,
        round: RoundId,
        #[serde(default)]
        sequence: u64,
    },
}

impl ChannelEvent {
    pub fn competition_id(&self) -> CompetitionId {
        match self {
            Self::Score(e) => e.competition_id,
            Self::Retracted { competition_id, .. } => *competition_id,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            Self::Score(e) => e.sequence,
            Self::Retracted { sequence, .. } => *sequence,
        }
    }

    /// The (participation, round) slot the event writes
    pub fn key(&self) -> (ParticipationId, RoundId) {
        match self {
            Self::Score(e) => (e.participation_id, e.round),
            Self::Retracted {
                participation_id,
                round,
                ..
            } => (*participation_id, *round),
        }
    }

    pub fn with_sequence(mut self, seq: u64) -> Self {
        match &mut self {
            Self::Score(e) => e.sequence = seq,
            Self::Retracted { sequence, .. } => *sequence = seq,
        }
        self
    }
}

/// Accept a total as a JSON number or a decimal string
pub fn coerce_total<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("total out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| D::Error::custom(format!("total '{}' is not numeric", s))),
        other => Err(D::Error::custom(format!("total must be numeric, got {}", other))),
    }
}
