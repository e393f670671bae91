//! Squad rotation for shot-by-shot (clay) disciplines
//!
//! Shooters fire in lane order, one attempt each, wrapping back to the first
//! lane after the last. The firing order is fixed when the round starts; a
//! participation approved mid-round only shows up in the next rotation.
//!
//! Rotation state is owned by the judge operating the round. It is not shared
//! between connections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discipline::clay::GRID_FIELD;
use crate::discipline::{Discipline, RawMarks};
use crate::error::{Result, ScoringError};
use crate::round::RoundId;
use crate::schema::{Participation, ParticipationId};

/// What the judge should do after an outcome was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RotationStep {
    /// Next shooter up, with the 1-based attempt number
    Next {
        participation_id: ParticipationId,
        display_name: String,
        lane: u32,
        attempt: usize,
    },
    /// Attempt limit reached; the grid is ready to save
    RoundComplete,
}

/// Shooter and attempt cursor for one squad in one round
#[derive(Debug, Clone)]
pub struct SquadRotation {
    round: RoundId,
    limit: usize,
    order: Vec<Participation>,
    grids: Vec<Vec<Option<bool>>>,
    shooter: usize,
    attempt: usize,
    /// (shooter, attempt) of each recorded outcome, most recent last
    history: Vec<(usize, usize)>,
    saved: bool,
}

impl SquadRotation {
    /// Fix the firing order for `round`
    pub fn start(round: RoundId, mut participations: Vec<Participation>) -> Result<Self> {
        if participations.is_empty() {
            return Err(ScoringError::rotation("squad is empty"));
        }
        if let Some(p) = participations
            .iter()
            .find(|p| !p.discipline.is_shot_by_shot())
        {
            return Err(ScoringError::rotation(format!(
                "{} is scored per round, not shot by shot",
                p.discipline.label()
            )));
        }
        if !Discipline::Clay.accepts_round(&round) {
            return Err(ScoringError::rotation(format!(
                "{} is not a clay round",
                round
            )));
        }

        participations.sort_by_key(|p| (p.lane, p.participation_id));
        participations.dedup_by_key(|p| p.participation_id);

        let limit = round.clay_attempt_limit();
        let grids = vec![vec![None; limit]; participations.len()];
        tracing::info!(
            round = %round,
            shooters = participations.len(),
            attempts = limit,
            "Rotation started"
        );

        Ok(Self {
            round,
            limit,
            order: participations,
            grids,
            shooter: 0,
            attempt: 0,
            history: Vec::new(),
            saved: false,
        })
    }

    pub fn round(&self) -> RoundId {
        self.round
    }

    pub fn attempt_limit(&self) -> usize {
        self.limit
    }

    /// Firing order
    pub fn order(&self) -> &[Participation] {
        &self.order
    }

    pub fn is_complete(&self) -> bool {
        self.attempt >= self.limit
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Outcomes recorded so far
    pub fn recorded(&self) -> usize {
        self.history.len()
    }

    pub fn grid(&self, participation_id: ParticipationId) -> Option<&[Option<bool>]> {
        self.order
            .iter()
            .position(|p| p.participation_id == participation_id)
            .map(|i| self.grids[i].as_slice())
    }

    /// Shooter currently on the line
    pub fn current(&self) -> Option<&Participation> {
        if self.is_complete() {
            None
        } else {
            self.order.get(self.shooter)
        }
    }

    /// Step describing the current cursor
    pub fn step(&self) -> RotationStep {
        match self.current() {
            Some(p) => RotationStep::Next {
                participation_id: p.participation_id,
                display_name: p.display_name.clone(),
                lane: p.lane,
                attempt: self.attempt + 1,
            },
            None => RotationStep::RoundComplete,
        }
    }

    /// Record a hit or miss for the current shooter and advance
    pub fn record_outcome(&mut self, hit: bool) -> Result<RotationStep> {
        if self.is_complete() {
            return Err(ScoringError::rotation("round already complete"));
        }

        self.grids[self.shooter][self.attempt] = Some(hit);
        self.history.push((self.shooter, self.attempt));

        self.shooter += 1;
        if self.shooter == self.order.len() {
            self.shooter = 0;
            self.attempt += 1;
        }

        let step = self.step();
        if step == RotationStep::RoundComplete {
            tracing::info!(round = %self.round, "Rotation complete");
        }
        Ok(step)
    }

    /// Revert the most recent outcome, reopening a completed round
    pub fn undo_last(&mut self) -> Result<RotationStep> {
        let (shooter, attempt) = self
            .history
            .pop()
            .ok_or_else(|| ScoringError::rotation("nothing to undo"))?;
        self.grids[shooter][attempt] = None;
        self.shooter = shooter;
        self.attempt = attempt;
        Ok(self.step())
    }

    /// One `disparos` payload per shooter
    ///
    /// Saving a partial grid or re-saving an already saved round is
    /// destructive and needs `confirm`. The rotation counts as saved only
    /// after [`mark_saved`](Self::mark_saved), once the payloads are stored.
    pub fn save_round(&self, confirm: bool) -> Result<Vec<(Participation, RawMarks)>> {
        if !self.is_complete() && !confirm {
            return Err(ScoringError::rotation(format!(
                "round incomplete ({} of {} outcomes); confirm to save a partial grid",
                self.recorded(),
                self.limit * self.order.len()
            )));
        }
        if self.saved && !confirm {
            return Err(ScoringError::rotation(
                "round already saved; confirm to overwrite",
            ));
        }

        let payloads = self
            .order
            .iter()
            .zip(&self.grids)
            .map(|(p, grid)| {
                let cells: Vec<Value> = grid
                    .iter()
                    .map(|cell| cell.map(Value::Bool).unwrap_or(Value::Null))
                    .collect();
                (p.clone(), RawMarks::new().with(GRID_FIELD, Value::Array(cells)))
            })
            .collect();
        Ok(payloads)
    }

    pub fn mark_saved(&mut self) {
        self.saved = true;
    }
}
