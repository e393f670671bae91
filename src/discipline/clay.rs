//! Clay targets (trap, skeet, helice): hits counted within the round's limit.
//!
//! Squads produce a `disparos` grid through the rotation controller; a judge
//! scoring from a paper card may enter `platos_rotos` instead.

use once_cell::sync::Lazy;

use super::{FieldKind, FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::{Result, ScoringError};
use crate::round::RoundId;

pub const GRID_FIELD: &str = "disparos";
pub const COUNT_FIELD: &str = "platos_rotos";

static FIELDS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    vec![
        FieldSpec::new(GRID_FIELD, FieldKind::Grid),
        FieldSpec::count(COUNT_FIELD),
    ]
});

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(round: &RoundId, marks: &RawMarks) -> Result<Reduction> {
    let limit = round.clay_attempt_limit();

    let hits = match (marks.grid(GRID_FIELD)?, marks.is_present(COUNT_FIELD)) {
        (Some(_), true) => {
            return Err(ScoringError::validation(
                GRID_FIELD,
                format!("provide either {} or {}, not both", GRID_FIELD, COUNT_FIELD),
            ));
        }
        (Some(grid), false) => {
            if grid.len() != limit {
                return Err(ScoringError::validation(
                    GRID_FIELD,
                    format!("{} expects {} attempts, got {}", round, limit, grid.len()),
                ));
            }
            grid.iter().filter(|cell| **cell == Some(true)).count()
        }
        (None, true) => {
            let count = marks.count(COUNT_FIELD)? as usize;
            if count > limit {
                return Err(ScoringError::validation(
                    COUNT_FIELD,
                    format!("{} has only {} targets", round, limit),
                ));
            }
            count
        }
        (None, false) => return Err(ScoringError::validation(GRID_FIELD, "required")),
    };

    Ok(Reduction::new(hits as f64, TieBreakDetail::None))
}
