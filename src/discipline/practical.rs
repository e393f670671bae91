//! Practical / IPSC: match points and percentage are entered, not computed.

use once_cell::sync::Lazy;

use super::{FieldKind, FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::{Result, ScoringError};

pub const POINTS_FIELD: &str = "match_points";
pub const PERCENT_FIELD: &str = "match_percent";

static FIELDS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    vec![
        FieldSpec::new(POINTS_FIELD, FieldKind::Decimal).required(),
        FieldSpec::new(PERCENT_FIELD, FieldKind::Percentage).required(),
    ]
});

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(marks: &RawMarks) -> Result<Reduction> {
    let points = marks
        .decimal(POINTS_FIELD)?
        .ok_or_else(|| ScoringError::validation(POINTS_FIELD, "required"))?;
    let percent = marks
        .decimal(PERCENT_FIELD)?
        .ok_or_else(|| ScoringError::validation(PERCENT_FIELD, "required"))?;

    Ok(Reduction::new(points, TieBreakDetail::Percentage { percent }))
}
