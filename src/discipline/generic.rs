//! Generic disciplines: the judge enters the round total directly.

use once_cell::sync::Lazy;

use super::{FieldKind, FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::{Result, ScoringError};

pub const TOTAL_FIELD: &str = "puntaje_total_ronda";
pub const INNER_FIELD: &str = "xs";

static FIELDS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    vec![
        FieldSpec::new(TOTAL_FIELD, FieldKind::Decimal).required(),
        FieldSpec::count(INNER_FIELD),
    ]
});

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(marks: &RawMarks) -> Result<Reduction> {
    let total = marks
        .decimal(TOTAL_FIELD)?
        .ok_or_else(|| ScoringError::validation(TOTAL_FIELD, "required"))?;
    let xs = marks.count(INNER_FIELD)?;
    Ok(Reduction::new(total, TieBreakDetail::InnerCount { count: xs }))
}
