//! Running target: hare and boar, zones 0-5, fixed shots per target type.

use once_cell::sync::Lazy;

use super::{zone_sum, FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::{Result, ScoringError};

pub const TARGET_TYPES: [&str; 2] = ["liebre", "jabali"];
pub const SHOTS_PER_TARGET: u32 = 10;
pub const X_COUNT_FIELD: &str = "x_count";

static FIELDS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    let mut fields = Vec::new();
    for target in TARGET_TYPES {
        for zone in (0..=5).rev() {
            fields.push(FieldSpec::count(format!("{}_{}", target, zone)).at_most(SHOTS_PER_TARGET));
        }
    }
    fields.push(FieldSpec::count(X_COUNT_FIELD));
    fields
});

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(marks: &RawMarks) -> Result<Reduction> {
    let mut total = 0u64;
    let mut fives = 0u32;

    for target in TARGET_TYPES {
        let (shots, points) = zone_sum(marks, target, 0..=5)?;
        if shots > SHOTS_PER_TARGET {
            return Err(ScoringError::validation(
                target,
                format!("{} shots recorded, limit is {}", shots, SHOTS_PER_TARGET),
            ));
        }
        total += points;
        fives += marks.count(&format!("{}_5", target))?;
    }

    let x_count = marks.count(X_COUNT_FIELD)?;
    if x_count > fives {
        return Err(ScoringError::validation(
            X_COUNT_FIELD,
            format!("{} X hits but only {} fives recorded", x_count, fives),
        ));
    }

    Ok(Reduction::new(
        total as f64,
        TieBreakDetail::InnerCount { count: x_count },
    ))
}
