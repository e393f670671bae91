//! Precision pistol match: slow and rapid strings of 10 targets, zones 1-10.

use once_cell::sync::Lazy;

use super::{zone_sum, FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::{Result, ScoringError};

/// Targets fired per string
pub const TARGETS_PER_STRING: u32 = 10;

/// Slow and rapid string prefixes
pub const STRINGS: [&str; 2] = ["lenta", "rapida"];

pub const INNER_TENS_FIELD: &str = "dieces_internos";

static FIELDS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    let mut fields = Vec::with_capacity(21);
    for string in STRINGS {
        for zone in (1..=10).rev() {
            fields.push(FieldSpec::count(format!("{}_{}", string, zone)).at_most(TARGETS_PER_STRING));
        }
    }
    fields.push(FieldSpec::count(INNER_TENS_FIELD).at_most(TARGETS_PER_STRING * 2));
    fields
});

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(marks: &RawMarks) -> Result<Reduction> {
    let mut total = 0u64;
    let mut tens = 0u32;

    for string in STRINGS {
        let (shots, points) = zone_sum(marks, string, 1..=10)?;
        if shots > TARGETS_PER_STRING {
            return Err(ScoringError::validation(
                string,
                format!(
                    "{} impacts recorded for a {}-target string",
                    shots, TARGETS_PER_STRING
                ),
            ));
        }
        total += points;
        tens += marks.count(&format!("{}_10", string))?;
    }

    let inner = marks.count(INNER_TENS_FIELD)?;
    if inner > tens {
        return Err(ScoringError::validation(
            INNER_TENS_FIELD,
            format!("{} inner tens but only {} tens recorded", inner, tens),
        ));
    }

    Ok(Reduction::new(
        total as f64,
        TieBreakDetail::InnerCount { count: inner },
    ))
}
