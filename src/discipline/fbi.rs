//! FBI combat course: four timed sub-rounds, impacts by zone 0-5.
//!
//! Forfeited shots (over-time) are charged at the top zone value. The total is
//! not clamped, so heavy penalties can drive it below zero.

use once_cell::sync::Lazy;

use super::{zone_sum, FieldKind, FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::{Result, ScoringError};

pub const SUB_ROUNDS: u32 = 4;
pub const MAX_ZONE: u32 = 5;
/// Points charged per forfeited shot
pub const PENALTY_PER_SHOT: i64 = MAX_ZONE as i64;

pub fn time_field(sub_round: u32) -> String {
    format!("tiempo_r{}", sub_round)
}

pub fn penalty_field(sub_round: u32) -> String {
    format!("penal_r{}", sub_round)
}

static FIELDS: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    let mut fields: Vec<FieldSpec> = (0..=MAX_ZONE)
        .rev()
        .map(|zone| FieldSpec::count(format!("impactos_{}", zone)))
        .collect();
    for sub_round in 1..=SUB_ROUNDS {
        let time = FieldSpec::new(time_field(sub_round), FieldKind::Time);
        fields.push(if sub_round == 1 { time.required() } else { time });
        fields.push(FieldSpec::count(penalty_field(sub_round)));
    }
    fields
});

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(marks: &RawMarks) -> Result<Reduction> {
    let first_time = marks.decimal(&time_field(1))?.ok_or_else(|| {
        ScoringError::validation(time_field(1), "sub-round 1 completion time is required")
    })?;

    let (_, points) = zone_sum(marks, "impactos", 0..=MAX_ZONE)?;

    let mut forfeited = 0i64;
    for sub_round in 1..=SUB_ROUNDS {
        forfeited += i64::from(marks.count(&penalty_field(sub_round))?);
    }

    let total = points as i64 - forfeited * PENALTY_PER_SHOT;
    let hits = marks.count("impactos_5")?;

    Ok(Reduction::new(
        total as f64,
        TieBreakDetail::HitsAndTime {
            hits,
            time: first_time,
        },
    ))
}
