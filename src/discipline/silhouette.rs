//! Metallic silhouette: two stands of four animal banks.

use once_cell::sync::Lazy;

use super::{FieldSpec, RawMarks, Reduction, TieBreakDetail};
use crate::error::Result;

/// Bird, pig, turkey, ram
pub const ANIMAL_WEIGHTS: [f64; 4] = [1.0, 1.5, 2.0, 2.5];
pub const SLOTS: usize = 8;

pub fn slot_field(slot: usize) -> String {
    format!("carril_{}", slot)
}

/// Weight of a 1-based slot; slots 1-4 are stand one, 5-8 stand two
pub fn slot_weight(slot: usize) -> f64 {
    ANIMAL_WEIGHTS[(slot - 1) % ANIMAL_WEIGHTS.len()]
}

static FIELDS: Lazy<Vec<FieldSpec>> =
    Lazy::new(|| (1..=SLOTS).map(|slot| FieldSpec::count(slot_field(slot))).collect());

pub fn fields() -> &'static [FieldSpec] {
    &FIELDS
}

pub fn reduce(marks: &RawMarks) -> Result<Reduction> {
    let mut total = 0.0;
    for slot in 1..=SLOTS {
        total += f64::from(marks.count(&slot_field(slot))?) * slot_weight(slot);
    }
    Ok(Reduction::new(total, TieBreakDetail::None))
}
