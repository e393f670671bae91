//! Best-total records per (discipline, category)
//!
//! Records are raised automatically when a newly computed total strictly
//! exceeds the standing one. Each record keeps the one it replaced, so a
//! record withdrawn because its round was disqualified or corrected downwards
//! hands the title back to its predecessor. Disqualifications never set
//! records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::discipline::Discipline;
use crate::round::RoundId;
use crate::schema::{CategoryId, ComputedScore, Participation, ParticipationId};

/// The record holder for one (discipline, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub discipline: Discipline,
    pub category_id: CategoryId,
    pub total: f64,
    pub participation_id: ParticipationId,
    pub holder: String,
    pub round: RoundId,
    pub set_at: DateTime<Utc>,
    /// The record this one beat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<RecordEntry>>,
}

impl RecordEntry {
    fn is_held_by(&self, participation_id: ParticipationId, round: RoundId) -> bool {
        self.participation_id == participation_id && self.round == round
    }
}

#[derive(Default)]
pub struct RecordBook {
    records: RwLock<HashMap<(Discipline, CategoryId), RecordEntry>>,
}

impl RecordBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a computed score; returns true if it became the new record
    ///
    /// A score for the (participation, round) that holds the record replaces
    /// it: a lower or disqualified result withdraws the record first.
    pub fn consider(&self, participation: &Participation, round: RoundId, score: &ComputedScore) -> bool {
        let key = (participation.discipline, participation.category_id);
        let pid = participation.participation_id;
        let counts = !score.disqualified && score.total.is_finite();
        let mut records = self.records.write();

        if let Some(current) = records.get(&key) {
            if current.is_held_by(pid, round) && (!counts || score.total < current.total) {
                Self::withdraw(&mut records, key);
            }
        }
        if !counts {
            return false;
        }
        if let Some(current) = records.get(&key) {
            if score.total <= current.total {
                return false;
            }
        }

        // The same shooter improving the same round does not stack a predecessor
        let previous = records.remove(&key).and_then(|current| {
            if current.is_held_by(pid, round) {
                current.previous
            } else {
                Some(Box::new(current))
            }
        });

        tracing::info!(
            discipline = %participation.discipline,
            category = participation.category_id,
            total = score.total,
            holder = %participation.display_name,
            "New record"
        );
        records.insert(
            key,
            RecordEntry {
                discipline: participation.discipline,
                category_id: participation.category_id,
                total: score.total,
                participation_id: pid,
                holder: participation.display_name.clone(),
                round,
                set_at: Utc::now(),
                previous,
            },
        );
        true
    }

    fn withdraw(records: &mut HashMap<(Discipline, CategoryId), RecordEntry>, key: (Discipline, CategoryId)) {
        let Some(current) = records.remove(&key) else {
            return;
        };
        tracing::info!(
            discipline = %current.discipline,
            category = current.category_id,
            total = current.total,
            holder = %current.holder,
            "Record withdrawn"
        );
        if let Some(previous) = current.previous {
            records.insert(key, *previous);
        }
    }

    /// Current record followed by every record it displaced, newest first
    pub fn history(&self, discipline: Discipline, category_id: CategoryId) -> Vec<RecordEntry> {
        let records = self.records.read();
        let mut chain = Vec::new();
        let mut next = records.get(&(discipline, category_id));
        while let Some(entry) = next {
            let mut flat = entry.clone();
            flat.previous = None;
            chain.push(flat);
            next = entry.previous.as_deref();
        }
        chain
    }

    pub fn get(&self, discipline: Discipline, category_id: CategoryId) -> Option<RecordEntry> {
        self.records.read().get(&(discipline, category_id)).cloned()
    }

    /// All records, ordered by discipline then category
    pub fn all(&self) -> Vec<RecordEntry> {
        let mut records: Vec<RecordEntry> = self.records.read().values().cloned().collect();
        records.sort_by_key(|r| (r.discipline, r.category_id));
        records
    }
}
