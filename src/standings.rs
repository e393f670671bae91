//! Live standings
//!
//! A [`StandingsSnapshot`] is rebuilt purely from channel events. The broadcast
//! channel keeps one as its current-state cache and every viewer keeps its own.
//!
//! Events are applied idempotently: each (participation, round) remembers the
//! sequence of the event that last wrote it, and anything older or equal is
//! ignored. A participation's standing is its most recently sequenced round.
//!
//! # Ranking order
//!
//! 1. Non-disqualified entries before disqualified ones
//! 2. Higher total first
//! 3. Judge-asserted tie-break winner first
//! 4. Discipline tie-break detail (inner count, FBI hits/time, IPSC percentage)
//! 5. Participation id, for a stable table

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use ordered_float::OrderedFloat;

use crate::round::RoundId;
use crate::schema::{ChannelEvent, ParticipationId, ScoreEvent};

/// Text shown instead of an empty table
pub const WAITING_FOR_DATA: &str = "Waiting for data...";

#[derive(Debug, Clone, Default)]
struct ParticipationRounds {
    rounds: BTreeMap<RoundId, ScoreEvent>,
    /// Highest sequence seen per round, including retractions
    seen: BTreeMap<RoundId, u64>,
}

impl ParticipationRounds {
    fn current(&self) -> Option<&ScoreEvent> {
        self.rounds.values().max_by_key(|e| e.sequence)
    }
}

/// Per-competition table of the latest score per participation
#[derive(Debug, Clone, Default)]
pub struct StandingsSnapshot {
    entries: HashMap<ParticipationId, ParticipationRounds>,
    last_sequence: u64,
}

impl StandingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event; returns true if the table changed
    pub fn apply(&mut self, event: &ChannelEvent) -> bool {
        let changed = match event {
            ChannelEvent::Score(score) => self.apply_score(score),
            ChannelEvent::Retracted {
                participation_id,
                round,
                sequence,
                ..
            } => self.apply_retraction(*participation_id, *round, *sequence),
        };
        self.last_sequence = self.last_sequence.max(event.sequence());
        changed
    }

    fn apply_score(&mut self, score: &ScoreEvent) -> bool {
        let entry = self.entries.entry(score.participation_id).or_default();
        if let Some(seen) = entry.seen.get(&score.round) {
            if *seen >= score.sequence && score.sequence != 0 {
                return false;
            }
        }
        entry.seen.insert(score.round, score.sequence);
        entry.rounds.insert(score.round, score.clone());
        true
    }

    fn apply_retraction(&mut self, participation_id: ParticipationId, round: RoundId, sequence: u64) -> bool {
        let Some(entry) = self.entries.get_mut(&participation_id) else {
            return false;
        };
        if let Some(seen) = entry.seen.get(&round) {
            if *seen >= sequence && sequence != 0 {
                return false;
            }
        }
        entry.seen.insert(round, sequence);
        let removed = entry.rounds.remove(&round).is_some();
        if entry.rounds.is_empty() {
            self.entries.remove(&participation_id);
        }
        removed
    }

    /// Replace the whole table (resync)
    pub fn reset<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = ScoreEvent>,
    {
        self.entries.clear();
        self.last_sequence = 0;
        for event in events {
            self.apply(&ChannelEvent::Score(event));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Highest sequence applied so far
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Current standing of one participation
    pub fn get(&self, participation_id: ParticipationId) -> Option<&ScoreEvent> {
        self.entries.get(&participation_id)?.current()
    }

    /// Every stored round event, for resync
    pub fn all_round_events(&self) -> Vec<ScoreEvent> {
        let mut events: Vec<ScoreEvent> = self
            .entries
            .values()
            .flat_map(|e| e.rounds.values().cloned())
            .collect();
        events.sort_by_key(|e| e.sequence);
        events
    }

    /// Entries sorted by ranking order
    pub fn ranked(&self) -> Vec<&ScoreEvent> {
        let mut rows: Vec<&ScoreEvent> = self.entries.values().filter_map(|e| e.current()).collect();
        rows.sort_by(|a, b| standing_order(a, b));
        rows
    }

    /// Plain-text scoreboard
    pub fn render(&self) -> String {
        if self.is_empty() {
            return format!("{}\n", WAITING_FOR_DATA);
        }

        let mut out = String::new();
        let _ = writeln!(out, "{:>4}  {:<28} {:<18} {:<10} {:>9}", "Pos", "Competitor", "Equipment", "Round", "Score");
        for (i, row) in self.ranked().iter().enumerate() {
            let score = if row.disqualified {
                "DQ".to_string()
            } else {
                format_total(row.total)
            };
            let marker = if row.tie_break { "*" } else { "" };
            let _ = writeln!(
                out,
                "{:>4}  {:<28} {:<18} {:<10} {:>9}{}",
                i + 1,
                row.display_name,
                row.equipment_label,
                row.round.to_string(),
                score,
                marker
            );
        }
        out
    }
}

/// Totals print without a trailing `.0` unless fractional
pub fn format_total(total: f64) -> String {
    if total.fract() == 0.0 {
        format!("{:.0}", total)
    } else {
        format!("{:.2}", total)
    }
}

/// `Less` when `a` ranks ahead of `b`
pub fn standing_order(a: &ScoreEvent, b: &ScoreEvent) -> Ordering {
    let key = |e: &ScoreEvent| {
        (
            e.disqualified,
            Reverse(OrderedFloat(if e.disqualified { f64::NEG_INFINITY } else { e.total })),
            Reverse(e.tie_break),
        )
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.detail.rank_cmp(&b.detail))
        .then_with(|| a.participation_id.cmp(&b.participation_id))
}
