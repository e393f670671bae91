//! Score input schema registry
//!
//! Every discipline owns a field table (what a judge may enter) and a pure
//! reduction from raw marks to a rankable total. Dispatch is on the closed
//! [`Discipline`] enum, so adding a ruleset means adding a variant and a module.
//!
//! # Flow
//!
//! ```text
//! RawMarks ──► Discipline::validate ──► <module>::reduce ──► Reduction
//!              (field table, kinds)     (cross-field rules)
//! ```

pub mod clay;
pub mod fbi;
pub mod generic;
pub mod practical;
pub mod precision;
pub mod running_target;
pub mod silhouette;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScoringError};
use crate::round::{RoundId, MAX_NUMBERED_ROUND, MAX_SERIES};

/// Judge-asserted tie-break winner, accepted by every discipline
pub const TIE_BREAK_FIELD: &str = "desempate";

static COMMON_FIELDS: Lazy<Vec<FieldSpec>> =
    Lazy::new(|| vec![FieldSpec::new(TIE_BREAK_FIELD, FieldKind::Flag)]);

// ============================================================================
// Field schema
// ============================================================================

/// Kind of value a raw-mark field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Non-negative integer count
    Count,
    /// Non-negative decimal (points, aggregate totals)
    Decimal,
    /// Elapsed seconds
    Time,
    /// Decimal between 0 and 100
    Percentage,
    /// Boolean flag
    Flag,
    /// Per-attempt hit/miss grid (`true` / `false` / `null`)
    Grid,
}

/// One recognized raw-mark field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            max: None,
        }
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Count)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn at_most(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }
}

// ============================================================================
// Raw marks
// ============================================================================

/// Judge-entered input for one participation in one round
///
/// Values arrive from HTML forms, so numbers may be JSON numbers or numeric
/// strings. Empty strings and `null` count as "not entered".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawMarks(Map<String, Value>);

impl RawMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the field holds something other than `null` or `""`
    pub fn is_present(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    fn number(&self, field: &str) -> Result<Option<f64>> {
        if !self.is_present(field) {
            return Ok(None);
        }
        let value = match self.0.get(field) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match value {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ScoringError::validation(field, "expected a number")),
        }
    }

    /// Integer count; missing fields count as zero
    pub fn count(&self, field: &str) -> Result<u32> {
        let Some(value) = self.number(field)? else {
            return Ok(0);
        };
        if value < 0.0 {
            return Err(ScoringError::validation(field, "count cannot be negative"));
        }
        if value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(ScoringError::validation(field, "count must be a whole number"));
        }
        Ok(value as u32)
    }

    /// Non-negative decimal, `None` when not entered
    pub fn decimal(&self, field: &str) -> Result<Option<f64>> {
        match self.number(field)? {
            Some(v) if v < 0.0 => Err(ScoringError::validation(field, "cannot be negative")),
            other => Ok(other),
        }
    }

    /// Boolean flag; missing fields are `false`
    pub fn flag(&self, field: &str) -> Result<bool> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "" | "false" => Ok(false),
                "true" => Ok(true),
                _ => Err(ScoringError::validation(field, "expected true or false")),
            },
            Some(_) => Err(ScoringError::validation(field, "expected true or false")),
        }
    }

    /// Hit/miss grid, `None` when not entered
    pub fn grid(&self, field: &str) -> Result<Option<Vec<Option<bool>>>> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(cells)) => cells
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell {
                    Value::Bool(b) => Ok(Some(*b)),
                    Value::Null => Ok(None),
                    _ => Err(ScoringError::validation(
                        field,
                        format!("attempt {} must be true, false or null", i + 1),
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(_) => Err(ScoringError::validation(field, "expected an array of attempts")),
        }
    }
}

impl From<Map<String, Value>> for RawMarks {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Reduction output
// ============================================================================

/// Discipline-specific data used to order equal totals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TieBreakDetail {
    #[default]
    None,
    /// Inner tens, X-count or `xs`: more is better
    InnerCount { count: u32 },
    /// FBI: more hits at zone 5, then faster sub-round 1
    HitsAndTime { hits: u32, time: f64 },
    /// IPSC match percentage: higher is better
    Percentage { percent: f64 },
}

impl TieBreakDetail {
    /// `Less` when `self` ranks ahead of `other`
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::InnerCount { count: a }, Self::InnerCount { count: b }) => b.cmp(a),
            (
                Self::HitsAndTime { hits: ha, time: ta },
                Self::HitsAndTime { hits: hb, time: tb },
            ) => hb.cmp(ha).then_with(|| ta.total_cmp(tb)),
            (Self::Percentage { percent: a }, Self::Percentage { percent: b }) => b.total_cmp(a),
            _ => Ordering::Equal,
        }
    }
}

/// Result of reducing raw marks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    pub total: f64,
    /// Judge-asserted tie-break winner, never computed
    pub tie_break: bool,
    pub detail: TieBreakDetail,
}

impl Reduction {
    pub fn new(total: f64, detail: TieBreakDetail) -> Self {
        Self {
            total,
            tie_break: false,
            detail,
        }
    }
}

// ============================================================================
// Discipline
// ============================================================================

/// A scoring ruleset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    PrecisionPistol,
    Fbi,
    MetallicSilhouette,
    RunningTarget,
    Practical,
    Clay,
    Generic,
}

impl Discipline {
    pub const ALL: [Discipline; 7] = [
        Self::PrecisionPistol,
        Self::Fbi,
        Self::MetallicSilhouette,
        Self::RunningTarget,
        Self::Practical,
        Self::Clay,
        Self::Generic,
    ];

    /// Wire identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::PrecisionPistol => "precision_pistol",
            Self::Fbi => "fbi",
            Self::MetallicSilhouette => "metallic_silhouette",
            Self::RunningTarget => "running_target",
            Self::Practical => "practical",
            Self::Clay => "clay",
            Self::Generic => "generic",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrecisionPistol => "Precision pistol match",
            Self::Fbi => "FBI combat course",
            Self::MetallicSilhouette => "Metallic silhouette",
            Self::RunningTarget => "Running target (hare/boar)",
            Self::Practical => "Practical (IPSC)",
            Self::Clay => "Clay target (trap/skeet/helice)",
            Self::Generic => "Generic total score",
        }
    }

    /// Discipline-specific fields (the common `desempate` flag is separate)
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::PrecisionPistol => precision::fields(),
            Self::Fbi => fbi::fields(),
            Self::MetallicSilhouette => silhouette::fields(),
            Self::RunningTarget => running_target::fields(),
            Self::Practical => practical::fields(),
            Self::Clay => clay::fields(),
            Self::Generic => generic::fields(),
        }
    }

    /// Fields every discipline accepts
    pub fn common_fields() -> &'static [FieldSpec] {
        &COMMON_FIELDS
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields()
            .iter()
            .chain(Self::common_fields().iter())
            .find(|f| f.name == name)
    }

    /// Scored shot-by-shot in a shared firing order
    pub fn is_shot_by_shot(&self) -> bool {
        matches!(self, Self::Clay)
    }

    /// Whether `round` is a valid phase for this discipline
    pub fn accepts_round(&self, round: &RoundId) -> bool {
        match (self, round) {
            (Self::Generic, _) => true,
            (_, RoundId::Final | RoundId::TieBreak) => true,
            (Self::Clay, RoundId::Semifinal) => true,
            (Self::PrecisionPistol, RoundId::Series(n)) => (1..=MAX_SERIES).contains(n),
            (Self::PrecisionPistol, _) => false,
            (_, RoundId::Round(n)) => (1..=MAX_NUMBERED_ROUND).contains(n),
            _ => false,
        }
    }

    /// Check field names, kinds and required fields
    pub fn validate(&self, marks: &RawMarks) -> Result<()> {
        for name in marks.fields() {
            let spec = self.field(name).ok_or_else(|| {
                ScoringError::validation(
                    name,
                    format!("not a recognized field for {}", self.label()),
                )
            })?;
            check_kind(spec, marks)?;
        }

        for spec in self.fields() {
            if spec.required && !marks.is_present(&spec.name) {
                return Err(ScoringError::validation(&spec.name, "required"));
            }
        }

        Ok(())
    }

    /// Validate and reduce raw marks for `round`
    pub fn reduce(&self, round: &RoundId, marks: &RawMarks) -> Result<Reduction> {
        self.validate(marks)?;

        let mut reduction = match self {
            Self::PrecisionPistol => precision::reduce(marks)?,
            Self::Fbi => fbi::reduce(marks)?,
            Self::MetallicSilhouette => silhouette::reduce(marks)?,
            Self::RunningTarget => running_target::reduce(marks)?,
            Self::Practical => practical::reduce(marks)?,
            Self::Clay => clay::reduce(round, marks)?,
            Self::Generic => generic::reduce(marks)?,
        };
        reduction.tie_break = marks.flag(TIE_BREAK_FIELD)?;

        tracing::debug!(
            discipline = self.id(),
            round = %round,
            total = reduction.total,
            "Reduced raw marks"
        );
        Ok(reduction)
    }
}

fn check_kind(spec: &FieldSpec, marks: &RawMarks) -> Result<()> {
    let name = spec.name.as_str();
    match spec.kind {
        FieldKind::Count => {
            let count = marks.count(name)?;
            if let Some(max) = spec.max {
                if count > max {
                    return Err(ScoringError::validation(
                        name,
                        format!("at most {} allowed, got {}", max, count),
                    ));
                }
            }
        }
        FieldKind::Decimal | FieldKind::Time => {
            marks.decimal(name)?;
        }
        FieldKind::Percentage => {
            if let Some(p) = marks.decimal(name)? {
                if p > 100.0 {
                    return Err(ScoringError::validation(name, "percentage above 100"));
                }
            }
        }
        FieldKind::Flag => {
            marks.flag(name)?;
        }
        FieldKind::Grid => {
            marks.grid(name)?;
        }
    }
    Ok(())
}

/// Σ count × zone for `<prefix>_<zone>` fields
pub(crate) fn zone_sum(marks: &RawMarks, prefix: &str, zones: std::ops::RangeInclusive<u32>) -> Result<(u32, u64)> {
    let mut shots = 0u32;
    let mut points = 0u64;
    for zone in zones {
        let count = marks.count(&format!("{}_{}", prefix, zone))?;
        shots = shots.saturating_add(count);
        points += u64::from(count) * u64::from(zone);
    }
    Ok((shots, points))
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Discipline {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.id() == wanted)
            .ok_or_else(|| ScoringError::validation("discipline", format!("unknown discipline '{}'", s)))
    }
}
