//! Round identifiers and attempt limits
//!
//! Rounds travel on the wire using the labels judges pick from
//! (`"Ronda 1"`, `"Serie 2"`, `"Semifinal"`, `"Final"`, `"Desempate"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

/// Clay targets in a standard round
pub const STANDARD_ROUND_TARGETS: usize = 25;
/// Clay targets in a semifinal
pub const SEMIFINAL_TARGETS: usize = 10;
/// Clay targets in a final (and shoot-off)
pub const FINAL_TARGETS: usize = 5;

/// Highest numbered `Ronda N` accepted
pub const MAX_NUMBERED_ROUND: u8 = 8;
/// Highest numbered `Serie N` accepted
pub const MAX_SERIES: u8 = 6;

/// A named phase of competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoundId {
    /// `Ronda N`
    Round(u8),
    /// `Serie N`
    Series(u8),
    Semifinal,
    Final,
    /// `Desempate`
    TieBreak,
}

impl RoundId {
    /// Number of clay targets for this round
    pub fn clay_attempt_limit(&self) -> usize {
        match self {
            Self::Round(_) | Self::Series(_) => STANDARD_ROUND_TARGETS,
            Self::Semifinal => SEMIFINAL_TARGETS,
            Self::Final | Self::TieBreak => FINAL_TARGETS,
        }
    }

    /// The round that follows this one in a clay program
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Round(n) if *n < MAX_NUMBERED_ROUND => Some(Self::Round(n + 1)),
            Self::Round(_) => Some(Self::Semifinal),
            Self::Series(n) if *n < MAX_SERIES => Some(Self::Series(n + 1)),
            Self::Series(_) => Some(Self::Final),
            Self::Semifinal => Some(Self::Final),
            Self::Final => Some(Self::TieBreak),
            Self::TieBreak => None,
        }
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Round(n) => write!(f, "Ronda {}", n),
            Self::Series(n) => write!(f, "Serie {}", n),
            Self::Semifinal => write!(f, "Semifinal"),
            Self::Final => write!(f, "Final"),
            Self::TieBreak => write!(f, "Desempate"),
        }
    }
}

impl FromStr for RoundId {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();

        let numbered = |prefix: &str, max: u8| -> Option<u8> {
            let rest = lower.strip_prefix(prefix)?.trim();
            let n: u8 = rest.parse().ok()?;
            (1..=max).contains(&n).then_some(n)
        };

        match lower.as_str() {
            "semifinal" => return Ok(Self::Semifinal),
            "final" => return Ok(Self::Final),
            "desempate" => return Ok(Self::TieBreak),
            _ => {}
        }

        if let Some(n) = numbered("ronda", MAX_NUMBERED_ROUND) {
            return Ok(Self::Round(n));
        }
        if let Some(n) = numbered("serie", MAX_SERIES) {
            return Ok(Self::Series(n));
        }

        Err(ScoringError::validation(
            "round",
            format!("unknown round '{}'", trimmed),
        ))
    }
}

impl TryFrom<String> for RoundId {
    type Error = ScoringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoundId> for String {
    fn from(round: RoundId) -> Self {
        round.to_string()
    }
}
