//! Reduce command handler

use std::fs;

use serde_json::{Map, Value};

use super::CommandContext;
use crate::cli::ReduceArgs;
use crate::discipline::{RawMarks, TieBreakDetail};
use crate::error::{Result, ScoringError};
use crate::schema::ComputedScore;
use crate::standings::format_total;

/// Run the reduce command
pub fn run_reduce(args: &ReduceArgs, ctx: &CommandContext) -> Result<String> {
    let raw = match (&args.marks, &args.file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => {
            return Err(ScoringError::validation(
                "marks",
                "pass raw marks as JSON or with --file",
            ))
        }
    };

    let map: Map<String, Value> = serde_json::from_str(&raw)
        .map_err(|e| ScoringError::validation("marks", format!("expected a JSON object: {}", e)))?;

    if !args.discipline.accepts_round(&args.round) {
        return Err(ScoringError::validation(
            "round",
            format!("{} is not a round of {}", args.round, args.discipline.label()),
        ));
    }

    let reduction = args.discipline.reduce(&args.round, &RawMarks::from_map(map))?;
    let computed = ComputedScore::from_reduction(reduction);

    if ctx.verbose {
        eprintln!("Reduced {} marks for {}", args.discipline, args.round);
    }

    if ctx.is_json() {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&computed)?));
    }

    let mut out = String::new();
    out.push_str(&format!("discipline: {}\n", args.discipline));
    out.push_str(&format!("round: {}\n", args.round));
    out.push_str(&format!("total: {}\n", format_total(computed.total)));
    out.push_str(&format!("tie_break: {}\n", computed.tie_break));
    if let Some(detail) = describe_detail(&computed.detail) {
        out.push_str(&format!("detail: {}\n", detail));
    }
    Ok(out)
}

fn describe_detail(detail: &TieBreakDetail) -> Option<String> {
    match detail {
        TieBreakDetail::None => None,
        TieBreakDetail::InnerCount { count } => Some(format!("{} inner", count)),
        TieBreakDetail::HitsAndTime { hits, time } => Some(format!("{} hits in {}s", hits, time)),
        TieBreakDetail::Percentage { percent } => Some(format!("{}%", percent)),
    }
}
