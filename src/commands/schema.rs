//! Schema command handler

use serde_json::json;

use super::CommandContext;
use crate::cli::SchemaArgs;
use crate::discipline::{Discipline, FieldSpec};
use crate::error::Result;

/// Run the schema command
pub fn run_schema(args: &SchemaArgs, ctx: &CommandContext) -> Result<String> {
    let disciplines: Vec<Discipline> = match args.discipline {
        Some(d) => vec![d],
        None => Discipline::ALL.to_vec(),
    };

    if ctx.is_json() {
        let entries: Vec<_> = disciplines
            .iter()
            .map(|d| {
                json!({
                    "discipline": d.id(),
                    "label": d.label(),
                    "shot_by_shot": d.is_shot_by_shot(),
                    "fields": d.fields(),
                })
            })
            .collect();
        let value = json!({
            "disciplines": entries,
            "common_fields": Discipline::common_fields(),
        });
        return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
    }

    let mut out = String::new();
    for d in &disciplines {
        out.push_str(&format!("{} ({})\n", d.id(), d.label()));
        for field in d.fields() {
            out.push_str(&format!("  {}\n", describe(field)));
        }
    }
    out.push_str("common\n");
    for field in Discipline::common_fields() {
        out.push_str(&format!("  {}\n", describe(field)));
    }
    Ok(out)
}

fn describe(field: &FieldSpec) -> String {
    let kind = format!("{:?}", field.kind).to_lowercase();
    let mut line = format!("{:<24} {}", field.name, kind);
    if field.required {
        line.push_str(" required");
    }
    if let Some(max) = field.max {
        line.push_str(&format!(" max={}", max));
    }
    line
}
