use super::print_json;
use crate::cli::LayersArgs;
use crate::config;
use crate::environment::{self, ConfigSource};
use crate::layers::{survey, LayerKind, LayerPresence, NamingConvention};
use anyhow::{anyhow, Result};
use serde::Serialize;

#[derive(Serialize)]
struct LayersReport<'a> {
    convention: NamingConvention,
    missing_required: Vec<&'a str>,
    layers: &'a [LayerPresence],
}

/// Print every layer's presence under both conventions.
///
/// Fails when the selected convention is missing a required layer, but
/// never switches conventions on its own.
pub fn run_layers(args: &LayersArgs, source: &dyn ConfigSource) -> Result<()> {
    let ctx = environment::resolve(source)?;
    let config = config::load_optional(args.config.as_deref())?;
    let convention = args.convention.or(config.convention).unwrap_or_default();

    let entries = survey(&ctx);
    let missing_required: Vec<&str> = entries
        .iter()
        .filter(|p| p.convention == convention && p.required && !p.exists)
        .map(|p| p.logical_name.as_str())
        .collect();

    if args.json {
        print_json(&LayersReport {
            convention,
            missing_required: missing_required.clone(),
            layers: &entries,
        })?;
    } else {
        for entry in &entries {
            let marker = if entry.convention == convention { "*" } else { " " };
            let state = if entry.exists { "ok" } else { "missing" };
            let kind = match entry.kind {
                LayerKind::Raster => "raster",
                LayerKind::VectorLayer => "vector",
            };
            println!(
                "{marker} {:<8} {:<16} {:<7} {:<7} {}",
                entry.convention.to_string(),
                entry.logical_name,
                kind,
                state,
                entry.path.display()
            );
        }
    }

    if missing_required.is_empty() {
        return Ok(());
    }
    let alternative = convention.other();
    let alternative_complete = entries
        .iter()
        .filter(|p| p.convention == alternative && p.required)
        .all(|p| p.exists);
    let hint = if alternative_complete {
        format!(" (all required layers exist under --convention {alternative})")
    } else {
        String::new()
    };
    Err(anyhow!(
        "{} required layer(s) missing under the {convention} convention: {}{hint}",
        missing_required.len(),
        missing_required.join(", ")
    ))
}
