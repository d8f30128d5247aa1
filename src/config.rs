//! Optional JSON run config.
//!
//! Operators who run the same watershed repeatedly keep their filter codes
//! and buffers here instead of on the command line. Flags always win over
//! the file; the file wins over built-in defaults.
use crate::cli::BuildArgs;
use crate::environment::{optional, ConfigSource, TOOL_COMMAND_VAR};
use crate::filters::{
    parse_max_waterbody, parse_meta, CodeFilter, FilterArguments, OptionalLayer, PositiveNumber,
    DEFAULT_RIPARIAN_BUFFER, DEFAULT_STREAMSIDE_BUFFER,
};
use crate::invocation::BuildRequest;
use crate::layers::NamingConvention;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current schema version for run config files.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Tool command used when nothing else names one.
pub const DEFAULT_TOOL_COMMAND: &str = "brat";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convention: Option<NamingConvention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamside_buffer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riparian_buffer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reach_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canal_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peren_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_waterbody: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_command: Option<String>,
}

/// Load and validate a run config.
pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let bytes = fs::read(path).with_context(|| format!("read run config {}", path.display()))?;
    let config: RunConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse run config {}", path.display()))?;
    validate_run_config(&config).with_context(|| format!("validate {}", path.display()))?;
    Ok(config)
}

/// Load the config named by `path`, or an empty config when none is given.
pub fn load_optional(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => load_run_config(path),
        None => Ok(RunConfig {
            schema_version: CONFIG_SCHEMA_VERSION,
            ..RunConfig::default()
        }),
    }
}

/// Validate schema and values the same way command-line flags are validated.
pub fn validate_run_config(config: &RunConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported run config schema_version {}",
            config.schema_version
        ));
    }
    if let Some(raw) = &config.streamside_buffer {
        PositiveNumber::parse("streamside_buffer", raw)?;
    }
    if let Some(raw) = &config.riparian_buffer {
        PositiveNumber::parse("riparian_buffer", raw)?;
    }
    for raw in [&config.reach_codes, &config.canal_codes, &config.peren_codes] {
        CodeFilter::parse(raw.as_deref())?;
    }
    if let Some(raw) = &config.max_waterbody {
        parse_max_waterbody(raw)?;
    }
    if let Some(raw) = &config.meta {
        parse_meta(raw)?;
    }
    if let Some(command) = &config.tool_command {
        tool_words(command)?;
    }
    Ok(())
}

/// Merge flags over the config into a build request.
pub fn build_request(args: &BuildArgs, config: &RunConfig) -> BuildRequest {
    let pick = |flag: &Option<String>, file: &Option<String>| flag.clone().or_else(|| file.clone());
    BuildRequest {
        convention: args.convention.or(config.convention).unwrap_or_default(),
        streamside_buffer: pick(&args.streamside_buffer, &config.streamside_buffer)
            .unwrap_or_else(|| DEFAULT_STREAMSIDE_BUFFER.to_string()),
        riparian_buffer: pick(&args.riparian_buffer, &config.riparian_buffer)
            .unwrap_or_else(|| DEFAULT_RIPARIAN_BUFFER.to_string()),
        filters: FilterArguments {
            reach_codes: pick(&args.reach_codes, &config.reach_codes),
            canal_codes: pick(&args.canal_codes, &config.canal_codes),
            peren_codes: pick(&args.peren_codes, &config.peren_codes),
            flow_areas: args.flow_areas.clone().map(OptionalLayer::from_flag),
            waterbodies: args.waterbodies.clone().map(OptionalLayer::from_flag),
            max_waterbody: pick(&args.max_waterbody, &config.max_waterbody),
            meta: pick(&args.meta, &config.meta),
            verbose: args.verbose,
            debug: args.debug,
        },
    }
}

/// Resolve the tool command: flag > config > environment > default.
pub fn resolve_tool_command(
    explicit: Option<&str>,
    config: &RunConfig,
    source: &dyn ConfigSource,
) -> Result<Vec<String>> {
    let command = explicit
        .map(str::to_string)
        .or_else(|| config.tool_command.clone())
        .or_else(|| optional(source, TOOL_COMMAND_VAR))
        .unwrap_or_else(|| DEFAULT_TOOL_COMMAND.to_string());
    tool_words(&command)
}

fn tool_words(command: &str) -> Result<Vec<String>> {
    let words =
        shell_words::split(command).with_context(|| format!("parse tool command: {command}"))?;
    if words.is_empty() {
        return Err(anyhow!("tool command is empty"));
    }
    Ok(words)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
