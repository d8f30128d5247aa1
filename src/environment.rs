//! Environment resolution for a single BRAT run.
//!
//! Required roots and identifiers are read from a configuration source (the
//! process environment in production) and validated before anything touches
//! the filesystem. Resolution stops at the first missing variable.
use crate::error::OrchestratorError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Root of the base-context (RS Context) tool outputs.
pub const CONTEXT_ROOT_VAR: &str = "RS";
/// Root of the hydrology tool outputs.
pub const HYDRO_ROOT_VAR: &str = "HYDRO";
/// Root of the anthropogenic-impact tool outputs.
pub const ANTHRO_ROOT_VAR: &str = "ANTHRO";
/// Root of the valley-bottom (VBET) tool outputs.
pub const VBET_ROOT_VAR: &str = "VBET";
/// Ten-digit hydrologic unit code.
pub const HUC10_VAR: &str = "HUC10";
/// Destination for the tool's results.
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIR";
/// Installed package resource root that receives staged files.
pub const RESOURCE_DIR_VAR: &str = "BRAT_RESOURCES";
/// Modeling tool source tree that staged files are copied from.
pub const SOURCE_DIR_VAR: &str = "BRAT_SOURCE";
/// Command line used to launch the modeling tool.
pub const TOOL_COMMAND_VAR: &str = "BRAT_COMMAND";

/// Variables checked by [`resolve`], in the order they are checked.
pub const REQUIRED_VARS: [&str; 7] = [
    CONTEXT_ROOT_VAR,
    HYDRO_ROOT_VAR,
    ANTHRO_ROOT_VAR,
    VBET_ROOT_VAR,
    HUC10_VAR,
    OUTPUT_DIR_VAR,
    RESOURCE_DIR_VAR,
];

const HUC10_LEN: usize = 10;

/// Lookup of configuration variables by name.
pub trait ConfigSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads variables from the current process environment.
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

/// A validated ten-digit watershed identifier. Leading zeros are significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WatershedId(String);

impl WatershedId {
    pub fn parse(value: &str) -> Result<Self, OrchestratorError> {
        if value.len() != HUC10_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrchestratorError::InvalidIdentifier {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }
}

impl fmt::Display for WatershedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated inputs for one invocation. Owned by the run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    pub context_root: PathBuf,
    pub hydro_root: PathBuf,
    pub anthro_root: PathBuf,
    pub vbet_root: PathBuf,
    pub watershed: WatershedId,
    pub output_dir: PathBuf,
    pub resource_dir: PathBuf,
}

impl RunContext {
    /// Root directory for an upstream tool.
    pub fn root(&self, root: UpstreamRoot) -> &Path {
        match root {
            UpstreamRoot::Context => &self.context_root,
            UpstreamRoot::Hydro => &self.hydro_root,
            UpstreamRoot::Anthro => &self.anthro_root,
            UpstreamRoot::Vbet => &self.vbet_root,
        }
    }
}

/// The four upstream tools whose outputs feed BRAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamRoot {
    Context,
    Hydro,
    Anthro,
    Vbet,
}

/// Validate the required variables and build a [`RunContext`].
pub fn resolve(source: &dyn ConfigSource) -> Result<RunContext, OrchestratorError> {
    let mut values = BTreeMap::new();
    for name in REQUIRED_VARS {
        values.insert(name, require(source, name)?);
    }
    let mut take = |name: &str| values.remove(name).unwrap_or_default();

    // Validated as given: padding makes the identifier malformed, not missing.
    let watershed = WatershedId::parse(&source.get(HUC10_VAR).unwrap_or_default())?;
    let context = RunContext {
        context_root: PathBuf::from(take(CONTEXT_ROOT_VAR)),
        hydro_root: PathBuf::from(take(HYDRO_ROOT_VAR)),
        anthro_root: PathBuf::from(take(ANTHRO_ROOT_VAR)),
        vbet_root: PathBuf::from(take(VBET_ROOT_VAR)),
        watershed,
        output_dir: PathBuf::from(take(OUTPUT_DIR_VAR)),
        resource_dir: PathBuf::from(take(RESOURCE_DIR_VAR)),
    };
    tracing::debug!(watershed = %context.watershed, "run context resolved");
    Ok(context)
}

/// Read a variable that must be present and non-empty.
pub fn require(source: &dyn ConfigSource, name: &str) -> Result<String, OrchestratorError> {
    source
        .get(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| OrchestratorError::MissingConfiguration {
            name: name.to_string(),
        })
}

/// Read an optional variable, treating empty values as absent.
pub fn optional(source: &dyn ConfigSource, name: &str) -> Option<String> {
    source
        .get(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
