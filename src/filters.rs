//! Optional filter/threshold arguments and numeric argument parsing.
//!
//! Code-list polarity matters: an absent list keeps every feature, an
//! explicitly empty list keeps none. The two stay distinct all the way to
//! the rendered command line.
use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default streamside buffer distance.
pub const DEFAULT_STREAMSIDE_BUFFER: &str = "30";
/// Default riparian buffer distance.
pub const DEFAULT_RIPARIAN_BUFFER: &str = "100";

/// Raw, operator-supplied optional arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArguments {
    pub reach_codes: Option<String>,
    pub canal_codes: Option<String>,
    pub peren_codes: Option<String>,
    pub flow_areas: Option<OptionalLayer>,
    pub waterbodies: Option<OptionalLayer>,
    pub max_waterbody: Option<String>,
    pub meta: Option<String>,
    pub verbose: bool,
    pub debug: bool,
}

/// How an optional layer was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalLayer {
    /// Use the conventional location under the context root.
    Conventional,
    /// Use an explicit raster or `container/layer` path.
    Explicit(PathBuf),
}

impl OptionalLayer {
    pub fn from_flag(value: Option<PathBuf>) -> Self {
        match value {
            Some(path) => OptionalLayer::Explicit(path),
            None => OptionalLayer::Conventional,
        }
    }
}

/// Feature-classification code filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "codes", rename_all = "snake_case")]
pub enum CodeFilter {
    RetainAll,
    Only(Vec<String>),
}

impl CodeFilter {
    /// Parse an optional comma-delimited list of numeric codes.
    pub fn parse(raw: Option<&str>) -> Result<Self, OrchestratorError> {
        let Some(raw) = raw else {
            return Ok(CodeFilter::RetainAll);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(CodeFilter::Only(Vec::new()));
        }
        let mut codes = Vec::new();
        for token in trimmed.split(',') {
            let code = token.trim();
            if code.is_empty() {
                return Err(filter_error(raw, "empty code in list"));
            }
            if !code.bytes().all(|b| b.is_ascii_digit()) {
                return Err(filter_error(
                    raw,
                    &format!("code {code:?} is not numeric"),
                ));
            }
            codes.push(code.to_string());
        }
        Ok(CodeFilter::Only(codes))
    }

    /// Value forwarded to the tool, or `None` when nothing is forwarded.
    pub fn arg_value(&self) -> Option<String> {
        match self {
            CodeFilter::RetainAll => None,
            CodeFilter::Only(codes) => Some(codes.join(",")),
        }
    }
}

/// One provenance `key=value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

/// Parse comma-separated `key=value` pairs. Values are opaque.
pub fn parse_meta(raw: &str) -> Result<Vec<MetaEntry>, OrchestratorError> {
    let mut entries = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = token.split_once('=') else {
            return Err(filter_error(token, "expected key=value"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(filter_error(token, "empty key"));
        }
        entries.push(MetaEntry {
            key: key.to_string(),
            value: value.trim().to_string(),
        });
    }
    Ok(entries)
}

pub fn render_meta(entries: &[MetaEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}={}", entry.key, entry.value))
        .collect::<Vec<_>>()
        .join(",")
}

/// A strictly positive, finite distance or size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PositiveNumber(f64);

impl PositiveNumber {
    pub fn parse(name: &str, raw: &str) -> Result<Self, OrchestratorError> {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(Self(value)),
            _ => Err(OrchestratorError::InvalidNumber {
                name: name.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for PositiveNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse `--max-waterbody`; malformed values are filter errors.
pub fn parse_max_waterbody(raw: &str) -> Result<PositiveNumber, OrchestratorError> {
    PositiveNumber::parse("max_waterbody", raw)
        .map_err(|_| filter_error(raw, "max_waterbody must be a positive number"))
}

fn filter_error(raw: &str, reason: &str) -> OrchestratorError {
    OrchestratorError::FilterParse {
        raw_value: raw.to_string(),
        reason: reason.to_string(),
    }
}
