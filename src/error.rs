//! Failure taxonomy for a single orchestrated run.
//!
//! Every variant is fatal to the current run and names the failing item so
//! the operator can act on it without reading logs.
use crate::layers::NamingConvention;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("required configuration variable {name} is not set")]
    MissingConfiguration { name: String },

    #[error("watershed identifier {value:?} must be exactly ten digits")]
    InvalidIdentifier { value: String },

    #[error("{name} must be a positive number (got {value:?})")]
    InvalidNumber { name: String, value: String },

    #[error(
        "layer {logical_name} not found at {} under the {convention} convention{}",
        .path_tried.display(),
        alternative_hint(.alternative)
    )]
    LayerResolution {
        logical_name: String,
        path_tried: PathBuf,
        convention: NamingConvention,
        alternative: Option<AlternativeCandidate>,
    },

    #[error("malformed filter value {raw_value:?}: {reason}")]
    FilterParse { raw_value: String, reason: String },

    #[error("failed to stage {}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("modeling tool {program:?} not found")]
    ToolNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to launch modeling tool {}", .program.display())]
    ToolLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("modeling tool exited with {}{}", exit_label(.exit_code), stderr_tail(.stderr))]
    ToolInvocation {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("run cancelled; partial results left in {}", .output_dir.display())]
    Cancelled { output_dir: PathBuf },
}

/// The path the other naming convention would have used for a failed layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternativeCandidate {
    pub convention: NamingConvention,
    pub path: PathBuf,
    pub exists: bool,
}

impl OrchestratorError {
    /// Exit code to surface from `bratrun` for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::ToolInvocation {
                exit_code: Some(code),
                ..
            } => *code,
            OrchestratorError::Cancelled { .. } => 130,
            _ => 1,
        }
    }
}

fn alternative_hint(alternative: &Option<AlternativeCandidate>) -> String {
    let Some(alt) = alternative else {
        return String::new();
    };
    let state = if alt.exists { "exists" } else { "is also missing" };
    format!(
        "; the {} convention would use {} which {state} (select it with --convention {})",
        alt.convention,
        alt.path.display(),
        alt.convention
    )
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_resolution_names_both_conventions() {
        let err = OrchestratorError::LayerResolution {
            logical_name: "hydro_igos".to_string(),
            path_tried: PathBuf::from("/h/outputs/hydro.gpkg/vwIGOs"),
            convention: NamingConvention::Legacy,
            alternative: Some(AlternativeCandidate {
                convention: NamingConvention::Current,
                path: PathBuf::from("/h/outputs/hydro.gpkg/IGOGeometry"),
                exists: true,
            }),
        };
        let text = err.to_string();
        assert!(text.contains("hydro_igos"));
        assert!(text.contains("vwIGOs"));
        assert!(text.contains("legacy convention"));
        assert!(text.contains("--convention current"));
    }

    #[test]
    fn tool_exit_code_is_surfaced() {
        let err = OrchestratorError::ToolInvocation {
            exit_code: Some(3),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "modeling tool exited with exit code 3: boom");
    }

    #[test]
    fn launch_failure_keeps_its_cause() {
        let err = OrchestratorError::ToolLaunch {
            program: PathBuf::from("/opt/brat/bin/brat"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "bad interpreter"),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("/opt/brat/bin/brat"));
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "bad interpreter");
    }
}
