//! The `bratrun run` pipeline.
//!
//! Resolve, build, stage when stale, record, then block on the tool. Each
//! step completes before the next starts.
use super::context::{staged_resources, RunSession};
use super::write_json;
use crate::cli::RunArgs;
use crate::environment::ConfigSource;
use crate::error::OrchestratorError;
use crate::invocation::{self, Invocation};
use crate::paths::run_record_path;
use crate::runner::{locate_program, run_tool};
use crate::staging::stage_if_stale;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current schema version for `bratrun_invocation.json`.
pub const RUN_RECORD_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum RunState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Serialize)]
struct RunRecord<'a> {
    schema_version: u32,
    started_at_epoch_ms: u128,
    state: RunState,
    command: &'a [String],
    args: Vec<String>,
    invocation: &'a Invocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run_run(args: &RunArgs, source: &dyn ConfigSource, cancel: &AtomicBool) -> Result<()> {
    let session = RunSession::load(&args.build, source)?;
    let invocation = invocation::build(&session.ctx, &session.request)?;
    let command = session.tool_command(args.tool.as_deref(), source)?;
    locate_program(&command[0])?;

    if args.no_stage {
        tracing::info!("resource staging skipped (--no-stage)");
    } else {
        let resources = staged_resources(source)
            .context("resource staging needs BRAT_SOURCE (or pass --no-stage)")?;
        let report = stage_if_stale(&resources, &session.ctx.resource_dir, false)?;
        if !report.skipped {
            tracing::info!(reason = ?report.reason, files = report.copied.len(), "resources restaged");
        }
    }

    let output_dir = &session.ctx.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create output dir {}", output_dir.display()))?;
    let record_path = run_record_path(output_dir);
    let mut record = RunRecord {
        schema_version: RUN_RECORD_SCHEMA_VERSION,
        started_at_epoch_ms: now_epoch_ms()?,
        state: RunState::Running,
        command: &command,
        args: invocation.args(),
        invocation: &invocation,
        exit_code: None,
        elapsed_ms: None,
        error: None,
    };
    write_json(&record_path, &record)?;

    let result = run_tool(&command, &record.args, output_dir, cancel);
    match &result {
        Ok(outcome) => {
            record.state = RunState::Succeeded;
            record.exit_code = Some(outcome.exit_code);
            record.elapsed_ms = Some(outcome.elapsed_ms);
        }
        Err(OrchestratorError::Cancelled { .. }) => record.state = RunState::Cancelled,
        Err(err) => {
            record.state = RunState::Failed;
            record.error = Some(error_chain(err));
            if let OrchestratorError::ToolInvocation { exit_code, .. } = err {
                record.exit_code = *exit_code;
            }
        }
    }
    write_json(&record_path, &record)?;
    result?;
    println!("BRAT finished; results in {}", output_dir.display());
    Ok(())
}

fn error_chain(err: &OrchestratorError) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn now_epoch_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("compute timestamp")?
        .as_millis())
}
