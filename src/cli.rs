//! CLI argument parsing for the BRAT run workflow.
//!
//! Upstream roots and the watershed come from the environment; flags here
//! carry the per-run choices layered on top of an optional run config.
use crate::layers::NamingConvention;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "bratrun",
    version,
    about = "Resolve inputs, stage resources, and invoke the BRAT riparian model",
    after_help = "Environment:\n  RS, HYDRO, ANTHRO, VBET   upstream tool output roots\n  HUC10                     ten-digit watershed identifier\n  OUTPUT_DIR                destination for BRAT results\n  BRAT_RESOURCES            installed package resource directory\n  BRAT_SOURCE               BRAT source tree (staging only)\n  BRAT_COMMAND              command used to launch BRAT (default: brat)\n\nExamples:\n  bratrun check --reach-codes 33400,46003,46006,46007,55800\n  bratrun layers\n  bratrun stage --status\n  bratrun run --flow-areas --waterbodies --verbose",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Check(CheckArgs),
    Layers(LayersArgs),
    Stage(StageArgs),
    Run(RunArgs),
}

/// Per-run build choices shared by `check` and `run`.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Optional JSON run config supplying defaults for these flags
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Internal layer naming convention of the hydro/anthro outputs
    #[arg(long, value_enum)]
    pub convention: Option<NamingConvention>,

    /// Streamside buffer distance (default 30)
    #[arg(long, value_name = "DIST", allow_hyphen_values = true)]
    pub streamside_buffer: Option<String>,

    /// Riparian buffer distance (default 100)
    #[arg(long, value_name = "DIST", allow_hyphen_values = true)]
    pub riparian_buffer: Option<String>,

    /// Comma-delimited reach codes to keep (absent keeps all)
    #[arg(long, value_name = "CODES")]
    pub reach_codes: Option<String>,

    /// Comma-delimited canal codes (absent keeps all)
    #[arg(long, value_name = "CODES")]
    pub canal_codes: Option<String>,

    /// Comma-delimited perennial codes (absent keeps all)
    #[arg(long, value_name = "CODES")]
    pub peren_codes: Option<String>,

    /// Include flow areas; optionally an explicit raster or container/layer path
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub flow_areas: Option<Option<PathBuf>>,

    /// Include waterbodies; optionally an explicit raster or container/layer path
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub waterbodies: Option<Option<PathBuf>>,

    /// Maximum waterbody size (ignored by BRAT without waterbodies)
    #[arg(long, value_name = "SIZE", allow_hyphen_values = true)]
    pub max_waterbody: Option<String>,

    /// Comma-separated key=value provenance metadata
    #[arg(long, value_name = "KV")]
    pub meta: Option<String>,

    /// Forward --verbose to BRAT and raise bratrun logging to debug
    #[arg(long)]
    pub verbose: bool,

    /// Forward --debug to BRAT
    #[arg(long)]
    pub debug: bool,
}

/// Check command inputs: resolve and print without side effects.
#[derive(Parser, Debug)]
#[command(about = "Resolve inputs and print the BRAT command line")]
pub struct CheckArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Command used to launch BRAT (overrides config and BRAT_COMMAND)
    #[arg(long, value_name = "CMD")]
    pub tool: Option<String>,

    /// Emit the resolved invocation as JSON
    #[arg(long)]
    pub json: bool,
}

/// Layers command inputs: survey both naming conventions.
#[derive(Parser, Debug)]
#[command(about = "Report every input layer under both naming conventions")]
pub struct LayersArgs {
    /// Convention whose missing required layers fail the command
    #[arg(long, value_enum)]
    pub convention: Option<NamingConvention>,

    /// Optional JSON run config supplying the default convention
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Stage command inputs.
#[derive(Parser, Debug)]
#[command(about = "Copy BRAT runtime resources into the installed package")]
pub struct StageArgs {
    /// Report freshness without copying
    #[arg(long, conflicts_with = "force")]
    pub status: bool,

    /// Re-stage even when the staged copy is fresh
    #[arg(long)]
    pub force: bool,

    /// Emit a verbose transcript of the workflow
    #[arg(long)]
    pub verbose: bool,
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Stage if needed, then run BRAT for one watershed")]
pub struct RunArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Command used to launch BRAT (overrides config and BRAT_COMMAND)
    #[arg(long, value_name = "CMD")]
    pub tool: Option<String>,

    /// Skip the automatic staleness check and staging
    #[arg(long)]
    pub no_stage: bool,
}
