use super::context::staged_resources;
use crate::cli::StageArgs;
use crate::environment::{self, ConfigSource, RESOURCE_DIR_VAR};
use crate::staging::{freshness, stage_if_stale};
use anyhow::Result;
use std::path::PathBuf;

pub fn run_stage(args: &StageArgs, source: &dyn ConfigSource) -> Result<()> {
    let resource_dir = PathBuf::from(environment::require(source, RESOURCE_DIR_VAR)?);
    let resources = staged_resources(source)?;

    if args.status {
        let state = freshness(&resources, &resource_dir)?;
        let label = serde_json::to_value(state)?;
        println!("{}", label.as_str().unwrap_or("unknown"));
        return Ok(());
    }

    let report = stage_if_stale(&resources, &resource_dir, args.force)?;
    if report.skipped {
        println!("resources already staged in {}", resource_dir.display());
        return Ok(());
    }
    if args.verbose {
        for path in &report.copied {
            eprintln!("staged {}", path.display());
        }
    }
    println!(
        "staged {} file(s) into {}",
        report.copied.len(),
        resource_dir.display()
    );
    Ok(())
}
