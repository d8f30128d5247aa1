//! Command implementations.
//!
//! Each command resolves the environment first, then does the minimum work
//! for its purpose. Only `stage` and `run` write to disk.
mod check;
mod context;
mod layers;
mod run;
mod stage;

pub use check::run_check;
pub use layers::run_layers;
pub use run::run_run;
pub use stage::run_stage;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(value).context("serialize JSON")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize JSON")?;
    println!("{text}");
    Ok(())
}
