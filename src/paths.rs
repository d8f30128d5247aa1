//! Typed paths for files bratrun owns.
//!
//! Centralizing path construction keeps the stamp, lock, and run record in
//! one place as the layout evolves.
use std::path::{Path, PathBuf};

const STAMP_FILE: &str = ".bratrun-stage.json";
const LOCK_FILE: &str = ".bratrun-stage.lock";
const RUN_RECORD_FILE: &str = "bratrun_invocation.json";

/// Locations under the installed package resource directory.
#[derive(Debug, Clone)]
pub struct ResourcePaths {
    root: PathBuf,
}

impl ResourcePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the staging stamp path.
    pub fn stamp_path(&self) -> PathBuf {
        self.root.join(STAMP_FILE)
    }

    /// Return the staging lock path.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

/// Return the invocation record path inside an output directory.
pub fn run_record_path(output_dir: &Path) -> PathBuf {
    output_dir.join(RUN_RECORD_FILE)
}
