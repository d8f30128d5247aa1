//! Resource staging into the installed BRAT package.
//!
//! The packaging step does not install a few runtime resources, so they are
//! copied from the tool's source tree into the resource directory. A stamp
//! records what was staged so later runs can tell when a rebuild or
//! reinstall made the copy stale.
use crate::error::OrchestratorError;
use crate::paths::ResourcePaths;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current schema version for the staging stamp.
pub const STAMP_SCHEMA_VERSION: u32 = 1;

/// Python package directory BRAT loads its resources from.
pub const TOOL_PACKAGE: &str = "sqlbrat";

/// One file or directory copied from the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedResource {
    pub source: PathBuf,
    /// Destination relative to the resource directory.
    pub dest_rel: PathBuf,
}

/// The layer descriptions, report stylesheet, and reference database.
pub fn default_resources(source_root: &Path) -> Vec<StagedResource> {
    let package = Path::new(TOOL_PACKAGE);
    [
        package.join("layer_descriptions.json"),
        package.join("brat_report.css"),
        PathBuf::from("database"),
    ]
    .into_iter()
    .map(|rel| StagedResource {
        source: source_root.join(&rel),
        dest_rel: rel,
    })
    .collect()
}

/// Record of the last successful staging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStamp {
    pub schema_version: u32,
    pub staged_at_epoch_ms: u128,
    pub resources: Vec<PathBuf>,
    pub sources_hash: String,
    pub staged_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    NeverStaged,
    SourcesChanged,
    StagedCopyChanged,
}

impl Freshness {
    pub fn is_stale(self) -> bool {
        self != Freshness::Fresh
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub copied: Vec<PathBuf>,
    pub skipped: bool,
    pub reason: Freshness,
}

/// Compare the sources and staged copies against the stamp.
pub fn freshness(
    resources: &[StagedResource],
    resource_dir: &Path,
) -> Result<Freshness, OrchestratorError> {
    let paths = ResourcePaths::new(resource_dir.to_path_buf());
    let Some(stamp) = load_stamp(&paths) else {
        return Ok(Freshness::NeverStaged);
    };
    if stamp.schema_version != STAMP_SCHEMA_VERSION {
        return Ok(Freshness::NeverStaged);
    }
    if hash_sources(resources)? != stamp.sources_hash {
        return Ok(Freshness::SourcesChanged);
    }
    if hash_staged(resources, resource_dir)? != stamp.staged_hash {
        return Ok(Freshness::StagedCopyChanged);
    }
    Ok(Freshness::Fresh)
}

/// Stage resources when stale, or always when `force` is set.
pub fn stage_if_stale(
    resources: &[StagedResource],
    resource_dir: &Path,
    force: bool,
) -> Result<StageReport, OrchestratorError> {
    let paths = ResourcePaths::new(resource_dir.to_path_buf());
    create_dir(resource_dir)?;
    let _lock = StageLock::acquire(&paths.lock_path())?;
    let reason = freshness(resources, resource_dir)?;
    if !force && !reason.is_stale() {
        tracing::info!(resource_dir = %resource_dir.display(), "staged resources are fresh");
        return Ok(StageReport {
            copied: Vec::new(),
            skipped: true,
            reason,
        });
    }
    let copied = stage_locked(resources, &paths)?;
    Ok(StageReport {
        copied,
        skipped: false,
        reason,
    })
}

fn stage_locked(
    resources: &[StagedResource],
    paths: &ResourcePaths,
) -> Result<Vec<PathBuf>, OrchestratorError> {
    let mut copied = Vec::new();
    for resource in resources {
        let dest = paths.root().join(&resource.dest_rel);
        if resource.source.is_dir() {
            copied.extend(replace_dir(&resource.source, &dest)?);
        } else {
            publish_file(&resource.source, &dest)?;
            copied.push(dest);
        }
    }
    let stamp = StageStamp {
        schema_version: STAMP_SCHEMA_VERSION,
        staged_at_epoch_ms: now_epoch_ms(),
        resources: resources.iter().map(|r| r.dest_rel.clone()).collect(),
        sources_hash: hash_sources(resources)?,
        staged_hash: hash_staged(resources, paths.root())?,
    };
    write_stamp(paths, &stamp)?;
    tracing::info!(
        files = copied.len(),
        resource_dir = %paths.root().display(),
        "staged resources"
    );
    Ok(copied)
}

fn replace_dir(source: &Path, dest: &Path) -> Result<Vec<PathBuf>, OrchestratorError> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|err| staging_error(dest, err))?;
    }
    let files = collect_files_recursive(source)?;
    let mut copied = Vec::with_capacity(files.len());
    for file in files {
        let rel = file
            .strip_prefix(source)
            .map_err(|_| staging_error(&file, io::Error::other("outside source tree")))?;
        let target = dest.join(rel);
        publish_file(&file, &target)?;
        copied.push(target);
    }
    if copied.is_empty() {
        create_dir(dest)?;
    }
    Ok(copied)
}

pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>, OrchestratorError> {
    let mut files = Vec::new();
    let entries = fs::read_dir(root).map_err(|err| staging_error(root, err))?;
    for entry in entries {
        let path = entry.map_err(|err| staging_error(root, err))?.path();
        if path.is_dir() {
            files.extend(collect_files_recursive(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy through a temporary sibling so readers never see a partial file.
fn publish_file(source: &Path, dest: &Path) -> Result<(), OrchestratorError> {
    if !source.is_file() {
        return Err(staging_error(
            source,
            io::Error::new(io::ErrorKind::NotFound, "source file missing"),
        ));
    }
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    create_dir(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|err| staging_error(dest, err))?;
    let mut input = File::open(source).map_err(|err| staging_error(source, err))?;
    io::copy(&mut input, tmp.as_file_mut()).map_err(|err| staging_error(dest, err))?;
    tmp.persist(dest)
        .map_err(|err| staging_error(dest, err.error))?;
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), OrchestratorError> {
    fs::create_dir_all(path).map_err(|err| staging_error(path, err))
}

fn staging_error(path: &Path, source: io::Error) -> OrchestratorError {
    OrchestratorError::Staging {
        path: path.to_path_buf(),
        source,
    }
}

fn hash_sources(resources: &[StagedResource]) -> Result<String, OrchestratorError> {
    let mut hasher = Sha256::new();
    for resource in resources {
        hash_path(&mut hasher, &resource.source, &resource.source)?;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn hash_staged(resources: &[StagedResource], root: &Path) -> Result<String, OrchestratorError> {
    let mut hasher = Sha256::new();
    for resource in resources {
        let dest = root.join(&resource.dest_rel);
        hash_path(&mut hasher, &dest, &dest)?;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash contents and relative names; absolute locations do not matter, so
/// a faithful copy hashes the same as its source.
fn hash_path(hasher: &mut Sha256, root: &Path, path: &Path) -> Result<(), OrchestratorError> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    if !path.exists() {
        hasher.update(b"missing:");
        hasher.update(rel.to_string_lossy().as_bytes());
        return Ok(());
    }
    if path.is_dir() {
        hasher.update(b"dir:");
        hasher.update(rel.to_string_lossy().as_bytes());
        let mut entries: Vec<_> = fs::read_dir(path)
            .map_err(|err| staging_error(path, err))?
            .filter_map(|entry| entry.ok())
            .collect();
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            hash_path(hasher, root, &entry.path())?;
        }
        return Ok(());
    }
    hasher.update(b"file:");
    hasher.update(rel.to_string_lossy().as_bytes());
    let bytes = fs::read(path).map_err(|err| staging_error(path, err))?;
    hasher.update(&bytes);
    Ok(())
}

fn load_stamp(paths: &ResourcePaths) -> Option<StageStamp> {
    let bytes = fs::read(paths.stamp_path()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn write_stamp(paths: &ResourcePaths, stamp: &StageStamp) -> Result<(), OrchestratorError> {
    let path = paths.stamp_path();
    let text = serde_json::to_string_pretty(stamp)
        .map_err(|err| staging_error(&path, io::Error::other(err)))?;
    fs::write(&path, text.as_bytes()).map_err(|err| staging_error(&path, err))
}

fn now_epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

/// Exclusive advisory lock held for the duration of a staging pass.
struct StageLock {
    file: File,
}

impl StageLock {
    fn acquire(path: &Path) -> Result<Self, OrchestratorError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|err| staging_error(path, err))?;
        file.lock().map_err(|err| staging_error(path, err))?;
        tracing::debug!(lock = %path.display(), "staging lock acquired");
        Ok(Self { file })
    }
}

impl Drop for StageLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::debug!(error = %err, "staging lock release failed");
        }
    }
}
