//! Shared test infrastructure for integration tests.
//!
//! Builds a scratch watershed (four upstream roots, a BRAT source tree, and a
//! resource directory) and runs the `bratrun` binary against it with a fake
//! BRAT script standing in for the modeling tool.
#![allow(dead_code)]

use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const WATERSHED: &str = "1710020407";

/// Records its arguments one per line, echoes `FAKE_BRAT_STDERR`, and exits
/// with `FAKE_BRAT_EXIT`.
const FAKE_BRAT: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$FAKE_BRAT_ARGS"
if [ -n "$FAKE_BRAT_STDERR" ]; then
    echo "$FAKE_BRAT_STDERR" >&2
fi
exit "${FAKE_BRAT_EXIT:-0}"
"#;

/// Layer names that differ between the two naming conventions.
#[derive(Debug, Clone, Copy)]
pub enum Layout {
    Legacy,
    Current,
}

impl Layout {
    fn igo(self) -> &'static str {
        match self {
            Layout::Legacy => "vwIGOs",
            Layout::Current => "IGOGeometry",
        }
    }

    fn dgo(self) -> &'static str {
        match self {
            Layout::Legacy => "vwDGOs",
            Layout::Current => "vwDgos",
        }
    }
}

/// One scratch watershed plus the environment that points at it.
pub struct Watershed {
    pub dir: TempDir,
    pub env: BTreeMap<String, String>,
}

impl Watershed {
    pub fn new(layout: Layout) -> Self {
        let dir = TempDir::new().expect("create tempdir");
        let base = dir.path();
        let rs = base.join("rs_context");
        let hydro = base.join("hydro");
        let anthro = base.join("anthro");
        let vbet = base.join("vbet");

        write_file(&rs.join("topography/dem_hillshade.tif"), "tif");
        write_file(&rs.join("vegetation/existing_veg.tif"), "tif");
        write_file(&rs.join("vegetation/historic_veg.tif"), "tif");
        write_container(
            &rs.join("hydrology/nhdplushr.gpkg"),
            &["NHDArea", "NHDWaterbody", "NHDFlowline"],
        );
        for root in [&hydro, &anthro] {
            let name = root.file_name().and_then(|n| n.to_str()).expect("root name");
            write_container(
                &root.join(format!("outputs/{name}.gpkg")),
                &["vwReaches", layout.igo(), layout.dgo()],
            );
        }
        write_container(&vbet.join("outputs/vbet.gpkg"), &["vbet_full"]);

        let source = base.join("brat_source");
        write_file(&source.join("sqlbrat/layer_descriptions.json"), "{}");
        write_file(&source.join("sqlbrat/brat_report.css"), "body {}");
        write_file(&source.join("database/brat_template.sql"), "CREATE TABLE t(x);");
        write_file(&source.join("database/data/watersheds.csv"), "id\n1\n");

        let fake = base.join("bin/fake-brat");
        write_file(&fake, FAKE_BRAT);
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");

        let path = |p: PathBuf| p.display().to_string();
        let env = [
            ("RS", path(rs)),
            ("HYDRO", path(hydro)),
            ("ANTHRO", path(anthro)),
            ("VBET", path(vbet)),
            ("HUC10", WATERSHED.to_string()),
            ("OUTPUT_DIR", path(base.join("brat_out"))),
            ("BRAT_RESOURCES", path(base.join("site-packages"))),
            ("BRAT_SOURCE", path(source)),
            ("BRAT_COMMAND", path(fake)),
            ("FAKE_BRAT_ARGS", path(base.join("fake-brat-args.txt"))),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self { dir, env }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path("brat_out")
    }

    pub fn resource_dir(&self) -> PathBuf {
        self.path("site-packages")
    }

    /// Run `bratrun` with exactly this watershed's environment.
    pub fn bratrun(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_bratrun"))
            .args(args)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .envs(&self.env)
            .output()
            .expect("spawn bratrun")
    }

    /// Arguments the fake tool received on its last run.
    pub fn recorded_args(&self) -> Vec<String> {
        let text = fs::read_to_string(&self.env["FAKE_BRAT_ARGS"]).expect("read recorded args");
        text.lines().map(str::to_string).collect()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write file");
}

/// A GeoPackage reduced to its `gpkg_contents` catalog.
pub fn write_container(path: &Path, layers: &[&str]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create container parent");
    }
    let conn = Connection::open(path).expect("open container");
    conn.execute_batch(
        "CREATE TABLE gpkg_contents (table_name TEXT NOT NULL PRIMARY KEY, data_type TEXT NOT NULL);",
    )
    .expect("create catalog");
    for layer in layers {
        conn.execute(
            "INSERT INTO gpkg_contents (table_name, data_type) VALUES (?1, 'features')",
            [layer],
        )
        .expect("register layer");
    }
}
