//! Shared scratch-tree builders for unit tests.
use crate::environment::{RunContext, WatershedId};
use crate::layers::NamingConvention;
use rusqlite::Connection;
use std::fs;
use std::path::Path;

/// Create a minimal GeoPackage whose catalog lists `layers`.
pub(crate) fn write_container(path: &Path, layers: &[&str]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create container parent");
    }
    let conn = Connection::open(path).expect("open container");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS gpkg_contents (
            table_name TEXT NOT NULL PRIMARY KEY,
            data_type TEXT NOT NULL
        );",
    )
    .expect("create catalog");
    for layer in layers {
        conn.execute(
            "INSERT OR REPLACE INTO gpkg_contents (table_name, data_type) VALUES (?1, 'features')",
            [layer],
        )
        .expect("register layer");
    }
}

pub(crate) fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents.as_bytes()).expect("write file");
}

/// Lay out all four upstream roots under `base` using `convention`.
pub(crate) fn populate_roots(base: &Path, convention: NamingConvention) -> RunContext {
    let ctx = RunContext {
        context_root: base.join("rs_context"),
        hydro_root: base.join("hydro"),
        anthro_root: base.join("anthro"),
        vbet_root: base.join("vbet"),
        watershed: WatershedId::parse("1710020407").expect("watershed"),
        output_dir: base.join("brat_out"),
        resource_dir: base.join("site-packages"),
    };
    let igo = convention.igo_layer();
    let dgo = convention.dgo_layer();
    write_file(&ctx.context_root.join("topography/dem_hillshade.tif"), "tif");
    write_file(&ctx.context_root.join("vegetation/existing_veg.tif"), "tif");
    write_file(&ctx.context_root.join("vegetation/historic_veg.tif"), "tif");
    write_container(
        &ctx.context_root.join("hydrology/nhdplushr.gpkg"),
        &["NHDArea", "NHDWaterbody", "NHDFlowline"],
    );
    write_container(
        &ctx.hydro_root.join("outputs/hydro.gpkg"),
        &["vwReaches", igo, dgo],
    );
    write_container(
        &ctx.anthro_root.join("outputs/anthro.gpkg"),
        &["vwReaches", igo, dgo],
    );
    write_container(&ctx.vbet_root.join("outputs/vbet.gpkg"), &["vbet_full"]);
    ctx
}
