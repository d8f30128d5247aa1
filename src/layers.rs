//! Layer naming conventions and path resolution under upstream roots.
//!
//! Every BRAT input is derived from a root plus a fixed relative template.
//! Internal layer names inside the hydro/anthro containers changed between
//! tool revisions, so the IGO/DGO names come from a [`NamingConvention`]
//! chosen by the operator. Resolution never entries the other convention to
//! pick a winner; it only reports it.
use crate::environment::{RunContext, UpstreamRoot};
use crate::error::{AlternativeCandidate, OrchestratorError};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const HYDRO_CONTAINER: &str = "outputs/hydro.gpkg";
const ANTHRO_CONTAINER: &str = "outputs/anthro.gpkg";
const VBET_CONTAINER: &str = "outputs/vbet.gpkg";
const NHD_CONTAINER: &str = "hydrology/nhdplushr.gpkg";
const REACHES_LAYER: &str = "vwReaches";

/// Internal layer names used by a given generation of the hydro/anthro tools.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    /// Older revisions: `vwIGOs` / `vwDGOs`.
    Legacy,
    /// Newer revisions: `IGOGeometry` / `vwDgos`.
    #[default]
    Current,
}

impl NamingConvention {
    pub const ALL: [NamingConvention; 2] = [NamingConvention::Legacy, NamingConvention::Current];

    pub fn igo_layer(self) -> &'static str {
        match self {
            NamingConvention::Legacy => "vwIGOs",
            NamingConvention::Current => "IGOGeometry",
        }
    }

    pub fn dgo_layer(self) -> &'static str {
        match self {
            NamingConvention::Legacy => "vwDGOs",
            NamingConvention::Current => "vwDgos",
        }
    }

    /// The other member of the closed set.
    pub fn other(self) -> Self {
        match self {
            NamingConvention::Legacy => NamingConvention::Current,
            NamingConvention::Current => NamingConvention::Legacy,
        }
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingConvention::Legacy => f.write_str("legacy"),
            NamingConvention::Current => f.write_str("current"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Raster,
    VectorLayer,
}

/// Logical BRAT inputs, in positional-argument order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSlot {
    Hillshade,
    HydroFlowlines,
    HydroIgos,
    HydroDgos,
    AnthroFlowlines,
    AnthroIgos,
    AnthroDgos,
    ExistingVeg,
    HistoricVeg,
    ValleyBottom,
    FlowAreas,
    Waterbodies,
}

impl LayerSlot {
    pub const REQUIRED: [LayerSlot; 10] = [
        LayerSlot::Hillshade,
        LayerSlot::HydroFlowlines,
        LayerSlot::HydroIgos,
        LayerSlot::HydroDgos,
        LayerSlot::AnthroFlowlines,
        LayerSlot::AnthroIgos,
        LayerSlot::AnthroDgos,
        LayerSlot::ExistingVeg,
        LayerSlot::HistoricVeg,
        LayerSlot::ValleyBottom,
    ];

    pub const OPTIONAL: [LayerSlot; 2] = [LayerSlot::FlowAreas, LayerSlot::Waterbodies];

    pub fn logical_name(self) -> &'static str {
        match self {
            LayerSlot::Hillshade => "hillshade",
            LayerSlot::HydroFlowlines => "hydro_flowlines",
            LayerSlot::HydroIgos => "hydro_igos",
            LayerSlot::HydroDgos => "hydro_dgos",
            LayerSlot::AnthroFlowlines => "anthro_flowlines",
            LayerSlot::AnthroIgos => "anthro_igos",
            LayerSlot::AnthroDgos => "anthro_dgos",
            LayerSlot::ExistingVeg => "existing_veg",
            LayerSlot::HistoricVeg => "historic_veg",
            LayerSlot::ValleyBottom => "valley_bottom",
            LayerSlot::FlowAreas => "flow_areas",
            LayerSlot::Waterbodies => "waterbodies",
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, LayerSlot::FlowAreas | LayerSlot::Waterbodies)
    }

    /// Whether the convention selector changes this slot's template.
    pub fn is_convention_sensitive(self) -> bool {
        matches!(
            self,
            LayerSlot::HydroIgos
                | LayerSlot::HydroDgos
                | LayerSlot::AnthroIgos
                | LayerSlot::AnthroDgos
        )
    }

    /// Root and relative template for this slot under a convention.
    pub fn template(self, convention: NamingConvention) -> LayerTemplate {
        use LayerSlot::*;
        let (root, file, layer) = match self {
            Hillshade => (UpstreamRoot::Context, "topography/dem_hillshade.tif", None),
            HydroFlowlines => (UpstreamRoot::Hydro, HYDRO_CONTAINER, Some(REACHES_LAYER)),
            HydroIgos => (UpstreamRoot::Hydro, HYDRO_CONTAINER, Some(convention.igo_layer())),
            HydroDgos => (UpstreamRoot::Hydro, HYDRO_CONTAINER, Some(convention.dgo_layer())),
            AnthroFlowlines => (UpstreamRoot::Anthro, ANTHRO_CONTAINER, Some(REACHES_LAYER)),
            AnthroIgos => (UpstreamRoot::Anthro, ANTHRO_CONTAINER, Some(convention.igo_layer())),
            AnthroDgos => (UpstreamRoot::Anthro, ANTHRO_CONTAINER, Some(convention.dgo_layer())),
            ExistingVeg => (UpstreamRoot::Context, "vegetation/existing_veg.tif", None),
            HistoricVeg => (UpstreamRoot::Context, "vegetation/historic_veg.tif", None),
            ValleyBottom => (UpstreamRoot::Vbet, VBET_CONTAINER, Some("vbet_full")),
            FlowAreas => (UpstreamRoot::Context, NHD_CONTAINER, Some("NHDArea")),
            Waterbodies => (UpstreamRoot::Context, NHD_CONTAINER, Some("NHDWaterbody")),
        };
        LayerTemplate {
            root,
            file,
            layer: layer.map(str::to_string),
        }
    }
}

/// A relative location beneath one upstream root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTemplate {
    pub root: UpstreamRoot,
    pub file: &'static str,
    pub layer: Option<String>,
}

impl LayerTemplate {
    pub fn location(&self, ctx: &RunContext) -> LayerLocation {
        let file = ctx.root(self.root).join(self.file);
        match &self.layer {
            Some(layer) => LayerLocation::Vector {
                container: file,
                layer: layer.clone(),
            },
            None => LayerLocation::Raster(file),
        }
    }
}

/// Where a layer lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerLocation {
    Raster(PathBuf),
    Vector { container: PathBuf, layer: String },
}

impl LayerLocation {
    /// Interpret an operator-supplied path.
    ///
    /// A path naming an existing file is a raster. Otherwise the last
    /// component is taken as a layer inside the parent container file.
    pub fn parse(path: &Path) -> Self {
        if path.is_file() {
            return LayerLocation::Raster(path.to_path_buf());
        }
        match (path.parent(), path.file_name().and_then(|name| name.to_str())) {
            (Some(parent), Some(layer)) if parent.is_file() => LayerLocation::Vector {
                container: parent.to_path_buf(),
                layer: layer.to_string(),
            },
            _ => LayerLocation::Raster(path.to_path_buf()),
        }
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            LayerLocation::Raster(_) => LayerKind::Raster,
            LayerLocation::Vector { .. } => LayerKind::VectorLayer,
        }
    }

    /// The `container/layer` or raster path handed to the tool.
    pub fn path(&self) -> PathBuf {
        match self {
            LayerLocation::Raster(path) => path.clone(),
            LayerLocation::Vector { container, layer } => container.join(layer),
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            LayerLocation::Raster(path) => path.is_file(),
            LayerLocation::Vector { container, layer } => {
                container.is_file() && container_has_layer(container, layer)
            }
        }
    }
}

/// One resolved input layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReference {
    pub logical_name: String,
    pub path: PathBuf,
    pub kind: LayerKind,
    pub required: bool,
}

impl LayerReference {
    fn from_location(slot: LayerSlot, location: &LayerLocation) -> Self {
        Self {
            logical_name: slot.logical_name().to_string(),
            path: location.path(),
            kind: location.kind(),
            required: slot.is_required(),
        }
    }
}

/// Whether a GeoPackage catalog lists `layer`. Names compare exactly.
pub fn container_has_layer(container: &Path, layer: &str) -> bool {
    match container_layers(container) {
        Ok(layers) => layers.iter().any(|name| name == layer),
        Err(err) => {
            tracing::debug!(
                container = %container.display(),
                error = %err,
                "container catalog unreadable"
            );
            false
        }
    }
}

/// List the layers registered in a GeoPackage's `gpkg_contents` table.
pub fn container_layers(container: &Path) -> rusqlite::Result<Vec<String>> {
    let conn = Connection::open_with_flags(
        container,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut stmt = conn.prepare("SELECT table_name FROM gpkg_contents ORDER BY table_name")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Resolve one slot under the configured convention, failing when absent.
pub fn resolve_slot(
    ctx: &RunContext,
    slot: LayerSlot,
    convention: NamingConvention,
) -> Result<LayerReference, OrchestratorError> {
    let location = slot.template(convention).location(ctx);
    if location.exists() {
        return Ok(LayerReference::from_location(slot, &location));
    }
    let alternative = slot.is_convention_sensitive().then(|| {
        let other = convention.other();
        let alt = slot.template(other).location(ctx);
        AlternativeCandidate {
            convention: other,
            path: alt.path(),
            exists: alt.exists(),
        }
    });
    Err(OrchestratorError::LayerResolution {
        logical_name: slot.logical_name().to_string(),
        path_tried: location.path(),
        convention,
        alternative,
    })
}

/// Resolve an optional layer from an explicit path, checking it exists.
pub fn resolve_explicit(
    slot: LayerSlot,
    path: &Path,
    convention: NamingConvention,
) -> Result<LayerReference, OrchestratorError> {
    let location = LayerLocation::parse(path);
    if !location.exists() {
        return Err(OrchestratorError::LayerResolution {
            logical_name: slot.logical_name().to_string(),
            path_tried: location.path(),
            convention,
            alternative: None,
        });
    }
    Ok(LayerReference::from_location(slot, &location))
}

/// Presence of one slot under one convention, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct LayerPresence {
    pub logical_name: String,
    pub convention: NamingConvention,
    pub kind: LayerKind,
    pub required: bool,
    pub path: PathBuf,
    pub exists: bool,
}

/// Check every slot under every convention without failing.
pub fn survey(ctx: &RunContext) -> Vec<LayerPresence> {
    let mut entries = Vec::new();
    for slot in LayerSlot::REQUIRED.into_iter().chain(LayerSlot::OPTIONAL) {
        for convention in NamingConvention::ALL {
            let location = slot.template(convention).location(ctx);
            entries.push(LayerPresence {
                logical_name: slot.logical_name().to_string(),
                convention,
                kind: location.kind(),
                required: slot.is_required(),
                path: location.path(),
                exists: location.exists(),
            });
        }
    }
    entries
}

#[cfg(test)]
#[path = "layers_tests.rs"]
mod tests;
