//! Invocation model and builder.
//!
//! An [`Invocation`] is the fully resolved BRAT command: fourteen positional
//! arguments followed by the optional named arguments. Building one reads
//! the filesystem to confirm layers exist but never writes to it.
use crate::environment::{RunContext, WatershedId};
use crate::error::OrchestratorError;
use crate::filters::{
    parse_max_waterbody, parse_meta, render_meta, CodeFilter, FilterArguments, MetaEntry,
    OptionalLayer, PositiveNumber,
};
use crate::layers::{resolve_explicit, resolve_slot, LayerReference, LayerSlot, NamingConvention};
use serde::Serialize;
use std::path::PathBuf;

/// Number of positional arguments the tool expects.
pub const POSITIONAL_ARG_COUNT: usize = 14;

/// Everything the operator chose for one build besides the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub convention: NamingConvention,
    pub streamside_buffer: String,
    pub riparian_buffer: String,
    pub filters: FilterArguments,
}

/// The hydro or anthro flowline/IGO/DGO triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkLayers {
    pub flowlines: LayerReference,
    pub igos: LayerReference,
    pub dgos: LayerReference,
}

/// Parsed optional arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationOptions {
    pub reach_codes: CodeFilter,
    pub canal_codes: CodeFilter,
    pub peren_codes: CodeFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_areas: Option<LayerReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waterbodies: Option<LayerReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_waterbody: Option<PositiveNumber>,
    pub meta: Vec<MetaEntry>,
    pub verbose: bool,
    pub debug: bool,
}

/// A fully resolved, immutable BRAT command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub convention: NamingConvention,
    pub watershed: WatershedId,
    pub hillshade: LayerReference,
    pub hydro: NetworkLayers,
    pub anthro: NetworkLayers,
    pub existing_veg: LayerReference,
    pub historic_veg: LayerReference,
    pub valley_bottom: LayerReference,
    pub streamside_buffer: PositiveNumber,
    pub riparian_buffer: PositiveNumber,
    pub output_dir: PathBuf,
    pub options: InvocationOptions,
}

/// Resolve layers and parse arguments into an [`Invocation`].
pub fn build(ctx: &RunContext, request: &BuildRequest) -> Result<Invocation, OrchestratorError> {
    let streamside_buffer =
        PositiveNumber::parse("streamside_buffer", &request.streamside_buffer)?;
    let riparian_buffer = PositiveNumber::parse("riparian_buffer", &request.riparian_buffer)?;
    let resolve = |slot| resolve_slot(ctx, slot, request.convention);

    // Field order is resolution order: required layers in positional order,
    // then the optional arguments.
    let invocation = Invocation {
        convention: request.convention,
        watershed: ctx.watershed.clone(),
        hillshade: resolve(LayerSlot::Hillshade)?,
        hydro: NetworkLayers {
            flowlines: resolve(LayerSlot::HydroFlowlines)?,
            igos: resolve(LayerSlot::HydroIgos)?,
            dgos: resolve(LayerSlot::HydroDgos)?,
        },
        anthro: NetworkLayers {
            flowlines: resolve(LayerSlot::AnthroFlowlines)?,
            igos: resolve(LayerSlot::AnthroIgos)?,
            dgos: resolve(LayerSlot::AnthroDgos)?,
        },
        existing_veg: resolve(LayerSlot::ExistingVeg)?,
        historic_veg: resolve(LayerSlot::HistoricVeg)?,
        valley_bottom: resolve(LayerSlot::ValleyBottom)?,
        streamside_buffer,
        riparian_buffer,
        output_dir: ctx.output_dir.clone(),
        options: build_options(ctx, request)?,
    };
    tracing::info!(
        watershed = %invocation.watershed,
        convention = %invocation.convention,
        "invocation built"
    );
    Ok(invocation)
}

fn build_options(
    ctx: &RunContext,
    request: &BuildRequest,
) -> Result<InvocationOptions, OrchestratorError> {
    let filters = &request.filters;
    let reach_codes = CodeFilter::parse(filters.reach_codes.as_deref())?;
    let canal_codes = CodeFilter::parse(filters.canal_codes.as_deref())?;
    let peren_codes = CodeFilter::parse(filters.peren_codes.as_deref())?;
    let max_waterbody = filters
        .max_waterbody
        .as_deref()
        .map(parse_max_waterbody)
        .transpose()?;
    let meta = match filters.meta.as_deref() {
        Some(raw) => parse_meta(raw)?,
        None => Vec::new(),
    };
    let flow_areas =
        resolve_optional(ctx, LayerSlot::FlowAreas, &filters.flow_areas, request.convention)?;
    let waterbodies = resolve_optional(
        ctx,
        LayerSlot::Waterbodies,
        &filters.waterbodies,
        request.convention,
    )?;
    if max_waterbody.is_some() && waterbodies.is_none() {
        tracing::warn!("max_waterbody has no effect without waterbodies");
    }
    Ok(InvocationOptions {
        reach_codes,
        canal_codes,
        peren_codes,
        flow_areas,
        waterbodies,
        max_waterbody,
        meta,
        verbose: filters.verbose,
        debug: filters.debug,
    })
}

fn resolve_optional(
    ctx: &RunContext,
    slot: LayerSlot,
    requested: &Option<OptionalLayer>,
    convention: NamingConvention,
) -> Result<Option<LayerReference>, OrchestratorError> {
    match requested {
        None => Ok(None),
        Some(OptionalLayer::Conventional) => resolve_slot(ctx, slot, convention).map(Some),
        Some(OptionalLayer::Explicit(path)) => resolve_explicit(slot, path, convention).map(Some),
    }
}

impl Invocation {
    /// The fourteen positional arguments, in the tool's order.
    pub fn positional_args(&self) -> [String; POSITIONAL_ARG_COUNT] {
        [
            self.watershed.to_string(),
            path_arg(&self.hillshade.path),
            path_arg(&self.hydro.flowlines.path),
            path_arg(&self.hydro.igos.path),
            path_arg(&self.hydro.dgos.path),
            path_arg(&self.anthro.flowlines.path),
            path_arg(&self.anthro.igos.path),
            path_arg(&self.anthro.dgos.path),
            path_arg(&self.existing_veg.path),
            path_arg(&self.historic_veg.path),
            path_arg(&self.valley_bottom.path),
            self.streamside_buffer.to_string(),
            self.riparian_buffer.to_string(),
            path_arg(&self.output_dir),
        ]
    }

    /// Named arguments, emitted only when supplied.
    pub fn optional_args(&self) -> Vec<String> {
        let options = &self.options;
        let mut args = Vec::new();
        let codes = [
            ("--reach_codes", &options.reach_codes),
            ("--canal_codes", &options.canal_codes),
            ("--peren_codes", &options.peren_codes),
        ];
        for (flag, filter) in codes {
            if let Some(value) = filter.arg_value() {
                args.push(flag.to_string());
                args.push(value);
            }
        }
        if let Some(layer) = &options.flow_areas {
            args.push("--flow_areas".to_string());
            args.push(path_arg(&layer.path));
        }
        if let Some(layer) = &options.waterbodies {
            args.push("--waterbodies".to_string());
            args.push(path_arg(&layer.path));
        }
        if let Some(size) = options.max_waterbody {
            args.push("--max_waterbody".to_string());
            args.push(size.to_string());
        }
        if !options.meta.is_empty() {
            args.push("--meta".to_string());
            args.push(render_meta(&options.meta));
        }
        if options.verbose {
            args.push("--verbose".to_string());
        }
        if options.debug {
            args.push("--debug".to_string());
        }
        args
    }

    /// Positional arguments followed by named arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.positional_args().to_vec();
        args.extend(self.optional_args());
        args
    }

    /// Shell-quoted command line for display or copy/paste.
    pub fn command_line(&self, program: &[String]) -> String {
        let mut words = program.to_vec();
        words.extend(self.args());
        shell_words::join(words)
    }
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
