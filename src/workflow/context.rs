use crate::cli::BuildArgs;
use crate::config::{self, RunConfig};
use crate::environment::{self, ConfigSource, RunContext, SOURCE_DIR_VAR};
use crate::invocation::BuildRequest;
use crate::staging::{self, StagedResource};
use anyhow::Result;
use std::path::PathBuf;

/// Everything one command needs, resolved once up front.
pub(crate) struct RunSession {
    pub(crate) ctx: RunContext,
    pub(crate) config: RunConfig,
    pub(crate) request: BuildRequest,
}

impl RunSession {
    pub(crate) fn load(args: &BuildArgs, source: &dyn ConfigSource) -> Result<Self> {
        let ctx = environment::resolve(source)?;
        let config = config::load_optional(args.config.as_deref())?;
        let request = config::build_request(args, &config);
        Ok(Self {
            ctx,
            config,
            request,
        })
    }

    /// Program words for the tool, honoring an explicit `--tool`.
    pub(crate) fn tool_command(
        &self,
        explicit: Option<&str>,
        source: &dyn ConfigSource,
    ) -> Result<Vec<String>> {
        config::resolve_tool_command(explicit, &self.config, source)
    }
}

/// Default staged resources from the source tree named by `BRAT_SOURCE`.
pub(crate) fn staged_resources(source: &dyn ConfigSource) -> Result<Vec<StagedResource>> {
    let root = environment::require(source, SOURCE_DIR_VAR)?;
    Ok(staging::default_resources(&PathBuf::from(root)))
}
