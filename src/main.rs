use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod environment;
mod error;
#[cfg(test)]
mod fixtures;
mod filters;
mod invocation;
mod layers;
mod paths;
mod runner;
mod signals;
mod staging;
mod util;
mod workflow;

use cli::{Command, RootArgs};
use environment::ProcessEnv;
use error::OrchestratorError;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(wants_debug(&args.command));

    match dispatch(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = match err.downcast_ref::<OrchestratorError>() {
                // BRAT's own stderr has already been forwarded.
                Some(OrchestratorError::ToolInvocation {
                    exit_code: Some(code),
                    ..
                }) => {
                    eprintln!("error: BRAT exited with status {code}");
                    *code
                }
                Some(known) => {
                    eprintln!("error: {err:#}");
                    known.exit_code()
                }
                None => {
                    eprintln!("error: {err:#}");
                    1
                }
            };
            match u8::try_from(code & 0xff) {
                Ok(0) | Err(_) => ExitCode::FAILURE,
                Ok(code) => ExitCode::from(code),
            }
        }
    }
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Check(args) => workflow::run_check(&args, &ProcessEnv),
        Command::Layers(args) => workflow::run_layers(&args, &ProcessEnv),
        Command::Stage(args) => workflow::run_stage(&args, &ProcessEnv),
        Command::Run(args) => {
            let cancel = signals::install_cancel_handler();
            workflow::run_run(&args, &ProcessEnv, cancel)
        }
    }
}

fn wants_debug(command: &Command) -> bool {
    match command {
        Command::Check(args) => args.build.verbose,
        Command::Run(args) => args.build.verbose,
        Command::Stage(args) => args.verbose,
        Command::Layers(_) => false,
    }
}

/// Log to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
