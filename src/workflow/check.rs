use super::context::RunSession;
use super::print_json;
use crate::cli::CheckArgs;
use crate::environment::ConfigSource;
use crate::invocation::{self, Invocation};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct CheckReport<'a> {
    command: &'a [String],
    args: Vec<String>,
    invocation: &'a Invocation,
}

/// Resolve everything and print the command BRAT would be run with.
pub fn run_check(args: &CheckArgs, source: &dyn ConfigSource) -> Result<()> {
    let session = RunSession::load(&args.build, source)?;
    let invocation = invocation::build(&session.ctx, &session.request)?;
    let command = session.tool_command(args.tool.as_deref(), source)?;

    if args.json {
        return print_json(&CheckReport {
            command: &command,
            args: invocation.args(),
            invocation: &invocation,
        });
    }
    println!("{}", invocation.command_line(&command));
    Ok(())
}
