//! Argument parsing and the `run`/`check` subcommand bodies for the `hark`
//! binary. Kept in the library half of this crate (rather than inline in
//! `src/bin/hark.rs`) so the subcommands are unit-testable without
//! spawning a process.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use hark::{ControllerKind, ForeignRegistry, Program, ProgramTree, RuntimeConfig, Value};

/// A small front end for the Hark runtime. Takes a serialized program tree
/// — the external parser/checker's output (spec §6) — rather than Hark
/// source text, since parsing Hark itself is outside this core's scope.
#[derive(Debug, Parser)]
#[command(name = "hark", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile and run a serialized program tree, printing the root
    /// thread's terminal value or error.
    Run(RunArgs),
    /// Compile a serialized program tree without running it, reporting
    /// any compile error.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to a JSON-encoded `ProgramTree`.
    pub program: PathBuf,

    /// Name of the function to run as the root thread.
    #[arg(long, default_value = "main")]
    pub entry: String,

    /// JSON array of argument values passed to the entry function.
    #[arg(long, default_value = "[]")]
    pub args: String,

    /// Instructions executed per lease before a thread is committed back
    /// as `Ready` (spec §4.5's step budget).
    #[arg(long, default_value_t = RuntimeConfig::default().step_budget)]
    pub step_budget: usize,

    /// Worker count for single-machine mode.
    #[arg(long, default_value_t = RuntimeConfig::default().worker_count)]
    pub workers: usize,

    /// Lease timeout in milliseconds before an unreturned lease is voided
    /// and its thread returned to `ready` (spec §5).
    #[arg(long, default_value_t = RuntimeConfig::default().lease_timeout.as_millis() as u64)]
    pub lease_timeout_ms: u64,

    /// Drive execution through `run_to_completion_distributed` (spec §4.6
    /// distributed mode) instead of the single-machine worker pool.
    #[arg(long)]
    pub distributed: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to a JSON-encoded `ProgramTree`.
    pub program: PathBuf,
}

fn load_tree(path: &PathBuf) -> Result<ProgramTree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading program tree from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing program tree from {}", path.display()))
}

pub async fn run(args: RunArgs) -> Result<Value> {
    let tree = load_tree(&args.program)?;
    let entry_args: Vec<Value> = serde_json::from_str(&args.args)
        .context("parsing --args as a JSON array of argument values")?;

    let config = RuntimeConfig {
        step_budget: args.step_budget,
        worker_count: args.workers,
        lease_timeout: Duration::from_millis(args.lease_timeout_ms),
    };

    let program =
        Program::compile_and_seed(&tree, ForeignRegistry::new(), config, ControllerKind::Local)
            .await
            .with_context(|| "compiling and seeding the program")?;

    let result = if args.distributed {
        program.run_distributed(args.entry, entry_args).await
    } else {
        program.run(args.entry, entry_args).await
    };
    result.map_err(|e| anyhow::anyhow!("{e}"))
}

pub fn check(args: CheckArgs) -> Result<()> {
    let tree = load_tree(&args.program)?;
    hark::compile(&tree).with_context(|| "compiling the program")?;
    Ok(())
}
