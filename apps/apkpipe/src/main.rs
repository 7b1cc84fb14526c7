//! apkpipe command line interface
//!
//! Loads a binary definition, turns it into a packaging rule and either
//! prints its action list, runs it, or prints its cache key.

mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::error::CliError;
use apkpipe_builder::{
    ActionRunner, BinaryDefinition, BuildableContext, CommandToolchain, OutputLayout,
    PackagingRule,
};
use apkpipe_config::Config;
use apkpipe_types::OutputFormat;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct PlanReport<'a> {
    target: String,
    plan: &'a apkpipe_builder::PipelinePlan,
    actions: &'a [apkpipe_builder::Action],
    artifacts: &'a [PathBuf],
    apk: PathBuf,
}

#[derive(Serialize)]
struct BuildReport {
    target: String,
    apk: PathBuf,
    actions: usize,
    dexed: usize,
    dex_cached: usize,
}

#[derive(Serialize)]
struct CacheKeyReport {
    target: String,
    key: apkpipe_builder::CacheKey,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "apkpipe=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.global).await?;
    let output = cli.global.output.unwrap_or(config.general.default_output);
    let project_root = config.project_root();

    let definition = BinaryDefinition::load(cli.command.definition()).await?;
    let layout = OutputLayout::new(config.general.out_dir.clone());
    let rule = definition.into_rule(&project_root, layout)?;

    match cli.command {
        Commands::Plan { .. } => plan(&rule, output),
        Commands::Build { dex_threads, .. } => {
            build(&rule, &config, &project_root, dex_threads, output).await
        }
        Commands::CacheKey { .. } => cache_key(&rule, &project_root, output).await,
    }
}

/// File, then environment, then command line flags.
async fn load_config(global: &GlobalArgs) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(global.config.as_deref()).await?;
    config.merge_env()?;

    if let Some(root) = &global.project_root {
        config.general.project_root = Some(root.clone());
    }
    if let Some(out_dir) = &global.out_dir {
        config.general.out_dir.clone_from(out_dir);
    }
    Ok(config)
}

fn plan(rule: &PackagingRule, output: OutputFormat) -> Result<(), CliError> {
    let mut context = BuildableContext::new();
    let actions = rule.build_actions(&mut context)?;

    match output {
        OutputFormat::Json => {
            let report = PlanReport {
                target: rule.config().target().fully_qualified_name(),
                plan: rule.plan(),
                actions: &actions,
                artifacts: context.artifacts(),
                apk: rule.apk_path(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            for (i, action) in actions.iter().enumerate() {
                println!("{:>3}  {}", i + 1, action.description());
            }
        }
    }
    Ok(())
}

async fn build(
    rule: &PackagingRule,
    config: &Config,
    project_root: &Path,
    dex_threads: Option<usize>,
    output: OutputFormat,
) -> Result<(), CliError> {
    let mut context = BuildableContext::new();
    let actions = rule.build_actions(&mut context)?;
    let target = rule.config().target().fully_qualified_name();

    let (tx, rx) = apkpipe_events::channel();
    let drain = tokio::spawn(logging::drain(rx));

    let toolchain = Arc::new(CommandToolchain::new(config.tools.clone(), project_root));
    let threads = apkpipe_config::calculate_dex_threads(dex_threads.unwrap_or(config.dex.threads));
    let runner = ActionRunner::new(project_root, toolchain)
        .with_dex_threads(threads)
        .with_event_sender(tx);

    let result = runner.run(&target, &actions).await;
    drop(runner);
    // Every sender is gone once the runner is dropped
    if let Err(e) = drain.await {
        warn!("event logging task failed: {e}");
    }
    let summary = result?;

    let apk = rule.apk_path();
    info!(binary = %target, apk = %apk.display(), "APK built");
    match output {
        OutputFormat::Json => {
            let report = BuildReport {
                target,
                apk,
                actions: summary.actions,
                dexed: summary.dexed,
                dex_cached: summary.dex_cached,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => println!("{}", apk.display()),
    }
    Ok(())
}

async fn cache_key(
    rule: &PackagingRule,
    project_root: &Path,
    output: OutputFormat,
) -> Result<(), CliError> {
    let key = rule.abi_key_for_deps(project_root).await?;
    match output {
        OutputFormat::Json => {
            let report = CacheKeyReport {
                target: rule.config().target().fully_qualified_name(),
                key,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => println!("{}", key.hash()),
    }
    Ok(())
}
