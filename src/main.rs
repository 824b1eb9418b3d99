mod cli;
mod error;
mod logging;
mod report;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use libprobe_catalog::Store;
use libprobe_config::{Config, Loader, Pipeline};
use libprobe_library::{Checkpoint, Context, FlushReason, RunOptions, Snapshot, drain, run};
use libprobe_probe::pipeline::{CommandPipeline, IncludeScanPipeline};
use libprobe_probe::{PipelineHandle, Prober, SearchContext};
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_FATAL: u8 = 1;
const EXIT_INTERRUPTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet, args.logger);
    match execute(&args).await {
        Ok(FlushReason::Completed) => ExitCode::SUCCESS,
        Ok(FlushReason::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            tracing::error!(error = ?e, "Fatal error");
            eprintln!("Error: {e:?}");
            ExitCode::from(EXIT_FATAL)
        },
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut loader = Loader::new().with_default_file();
    if let Some(path) = &args.config {
        loader = loader.with_file(path).or_raise(|| ErrorKind::Config)?;
    }
    loader.with_env().with_overrides(args.overrides()).load().or_raise(|| ErrorKind::Config)
}

fn build_pipeline(config: &Config) -> Result<PipelineHandle> {
    Ok(match &config.probe.pipeline {
        Pipeline::Scan => Arc::new(IncludeScanPipeline::new()),
        Pipeline::Command { program, args } => {
            Arc::new(CommandPipeline::new(program, args.clone()).or_raise(|| ErrorKind::Pipeline)?)
        },
    })
}

/// Runs to completion or until interrupted, and reports which.
async fn execute(args: &Args) -> Result<FlushReason> {
    let config = load_config(args)?;
    let catalog_path = config.catalog.clone().ok_or_raise(|| ErrorKind::Config)?;
    let store = Store::new(catalog_path, &config.processed_cache);
    let catalog = store.load_catalog().or_raise(|| ErrorKind::Load)?;
    let processed = store.load_processed().or_raise(|| ErrorKind::Load)?;

    let search = SearchContext {
        hardware: config.folders.hardware.clone(),
        tools: config.folders.tools.clone(),
        built_in: config.folders.built_in.clone(),
        other: config.folders.libraries.clone(),
        aliases: Default::default(),
    };
    let pipeline = build_pipeline(&config)?;
    tracing::info!(pipeline = pipeline.name(), timeout_secs = config.probe.timeout_secs, "Build pipeline ready");
    let ctx = Context::new(Prober::new(pipeline, search, config.probe.timeout()), RunOptions::from(&config));

    let checkpoint = Checkpoint::new(store, Snapshot { catalog, processed });
    drain(&checkpoint, run(&ctx, &checkpoint), shutdown_signal(), |event| report::print(&event))
        .await
        .or_raise(|| ErrorKind::Persist)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
