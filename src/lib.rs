// src/lib.rs

pub mod cli;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod feed;
pub mod fs;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod policy;
pub mod registry;
pub mod types;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_and_validate, AppConfig};
use crate::cursor::{build_cursor_store, CommitLedger};
use crate::dispatch::{DispatchSettings, Dispatcher, Outcome};
use crate::engine::{EngineOptions, Runtime};
use crate::errors::{Result, YggError};
use crate::feed::{ChangeEvent, JsonlFileFeed, SeqToken};
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::{BranchRegistry, HandlerTable};
use crate::types::ManualSubmit;

/// Exit status of `run-doc` when the document was skipped.
pub const EXIT_SKIPPED: u8 = 3;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config and registry loading
/// - the dispatcher and its handler table
/// - cursor ledger, change feed and consumer runtime
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let cfg = load_config(fs.as_ref(), &args)?;
    let registry = Arc::new(load_branch_registry(Arc::clone(&fs), &args, &cfg)?);

    if args.dry_run {
        print_dry_run(&cfg, &registry);
        return Ok(ExitCode::SUCCESS);
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        dispatch_settings(&args, &cfg),
    ));

    match args.command {
        Some(Command::RunDoc { doc_id, doc }) => {
            run_doc(fs.as_ref(), &dispatcher, doc_id, &doc).await
        }
        Some(Command::Daemon) | None => run_daemon(fs, &cfg, dispatcher).await,
    }
}

fn load_config(fs: &dyn FileSystem, args: &CliArgs) -> Result<AppConfig> {
    match &args.config {
        Some(path) => load_and_validate(fs, path, true),
        None => load_and_validate(fs, &default_config_path(), false),
    }
}

fn load_branch_registry(
    fs: Arc<dyn FileSystem>,
    args: &CliArgs,
    cfg: &AppConfig,
) -> Result<BranchRegistry> {
    let (path, required) = match &args.registry {
        Some(path) => (path.clone(), true),
        None => (cfg.registry_path.clone(), false),
    };
    BranchRegistry::load(fs, path, required, HandlerTable::with_builtins())
}

/// Session and realm signals plus the default timeout, from CLI and config.
pub fn dispatch_settings(args: &CliArgs, cfg: &AppConfig) -> DispatchSettings {
    DispatchSettings {
        manual_submit: if args.manual_submit {
            ManualSubmit::Manual
        } else {
            ManualSubmit::Unset
        },
        realm_supports_auto: cfg.realm.supports_auto_submit,
        default_timeout: cfg.default_handler_timeout,
    }
}

async fn run_daemon(
    fs: Arc<dyn FileSystem>,
    cfg: &AppConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<ExitCode> {
    if dispatcher.registry().get_registry().is_empty() && !cfg.allow_empty_registry {
        return Err(YggError::ConfigMissing(format!(
            "no branches configured in {} (set [config].allow_empty_registry to run without any)",
            cfg.registry_path.display()
        )));
    }

    let store = build_cursor_store(cfg.cursor_storage, fs, cfg.cursor_path.clone());
    let ledger = Arc::new(CommitLedger::open(store)?);
    let feed = Arc::new(JsonlFileFeed::new(&cfg.feed.path, cfg.feed.poll_interval));

    let runtime = Runtime::new(feed, dispatcher, ledger, EngineOptions::from(cfg));

    // Ctrl-C → graceful shutdown.
    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received");
        shutdown.shutdown();
    });

    let summary = runtime.run().await?;
    if !summary.failed.is_empty() {
        warn!(
            failed = ?summary.failed,
            "some events failed and will be replayed on the next start"
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_doc(
    fs: &dyn FileSystem,
    dispatcher: &Dispatcher,
    doc_id: String,
    doc_path: &Path,
) -> Result<ExitCode> {
    let raw = fs
        .read_to_string(doc_path)
        .map_err(|e| YggError::ConfigMissing(format!("{}: {e:#}", doc_path.display())))?;
    let document: serde_json::Value = serde_json::from_str(&raw)?;

    let event = ChangeEvent {
        sequence: SeqToken::start(),
        document_id: doc_id,
        document,
        deleted: false,
    };

    let outcome = dispatcher.dispatch(&event).await;
    println!("{}: {outcome}", event.document_id);

    Ok(match outcome {
        Outcome::Handled => ExitCode::SUCCESS,
        Outcome::Skipped(_) => ExitCode::from(EXIT_SKIPPED),
        Outcome::Failed(_) => ExitCode::FAILURE,
    })
}

/// Simple dry-run output: print settings and the branch table.
fn print_dry_run(cfg: &AppConfig, registry: &BranchRegistry) {
    println!("ygg dry-run");
    println!("  config.workers = {}", cfg.workers);
    println!("  config.cursor_storage = {:?}", cfg.cursor_storage);
    println!("  config.cursor_path = {}", cfg.cursor_path.display());
    println!(
        "  config.default_handler_timeout = {:?}",
        cfg.default_handler_timeout
    );
    println!("  feed.path = {}", cfg.feed.path.display());
    println!("  realm.supports_auto_submit = {}", cfg.realm.supports_auto_submit);
    println!();

    let table = registry.get_registry();
    println!("branches ({}):", table.len());
    for branch in table.iter() {
        println!("  - {}", branch.name);
        println!("      handler: {}", branch.handler_reference);
        if branch.prefix {
            println!("      prefix: true");
        }
        if !branch.patterns.is_empty() {
            println!("      match: {:?}", branch.patterns);
        }
        if let Some(timeout) = branch.timeout {
            println!("      timeout: {timeout:?}");
        }
        if branch.handles_deletions {
            println!("      handles_deletions: true");
        }
        if !branch.options.is_empty() {
            println!("      options: {}", serde_json::Value::Object((*branch.options).clone()));
        }
    }

    debug!("dry-run complete (no dispatch)");
}
