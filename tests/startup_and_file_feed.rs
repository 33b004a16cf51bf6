mod common;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use common::{fast_options, Harness};
use yggdrasil::cli::CliArgs;
use yggdrasil::cursor::FileCursorStore;
use yggdrasil::dispatch::{DispatchSettings, Outcome, SkipReason};
use yggdrasil::errors::YggError;
use yggdrasil::feed::{JsonlFileFeed, SeqToken};
use yggdrasil::fs::{FileSystem, RealFileSystem};
use yggdrasil::registry::{BranchRegistry, HandlerTable};
use yggdrasil_test_utils::fake_handler::FakeHandler;

fn args(argv: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("ygg").chain(argv.iter().copied())).unwrap()
}

fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}

fn append(path: &Path, line: &str) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .unwrap();
    writeln!(file, "{line}").unwrap();
}

#[tokio::test]
async fn explicit_config_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Yggdrasil.toml");

    let err = yggdrasil::run(args(&["--config", missing.to_str().unwrap()]))
        .await
        .unwrap_err();
    assert!(matches!(err, YggError::ConfigMissing(_)));
}

#[tokio::test]
async fn explicit_registry_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Yggdrasil.toml");
    write(&config, "[config]\nworkers = 1\n");
    let missing = dir.path().join("registry.toml");

    let err = yggdrasil::run(args(&[
        "--config",
        config.to_str().unwrap(),
        "--registry",
        missing.to_str().unwrap(),
        "--dry-run",
    ]))
    .await
    .unwrap_err();
    assert!(matches!(err, YggError::ConfigMissing(_)));
}

#[tokio::test]
async fn unparsable_registry_is_config_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Yggdrasil.toml");
    write(&config, "[config]\nregistry_path = \"registry.toml\"\n");
    write(&dir.path().join("registry.toml"), "[branch.10x\nhandler = ");

    let err = yggdrasil::run(args(&["--config", config.to_str().unwrap(), "--dry-run"]))
        .await
        .unwrap_err();
    assert!(matches!(err, YggError::ConfigInvalid(_)));
}

#[tokio::test]
async fn invalid_config_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Yggdrasil.toml");
    write(&config, "[config]\ndefault_handler_timeout = \"soon\"\n");

    let err = yggdrasil::run(args(&["--config", config.to_str().unwrap(), "--dry-run"]))
        .await
        .unwrap_err();
    assert!(matches!(err, YggError::ConfigInvalid(_)));
}

#[tokio::test]
async fn daemon_refuses_an_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Yggdrasil.toml");
    write(&config, "[config]\nworkers = 1\n");

    let err = yggdrasil::run(args(&["--config", config.to_str().unwrap(), "daemon"]))
        .await
        .unwrap_err();
    assert!(matches!(err, YggError::ConfigMissing(_)));
}

#[tokio::test]
async fn run_doc_rejects_unreadable_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Yggdrasil.toml");
    write(&config, "[config]\nworkers = 1\n");
    let doc = dir.path().join("doc.json");
    write(&doc, "{ not json");

    let result = yggdrasil::run(args(&[
        "--config",
        config.to_str().unwrap(),
        "run-doc",
        "P1",
        "--doc",
        doc.to_str().unwrap(),
    ]))
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn registry_file_reload_picks_up_new_branches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.toml");
    write(&path, "[branch.10x]\nhandler = \"builtin:log\"\n");

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let registry =
        BranchRegistry::load(fs, path.clone(), true, HandlerTable::with_builtins()).unwrap();
    assert!(registry.resolve("ss3").await.is_err());

    write(
        &path,
        "[branch.10x]\nhandler = \"builtin:log\"\n\n[branch.ss3]\nhandler = \"builtin:log\"\ntimeout = \"30s\"\n",
    );
    registry.reload().unwrap();

    let resolved = registry.resolve("ss3").await.unwrap();
    assert_eq!(resolved.descriptor.timeout, Some(Duration::from_secs(30)));

    // A broken edit keeps the last good table.
    write(&path, "[branch.ss3\n");
    assert!(registry.reload().is_err());
    assert_eq!(registry.get_registry().len(), 2);
}

#[tokio::test]
async fn change_log_on_disk_drives_dispatch_and_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("changes.jsonl");
    append(
        &log,
        r#"{"seq":"0001","id":"P1","doc":{"project_id":"P1","details":{"library_construction_method":"10x"}}}"#,
    );
    // No document id: undecodable, but its token is recoverable.
    append(&log, r#"{"seq":"0002","doc":{}}"#);

    let handler = FakeHandler::new();
    let registry = yggdrasil_test_utils::builders::RegistryBuilder::new()
        .branch("10x", "fake")
        .with_handler("fake", handler.as_handler())
        .build();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let cursor = dir.path().join(".ygg").join("last_processed_seq");

    let mut h = Harness::start(
        Arc::new(JsonlFileFeed::new(&log, Duration::from_millis(20))),
        registry,
        Box::new(FileCursorStore::new(Arc::clone(&fs), cursor.clone())),
        fast_options(2),
        DispatchSettings::default(),
    );

    let first = h.reports(2).await;
    assert_eq!(first[0].sequence, SeqToken::new("0001"));
    assert!(matches!(first[0].outcome, Outcome::Handled));
    assert!(matches!(
        first[1].outcome,
        Outcome::Skipped(SkipReason::Malformed(_))
    ));

    append(
        &log,
        r#"{"seq":"0003","id":"P1","doc":{"project_id":"P1","details":{"library_construction_method":"10x"},"delivery_ready":true}}"#,
    );
    let third = h.next_report().await;
    assert_eq!(third.sequence, SeqToken::new("0003"));
    h.wait_for_cursor("0003").await;

    let summary = h.stop().await;
    assert_eq!(summary.totals.handled, 2);
    assert_eq!(summary.totals.skipped, 1);
    assert_eq!(std::fs::read_to_string(&cursor).unwrap().trim(), "0003");
    assert_eq!(handler.seqs_for("P1").len(), 2);
}
