// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `ygg`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ygg",
    version,
    about = "Route project database changes to technology-specific processing branches.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the application config (TOML).
    ///
    /// Default: `Yggdrasil.toml` in the current working directory, with
    /// built-in defaults when that file does not exist. A path given here
    /// must exist.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Branch registry file; overrides `[config].registry_path` and must exist.
    #[arg(long, global = true, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `--dev` or `YGG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Development mode: debug logging.
    #[arg(long, global = true)]
    pub dev: bool,

    /// Force manual HPC submission for every task decided in this process.
    #[arg(long, global = true)]
    pub manual_submit: bool,

    /// Load and validate config and registry, print the branch table, and exit.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Follow the change feed and dispatch events (default).
    Daemon,

    /// Dispatch one document without touching the feed or the cursor.
    RunDoc {
        /// Document id passed to the handler.
        doc_id: String,

        /// JSON file holding the document.
        #[arg(long, value_name = "FILE")]
        doc: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_is_the_default_command() {
        let args = CliArgs::try_parse_from(["ygg", "--dev"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.dev);
        assert!(!args.manual_submit);
    }

    #[test]
    fn run_doc_takes_id_and_file() {
        let args = CliArgs::try_parse_from([
            "ygg",
            "run-doc",
            "P123",
            "--doc",
            "p123.json",
            "--manual-submit",
        ])
        .unwrap();
        match args.command {
            Some(Command::RunDoc { doc_id, doc }) => {
                assert_eq!(doc_id, "P123");
                assert_eq!(doc, PathBuf::from("p123.json"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(args.manual_submit);
    }
}
