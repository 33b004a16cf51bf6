// src/handlers/command.rs

//! Handler that runs a shell command for each document.
//!
//! Branch options:
//! - `cmd` (required): command line run through `sh -c` (`cmd /C` on Windows).
//!
//! The document JSON is written to the child's stdin. The child also sees
//! `YGG_DOC_ID`, `YGG_BRANCH`, `YGG_EVENT_TYPE`, `YGG_SEQ` and
//! `YGG_AUTO_SUBMIT` (`"true"` / `"false"`). Exit status 0 acknowledges the
//! event.

use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::{option_str, BranchHandler, HandlerContext, HandlerFuture};

#[derive(Debug, Default)]
pub struct CommandHandler;

impl BranchHandler for CommandHandler {
    fn handle(&self, ctx: HandlerContext) -> HandlerFuture<'_> {
        Box::pin(run_command(ctx))
    }
}

async fn run_command(ctx: HandlerContext) -> Result<()> {
    let cmd_line = option_str(&ctx.options, "cmd")
        .ok_or_else(|| anyhow!("branch '{}' has no `cmd` option", ctx.branch))?
        .to_string();

    info!(
        branch = %ctx.branch,
        doc_id = %ctx.doc_id,
        seq = %ctx.sequence,
        cmd = %cmd_line,
        "starting handler process"
    );

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd_line);
        c
    };

    cmd.env("YGG_DOC_ID", &ctx.doc_id)
        .env("YGG_BRANCH", &ctx.branch)
        .env("YGG_EVENT_TYPE", ctx.event_type.as_str())
        .env("YGG_SEQ", ctx.sequence.as_str())
        .env(
            "YGG_AUTO_SUBMIT",
            ctx.submission.should_auto_submit().to_string(),
        )
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // A timed-out invocation drops this future; the child must go with it.
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning handler process for branch '{}'", ctx.branch))?;

    if let Some(mut stdin) = child.stdin.take() {
        let payload = serde_json::to_vec(&ctx.document.raw)?;
        // A child that exits without reading stdin is not an error by itself.
        if let Err(e) = stdin.write_all(&payload).await {
            debug!(doc_id = %ctx.doc_id, error = %e, "handler process closed stdin early");
        }
    }

    if let Some(stdout) = child.stdout.take() {
        spawn_line_logger(stdout, ctx.doc_id.clone(), "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_logger(stderr, ctx.doc_id.clone(), "stderr");
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for handler process of branch '{}'", ctx.branch))?;

    let code = status.code().unwrap_or(-1);
    info!(
        branch = %ctx.branch,
        doc_id = %ctx.doc_id,
        exit_code = code,
        success = status.success(),
        "handler process exited"
    );

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("handler process exited with code {code}"))
    }
}

/// Drain a child stream so its pipe never fills; lines are logged at debug.
fn spawn_line_logger<R>(stream: R, doc_id: String, label: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(doc_id = %doc_id, "{label}: {line}");
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::feed::SeqToken;
    use crate::model::ProjectDocument;
    use crate::policy::HpcSubmissionPolicy;
    use crate::types::EventType;

    fn ctx(cmd: Option<&str>) -> HandlerContext {
        let mut options = Map::new();
        if let Some(cmd) = cmd {
            options.insert("cmd".into(), Value::String(cmd.into()));
        }
        HandlerContext {
            branch: "10x".into(),
            event_type: EventType::ProjectChange,
            doc_id: "doc-1".into(),
            sequence: SeqToken::new("0001"),
            document: Arc::new(ProjectDocument::parse(json!({"project_id": "P1"})).unwrap()),
            options: Arc::new(options),
            submission: HpcSubmissionPolicy::default(),
        }
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        assert!(CommandHandler.handle(ctx(Some("cat > /dev/null"))).await.is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let err = CommandHandler.handle(ctx(Some("exit 3"))).await.unwrap_err();
        assert!(err.to_string().contains("code 3"));
    }

    #[tokio::test]
    async fn environment_carries_dispatch_details() {
        let script = r#"test "$YGG_DOC_ID" = doc-1 && test "$YGG_EVENT_TYPE" = project_change && test "$YGG_AUTO_SUBMIT" = false"#;
        assert!(CommandHandler.handle(ctx(Some(script))).await.is_ok());
    }

    #[tokio::test]
    async fn missing_cmd_option_fails() {
        assert!(CommandHandler.handle(ctx(None)).await.is_err());
    }
}
