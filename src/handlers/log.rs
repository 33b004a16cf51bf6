// src/handlers/log.rs

use tracing::info;

use super::{BranchHandler, HandlerContext, HandlerFuture};

/// Handler that records the dispatch and succeeds.
#[derive(Debug, Default)]
pub struct LogHandler;

impl BranchHandler for LogHandler {
    fn handle(&self, ctx: HandlerContext) -> HandlerFuture<'_> {
        Box::pin(async move {
            info!(
                branch = %ctx.branch,
                doc_id = %ctx.doc_id,
                seq = %ctx.sequence,
                event_type = %ctx.event_type,
                project = %ctx.document.display_id(),
                auto_submit = ctx.submission.should_auto_submit(),
                "log handler received document"
            );
            Ok(())
        })
    }
}
