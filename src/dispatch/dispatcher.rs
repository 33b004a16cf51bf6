// src/dispatch/dispatcher.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::classify::classify;
use super::outcome::{Outcome, OutcomeCounters, SkipReason};
use crate::errors::YggError;
use crate::feed::{ChangeEvent, SeqToken};
use crate::handlers::HandlerContext;
use crate::model::ProjectDocument;
use crate::policy::HpcSubmissionPolicy;
use crate::registry::BranchRegistry;
use crate::types::ManualSubmit;

/// Fallback handler timeout when neither config nor branch sets one.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Process-level settings applied to every dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Session override from `--manual-submit`.
    pub manual_submit: ManualSubmit,
    pub realm_supports_auto: bool,
    /// Used for branches without their own `timeout`.
    pub default_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            manual_submit: ManualSubmit::Unset,
            realm_supports_auto: false,
            default_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

/// Routes one change event to its branch handler.
pub struct Dispatcher {
    registry: Arc<BranchRegistry>,
    settings: DispatchSettings,
    counters: Arc<OutcomeCounters>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("totals", &self.counters.totals())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<BranchRegistry>, settings: DispatchSettings) -> Self {
        Self {
            registry,
            settings,
            counters: Arc::new(OutcomeCounters::default()),
        }
    }

    pub fn registry(&self) -> &Arc<BranchRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn counters(&self) -> &Arc<OutcomeCounters> {
        &self.counters
    }

    /// Dispatch `event` and return its outcome. The outcome is logged and
    /// counted here; cursor bookkeeping is the caller's job.
    pub async fn dispatch(&self, event: &ChangeEvent) -> Outcome {
        let outcome = self.route(event).await;
        self.observe(&event.sequence, &event.document_id, &outcome);
        outcome
    }

    /// Log and count an outcome that was decided outside `dispatch`
    /// (undecodable feed records).
    pub fn observe(&self, seq: &SeqToken, doc_id: &str, outcome: &Outcome) {
        self.counters.record(outcome);
        match outcome {
            Outcome::Handled => info!(%seq, %doc_id, outcome = "handled", "event dispatched"),
            Outcome::Skipped(SkipReason::AmbiguousClassification(reason)) => error!(
                %seq, %doc_id, outcome = "skipped", %reason,
                "event skipped: ambiguous classification"
            ),
            Outcome::Skipped(SkipReason::Malformed(reason)) => warn!(
                %seq, %doc_id, outcome = "skipped", %reason,
                "event skipped: malformed"
            ),
            Outcome::Skipped(reason) => {
                debug!(%seq, %doc_id, outcome = "skipped", %reason, "event skipped")
            }
            Outcome::Failed(err) => warn!(
                %seq, %doc_id, outcome = "failed", kind = err.kind(), error = %err,
                "event failed; cursor held"
            ),
        }
    }

    async fn route(&self, event: &ChangeEvent) -> Outcome {
        let doc = match ProjectDocument::parse(event.document.clone()) {
            Ok(doc) => doc,
            Err(_) if event.deleted => return Outcome::Skipped(SkipReason::Deleted),
            Err(err) => return Outcome::Skipped(SkipReason::Malformed(err.to_string())),
        };

        let table = self.registry.get_registry();
        let descriptor = doc
            .library_construction_method
            .as_deref()
            .and_then(|method| table.lookup(method))
            .cloned();

        if event.deleted && !descriptor.as_ref().is_some_and(|d| d.handles_deletions) {
            return Outcome::Skipped(SkipReason::Deleted);
        }

        let event_type = match classify(&doc).event_type(&event.document_id) {
            Ok(t) => t,
            Err(err) => {
                return Outcome::Skipped(SkipReason::AmbiguousClassification(err.to_string()));
            }
        };

        let Some(descriptor) = descriptor else {
            return Outcome::Skipped(SkipReason::UnknownBranch);
        };

        let resolved = match self.registry.resolve_descriptor(descriptor).await {
            Ok(r) => r,
            Err(err) => return Outcome::Failed(err),
        };

        let branch = resolved.descriptor.name.clone();
        let timeout = resolved
            .descriptor
            .timeout
            .unwrap_or(self.settings.default_timeout);

        let ctx = HandlerContext {
            branch: branch.clone(),
            event_type,
            doc_id: event.document_id.clone(),
            sequence: event.sequence.clone(),
            submission: HpcSubmissionPolicy::for_document(
                &doc,
                self.settings.manual_submit,
                self.settings.realm_supports_auto,
            ),
            document: Arc::new(doc),
            options: Arc::clone(&resolved.descriptor.options),
        };

        debug!(
            seq = %event.sequence,
            doc_id = %event.document_id,
            %branch,
            %event_type,
            ?timeout,
            "invoking handler"
        );

        let handler = resolved.handler;
        let mut task = tokio::spawn(async move { handler.handle(ctx).await });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(Ok(()))) => Outcome::Handled,
            Ok(Ok(Err(err))) => Outcome::Failed(YggError::HandlerFailure {
                branch,
                reason: format!("{err:#}"),
            }),
            Ok(Err(join)) => Outcome::Failed(YggError::HandlerFailure {
                branch,
                reason: if join.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler task was cancelled".to_string()
                },
            }),
            Err(_) => {
                // Abort lands at the handler's next yield. The event is not
                // finished until the task is gone.
                task.abort();
                match task.await {
                    Ok(_) => debug!(%branch, "timed-out handler completed before abort"),
                    Err(join) if join.is_panic() => {
                        warn!(%branch, "timed-out handler panicked while being aborted")
                    }
                    Err(_) => debug!(%branch, "timed-out handler aborted"),
                }
                Outcome::Failed(YggError::Timeout {
                    branch,
                    after: timeout,
                })
            }
        }
    }
}
