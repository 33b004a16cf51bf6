use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use yggdrasil::feed::SeqToken;
use yggdrasil::handlers::{BranchHandler, HandlerContext, HandlerFuture};
use yggdrasil::types::EventType;

/// Whether a record marks the start or the end of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub phase: Phase,
    pub branch: String,
    pub doc_id: String,
    pub seq: SeqToken,
    pub event_type: EventType,
    pub auto_submit: bool,
}

#[derive(Debug, Default)]
struct Script {
    delays: HashMap<String, Duration>,
    failures: HashMap<String, usize>,
    hangs: HashSet<String>,
    blocks: HashMap<String, Duration>,
}

/// A handler for tests that:
/// - records the start and end of every invocation
/// - succeeds unless scripted otherwise
/// - can be slowed down per document or sequence, failed per sequence a given
///   number of times, made to hang per sequence, or made to block its thread
///   without yielding.
///
/// Clones share the same log and script.
#[derive(Debug, Clone, Default)]
pub struct FakeHandler {
    log: Arc<Mutex<Vec<CallRecord>>>,
    script: Arc<Mutex<Script>>,
}

impl FakeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay_doc(&self, doc_id: &str, delay: Duration) -> &Self {
        self.script
            .lock()
            .unwrap()
            .delays
            .insert(doc_id.to_string(), delay);
        self
    }

    /// Slow down the invocation for one sequence token; wins over `delay_doc`.
    pub fn delay_seq(&self, seq: &str, delay: Duration) -> &Self {
        self.script
            .lock()
            .unwrap()
            .delays
            .insert(format!("seq:{seq}"), delay);
        self
    }

    /// Fail the next `times` invocations for `seq`.
    pub fn fail_seq(&self, seq: &str, times: usize) -> &Self {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(seq.to_string(), times);
        self
    }

    /// Never return for `seq`.
    pub fn hang_seq(&self, seq: &str) -> &Self {
        self.script.lock().unwrap().hangs.insert(seq.to_string());
        self
    }

    /// Block the executor thread for `duration` on `seq`, never yielding, the
    /// way a handler stuck in synchronous IO would.
    pub fn block_seq(&self, seq: &str, duration: Duration) -> &Self {
        self.script
            .lock()
            .unwrap()
            .blocks
            .insert(seq.to_string(), duration);
        self
    }

    pub fn clear_hangs(&self) {
        self.script.lock().unwrap().hangs.clear();
    }

    pub fn as_handler(&self) -> Arc<dyn BranchHandler> {
        Arc::new(self.clone())
    }

    /// Full start/end log in order.
    pub fn log(&self) -> Vec<CallRecord> {
        self.log.lock().unwrap().clone()
    }

    /// Invocations that were started.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.log()
            .into_iter()
            .filter(|r| r.phase == Phase::Start)
            .collect()
    }

    /// Sequence tokens handled for `doc_id`, in start order.
    pub fn seqs_for(&self, doc_id: &str) -> Vec<SeqToken> {
        self.calls()
            .into_iter()
            .filter(|r| r.doc_id == doc_id)
            .map(|r| r.seq)
            .collect()
    }

    fn record(&self, phase: Phase, ctx: &HandlerContext) {
        self.log.lock().unwrap().push(CallRecord {
            phase,
            branch: ctx.branch.clone(),
            doc_id: ctx.doc_id.clone(),
            seq: ctx.sequence.clone(),
            event_type: ctx.event_type,
            auto_submit: ctx.submission.should_auto_submit(),
        });
    }
}

impl BranchHandler for FakeHandler {
    fn handle(&self, ctx: HandlerContext) -> HandlerFuture<'_> {
        Box::pin(async move {
            self.record(Phase::Start, &ctx);

            let (delay, fail, hang, block) = {
                let mut script = self.script.lock().unwrap();
                let delay = script
                    .delays
                    .get(&format!("seq:{}", ctx.sequence.as_str()))
                    .or_else(|| script.delays.get(&ctx.doc_id))
                    .copied();
                let fail = match script.failures.get_mut(ctx.sequence.as_str()) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                };
                let hang = script.hangs.contains(ctx.sequence.as_str());
                let block = script.blocks.get(ctx.sequence.as_str()).copied();
                (delay, fail, hang, block)
            };

            if let Some(block) = block {
                std::thread::sleep(block);
            }

            if hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.record(Phase::End, &ctx);
            if fail {
                Err(anyhow!("scripted failure for {}", ctx.sequence))
            } else {
                Ok(())
            }
        })
    }
}
