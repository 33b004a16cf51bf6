pub mod builders;
pub mod fake_handler;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for any single wait in the engine tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval of [`eventually`].
const POLL: Duration = Duration::from_millis(5);

static INIT: Once = Once::new();

/// Route engine logs to the per-test writer, filtered by `RUST_LOG`
/// (default `info`, e.g. `RUST_LOG=yggdrasil=debug`).
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {TEST_TIMEOUT:?}"))
}

/// Wait until `cond` holds, re-checking every few milliseconds. Workers,
/// ledger and feed tasks settle asynchronously, so assertions on their
/// shared state go through this.
pub async fn eventually<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    let waited = tokio::time::timeout(TEST_TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(POLL).await;
        }
    })
    .await;
    if waited.is_err() {
        panic!("timed out after {TEST_TIMEOUT:?} waiting for {what}");
    }
}
