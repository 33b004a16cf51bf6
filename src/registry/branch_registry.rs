// src/registry/branch_registry.rs

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::loader::load_registry;
use super::model::{BranchDescriptor, BranchTable};
use super::plugins::HandlerTable;
use crate::errors::{Result, YggError};
use crate::fs::FileSystem;
use crate::handlers::BranchHandler;

type HandlerCell = Arc<OnceCell<Arc<dyn BranchHandler>>>;

/// Where the table came from, so `reload` can read it again.
#[derive(Debug)]
struct RegistrySource {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    required: bool,
}

struct RegistryState {
    table: Arc<BranchTable>,
    /// Loaded handlers keyed by handler reference.
    cache: HashMap<String, HandlerCell>,
}

/// A branch descriptor together with its loaded handler.
#[derive(Clone)]
pub struct ResolvedBranch {
    pub descriptor: Arc<BranchDescriptor>,
    pub handler: Arc<dyn BranchHandler>,
}

impl fmt::Debug for ResolvedBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBranch")
            .field("branch", &self.descriptor.name)
            .field("handler", &self.descriptor.handler_reference)
            .finish()
    }
}

/// Branch table plus the lazily filled handler cache.
///
/// Owned by the dispatcher for the lifetime of the process. The table and
/// cache only change on [`BranchRegistry::reload`].
pub struct BranchRegistry {
    handlers: HandlerTable,
    source: Option<RegistrySource>,
    state: Mutex<RegistryState>,
}

impl fmt::Debug for BranchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BranchRegistry")
            .field("branches", &state.table.names().collect::<Vec<_>>())
            .field("cached", &state.cache.len())
            .field("source", &self.source.as_ref().map(|s| &s.path))
            .finish()
    }
}

impl BranchRegistry {
    /// Load the registry file and build a registry over `handlers`.
    pub fn load(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        required: bool,
        handlers: HandlerTable,
    ) -> Result<Self> {
        let path = path.into();
        let table = load_registry(fs.as_ref(), &path, required)?;
        Ok(Self {
            handlers,
            source: Some(RegistrySource { fs, path, required }),
            state: Mutex::new(RegistryState {
                table: Arc::new(table),
                cache: HashMap::new(),
            }),
        })
    }

    /// Registry over a fixed, in-memory table.
    pub fn from_table(table: BranchTable, handlers: HandlerTable) -> Self {
        Self {
            handlers,
            source: None,
            state: Mutex::new(RegistryState {
                table: Arc::new(table),
                cache: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current branch name → descriptor mapping.
    pub fn get_registry(&self) -> Arc<BranchTable> {
        Arc::clone(&self.lock().table)
    }

    /// Look up `branch` and return its (cached) handler.
    pub async fn resolve(&self, branch: &str) -> Result<ResolvedBranch> {
        let descriptor = self
            .get_registry()
            .get(branch)
            .cloned()
            .ok_or_else(|| YggError::HandlerLoad {
                branch: branch.to_string(),
                reason: "branch is not in the registry".to_string(),
            })?;
        self.resolve_descriptor(descriptor).await
    }

    /// Return the handler for an already looked-up descriptor, loading it on
    /// first use. Concurrent first loads of one reference share a single
    /// factory call; a failed load is not cached.
    pub async fn resolve_descriptor(
        &self,
        descriptor: Arc<BranchDescriptor>,
    ) -> Result<ResolvedBranch> {
        let load_error = |reason: String| YggError::HandlerLoad {
            branch: descriptor.name.clone(),
            reason,
        };

        let factory = self.handlers.get(&descriptor.handler_reference).ok_or_else(|| {
            load_error(format!(
                "unknown handler reference '{}'",
                descriptor.handler_reference
            ))
        })?;

        let cell = {
            let mut state = self.lock();
            Arc::clone(
                state
                    .cache
                    .entry(descriptor.handler_reference.clone())
                    .or_default(),
            )
        };

        let branch = descriptor.name.clone();
        let reference = descriptor.handler_reference.clone();
        let handler = cell
            .get_or_try_init(|| async move {
                debug!(%branch, handler = %reference, "loading handler");
                match tokio::task::spawn_blocking(move || factory()).await {
                    Ok(loaded) => loaded,
                    Err(join) => Err(anyhow!("handler loader did not complete: {join}")),
                }
            })
            .await
            .map_err(|e| load_error(format!("{e:#}")))?;

        Ok(ResolvedBranch {
            handler: Arc::clone(handler),
            descriptor,
        })
    }

    /// Re-read the registry source (when there is one) and drop every cached
    /// handler. On error the previous table and cache stay in place.
    pub fn reload(&self) -> Result<()> {
        let table = match &self.source {
            Some(src) => Some(load_registry(src.fs.as_ref(), &src.path, src.required)?),
            None => None,
        };

        let mut state = self.lock();
        if let Some(table) = table {
            state.table = Arc::new(table);
        }
        let dropped = state.cache.len();
        state.cache.clear();
        info!(
            branches = state.table.len(),
            dropped_handlers = dropped,
            "branch registry reloaded"
        );
        Ok(())
    }

    /// Number of handler references with a cache slot.
    pub fn cached_references(&self) -> usize {
        self.lock().cache.len()
    }
}
