// src/registry/plugins.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handlers::{BranchHandler, CommandHandler, LogHandler};

/// Builds a handler instance. May perform blocking I/O; it runs on the
/// blocking thread pool.
pub type HandlerFactory =
    Arc<dyn Fn() -> anyhow::Result<Arc<dyn BranchHandler>> + Send + Sync>;

pub const BUILTIN_LOG: &str = "builtin:log";
pub const BUILTIN_COMMAND: &str = "builtin:command";

/// Explicit handler reference → factory table, filled at startup.
#[derive(Clone, Default)]
pub struct HandlerTable {
    factories: HashMap<String, HandlerFactory>,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut refs: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        refs.sort_unstable();
        f.debug_struct("HandlerTable").field("references", &refs).finish()
    }
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with `builtin:log` and `builtin:command` registered.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register(BUILTIN_LOG, || Ok(Arc::new(LogHandler) as Arc<dyn BranchHandler>));
        table.register(BUILTIN_COMMAND, || {
            Ok(Arc::new(CommandHandler) as Arc<dyn BranchHandler>)
        });
        table
    }

    /// Register (or replace) the factory for `reference`.
    pub fn register<F>(&mut self, reference: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn BranchHandler>> + Send + Sync + 'static,
    {
        self.factories.insert(reference.into(), Arc::new(factory));
        self
    }

    /// Register a single shared instance; every load returns it.
    pub fn register_instance(
        &mut self,
        reference: impl Into<String>,
        handler: Arc<dyn BranchHandler>,
    ) -> &mut Self {
        self.register(reference, move || Ok(Arc::clone(&handler)))
    }

    pub fn get(&self, reference: &str) -> Option<HandlerFactory> {
        self.factories.get(reference).cloned()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.factories.contains_key(reference)
    }
}
