#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use yggdrasil::feed::{ChangeEvent, SeqToken};
use yggdrasil::handlers::BranchHandler;
use yggdrasil::registry::{BranchDescriptor, BranchRegistry, BranchTable, HandlerTable};

/// Builder for a [`BranchRegistry`] over an in-memory table.
pub struct RegistryBuilder {
    branches: Vec<BranchDescriptor>,
    handlers: HandlerTable,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            handlers: HandlerTable::with_builtins(),
        }
    }

    pub fn with_branch(mut self, branch: BranchDescriptor) -> Self {
        self.branches.push(branch);
        self
    }

    /// Branch `name` served by `reference`, with default settings.
    pub fn branch(self, name: &str, reference: &str) -> Self {
        self.with_branch(BranchDescriptor::new(name, reference))
    }

    /// Register a shared handler instance under `reference`.
    pub fn with_handler(mut self, reference: &str, handler: Arc<dyn BranchHandler>) -> Self {
        self.handlers.register_instance(reference, handler);
        self
    }

    pub fn build(self) -> BranchRegistry {
        let table = BranchTable::from_descriptors(self.branches)
            .expect("Failed to build branch table from builder");
        BranchRegistry::from_table(table, self.handlers)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`BranchDescriptor`] values.
pub struct BranchBuilder {
    branch: BranchDescriptor,
}

impl BranchBuilder {
    pub fn new(name: &str, reference: &str) -> Self {
        Self {
            branch: BranchDescriptor::new(name, reference),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.branch.timeout = Some(timeout);
        self
    }

    pub fn handles_deletions(mut self) -> Self {
        self.branch.handles_deletions = true;
        self
    }

    pub fn prefix(mut self) -> Self {
        self.branch.prefix = true;
        self
    }

    pub fn pattern(mut self, glob: &str) -> Self {
        self.branch.patterns.push(glob.to_string());
        self
    }

    pub fn option(mut self, key: &str, value: Value) -> Self {
        Arc::make_mut(&mut self.branch.options).insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> BranchDescriptor {
        self.branch
    }
}

/// Builder for project documents as they appear in the change feed.
pub struct DocBuilder {
    doc: Map<String, Value>,
}

impl DocBuilder {
    pub fn project(project_id: &str) -> Self {
        let mut doc = Map::new();
        doc.insert("project_id".into(), json!(project_id));
        doc.insert("project_name".into(), json!(format!("{project_id}-name")));
        Self { doc }
    }

    /// Set `details.library_construction_method`, the branch key.
    pub fn method(mut self, method: &str) -> Self {
        self.doc.insert(
            "details".into(),
            json!({ "library_construction_method": method }),
        );
        self
    }

    pub fn auto_submit(mut self, value: bool) -> Self {
        self.doc.insert("auto_submit".into(), json!(value));
        self
    }

    pub fn flowcell_ready(mut self) -> Self {
        self.doc.insert("flowcell_ready".into(), json!(true));
        self
    }

    pub fn delivery_ready(mut self) -> Self {
        self.doc.insert("delivery_ready".into(), json!(true));
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.doc.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.doc)
    }
}

/// A non-deleted change event.
pub fn change(seq: &str, document_id: &str, document: Value) -> ChangeEvent {
    ChangeEvent {
        sequence: SeqToken::new(seq),
        document_id: document_id.to_string(),
        document,
        deleted: false,
    }
}

/// A deletion event carrying the last known document state.
pub fn deletion(seq: &str, document_id: &str, document: Value) -> ChangeEvent {
    ChangeEvent {
        deleted: true,
        ..change(seq, document_id, document)
    }
}
