// src/registry/model.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::config::validate::duration_field;
use crate::errors::{Result, YggError};
use crate::handlers::BranchOptions;

/// Top-level structure of `module_registry.toml`.
///
/// ```toml
/// [branch."10x"]
/// handler = "builtin:command"
/// match = ["10X Chromium*"]
/// timeout = "30m"
///
/// [branch."10x".options]
/// cmd = "process-10x"
///
/// [branch.MARS]
/// handler = "builtin:log"
/// prefix = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRegistryFile {
    #[serde(default)]
    pub branch: BTreeMap<String, RawBranch>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBranch {
    pub handler: String,

    #[serde(default)]
    pub options: BranchOptions,

    /// Globs over the library construction method.
    #[serde(default, rename = "match")]
    pub patterns: Vec<String>,

    /// Also match any method starting with the branch name.
    #[serde(default)]
    pub prefix: bool,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub handles_deletions: bool,
}

/// One configured branch.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchDescriptor {
    pub name: String,
    pub handler_reference: String,
    pub options: Arc<BranchOptions>,
    pub patterns: Vec<String>,
    pub prefix: bool,
    /// Overrides the configured default handler timeout.
    pub timeout: Option<Duration>,
    pub handles_deletions: bool,
}

impl BranchDescriptor {
    pub fn new(name: impl Into<String>, handler_reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler_reference: handler_reference.into(),
            options: Arc::new(BranchOptions::new()),
            patterns: Vec::new(),
            prefix: false,
            timeout: None,
            handles_deletions: false,
        }
    }

    fn from_raw(name: String, raw: RawBranch) -> Result<Self> {
        if raw.handler.trim().is_empty() {
            return Err(YggError::ConfigInvalid(format!(
                "branch '{name}' has an empty handler reference"
            )));
        }

        let timeout = raw
            .timeout
            .as_deref()
            .map(|t| duration_field(&format!("branch '{name}' timeout"), t))
            .transpose()?;
        if timeout == Some(Duration::ZERO) {
            return Err(YggError::ConfigInvalid(format!(
                "branch '{name}' timeout must be greater than zero"
            )));
        }

        Ok(Self {
            name,
            handler_reference: raw.handler,
            options: Arc::new(raw.options),
            patterns: raw.patterns,
            prefix: raw.prefix,
            timeout,
            handles_deletions: raw.handles_deletions,
        })
    }
}

/// Immutable branch name → descriptor mapping with compiled matchers.
#[derive(Debug, Clone, Default)]
pub struct BranchTable {
    branches: BTreeMap<String, Arc<BranchDescriptor>>,
    /// Branches with `match` globs, in name order.
    matchers: Vec<(String, GlobSet)>,
}

impl BranchTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: RawRegistryFile) -> Result<Self> {
        let descriptors = raw
            .branch
            .into_iter()
            .map(|(name, branch)| BranchDescriptor::from_raw(name, branch))
            .collect::<Result<Vec<_>>>()?;
        Self::from_descriptors(descriptors)
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = BranchDescriptor>) -> Result<Self> {
        let mut branches = BTreeMap::new();
        for d in descriptors {
            let name = d.name.clone();
            if branches.insert(name.clone(), Arc::new(d)).is_some() {
                return Err(YggError::ConfigInvalid(format!("duplicate branch '{name}'")));
            }
        }

        let mut matchers = Vec::new();
        for (name, d) in &branches {
            if d.patterns.is_empty() {
                continue;
            }
            matchers.push((name.clone(), compile_globs(name, &d.patterns)?));
        }

        Ok(Self { branches, matchers })
    }

    /// Descriptor by exact branch name.
    pub fn get(&self, name: &str) -> Option<&Arc<BranchDescriptor>> {
        self.branches.get(name)
    }

    /// Branch for a library construction method: exact name first, then the
    /// first branch (by name) whose prefix or globs match.
    pub fn lookup(&self, method: &str) -> Option<&Arc<BranchDescriptor>> {
        if let Some(d) = self.branches.get(method) {
            return Some(d);
        }

        self.branches.iter().find_map(|(name, d)| {
            let by_prefix = d.prefix && method.starts_with(name.as_str());
            let by_glob = self
                .matchers
                .iter()
                .any(|(n, set)| n == name && set.is_match(method));
            (by_prefix || by_glob).then_some(d)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BranchDescriptor>> {
        self.branches.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.branches.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

fn compile_globs(branch: &str, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|e| {
            YggError::ConfigInvalid(format!("branch '{branch}': invalid match pattern '{pat}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| YggError::ConfigInvalid(format!("branch '{branch}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> Result<BranchTable> {
        let raw: RawRegistryFile = toml::from_str(src)?;
        BranchTable::from_raw(raw)
    }

    #[test]
    fn parses_branches_with_options_and_timeouts() {
        let t = table(
            r#"
            [branch."10x"]
            handler = "builtin:command"
            timeout = "30m"
            handles_deletions = true
            [branch."10x".options]
            cmd = "run.sh"
            "#,
        )
        .unwrap();

        let d = t.get("10x").unwrap();
        assert_eq!(d.handler_reference, "builtin:command");
        assert_eq!(d.timeout, Some(Duration::from_secs(30 * 60)));
        assert!(d.handles_deletions);
        assert_eq!(d.options["cmd"], "run.sh");
    }

    #[test]
    fn exact_name_wins_over_patterns() {
        let t = table(
            r#"
            [branch.MARS]
            handler = "a"
            prefix = true

            [branch."MARS-seq"]
            handler = "b"

            [branch.chromium]
            handler = "c"
            match = ["10X Chromium*"]
            "#,
        )
        .unwrap();

        assert_eq!(t.lookup("MARS-seq").unwrap().handler_reference, "b");
        assert_eq!(t.lookup("MARS-other").unwrap().handler_reference, "a");
        assert_eq!(t.lookup("10X Chromium 3'").unwrap().handler_reference, "c");
        assert!(t.lookup("Smart-seq3").is_none());
    }

    #[test]
    fn bad_glob_or_timeout_is_config_invalid() {
        let err = table("[branch.x]\nhandler = \"h\"\nmatch = [\"[\"]\n").unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(_)));

        let err = table("[branch.x]\nhandler = \"h\"\ntimeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(table("[branch.x]\nhandler = \"h\"\nmodule = \"m\"\n").is_err());
    }
}
