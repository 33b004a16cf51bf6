// src/registry/loader.rs

use std::path::Path;

use tracing::{info, warn};

use super::model::{BranchTable, RawRegistryFile};
use crate::errors::{Result, YggError};
use crate::fs::FileSystem;

/// Load the branch registry from `path`.
///
/// - absent and not `required`: empty table, with a warning
/// - absent and `required`: `ConfigMissing`
/// - present but unreadable or unparsable: `ConfigInvalid`
///
/// Handler references are not checked here; unknown ones fail on first
/// resolution.
pub fn load_registry(fs: &dyn FileSystem, path: &Path, required: bool) -> Result<BranchTable> {
    if !fs.exists(path) {
        if required {
            return Err(YggError::ConfigMissing(format!(
                "branch registry not found: {}",
                path.display()
            )));
        }
        warn!(path = %path.display(), "branch registry not found; running with no branches");
        return Ok(BranchTable::empty());
    }

    let contents = fs
        .read_to_string(path)
        .map_err(|e| YggError::ConfigInvalid(format!("{}: {e:#}", path.display())))?;

    let raw: RawRegistryFile = toml::from_str(&contents)
        .map_err(|e| YggError::ConfigInvalid(format!("{}: {e}", path.display())))?;

    let table = BranchTable::from_raw(raw)?;
    info!(
        path = %path.display(),
        branches = table.len(),
        "loaded branch registry"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn absent_file_is_empty_unless_required() {
        let fs = MockFileSystem::new();
        let p = Path::new("/cfg/module_registry.toml");

        assert!(load_registry(&fs, p, false).unwrap().is_empty());
        assert!(matches!(
            load_registry(&fs, p, true),
            Err(YggError::ConfigMissing(_))
        ));
    }

    #[test]
    fn broken_file_is_never_replaced_by_empty_table() {
        let fs = MockFileSystem::new();
        let p = Path::new("/cfg/module_registry.toml");
        fs.add_file(p, "[branch.\"10x\"\nhandler = ");

        for required in [false, true] {
            assert!(matches!(
                load_registry(&fs, p, required),
                Err(YggError::ConfigInvalid(_))
            ));
        }
    }

    #[test]
    fn loads_branches() {
        let fs = MockFileSystem::new();
        let p = Path::new("/cfg/module_registry.toml");
        fs.add_file(
            p,
            "[branch.\"10x\"]\nhandler = \"builtin:log\"\n[branch.ss3]\nhandler = \"builtin:log\"\n",
        );

        let table = load_registry(&fs, p, true).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["10x", "ss3"]);
    }
}
