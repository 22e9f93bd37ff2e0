//! Registry of external programs by alias.
//!
//! Aliases map short names (`cmake`, `clang`, `python3`) to executable paths.
//! The registry has two layers: programs from the user-wide config and
//! programs registered for this project. Lookups prefer the project layer;
//! registrations always land in it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::process::find_executable;

/// Error while changing the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("trying to override {} of {alias} with {}", .existing.display(), .requested.display())]
    AlreadyRegistered {
        alias: String,
        existing: PathBuf,
        requested: PathBuf,
    },

    #[error("alias must not be empty")]
    EmptyAlias,
}

/// Alias -> executable path table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramRegistry {
    global: BTreeMap<String, PathBuf>,
    local: BTreeMap<String, PathBuf>,
}

impl ProgramRegistry {
    pub fn new(global: BTreeMap<String, PathBuf>, local: BTreeMap<String, PathBuf>) -> Self {
        ProgramRegistry { global, local }
    }

    /// Check whether an alias is registered in either layer.
    pub fn contains(&self, alias: &str) -> bool {
        self.local.contains_key(alias) || self.global.contains_key(alias)
    }

    /// Path registered for an alias.
    pub fn get(&self, alias: &str) -> Option<&Path> {
        self.local
            .get(alias)
            .or_else(|| self.global.get(alias))
            .map(PathBuf::as_path)
    }

    /// Register a program.
    ///
    /// An existing alias is only replaced when `override_existing` is set.
    pub fn register(
        &mut self,
        alias: &str,
        path: impl Into<PathBuf>,
        override_existing: bool,
    ) -> Result<(), RegistryError> {
        if alias.is_empty() {
            return Err(RegistryError::EmptyAlias);
        }

        let path = path.into();
        if !override_existing {
            if let Some(existing) = self.get(alias) {
                if existing != path {
                    return Err(RegistryError::AlreadyRegistered {
                        alias: alias.to_string(),
                        existing: existing.to_path_buf(),
                        requested: path,
                    });
                }
            }
        }

        tracing::debug!("registered {} -> {}", alias, path.display());
        self.local.insert(alias.to_string(), path);
        Ok(())
    }

    /// All registrations, project entries shadowing global ones.
    pub fn entries(&self) -> BTreeMap<&str, &Path> {
        self.global
            .iter()
            .chain(self.local.iter())
            .map(|(k, v)| (k.as_str(), v.as_path()))
            .collect()
    }

    /// Registrations made for this project (what gets saved).
    pub fn local(&self) -> &BTreeMap<String, PathBuf> {
        &self.local
    }

    /// Replace the project layer.
    pub fn set_local(&mut self, local: BTreeMap<String, PathBuf>) {
        self.local = local;
    }

    /// Resolve an alias to an existing executable file.
    ///
    /// The error is a ready-to-print diagnostic naming the alias or path.
    pub fn verify_executable(&self, alias: &str) -> Result<PathBuf, Diagnostic> {
        let Some(path) = self.get(alias) else {
            return Err(Diagnostic::error(format!("No alias exists for {}", alias))
                .with_suggestion(suggestions::REGISTER_PROGRAM)
                .with_suggestion(suggestions::REGISTER_EXAMPLE));
        };

        if !path.is_file() {
            return Err(Diagnostic::error(format!(
                "Executable path for {} does not exist at {}",
                alias,
                path.display()
            )));
        }

        Ok(path.to_path_buf())
    }
}

/// Look a program up on `PATH`.
pub fn discover(name: &str) -> Option<PathBuf> {
    find_executable(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> ProgramRegistry {
        let mut global = BTreeMap::new();
        global.insert("cmake".to_string(), PathBuf::from("/usr/bin/cmake"));
        global.insert("gcc".to_string(), PathBuf::from("/usr/bin/gcc"));
        ProgramRegistry::new(global, BTreeMap::new())
    }

    #[test]
    fn test_lookup_prefers_local() {
        let mut reg = registry();
        reg.register("cmake", "/opt/cmake/bin/cmake", true).unwrap();

        assert_eq!(reg.get("cmake"), Some(Path::new("/opt/cmake/bin/cmake")));
        assert_eq!(reg.get("gcc"), Some(Path::new("/usr/bin/gcc")));
        assert!(reg.get("clang").is_none());
        assert_eq!(reg.local().len(), 1);
    }

    #[test]
    fn test_register_refuses_replace_without_override() {
        let mut reg = registry();
        let err = reg.register("cmake", "/opt/cmake", false).unwrap_err();

        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
        assert!(err
            .to_string()
            .contains("trying to override /usr/bin/cmake of cmake with /opt/cmake"));
        assert_eq!(reg.get("cmake"), Some(Path::new("/usr/bin/cmake")));
    }

    #[test]
    fn test_register_same_path_is_fine() {
        let mut reg = registry();
        reg.register("gcc", "/usr/bin/gcc", false).unwrap();
    }

    #[test]
    fn test_register_empty_alias() {
        let mut reg = ProgramRegistry::default();
        assert_eq!(
            reg.register("", "/usr/bin/true", false),
            Err(RegistryError::EmptyAlias)
        );
    }

    #[test]
    fn test_entries_shadowing() {
        let mut reg = registry();
        reg.register("gcc", "/usr/local/bin/gcc-13", true).unwrap();
        reg.register("clang", "/usr/bin/clang", false).unwrap();

        let entries = reg.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries["gcc"], Path::new("/usr/local/bin/gcc-13"));
    }

    #[test]
    fn test_verify_missing_alias() {
        let reg = ProgramRegistry::default();
        let diag = reg.verify_executable("cmake").unwrap_err();

        assert_eq!(diag.message, "No alias exists for cmake");
        assert_eq!(diag.suggestions.len(), 2);
    }

    #[test]
    fn test_verify_missing_path() {
        let tmp = TempDir::new().unwrap();
        let mut reg = ProgramRegistry::default();
        reg.register("cmake", tmp.path().join("cmake"), false).unwrap();

        let diag = reg.verify_executable("cmake").unwrap_err();
        assert!(diag
            .message
            .starts_with("Executable path for cmake does not exist at"));
    }

    #[test]
    fn test_verify_existing_file() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("cmake");
        std::fs::write(&exe, "").unwrap();

        let mut reg = ProgramRegistry::default();
        reg.register("cmake", &exe, false).unwrap();
        assert_eq!(reg.verify_executable("cmake").unwrap(), exe);
    }
}
