//! Virtual files served through the interpreter's `read` hook.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use crate::interpreter::{GuestError, library_path};

/// In-memory file table keyed by virtual path (`lib/<name>.py`).
#[derive(Debug, Clone, Default)]
pub struct VirtualLibrary {
    files: BTreeMap<String, String>,
}

impl VirtualLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file under an explicit virtual path.
    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }

    /// Add the source behind `import name`.
    pub fn insert_module(&mut self, name: &str, source: impl Into<String>) {
        self.insert(library_path(name), source);
    }

    /// Load every `*.py` file in `dir` as an importable module. Returns how many were added.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list library dir {}", dir.display()))?;

        let mut added = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("py") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read library module {}", path.display()))?;
            tracing::debug!(module = name, "loaded library module");
            self.insert_module(name, source);
            added += 1;
        }
        Ok(added)
    }

    /// Resolve a virtual path.
    pub fn read(&self, path: &str) -> Result<&str, GuestError> {
        self.files
            .get(path)
            .map(String::as_str)
            .ok_or_else(|| GuestError::resource_not_found(path))
    }

    /// Whether the path exists.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the library has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::GuestErrorKind;

    #[test]
    fn loads_python_files_from_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.py"), "hello = 'hi'\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut library = VirtualLibrary::new();
        assert_eq!(library.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(library.read("lib/greet.py").unwrap(), "hello = 'hi'\n");
        assert!(!library.contains("lib/notes.py"));
    }

    #[test]
    fn missing_files_are_not_found() {
        let library = VirtualLibrary::new();
        let err = library.read("lib/absent.py").unwrap_err();
        assert_eq!(err.kind, GuestErrorKind::ResourceNotFound);
        assert_eq!(err.message, "lib/absent.py");
        assert!(library.is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let mut library = VirtualLibrary::new();
        let err = library.load_dir("/no/such/library").unwrap_err();
        assert!(err.to_string().contains("failed to list library dir"));
    }
}
