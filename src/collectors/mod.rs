pub mod cpu;
pub mod inventory;
pub mod network;
pub mod system;
pub mod temperature;
pub mod tools;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{tool} is unavailable: {source}")]
    ToolUnavailable { tool: String, source: io::Error },
    #[error("{tool} did not finish within {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },
    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: std::process::ExitStatus },
    #[error("malformed {what}")]
    Malformed { what: String },
    #[error("address enumeration failed: {0}")]
    AddressEnumeration(#[from] nix::Error),
}

/// Read access to kernel and system files, so collectors can be pointed at an
/// in-memory tree in tests.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads straight from the host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

pub(crate) fn read_file(fs: &dyn FileSystem, path: &Path) -> Result<String, CollectError> {
    fs.read_to_string(path).map_err(|source| CollectError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod mock {
    use super::FileSystem;
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::RwLock;

    /// In-memory file tree; contents can be swapped between collection cycles.
    #[derive(Debug, Default)]
    pub struct MockFs {
        files: RwLock<HashMap<PathBuf, String>>,
    }

    impl MockFs {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
            self.set_file(path, content);
            self
        }

        pub fn set_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
            self.files
                .write()
                .expect("mock fs lock")
                .insert(path.as_ref().to_path_buf(), content.into());
        }
    }

    impl FileSystem for MockFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.files
                .read()
                .expect("mock fs lock")
                .get(path)
                .cloned()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("file not found: {path:?}"))
                })
        }
    }
}
