//! View loading.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// File-system collaborator that turns a path into template text.
/// Injectable so tests can observe or stub loads.
pub trait ViewLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<String>;
}

/// Default loader backed by `std::fs`. Appends the configured
/// extension when the path has none, so `nav` resolves to `nav.html`.
pub struct FsLoader {
    extension: String,
}

impl FsLoader {
    pub fn new(extension: impl Into<String>) -> Self {
        FsLoader {
            extension: extension.into(),
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.extension().is_some() || self.extension.is_empty() {
            path.to_path_buf()
        } else {
            path.with_extension(&self.extension)
        }
    }
}

impl ViewLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(self.resolve(path))?)
    }
}
