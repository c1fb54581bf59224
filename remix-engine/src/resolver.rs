//! Resolution of clip references to encoded bytes
//!
//! Storage of uploads belongs to the caller; the pipeline only needs a way
//! to turn a reference like `/uploads/1f3c_take2.mp3` into bytes.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors from resolving a reference
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    #[error("IO error reading {reference}: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of encoded audio bytes
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError>;
}

impl<T: SourceResolver + ?Sized> SourceResolver for &T {
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError> {
        (**self).resolve(reference)
    }
}

impl<T: SourceResolver + ?Sized> SourceResolver for std::sync::Arc<T> {
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError> {
        (**self).resolve(reference)
    }
}

/// Resolves `/uploads/<name>`-style references against a directory on disk.
///
/// The leading `/` is dropped and the rest joined onto the root, so
/// `/uploads/a.mp3` with root `/srv/remix` reads `/srv/remix/uploads/a.mp3`.
#[derive(Debug, Clone)]
pub struct UploadDirResolver {
    root: PathBuf,
}

impl UploadDirResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference to a path under the root, refusing anything that escapes it
    pub fn path_for(&self, reference: &str) -> Result<PathBuf, ResolveError> {
        let relative = Path::new(reference.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(ResolveError::InvalidReference(reference.to_string()));
        }

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ResolveError::InvalidReference(reference.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

impl SourceResolver for UploadDirResolver {
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError> {
        let path = self.path_for(reference)?;
        if !path.is_file() {
            return Err(ResolveError::NotFound(reference.to_string()));
        }

        fs::read(&path).map_err(|source| ResolveError::Io {
            reference: reference.to_string(),
            source,
        })
    }
}

/// Resolver backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(reference.into(), bytes);
    }

    pub fn with(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SourceResolver for MemoryResolver {
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(reference.to_string()))
    }
}
