use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};

use crate::error::CacheError;
use crate::source::GeneratedFile;

/// Cache key: a source file path plus the digest of its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinaryKey {
    pub path: PathBuf,
    pub digest: String,
}

impl BinaryKey {
    pub fn of(file: &GeneratedFile) -> Self {
        Self {
            path: file.path.clone(),
            digest: file.digest.clone(),
        }
    }
}

/// One compiled output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryObject {
    /// Binary type name, nested types keep their `$` suffix.
    pub fqn: String,

    /// Source file the object was compiled from.
    pub source: PathBuf,

    /// Digest of the source content at compile time.
    pub digest: String,

    /// Location below the output directory, for example `a/B.class`.
    pub relative_path: PathBuf,

    pub bytes: Arc<[u8]>,
}

impl BinaryObject {
    pub fn key(&self) -> BinaryKey {
        BinaryKey {
            path: self.source.clone(),
            digest: self.digest.clone(),
        }
    }

    /// Write the object below `out_dir`.
    pub fn write_to(&self, out_dir: &Path) -> Result<()> {
        let target = out_dir.join(&self.relative_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create dir {:?}", parent))?;
        }
        fs::write(&target, &self.bytes)
            .with_context(|| format!("failed to write binary {:?}", target))
    }
}

#[derive(Debug, Default)]
struct Inner {
    by_key: HashMap<BinaryKey, Vec<Arc<BinaryObject>>>,
    digests_by_path: HashMap<PathBuf, BTreeSet<String>>,
    by_fqn: HashMap<String, Arc<BinaryObject>>,
}

/// Compiled objects of every successfully built (path, digest) pair.
///
/// Shared across concurrent builds. Writing an existing key again replaces
/// byte-identical content and is harmless.
#[derive(Debug, Default)]
pub struct BinaryStore {
    inner: RwLock<Inner>,
}

impl BinaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, key: &BinaryKey) -> bool {
        self.read(|inner| inner.by_key.contains_key(key))
    }

    /// Objects compiled from `key`; `None` when it was never compiled.
    pub fn get(&self, key: &BinaryKey) -> Option<Vec<Arc<BinaryObject>>> {
        self.read(|inner| inner.by_key.get(key).cloned())
    }

    /// Objects compiled from any version of the file at `path`.
    pub fn get_by_path(&self, path: &Path) -> Vec<Arc<BinaryObject>> {
        self.read(|inner| {
            let Some(digests) = inner.digests_by_path.get(path) else {
                return Vec::new();
            };
            digests
                .iter()
                .filter_map(|digest| {
                    inner.by_key.get(&BinaryKey {
                        path: path.to_path_buf(),
                        digest: digest.clone(),
                    })
                })
                .flatten()
                .cloned()
                .collect()
        })
    }

    /// The most recently stored object named `fqn`.
    pub fn get_by_fqn(&self, fqn: &str) -> Result<Arc<BinaryObject>, CacheError> {
        self.read(|inner| inner.by_fqn.get(fqn).cloned())
            .ok_or_else(|| CacheError::NotFound(fqn.to_string()))
    }

    /// Record the complete output of compiling `key`. An empty list is a
    /// valid entry (the file declared nothing).
    pub fn add(&self, key: BinaryKey, objects: Vec<BinaryObject>) -> Vec<Arc<BinaryObject>> {
        let objects: Vec<Arc<BinaryObject>> = objects.into_iter().map(Arc::new).collect();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for obj in &objects {
            inner.by_fqn.insert(obj.fqn.clone(), Arc::clone(obj));
        }
        inner
            .digests_by_path
            .entry(key.path.clone())
            .or_default()
            .insert(key.digest.clone());
        inner.by_key.insert(key, objects.clone());
        objects
    }

    pub fn len(&self) -> usize {
        self.read(|inner| inner.by_key.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&inner)
    }
}
