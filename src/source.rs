use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ast::{ParseError, SourceAst};

/// Whether a file is repaired or only used to judge repairs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Product,
    Test,
}

/// Source file within a project
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root (for example `src/main/java/a/B.java`).
    pub root_relative: PathBuf,

    /// Absolute path on disk.
    pub absolute_path: PathBuf,

    pub kind: SourceKind,
}

impl SourceFile {
    /// Construct a `SourceFile` from a project root and a relative path.
    pub fn from_relative(root: &Path, rel: &Path, kind: SourceKind) -> Self {
        Self {
            root_relative: rel.to_path_buf(),
            absolute_path: root.join(rel),
            kind,
        }
    }

    /// Absolute path on disk
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    /// Path relative to the project root
    pub fn relative_path(&self) -> &Path {
        &self.root_relative
    }

    /// Load the full file contents as UTF-8 text.
    pub fn read_to_string(&self) -> Result<String> {
        fs::read_to_string(&self.absolute_path)
            .with_context(|| format!("failed to read source file {:?}", self.absolute_path))
    }
}

/// Hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// One file of a generated program.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub digest: String,
    text: String,
    ast: Option<SourceAst>,
}

impl GeneratedFile {
    /// Product files are parsed; a parse failure means the text is not valid source.
    pub fn new(path: PathBuf, kind: SourceKind, text: String) -> Result<Self, ParseError> {
        let digest = content_digest(text.as_bytes());
        let ast = match kind {
            SourceKind::Product => Some(SourceAst::parse(path.clone(), text.clone())?),
            SourceKind::Test => None,
        };
        Ok(Self {
            path,
            kind,
            digest,
            text,
            ast,
        })
    }

    /// A product file from an already parsed outline.
    pub fn from_ast(ast: SourceAst) -> Self {
        let text = ast.text().to_string();
        Self {
            path: ast.path().to_path_buf(),
            kind: SourceKind::Product,
            digest: content_digest(text.as_bytes()),
            text,
            ast: Some(ast),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> Option<&SourceAst> {
        self.ast.as_ref()
    }
}

impl PartialEq for GeneratedFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind && self.digest == other.digest
    }
}

impl Eq for GeneratedFile {}

/// Full source set of one program variant.
///
/// Files untouched by a gene share their `Arc` with the original program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedSource {
    files: BTreeMap<PathBuf, Arc<GeneratedFile>>,
}

impl GeneratedSource {
    pub fn new(files: impl IntoIterator<Item = GeneratedFile>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|f| (f.path.clone(), Arc::new(f)))
                .collect(),
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<GeneratedFile>> {
        self.files.values()
    }

    pub fn file(&self, path: &Path) -> Option<&Arc<GeneratedFile>> {
        self.files.get(path)
    }

    /// Parsed product files, ordered by path.
    pub fn product_asts(&self) -> impl Iterator<Item = &SourceAst> {
        self.files.values().filter_map(|f| f.ast())
    }

    pub fn with_file(&self, file: GeneratedFile) -> Self {
        let mut files = self.files.clone();
        files.insert(file.path.clone(), Arc::new(file));
        Self { files }
    }

    /// Digest over every file path and content digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, file) in &self.files {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0]);
            hasher.update(file.digest.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn with_file_replaces_only_that_path() {
        let a = GeneratedFile::new("A.java".into(), SourceKind::Test, "a".into()).unwrap();
        let b = GeneratedFile::new("B.java".into(), SourceKind::Test, "b".into()).unwrap();
        let source = GeneratedSource::new([a, b]);

        let b2 = GeneratedFile::new("B.java".into(), SourceKind::Test, "b2".into()).unwrap();
        let changed = source.with_file(b2);

        assert_ne!(source, changed);
        assert_ne!(source.digest(), changed.digest());
        assert!(Arc::ptr_eq(
            source.file(Path::new("A.java")).unwrap(),
            changed.file(Path::new("A.java")).unwrap()
        ));
    }

    #[test]
    fn product_files_must_parse() {
        let err = GeneratedFile::new(
            "A.java".into(),
            SourceKind::Product,
            "class A { void f() {".into(),
        );
        assert!(err.is_err());
    }
}
