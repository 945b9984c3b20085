use std::path::PathBuf;

use thiserror::Error;

use crate::variant::VariantId;

/// Invalid run configuration. The only failure class that aborts a run.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("project root {0:?} does not exist or is not a directory")]
    MissingRoot(PathBuf),

    #[error("source directory {0:?} is not readable")]
    UnreadableSourceDir(PathBuf),

    #[error("no product source files found under {0:?}")]
    NoProductSources(PathBuf),

    #[error("failed to parse {path:?}: {reason}")]
    UnparsableSource { path: PathBuf, reason: String },

    #[error("failed to load config file {path:?}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

/// Two bases of one gene that cannot both be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchConflict {
    #[error("{file:?} has no statement at path {path:?}")]
    Unresolved { file: PathBuf, path: Vec<usize> },

    #[error("statement at {file:?} {path:?} was modified by an earlier base")]
    Modified { file: PathBuf, path: Vec<usize> },

    #[error("statement at {file:?} {path:?} was taken at line {expected}, found at line {found}")]
    Moved {
        file: PathBuf,
        path: Vec<usize>,
        expected: u32,
        found: u32,
    },

    #[error("{0:?} is not a product source file")]
    UnknownFile(PathBuf),
}

/// A stochastic choice that has nothing to choose from.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SelectionInfeasible {
    #[error("candidate list is empty")]
    EmptyCandidates,

    #[error("population has no eligible second parent")]
    NoSecondParent,

    #[error("variant has no suspicious statements")]
    NoSuspiciousStatements,

    #[error("gene already has the maximum length")]
    GeneTooLong,
}

/// Failure to run or read back an isolated test worker.
#[derive(Debug, Error)]
pub enum TestExecutionFailure {
    #[error("failed to spawn test worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("test worker timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to wait for test worker: {0}")]
    Wait(#[source] std::io::Error),

    #[error("test worker wrote no results to {0:?}")]
    MissingResults(PathBuf),

    #[error("failed to deserialize test results: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("failed to prepare worker directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Lookup failure in the binary store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no binary named `{0}` in the store")]
    NotFound(String),
}

/// Insertion into the variant store that would break lineage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("variant {child} references unknown parent {parent}")]
    UnknownParent { child: VariantId, parent: VariantId },

    #[error("variant {0} is already stored")]
    Duplicate(VariantId),

    #[error("variant {0} claims to be an initial variant")]
    SecondInitial(VariantId),

    #[error("variant {0} is not an initial variant")]
    NotInitial(VariantId),
}
