use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ConfigurationError;
use crate::options::Options;
use crate::source::{GeneratedFile, GeneratedSource, SourceFile, SourceKind};

/// Project under repair. Built once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct TargetProject {
    /// Root directory of the project.
    pub root: PathBuf,

    pub product_files: Vec<SourceFile>,
    pub test_files: Vec<SourceFile>,

    /// Extra classpath entries, absolute.
    pub classpath: Vec<PathBuf>,
}

impl TargetProject {
    /// Discover product and test sources as configured in `options`.
    pub fn from_options(options: &Options) -> Result<Self, ConfigurationError> {
        let root = &options.project_root;
        if !root.is_dir() {
            return Err(ConfigurationError::MissingRoot(root.clone()));
        }

        let product_files = discover(root, &options.product_dirs, &options.extension, SourceKind::Product)?;
        let test_files = discover(root, &options.test_dirs, &options.extension, SourceKind::Test)?;

        // A directory configured as both keeps its files on the test side.
        let product_files: Vec<SourceFile> = product_files
            .into_iter()
            .filter(|p| !test_files.iter().any(|t| t.root_relative == p.root_relative))
            .collect();

        if product_files.is_empty() {
            return Err(ConfigurationError::NoProductSources(root.clone()));
        }

        let classpath = options
            .classpath
            .iter()
            .map(|cp| if cp.is_absolute() { cp.clone() } else { root.join(cp) })
            .collect();

        Ok(Self {
            root: root.clone(),
            product_files,
            test_files,
            classpath,
        })
    }

    pub fn source_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.product_files.iter().chain(self.test_files.iter())
    }

    /// Read and parse every file into the original program.
    pub fn load_initial_source(&self) -> Result<GeneratedSource, ConfigurationError> {
        let mut files = Vec::new();
        for src in self.source_files() {
            let text = src
                .read_to_string()
                .map_err(|_| ConfigurationError::UnreadableSourceDir(src.path().to_path_buf()))?;
            let file = GeneratedFile::new(src.root_relative.clone(), src.kind, text).map_err(|e| {
                ConfigurationError::UnparsableSource {
                    path: src.root_relative.clone(),
                    reason: e.to_string(),
                }
            })?;
            files.push(file);
        }
        Ok(GeneratedSource::new(files))
    }
}

fn discover(
    root: &Path,
    dirs: &[PathBuf],
    extension: &str,
    kind: SourceKind,
) -> Result<Vec<SourceFile>, ConfigurationError> {
    let mut files = Vec::new();
    for dir in dirs {
        let abs = root.join(dir);
        if !abs.exists() {
            continue;
        }
        for entry in WalkDir::new(&abs).sort_by_file_name() {
            let entry = entry.map_err(|_| ConfigurationError::UnreadableSourceDir(abs.clone()))?;
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some(extension)
            {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| ConfigurationError::UnreadableSourceDir(abs.clone()))?;
            files.push(SourceFile::from_relative(root, rel, kind));
        }
    }
    files.sort_by(|a, b| a.root_relative.cmp(&b.root_relative));
    files.dedup_by(|a, b| a.root_relative == b.root_relative);
    Ok(files)
}
