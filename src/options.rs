use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Suspiciousness formula used for fault localization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultLocalizationKind {
    #[default]
    Ochiai,
    Jaccard,
}

/// How crossover picks its second parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondParentStrategy {
    Elite,
    #[default]
    Random,
    TestComplementary,
    GeneSimilarity,
}

/// How mutation picks Insert/Replace donor statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DonorSelection {
    #[default]
    Uniform,
    Roulette,
}

/// Configuration options for a repair run, after merging defaults, the
/// optional config file and command-line flags.
#[derive(Debug, Clone)]
pub struct Options {
    /// Path to the target project root.
    pub project_root: PathBuf,

    /// Product source directories, relative to the root.
    pub product_dirs: Vec<PathBuf>,

    /// Test source directories, relative to the root.
    pub test_dirs: Vec<PathBuf>,

    /// Extra classpath entries needed to build and test the project.
    pub classpath: Vec<PathBuf>,

    /// Extension of source files to pick up (without the dot).
    pub extension: String,

    pub seed: u64,
    pub max_generations: u32,
    pub time_limit: Duration,

    /// Survivors kept per generation.
    pub headcount: usize,

    pub mutation_generating_count: usize,
    pub crossover_generating_count: usize,
    pub max_gene_length: usize,
    pub required_solutions: usize,

    /// Upper bound on a single test worker process.
    pub test_timeout: Duration,

    /// Size of the evaluation pool.
    pub workers: usize,

    pub fault_localization: FaultLocalizationKind,
    pub second_parent: SecondParentStrategy,
    pub donor_selection: DonorSelection,

    /// Command used to invoke the javac-compatible compiler.
    pub compiler: String,

    /// Program (plus fixed leading arguments) of the isolated test worker.
    pub test_worker: Vec<String>,

    /// Directory receiving the history and patches.
    pub out_dir: PathBuf,

    /// When true, emit JSON output instead of human-readable summary.
    pub json_output: bool,
}

impl Options {
    /// Construct an `Options` instance with default values.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            product_dirs: vec![PathBuf::from("src/main/java")],
            test_dirs: vec![PathBuf::from("src/test/java")],
            classpath: Vec::new(),
            extension: "java".to_string(),
            seed: 0,
            max_generations: 10,
            time_limit: Duration::from_secs(60),
            headcount: 100,
            mutation_generating_count: 10,
            crossover_generating_count: 10,
            max_gene_length: 10,
            required_solutions: 1,
            test_timeout: Duration::from_secs(60),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            fault_localization: FaultLocalizationKind::default(),
            second_parent: SecondParentStrategy::default(),
            donor_selection: DonorSelection::default(),
            compiler: "javac".to_string(),
            test_worker: vec!["genrepair-test-worker".to_string()],
            out_dir: PathBuf::from("genrepair-out"),
            json_output: false,
        }
    }

    /// Overlay every key present in `file`.
    pub fn apply_file(&mut self, file: FileConfig) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = file.$field { self.$field = v; })*
            };
        }

        if let Some(root) = file.root {
            self.project_root = root;
        }
        if let Some(dirs) = file.sources {
            self.product_dirs = dirs;
        }
        if let Some(dirs) = file.tests {
            self.test_dirs = dirs;
        }
        if let Some(secs) = file.time_limit_secs {
            self.time_limit = Duration::from_secs(secs);
        }
        if let Some(secs) = file.test_timeout_secs {
            self.test_timeout = Duration::from_secs(secs);
        }
        overlay!(
            classpath,
            extension,
            seed,
            max_generations,
            headcount,
            mutation_generating_count,
            crossover_generating_count,
            max_gene_length,
            required_solutions,
            workers,
            fault_localization,
            second_parent,
            donor_selection,
            compiler,
            test_worker,
            out_dir,
        );
    }

    /// Reject configurations that cannot start a run.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.project_root.is_dir() {
            return Err(ConfigurationError::MissingRoot(self.project_root.clone()));
        }

        let positive = [
            ("headcount", self.headcount),
            ("max_gene_length", self.max_gene_length),
            ("workers", self.workers),
            ("required_solutions", self.required_solutions),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigurationError::InvalidOption {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.test_worker.is_empty() || self.test_worker[0].trim().is_empty() {
            return Err(ConfigurationError::InvalidOption {
                name: "test_worker",
                reason: "a worker program is required".to_string(),
            });
        }
        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(ConfigurationError::InvalidOption {
                name: "extension",
                reason: format!("{:?} is not a bare file extension", self.extension),
            });
        }

        Ok(())
    }
}

/// Keys accepted in a `--config` TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<PathBuf>,
    pub sources: Option<Vec<PathBuf>>,
    pub tests: Option<Vec<PathBuf>>,
    pub classpath: Option<Vec<PathBuf>>,
    pub extension: Option<String>,
    pub seed: Option<u64>,
    pub max_generations: Option<u32>,
    pub time_limit_secs: Option<u64>,
    pub headcount: Option<usize>,
    pub mutation_generating_count: Option<usize>,
    pub crossover_generating_count: Option<usize>,
    pub max_gene_length: Option<usize>,
    pub required_solutions: Option<usize>,
    pub test_timeout_secs: Option<u64>,
    pub workers: Option<usize>,
    pub fault_localization: Option<FaultLocalizationKind>,
    pub second_parent: Option<SecondParentStrategy>,
    pub donor_selection: Option<DonorSelection>,
    pub compiler: Option<String>,
    pub test_worker: Option<Vec<String>>,
    pub out_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigurationError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(text).map_err(|e| ConfigurationError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_overlays_defaults() {
        let text = r#"
            seed = 42
            headcount = 5
            sources = ["src"]
            time_limit_secs = 3
            second_parent = "test-complementary"
            test_worker = ["java", "-jar", "worker.jar"]
        "#;
        let file = FileConfig::parse(Path::new("repair.toml"), text).unwrap();

        let mut options = Options::new(PathBuf::from("."));
        options.apply_file(file);

        assert_eq!(options.seed, 42);
        assert_eq!(options.headcount, 5);
        assert_eq!(options.product_dirs, vec![PathBuf::from("src")]);
        assert_eq!(options.time_limit, Duration::from_secs(3));
        assert_eq!(options.second_parent, SecondParentStrategy::TestComplementary);
        assert_eq!(options.test_worker.len(), 3);
        assert_eq!(options.max_gene_length, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::parse(Path::new("repair.toml"), "sede = 1").unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFile { .. }));
    }

    #[test]
    fn validate_rejects_zero_headcount_and_missing_root() {
        let mut options = Options::new(PathBuf::from("."));
        options.headcount = 0;
        assert!(matches!(
            options.validate(),
            Err(ConfigurationError::InvalidOption { name: "headcount", .. })
        ));

        let options = Options::new(PathBuf::from("/definitely/not/here"));
        assert!(matches!(
            options.validate(),
            Err(ConfigurationError::MissingRoot(_))
        ));
    }
}
