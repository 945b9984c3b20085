use std::path::PathBuf;

use serde::Serialize;

use crate::builder::BuildResult;
use crate::engine::{GenerationSummary, RepairOutcome, StopReason};
use crate::fl::Suspiciousness;
use crate::source::GeneratedSource;
use crate::test_results::TestResults;
use crate::variant::{Fitness, Gene, HistoricalElement, Variant, VariantId};

/// Original program metadata.
#[derive(Debug, Clone, Serialize)]
pub struct InitialReport {
    pub build_success: bool,
    pub fitness: Fitness,
    pub passed: usize,
    pub total: usize,
    pub failed_tests: Vec<String>,
}

impl InitialReport {
    pub fn from_variant(v: &Variant) -> Self {
        Self::new(v.build(), v.test_results())
    }

    pub fn new(build: &BuildResult, tests: &TestResults) -> Self {
        Self {
            build_success: build.success,
            fitness: Fitness::of(build, tests),
            passed: tests.passed_count(),
            total: tests.total(),
            failed_tests: tests.failed_ids().into_iter().map(String::from).collect(),
        }
    }
}

/// One repaired program.
#[derive(Debug, Clone, Serialize)]
pub struct SolutionReport {
    pub id: VariantId,
    pub generation: u32,
    pub gene: Gene,
    pub history: HistoricalElement,

    /// Unified diff against the original program.
    pub diff: String,
}

impl SolutionReport {
    pub fn new(v: &Variant, original: &GeneratedSource) -> Self {
        Self {
            id: v.id(),
            generation: v.generation(),
            gene: v.gene().clone(),
            history: v.history().clone(),
            diff: crate::out::unified_diff(original, v.source()),
        }
    }
}

/// Machine-readable report for a repair run.
///
/// In `--json` mode we print this to stdout as pretty JSON.
#[derive(Debug, Serialize)]
pub struct RepairRunReport {
    /// Tool name, stable across versions.
    pub tool: &'static str,

    /// Current crate version.
    pub version: &'static str,

    /// The project root used for this run.
    pub project_root: PathBuf,

    pub seed: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<InitialReport>,

    /// Number of variants created, the original program included.
    pub variants: usize,

    pub elapsed_ms: u64,

    pub generations: Vec<GenerationSummary>,
    pub solutions: Vec<SolutionReport>,

    /// Optional high-level error message (for example an invalid configuration).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepairRunReport {
    pub fn success(project_root: PathBuf, seed: u64, outcome: &RepairOutcome) -> Self {
        let initial = outcome.store.initial();
        let original = initial.source();
        Self {
            tool: "genrepair",
            version: env!("CARGO_PKG_VERSION"),
            project_root,
            seed,
            stop: Some(outcome.stop),
            initial: Some(InitialReport::from_variant(initial)),
            variants: outcome.store.all().len(),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            generations: outcome.generations.clone(),
            solutions: outcome
                .solutions()
                .iter()
                .map(|v| SolutionReport::new(v, original))
                .collect(),
            error: None,
        }
    }

    pub fn failure(project_root: PathBuf, seed: u64, error: String) -> Self {
        Self {
            tool: "genrepair",
            version: env!("CARGO_PKG_VERSION"),
            project_root,
            seed,
            stop: None,
            initial: None,
            variants: 0,
            elapsed_ms: 0,
            generations: Vec::new(),
            solutions: Vec::new(),
            error: Some(error),
        }
    }

    pub fn found_solution(&self) -> bool {
        !self.solutions.is_empty()
    }
}

/// Machine-readable output of `genrepair localize`.
#[derive(Debug, Serialize)]
pub struct LocalizeReport {
    pub tool: &'static str,
    pub version: &'static str,
    pub project_root: PathBuf,
    pub formula: &'static str,
    pub initial: InitialReport,
    pub suspicious: Vec<Suspiciousness>,
}

impl LocalizeReport {
    pub fn new(
        project_root: PathBuf,
        formula: &'static str,
        initial: InitialReport,
        suspicious: Vec<Suspiciousness>,
    ) -> Self {
        Self {
            tool: "genrepair",
            version: env!("CARGO_PKG_VERSION"),
            project_root,
            formula,
            initial,
            suspicious,
        }
    }
}
