use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tempfile::TempDir;

use crate::builder::{BuildResult, ProjectBuilder};
use crate::runner::{TestRequest, TestRunner};
use crate::source::{GeneratedSource, SourceKind};
use crate::test_results::TestResults;
use crate::variant::VariantId;

/// Build and test outcome of one generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub build: BuildResult,
    pub test_results: TestResults,
}

impl Evaluation {
    /// A program that never reached the compiler.
    pub fn invalid_source(diagnostics: impl Into<String>) -> Self {
        Self {
            build: BuildResult::failure(diagnostics),
            test_results: TestResults::empty(),
        }
    }
}

/// Builds and tests generated programs in a bounded pool, one scratch
/// directory per variant.
pub struct Evaluator {
    builder: ProjectBuilder,
    runner: Box<dyn TestRunner>,
    scratch: TempDir,
    pool: rayon::ThreadPool,
}

impl Evaluator {
    pub fn new(builder: ProjectBuilder, runner: Box<dyn TestRunner>, workers: usize) -> Result<Self> {
        let scratch = TempDir::with_prefix("genrepair-")
            .context("failed to create scratch directory")?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("genrepair-eval-{i}"))
            .build()
            .context("failed to start evaluation pool")?;
        Ok(Self {
            builder,
            runner,
            scratch,
            pool,
        })
    }

    /// Build then test `source`. Failures are logged and folded into the
    /// result: a failed build, or empty test results.
    pub fn evaluate(&self, id: VariantId, source: &GeneratedSource) -> Evaluation {
        let workdir = self.workdir(id);
        if let Err(e) = fs::create_dir_all(&workdir) {
            tracing::warn!(variant = %id, stage = "build", error = %e, "cannot create work dir");
            return Evaluation::invalid_source(format!("cannot create {:?}: {e}", workdir));
        }

        let build = self.builder.build(source, &workdir);
        if !build.success {
            tracing::info!(
                variant = %id,
                stage = "build",
                diagnostics = %first_line(&build.diagnostics),
                "build failed"
            );
            self.cleanup(&workdir);
            return Evaluation {
                build,
                test_results: TestResults::empty(),
            };
        }

        let mut targets = Vec::new();
        let mut tests = Vec::new();
        for file in source.files() {
            let names = build.fqns_of(&file.path).map(String::from);
            match file.kind {
                SourceKind::Product => targets.extend(names),
                SourceKind::Test => tests.extend(names),
            }
        }

        let request = TestRequest {
            workdir: &workdir,
            build: &build,
            targets,
            tests,
        };
        let test_results = match self.runner.run(&request) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(variant = %id, stage = "test", error = %e, "test execution failed");
                TestResults::empty()
            }
        };
        self.cleanup(&workdir);

        Evaluation {
            build,
            test_results,
        }
    }

    /// Evaluate every job in parallel, results in job order.
    ///
    /// Jobs that have not started when `deadline` passes are not evaluated and
    /// come back as `None`.
    pub fn evaluate_all(
        &self,
        jobs: &[(VariantId, &GeneratedSource)],
        deadline: Option<Instant>,
    ) -> Vec<Option<Evaluation>> {
        self.pool.install(|| {
            jobs.par_iter()
                .map(|(id, source)| {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        tracing::debug!(variant = %id, "deadline passed, not evaluated");
                        return None;
                    }
                    Some(self.evaluate(*id, source))
                })
                .collect()
        })
    }

    fn workdir(&self, id: VariantId) -> PathBuf {
        self.scratch.path().join(format!("variant-{}", id.0))
    }

    fn cleanup(&self, workdir: &Path) {
        if let Err(e) = fs::remove_dir_all(workdir) {
            tracing::debug!(dir = ?workdir, error = %e, "failed to remove work dir");
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::builder::tests::CopyCompiler;
    use crate::error::TestExecutionFailure;
    use crate::source::GeneratedFile;
    use crate::test_results::TestResult;
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    /// Runs every test type in-process: a test passes unless the binary of
    /// the first target contains `BUG`. Each test covers every line of the
    /// target that mentions `x`.
    pub(crate) struct GrepRunner;

    impl TestRunner for GrepRunner {
        fn run(&self, request: &TestRequest<'_>) -> Result<TestResults, TestExecutionFailure> {
            let target = request.targets.first().cloned().unwrap_or_default();
            let path = request.build.path_of_fqn(&target).map(PathBuf::from);
            let class = request
                .workdir
                .join(crate::builder::BIN_DIR)
                .join(format!("{}.class", target.replace('.', "/")));
            let binary = fs::read_to_string(class)?;
            let lines: BTreeSet<u32> = binary
                .lines()
                .enumerate()
                .filter(|(_, l)| l.contains('x'))
                .map(|(i, _)| i as u32 + 1)
                .collect();

            let results = request
                .tests
                .iter()
                .map(|test| TestResult {
                    id: format!("{test}.check"),
                    passed: !binary.contains("BUG"),
                    coverage: path
                        .iter()
                        .map(|p| (p.clone(), lines.clone()))
                        .collect::<BTreeMap<_, _>>(),
                })
                .collect();
            Ok(TestResults::new(results))
        }
    }

    struct FailingRunner;

    impl TestRunner for FailingRunner {
        fn run(&self, _: &TestRequest<'_>) -> Result<TestResults, TestExecutionFailure> {
            Err(TestExecutionFailure::Timeout(Duration::from_secs(1)))
        }
    }

    fn source(body: &str) -> GeneratedSource {
        GeneratedSource::new([
            GeneratedFile::new(
                "src/A.java".into(),
                SourceKind::Product,
                format!("package a;\nclass A {{\n  int f(int x) {{\n{body}\n  }}\n}}\n"),
            )
            .unwrap(),
            GeneratedFile::new(
                "test/ATest.java".into(),
                SourceKind::Test,
                "package a;\nclass ATest {}\n".into(),
            )
            .unwrap(),
        ])
    }

    fn evaluator(runner: Box<dyn TestRunner>) -> Evaluator {
        let builder = ProjectBuilder::new(Box::new(CopyCompiler::default()), Vec::new());
        Evaluator::new(builder, runner, 2).unwrap()
    }

    #[test]
    fn evaluates_build_and_tests() {
        let evaluator = evaluator(Box::new(GrepRunner));
        let ok = evaluator.evaluate(VariantId(0), &source("    return x;"));
        assert!(ok.build.success);
        assert!(ok.test_results.all_passed());
        assert_eq!(ok.test_results.results()[0].id, "a.ATest.check");

        let buggy = evaluator.evaluate(VariantId(1), &source("    BUG(); return x;"));
        assert!(buggy.build.success);
        assert_eq!(buggy.test_results.failed_count(), 1);
    }

    #[test]
    fn failures_are_contained() {
        let evaluator = evaluator(Box::new(FailingRunner));
        let timed_out = evaluator.evaluate(VariantId(0), &source("    return x;"));
        assert!(timed_out.build.success);
        assert!(timed_out.test_results.is_empty());

        let broken = evaluator.evaluate(VariantId(1), &source("    COMPILE_ERROR();"));
        assert!(!broken.build.success);
        assert!(broken.test_results.is_empty());
    }

    #[test]
    fn parallel_results_keep_job_order() {
        let evaluator = evaluator(Box::new(GrepRunner));
        let sources: Vec<GeneratedSource> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    source(&format!("    return x + {i};"))
                } else {
                    source(&format!("    BUG({i}); return x;"))
                }
            })
            .collect();
        let jobs: Vec<(VariantId, &GeneratedSource)> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (VariantId(i as u64), s))
            .collect();

        let results = evaluator.evaluate_all(&jobs, None);
        for (i, result) in results.iter().enumerate() {
            let result = result.as_ref().unwrap();
            assert_eq!(result.test_results.all_passed(), i % 2 == 0, "job {i}");
        }

        let expired = evaluator.evaluate_all(&jobs, Some(Instant::now()));
        assert!(expired.iter().all(Option::is_none));
    }
}
