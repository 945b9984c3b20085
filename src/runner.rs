use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use wait_timeout::ChildExt;

use crate::builder::{BIN_DIR, BuildResult};
use crate::error::TestExecutionFailure;
use crate::test_results::{TestResult, TestResults};

/// File the worker writes next to the bin directory.
pub const RESULTS_FILE: &str = "test-results.json";

/// File receiving the worker's stdout and stderr.
pub const WORKER_LOG: &str = "worker.log";

/// Everything a test run needs to know about one built program.
#[derive(Debug)]
pub struct TestRequest<'a> {
    /// Build work dir; binaries live in `<workdir>/bin`.
    pub workdir: &'a Path,
    pub build: &'a BuildResult,

    /// Product type names under test.
    pub targets: Vec<String>,

    /// Test type names to execute.
    pub tests: Vec<String>,
}

/// Executes the test suite of a built program.
pub trait TestRunner: Send + Sync {
    fn run(&self, request: &TestRequest<'_>) -> Result<TestResults, TestExecutionFailure>;
}

/// Runs the tests in a separate worker process per program.
#[derive(Debug, Clone)]
pub struct ProcessTestRunner {
    command: Vec<String>,
    project_root: PathBuf,
    classpath: Vec<PathBuf>,
    timeout: Duration,
}

impl ProcessTestRunner {
    pub fn new(
        command: Vec<String>,
        project_root: PathBuf,
        classpath: Vec<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            command,
            project_root,
            classpath,
            timeout,
        }
    }

    fn args(&self, bin: &Path, request: &TestRequest<'_>) -> Vec<String> {
        let classpath: Vec<String> = self
            .classpath
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        let separator = if cfg!(windows) { ";" } else { ":" };

        let mut args: Vec<String> = self.command[1..].to_vec();
        args.extend([
            "-b".to_string(),
            bin.to_string_lossy().to_string(),
            "-c".to_string(),
            classpath.join(separator),
            "-s".to_string(),
            request.targets.join(","),
            "-t".to_string(),
            request.tests.join(","),
        ]);
        args
    }
}

impl TestRunner for ProcessTestRunner {
    fn run(&self, request: &TestRequest<'_>) -> Result<TestResults, TestExecutionFailure> {
        let program = self.command.first().cloned().unwrap_or_default();
        let bin = request.workdir.join(BIN_DIR);
        let results_path = request.workdir.join(RESULTS_FILE);
        if results_path.exists() {
            fs::remove_file(&results_path)?;
        }

        let log = File::create(request.workdir.join(WORKER_LOG))?;
        let start = Instant::now();
        let mut command = Command::new(&program);
        command
            .args(self.args(&bin, request))
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group, so a timeout also reaches the JVMs it forks.
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|source| TestExecutionFailure::Spawn {
                program: program.clone(),
                source,
            })?;

        let status = match child
            .wait_timeout(self.timeout)
            .map_err(TestExecutionFailure::Wait)?
        {
            Some(status) => status,
            None => {
                kill_worker(&mut child);
                return Err(TestExecutionFailure::Timeout(self.timeout));
            }
        };
        tracing::debug!(
            stage = "test",
            code = ?status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "test worker exited"
        );

        if !results_path.is_file() {
            return Err(TestExecutionFailure::MissingResults(results_path));
        }
        let text = fs::read_to_string(&results_path)?;
        let report: WorkerReport = serde_json::from_str(&text)?;
        Ok(report.into_results(request.build))
    }
}

/// Kill the worker's process group and reap the worker.
fn kill_worker(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        // SAFETY: signals only the group created for this worker at spawn.
        if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
            tracing::warn!(
                stage = "test",
                pid = pgid,
                error = %std::io::Error::last_os_error(),
                "failed to kill test worker group"
            );
        }
    }
    #[cfg(not(unix))]
    if let Err(e) = child.kill() {
        tracing::warn!(stage = "test", pid = child.id(), error = %e, "failed to kill test worker");
    }

    if let Err(e) = child.wait() {
        tracing::warn!(stage = "test", pid = child.id(), error = %e, "failed to reap test worker");
    }
}

/// Result file written by the worker. Coverage is keyed by type name.
#[derive(Debug, Deserialize)]
struct WorkerReport {
    tests: Vec<WorkerTest>,
}

#[derive(Debug, Deserialize)]
struct WorkerTest {
    id: String,
    passed: bool,
    #[serde(default)]
    coverage: BTreeMap<String, BTreeSet<u32>>,
}

impl WorkerReport {
    /// Map type-keyed coverage to product files. Types that belong to no
    /// compiled source (test classes, libraries) are dropped.
    fn into_results(self, build: &BuildResult) -> TestResults {
        let results = self
            .tests
            .into_iter()
            .map(|test| {
                let mut coverage: BTreeMap<PathBuf, BTreeSet<u32>> = BTreeMap::new();
                for (fqn, lines) in test.coverage {
                    if let Some(path) = build.path_of_fqn(&fqn) {
                        coverage.entry(path.to_path_buf()).or_default().extend(lines);
                    }
                }
                TestResult {
                    id: test.id,
                    passed: test.passed,
                    coverage,
                }
            })
            .collect();
        TestResults::new(results)
    }
}
