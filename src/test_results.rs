use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ast::Location;

/// Outcome and coverage of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Fully qualified test identifier, for example `a.BTest.testAbs`.
    pub id: String,

    pub passed: bool,

    /// Executed line numbers per product file (project-relative path).
    #[serde(default)]
    pub coverage: BTreeMap<PathBuf, BTreeSet<u32>>,
}

impl TestResult {
    /// A test executed a statement iff it executed the statement's first line.
    pub fn executed(&self, path: &Path, location: &Location) -> bool {
        self.coverage
            .get(path)
            .is_some_and(|lines| lines.contains(&location.lines.start))
    }
}

/// All test outcomes of one variant.
///
/// The empty value doubles as the "no test results" sentinel for variants
/// that failed to build or whose test worker failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    results: Vec<TestResult>,
}

impl TestResults {
    /// Results are kept sorted by test id; a repeated id keeps its first entry.
    pub fn new(mut results: Vec<TestResult>) -> Self {
        results.sort_by(|a, b| a.id.cmp(&b.id));
        results.dedup_by(|a, b| a.id == b.id);
        Self { results }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.total() - self.passed_count()
    }

    /// At least one test ran and none failed.
    pub fn all_passed(&self) -> bool {
        !self.is_empty() && self.failed_count() == 0
    }

    pub fn passed_ids(&self) -> BTreeSet<&str> {
        self.results
            .iter()
            .filter(|r| r.passed)
            .map(|r| r.id.as_str())
            .collect()
    }

    pub fn failed_ids(&self) -> BTreeSet<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.id.as_str())
            .collect()
    }

    /// `ef`: failing tests that executed the statement.
    pub fn failed_executing(&self, path: &Path, location: &Location) -> usize {
        self.count(|r| !r.passed && r.executed(path, location))
    }

    /// `nf`: failing tests that did not execute the statement.
    pub fn failed_not_executing(&self, path: &Path, location: &Location) -> usize {
        self.count(|r| !r.passed && !r.executed(path, location))
    }

    /// `ep`: passing tests that executed the statement.
    pub fn passed_executing(&self, path: &Path, location: &Location) -> usize {
        self.count(|r| r.passed && r.executed(path, location))
    }

    fn count(&self, pred: impl Fn(&TestResult) -> bool) -> usize {
        self.results.iter().filter(|r| pred(r)).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ast::StatementKind;
    use crate::span::LineRange;

    pub(crate) fn result(id: &str, passed: bool, file: &str, lines: &[u32]) -> TestResult {
        let mut coverage = BTreeMap::new();
        if !lines.is_empty() {
            coverage.insert(PathBuf::from(file), lines.iter().copied().collect());
        }
        TestResult {
            id: id.to_string(),
            passed,
            coverage,
        }
    }

    pub(crate) fn location_at(file: &str, line: u32) -> Location {
        Location {
            file: PathBuf::from(file),
            path: vec![0, line as usize],
            kind: StatementKind::Expression,
            lines: LineRange {
                start: line,
                end: line,
            },
            text: "x();".to_string(),
        }
    }

    #[test]
    fn sufficient_statistics() {
        let results = TestResults::new(vec![
            result("t1", false, "A.java", &[3, 4]),
            result("t2", false, "A.java", &[4]),
            result("t3", true, "A.java", &[3]),
            result("t4", true, "A.java", &[5]),
        ]);
        let path = Path::new("A.java");
        let loc = location_at("A.java", 3);

        assert_eq!(results.failed_executing(path, &loc), 1);
        assert_eq!(results.failed_not_executing(path, &loc), 1);
        assert_eq!(results.passed_executing(path, &loc), 1);
        assert_eq!(results.failed_executing(Path::new("B.java"), &loc), 0);
    }

    #[test]
    fn empty_results_never_count_as_passing() {
        let empty = TestResults::empty();
        assert!(empty.is_empty());
        assert!(!empty.all_passed());

        let ok = TestResults::new(vec![result("t", true, "A.java", &[])]);
        assert!(ok.all_passed());
    }

    #[test]
    fn results_are_ordered_by_id() {
        let results = TestResults::new(vec![
            result("b", true, "A.java", &[]),
            result("a", false, "A.java", &[]),
            result("a", true, "A.java", &[]),
        ]);
        let ids: Vec<_> = results.results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
