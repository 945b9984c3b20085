use serde::Serialize;

use crate::ast::Location;
use crate::options::FaultLocalizationKind;
use crate::source::GeneratedSource;
use crate::test_results::TestResults;

/// A statement and how likely it is to be faulty. `value` is in `(0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suspiciousness {
    pub location: Location,
    pub value: f64,
}

/// Coverage counts for one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spectrum {
    /// Failing tests that executed the statement.
    pub ef: usize,
    /// Failing tests that did not execute the statement.
    pub nf: usize,
    /// Passing tests that executed the statement.
    pub ep: usize,
}

/// A spectrum-based suspiciousness formula.
pub trait FaultLocalization: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score for one statement; `None` where the formula is undefined.
    fn formula(&self, spectrum: Spectrum) -> Option<f64>;

    /// Score every line of every product file.
    ///
    /// Each line maps to the innermost eligible statement covering it, so a
    /// statement spanning several lines is reported once per line.
    fn score(&self, source: &GeneratedSource, results: &TestResults) -> Vec<Suspiciousness> {
        let mut out = Vec::new();
        for ast in source.product_asts() {
            let path = ast.path();
            for line in 1..=ast.line_count() {
                let Some(location) = ast.infer(line).pop() else {
                    continue;
                };
                let spectrum = Spectrum {
                    ef: results.failed_executing(path, &location),
                    nf: results.failed_not_executing(path, &location),
                    ep: results.passed_executing(path, &location),
                };
                if let Some(value) = self.formula(spectrum).filter(|v| *v > 0.0) {
                    out.push(Suspiciousness { location, value });
                }
            }
        }
        out
    }
}

/// `ef / (ef + nf + ep)`
#[derive(Debug, Default, Clone, Copy)]
pub struct Jaccard;

impl FaultLocalization for Jaccard {
    fn name(&self) -> &'static str {
        "jaccard"
    }

    fn formula(&self, s: Spectrum) -> Option<f64> {
        let denominator = s.ef + s.nf + s.ep;
        (denominator > 0).then(|| s.ef as f64 / denominator as f64)
    }
}

/// `ef / sqrt((ef + nf) * (ef + ep))`
#[derive(Debug, Default, Clone, Copy)]
pub struct Ochiai;

impl FaultLocalization for Ochiai {
    fn name(&self) -> &'static str {
        "ochiai"
    }

    fn formula(&self, s: Spectrum) -> Option<f64> {
        let denominator = ((s.ef + s.nf) * (s.ef + s.ep)) as f64;
        (denominator > 0.0).then(|| s.ef as f64 / denominator.sqrt())
    }
}

impl FaultLocalizationKind {
    pub fn build(self) -> Box<dyn FaultLocalization> {
        match self {
            FaultLocalizationKind::Ochiai => Box::new(Ochiai),
            FaultLocalizationKind::Jaccard => Box::new(Jaccard),
        }
    }
}

/// Sort descending by value. Ties keep discovery order.
pub fn rank(mut suspiciousness: Vec<Suspiciousness>) -> Vec<Suspiciousness> {
    suspiciousness.sort_by(|a, b| b.value.total_cmp(&a.value));
    suspiciousness
}
