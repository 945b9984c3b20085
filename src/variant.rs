use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::{Location, StatementKind};
use crate::builder::BuildResult;
use crate::source::GeneratedSource;
use crate::test_results::TestResults;

/// Run-unique, monotonically increasing variant identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantId(pub u64);

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A statement copied from the original program as Insert/Replace payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DonorStatement {
    pub kind: StatementKind,
    pub text: String,
    pub origin: Location,
}

/// One edit applied at a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
pub enum Operation {
    /// Remove the statement.
    Delete,

    /// Insert a copy of the donor immediately before the statement.
    Insert { donor: DonorStatement },

    /// Replace the statement with a copy of the donor.
    Replace { donor: DonorStatement },

    NoOp,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Delete => "delete",
            Operation::Insert { .. } => "insert",
            Operation::Replace { .. } => "replace",
            Operation::NoOp => "noop",
        }
    }

    pub fn donor(&self) -> Option<&DonorStatement> {
        match self {
            Operation::Insert { donor } | Operation::Replace { donor } => Some(donor),
            Operation::Delete | Operation::NoOp => None,
        }
    }
}

/// One edit instruction: where and what.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Base {
    pub location: Location,
    pub operation: Operation,
}

impl Base {
    pub fn new(location: Location, operation: Operation) -> Self {
        Self {
            location,
            operation,
        }
    }
}

/// Ordered edits that turn the original program into a variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Gene {
    bases: Vec<Base>,
}

impl Gene {
    pub fn new(bases: Vec<Base>) -> Self {
        Self { bases }
    }

    pub fn bases(&self) -> &[Base] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Copy of this gene with `base` appended.
    pub fn with_base(&self, base: Base) -> Self {
        let mut bases = self.bases.clone();
        bases.push(base);
        Self { bases }
    }

    /// `self[..i] ++ other[j..]`.
    pub fn splice(&self, i: usize, other: &Gene, j: usize) -> Self {
        let bases = self.bases[..i]
            .iter()
            .chain(other.bases[j..].iter())
            .cloned()
            .collect();
        Self { bases }
    }
}

/// How a variant was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum HistoricalElement {
    Initial,
    Mutation {
        parent: VariantId,
        appended: Base,
    },
    Crossover {
        parent1: VariantId,
        parent2: VariantId,
        split1: usize,
        split2: usize,
    },
}

impl HistoricalElement {
    pub fn parents(&self) -> Vec<VariantId> {
        match self {
            HistoricalElement::Initial => Vec::new(),
            HistoricalElement::Mutation { parent, .. } => vec![*parent],
            HistoricalElement::Crossover {
                parent1, parent2, ..
            } => vec![*parent1, *parent2],
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            HistoricalElement::Initial => "initial",
            HistoricalElement::Mutation { .. } => "mutation",
            HistoricalElement::Crossover { .. } => "crossover",
        }
    }
}

/// Total order over evaluation outcomes, ties allowed.
///
/// A failed build ranks below every successful build; successful builds rank
/// by the share of passing tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Fitness {
    BuildFailed,
    Evaluated { passed: usize, total: usize },
}

impl Fitness {
    pub fn of(build: &BuildResult, tests: &TestResults) -> Self {
        if build.success {
            Fitness::Evaluated {
                passed: tests.passed_count(),
                total: tests.total(),
            }
        } else {
            Fitness::BuildFailed
        }
    }

    /// Passing share in `[0, 1]`; `None` for a failed build.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Fitness::BuildFailed => None,
            Fitness::Evaluated { total: 0, .. } => Some(0.0),
            Fitness::Evaluated { passed, total } => Some(passed as f64 / total as f64),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(*self, Fitness::Evaluated { passed, total } if total > 0 && passed == total)
    }
}

impl Ord for Fitness {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.value(), other.value()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.total_cmp(&b),
        }
    }
}

impl PartialOrd for Fitness {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Fitness {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fitness {}

/// Immutable snapshot of one candidate program and its evaluation.
#[derive(Debug)]
pub struct Variant {
    id: VariantId,
    generation: u32,
    gene: Gene,
    source: Arc<GeneratedSource>,
    build: BuildResult,
    test_results: TestResults,
    fitness: Fitness,
    history: HistoricalElement,
}

impl Variant {
    pub fn new(
        id: VariantId,
        generation: u32,
        gene: Gene,
        history: HistoricalElement,
        source: Arc<GeneratedSource>,
        build: BuildResult,
        test_results: TestResults,
    ) -> Self {
        let fitness = Fitness::of(&build, &test_results);
        Self {
            id,
            generation,
            gene,
            source,
            build,
            test_results,
            fitness,
            history,
        }
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn gene(&self) -> &Gene {
        &self.gene
    }

    pub fn source(&self) -> &Arc<GeneratedSource> {
        &self.source
    }

    pub fn build(&self) -> &BuildResult {
        &self.build
    }

    pub fn test_results(&self) -> &TestResults {
        &self.test_results
    }

    pub fn fitness(&self) -> Fitness {
        self.fitness
    }

    pub fn history(&self) -> &HistoricalElement {
        &self.history
    }

    /// Builds and passes every test.
    pub fn is_complete(&self) -> bool {
        self.fitness.is_complete()
    }
}
