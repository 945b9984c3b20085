use crate::catalog::StatementCatalog;
use crate::error::SelectionInfeasible;
use crate::fl::Suspiciousness;
use crate::options::DonorSelection;
use crate::random::RandomSource;
use crate::roulette::Roulette;
use crate::variant::{Base, Gene, Operation};

/// Which of the three edits a draw selected.
const OPERATIONS: [OperationKind; 3] = [
    OperationKind::Delete,
    OperationKind::Insert,
    OperationKind::Replace,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationKind {
    Delete,
    Insert,
    Replace,
}

/// Delete, insert or replace at suspicious statements, with donors taken from
/// anywhere in the original product sources.
#[derive(Debug, Clone)]
pub struct RandomMutation {
    catalog: StatementCatalog,
    donor_selection: DonorSelection,
}

/// A gene one base longer than its parent's.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOffspring {
    pub gene: Gene,
    pub appended: Base,
}

impl RandomMutation {
    pub fn new(catalog: StatementCatalog, donor_selection: DonorSelection) -> Self {
        Self {
            catalog,
            donor_selection,
        }
    }

    pub fn catalog(&self) -> &StatementCatalog {
        &self.catalog
    }

    /// One base per entry of `ranked`, in the same order.
    pub fn propose_bases(
        &self,
        ranked: &[Suspiciousness],
        rng: &mut RandomSource,
    ) -> Result<Vec<Base>, SelectionInfeasible> {
        ranked
            .iter()
            .map(|s| {
                let operation = self.random_operation(rng)?;
                Ok(Base::new(s.location.clone(), operation))
            })
            .collect()
    }

    fn random_operation(&self, rng: &mut RandomSource) -> Result<Operation, SelectionInfeasible> {
        let operation = match OPERATIONS[rng.below(OPERATIONS.len())] {
            OperationKind::Delete => Operation::Delete,
            OperationKind::Insert => Operation::Insert {
                donor: self.catalog.pick(self.donor_selection, rng)?.clone(),
            },
            OperationKind::Replace => Operation::Replace {
                donor: self.catalog.pick(self.donor_selection, rng)?.clone(),
            },
        };
        Ok(operation)
    }

    /// Extend `parent` by one base at a statement drawn from `ranked`,
    /// weighted by suspiciousness.
    pub fn mutate(
        &self,
        parent: &Gene,
        ranked: &[Suspiciousness],
        max_gene_length: usize,
        rng: &mut RandomSource,
    ) -> Result<MutationOffspring, SelectionInfeasible> {
        if parent.len() >= max_gene_length {
            return Err(SelectionInfeasible::GeneTooLong);
        }
        let roulette = Roulette::new(ranked, |s| s.value)
            .map_err(|_| SelectionInfeasible::NoSuspiciousStatements)?;
        let target = roulette.spin(rng);

        let appended = self
            .propose_bases(std::slice::from_ref(target), rng)?
            .pop()
            .ok_or(SelectionInfeasible::EmptyCandidates)?;
        Ok(MutationOffspring {
            gene: parent.with_base(appended.clone()),
            appended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{GeneratedFile, GeneratedSource, SourceKind};
    use crate::test_results::tests::location_at;

    fn mutation() -> RandomMutation {
        let source = GeneratedSource::new([GeneratedFile::new(
            "A.java".into(),
            SourceKind::Product,
            "class A { void f() { a(); b(); return; } }".into(),
        )
        .unwrap()]);
        RandomMutation::new(StatementCatalog::from_source(&source), DonorSelection::Uniform)
    }

    fn ranked() -> Vec<Suspiciousness> {
        (1..=30)
            .map(|line| Suspiciousness {
                location: location_at("A.java", line),
                value: 1.0 / line as f64,
            })
            .collect()
    }

    #[test]
    fn one_base_per_suspicious_statement() {
        let mutation = mutation();
        let ranked = ranked();
        let mut rng = RandomSource::seeded(5);
        let bases = mutation.propose_bases(&ranked, &mut rng).unwrap();

        assert_eq!(bases.len(), ranked.len());
        for (base, s) in bases.iter().zip(&ranked) {
            assert_eq!(base.location, s.location);
            assert_ne!(base.operation, Operation::NoOp);
            if let Some(donor) = base.operation.donor() {
                assert!(mutation.catalog().entries().iter().any(|e| &e.donor == donor));
            }
        }
        for name in ["delete", "insert", "replace"] {
            assert!(
                bases.iter().any(|b| b.operation.name() == name),
                "30 draws should produce at least one {name}"
            );
        }
    }

    #[test]
    fn mutate_appends_one_base() {
        let mutation = mutation();
        let mut rng = RandomSource::seeded(9);
        let parent = Gene::default();

        let child = mutation.mutate(&parent, &ranked(), 2, &mut rng).unwrap();
        assert_eq!(child.gene.len(), 1);
        assert_eq!(child.gene.bases()[0], child.appended);

        let grown = mutation.mutate(&child.gene, &ranked(), 2, &mut rng).unwrap();
        assert_eq!(grown.gene.len(), 2);
        assert_eq!(
            mutation.mutate(&grown.gene, &ranked(), 2, &mut rng).unwrap_err(),
            SelectionInfeasible::GeneTooLong
        );
        assert_eq!(
            mutation.mutate(&parent, &[], 2, &mut rng).unwrap_err(),
            SelectionInfeasible::NoSuspiciousStatements
        );
    }

    #[test]
    fn same_seed_same_bases() {
        let mutation = mutation();
        let a = mutation
            .propose_bases(&ranked(), &mut RandomSource::seeded(1))
            .unwrap();
        let b = mutation
            .propose_bases(&ranked(), &mut RandomSource::seeded(1))
            .unwrap();
        assert_eq!(a, b);
    }
}
