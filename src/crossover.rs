use std::cmp::{Ordering, Reverse};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::SelectionInfeasible;
use crate::options::SecondParentStrategy;
use crate::random::RandomSource;
use crate::variant::{Base, Gene, Variant, VariantId};

/// Picks the partner of an already chosen first parent.
///
/// Implementations never return the first parent and report
/// [`SelectionInfeasible::NoSecondParent`] when nobody else is left.
pub trait SecondParentSelection: Send + Sync {
    fn name(&self) -> &'static str;

    fn select(
        &self,
        population: &[Arc<Variant>],
        first: &Variant,
        rng: &mut RandomSource,
    ) -> Result<Arc<Variant>, SelectionInfeasible>;
}

fn others<'p>(population: &'p [Arc<Variant>], first: &Variant) -> Vec<&'p Arc<Variant>> {
    population.iter().filter(|v| v.id() != first.id()).collect()
}

/// The fittest other variant; shorter genes, then lower ids win ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct EliteSelection;

impl SecondParentSelection for EliteSelection {
    fn name(&self) -> &'static str {
        "elite"
    }

    fn select(
        &self,
        population: &[Arc<Variant>],
        first: &Variant,
        _rng: &mut RandomSource,
    ) -> Result<Arc<Variant>, SelectionInfeasible> {
        others(population, first)
            .into_iter()
            .max_by_key(|v| (v.fitness(), Reverse(v.gene().len()), Reverse(v.id())))
            .cloned()
            .ok_or(SelectionInfeasible::NoSecondParent)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelection;

impl SecondParentSelection for RandomSelection {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(
        &self,
        population: &[Arc<Variant>],
        first: &Variant,
        rng: &mut RandomSource,
    ) -> Result<Arc<Variant>, SelectionInfeasible> {
        let candidates = others(population, first);
        rng.choose(&candidates)
            .map(|v| Arc::clone(v))
            .ok_or(SelectionInfeasible::NoSecondParent)
    }
}

/// The variant passing most of the tests the first parent fails.
///
/// Ties go to higher fitness, then to the lower id.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestComplementarySelection;

impl SecondParentSelection for TestComplementarySelection {
    fn name(&self) -> &'static str {
        "test-complementary"
    }

    fn select(
        &self,
        population: &[Arc<Variant>],
        first: &Variant,
        _rng: &mut RandomSource,
    ) -> Result<Arc<Variant>, SelectionInfeasible> {
        let failing = first.test_results().failed_ids();
        others(population, first)
            .into_iter()
            .max_by_key(|v| {
                let passing = v.test_results().passed_ids();
                let complemented = failing.intersection(&passing).count();
                (complemented, v.fitness(), Reverse(v.id()))
            })
            .cloned()
            .ok_or(SelectionInfeasible::NoSecondParent)
    }
}

/// The variant whose gene differs most from the first parent's.
///
/// Distance is the Jaccard distance between the two base sets; ties are
/// broken by a uniform draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneSimilaritySelection;

/// `1 - |a ∩ b| / |a ∪ b|` as an exact fraction; two empty genes are at
/// distance zero.
fn gene_distance(a: &Gene, b: &Gene) -> (usize, usize) {
    let a: HashSet<&Base> = a.bases().iter().collect();
    let b: HashSet<&Base> = b.bases().iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return (0, 1);
    }
    let shared = a.intersection(&b).count();
    (union - shared, union)
}

fn cmp_fraction(a: (usize, usize), b: (usize, usize)) -> Ordering {
    (a.0 * b.1).cmp(&(b.0 * a.1))
}

impl SecondParentSelection for GeneSimilaritySelection {
    fn name(&self) -> &'static str {
        "gene-similarity"
    }

    fn select(
        &self,
        population: &[Arc<Variant>],
        first: &Variant,
        rng: &mut RandomSource,
    ) -> Result<Arc<Variant>, SelectionInfeasible> {
        let scored: Vec<(&Arc<Variant>, (usize, usize))> = others(population, first)
            .into_iter()
            .map(|v| (v, gene_distance(first.gene(), v.gene())))
            .collect();
        let best = scored
            .iter()
            .map(|(_, d)| *d)
            .max_by(|a, b| cmp_fraction(*a, *b))
            .ok_or(SelectionInfeasible::NoSecondParent)?;
        let tied: Vec<&Arc<Variant>> = scored
            .iter()
            .filter(|(_, d)| cmp_fraction(*d, best) == Ordering::Equal)
            .map(|(v, _)| *v)
            .collect();
        rng.choose(&tied)
            .map(|v| Arc::clone(v))
            .ok_or(SelectionInfeasible::NoSecondParent)
    }
}

impl SecondParentStrategy {
    pub fn build(self) -> Box<dyn SecondParentSelection> {
        match self {
            SecondParentStrategy::Elite => Box::new(EliteSelection),
            SecondParentStrategy::Random => Box::new(RandomSelection),
            SecondParentStrategy::TestComplementary => Box::new(TestComplementarySelection),
            SecondParentStrategy::GeneSimilarity => Box::new(GeneSimilaritySelection),
        }
    }
}

/// A crossover child and how it was cut.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverOffspring {
    pub gene: Gene,
    pub parent1: VariantId,
    pub parent2: VariantId,
    pub split1: usize,
    pub split2: usize,
}

/// Prefix of one parent's gene joined to the suffix of another's.
pub struct SinglePointCrossover {
    strategy: Box<dyn SecondParentSelection>,
}

impl SinglePointCrossover {
    pub fn new(strategy: Box<dyn SecondParentSelection>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &dyn SecondParentSelection {
        self.strategy.as_ref()
    }

    /// First parent uniform, second by strategy, then one cut per parent.
    pub fn cross(
        &self,
        population: &[Arc<Variant>],
        max_gene_length: usize,
        rng: &mut RandomSource,
    ) -> Result<CrossoverOffspring, SelectionInfeasible> {
        let first = rng
            .choose(population)
            .ok_or(SelectionInfeasible::EmptyCandidates)?;
        let second = self.strategy.select(population, first, rng)?;

        let split1 = rng.up_to(first.gene().len());
        let split2 = rng.up_to(second.gene().len());
        let gene = first.gene().splice(split1, second.gene(), split2);
        if gene.len() > max_gene_length {
            return Err(SelectionInfeasible::GeneTooLong);
        }

        Ok(CrossoverOffspring {
            gene,
            parent1: first.id(),
            parent2: second.id(),
            split1,
            split2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::variant;
    use crate::variant::HistoricalElement;
    use crate::variant::tests::gene_of;

    fn population() -> Vec<Arc<Variant>> {
        vec![
            Arc::new(variant(0, HistoricalElement::Initial, gene_of(&[1, 2]), &[false, false, true])),
            Arc::new(variant(1, HistoricalElement::Initial, gene_of(&[1, 2, 3]), &[true, false, true])),
            Arc::new(variant(2, HistoricalElement::Initial, gene_of(&[9]), &[true, false, true])),
            Arc::new(variant(3, HistoricalElement::Initial, gene_of(&[1]), &[false, true, false])),
        ]
    }

    fn all_strategies() -> Vec<Box<dyn SecondParentSelection>> {
        [
            SecondParentStrategy::Elite,
            SecondParentStrategy::Random,
            SecondParentStrategy::TestComplementary,
            SecondParentStrategy::GeneSimilarity,
        ]
        .into_iter()
        .map(SecondParentStrategy::build)
        .collect()
    }

    #[test]
    fn no_strategy_returns_the_first_parent() {
        let population = population();
        let mut rng = RandomSource::seeded(4);
        for strategy in all_strategies() {
            for first in &population {
                for _ in 0..20 {
                    let second = strategy.select(&population, first, &mut rng).unwrap();
                    assert_ne!(second.id(), first.id(), "{}", strategy.name());
                }
            }
        }
    }

    #[test]
    fn a_lone_variant_has_no_partner() {
        let population = population();
        let lone = &population[..1];
        let mut rng = RandomSource::seeded(4);
        for strategy in all_strategies() {
            assert_eq!(
                strategy.select(lone, &lone[0], &mut rng).unwrap_err(),
                SelectionInfeasible::NoSecondParent
            );
        }
    }

    #[test]
    fn elite_prefers_fitness_then_short_genes() {
        let population = population();
        let mut rng = RandomSource::seeded(0);
        // #1 and #2 both pass 2 of 3; #2 has the shorter gene
        let second = EliteSelection.select(&population, &population[0], &mut rng).unwrap();
        assert_eq!(second.id(), VariantId(2));
        let second = EliteSelection.select(&population, &population[2], &mut rng).unwrap();
        assert_eq!(second.id(), VariantId(1));
    }

    #[test]
    fn test_complementary_covers_failing_tests() {
        let population = population();
        let mut rng = RandomSource::seeded(0);
        // #3 fails t0 and t2, #1 and #2 pass both; #2 loses the id tie-break
        let second = TestComplementarySelection
            .select(&population, &population[3], &mut rng)
            .unwrap();
        assert_eq!(second.id(), VariantId(1));
        // #0 fails t0 and t1; every candidate passes exactly one of them
        let second = TestComplementarySelection
            .select(&population, &population[0], &mut rng)
            .unwrap();
        assert_eq!(second.id(), VariantId(1));
    }

    #[test]
    fn gene_similarity_prefers_distant_genes() {
        assert_eq!(gene_distance(&gene_of(&[1, 2]), &gene_of(&[9])), (3, 3));
        assert_eq!(gene_distance(&gene_of(&[1, 2]), &gene_of(&[1, 2, 3])), (1, 3));
        assert_eq!(gene_distance(&Gene::default(), &Gene::default()), (0, 1));

        let population = population();
        let mut rng = RandomSource::seeded(0);
        let second = GeneSimilaritySelection
            .select(&population, &population[0], &mut rng)
            .unwrap();
        assert_eq!(second.id(), VariantId(2));
    }

    #[test]
    fn child_is_prefix_plus_suffix() {
        let population = population();
        let crossover = SinglePointCrossover::new(SecondParentStrategy::Random.build());
        let mut rng = RandomSource::seeded(21);

        for _ in 0..50 {
            let child = crossover.cross(&population, 10, &mut rng).unwrap();
            let p1 = population.iter().find(|v| v.id() == child.parent1).unwrap();
            let p2 = population.iter().find(|v| v.id() == child.parent2).unwrap();
            assert_ne!(p1.id(), p2.id());
            assert!(child.gene.len() <= p1.gene().len() + p2.gene().len());
            assert_eq!(child.gene, p1.gene().splice(child.split1, p2.gene(), child.split2));
        }
    }

    #[test]
    fn overlong_children_are_infeasible() {
        let population = population();
        let crossover = SinglePointCrossover::new(SecondParentStrategy::Elite.build());
        let mut rng = RandomSource::seeded(2);
        let outcomes: Vec<_> = (0..50)
            .map(|_| crossover.cross(&population, 0, &mut rng))
            .collect();
        assert!(outcomes.iter().all(|o| match o {
            Ok(child) => child.gene.is_empty(),
            Err(e) => *e == SelectionInfeasible::GeneTooLong,
        }));
    }
}
