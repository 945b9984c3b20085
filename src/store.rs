use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::StoreError;
use crate::variant::{Fitness, Gene, HistoricalElement, Variant, VariantId};

/// Every variant of a run: the initial program, the current population and
/// the append-only history. Nothing is removed while a run is in progress.
#[derive(Debug)]
pub struct VariantStore {
    initial: Arc<Variant>,
    current: Vec<Arc<Variant>>,
    all: Vec<Arc<Variant>>,
    index: HashMap<VariantId, usize>,
    source_digests: HashSet<String>,
    generation: u32,
    next_id: u64,
}

impl VariantStore {
    pub fn new(initial: Variant) -> Result<Self, StoreError> {
        if !matches!(initial.history(), HistoricalElement::Initial) {
            return Err(StoreError::NotInitial(initial.id()));
        }
        let initial = Arc::new(initial);
        let mut store = Self {
            initial: Arc::clone(&initial),
            current: vec![Arc::clone(&initial)],
            all: Vec::new(),
            index: HashMap::new(),
            source_digests: HashSet::new(),
            generation: 0,
            next_id: initial.id().0 + 1,
        };
        store.record(initial);
        Ok(store)
    }

    /// Allocate the id of a not yet created variant.
    pub fn next_id(&mut self) -> VariantId {
        let id = VariantId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn initial(&self) -> &Arc<Variant> {
        &self.initial
    }

    pub fn current(&self) -> &[Arc<Variant>] {
        &self.current
    }

    pub fn all(&self) -> &[Arc<Variant>] {
        &self.all
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn get(&self, id: VariantId) -> Option<&Arc<Variant>> {
        self.index.get(&id).map(|&i| &self.all[i])
    }

    /// Whether a variant with the same generated program already exists.
    pub fn contains_source(&self, digest: &str) -> bool {
        self.source_digests.contains(digest)
    }

    /// Append a newly evaluated variant. Its parents must already be stored.
    pub fn add(&mut self, variant: Variant) -> Result<Arc<Variant>, StoreError> {
        let id = variant.id();
        if self.index.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        if matches!(variant.history(), HistoricalElement::Initial) {
            return Err(StoreError::SecondInitial(id));
        }
        for parent in variant.history().parents() {
            if !self.index.contains_key(&parent) {
                return Err(StoreError::UnknownParent { child: id, parent });
            }
        }
        let variant = Arc::new(variant);
        self.record(Arc::clone(&variant));
        Ok(variant)
    }

    fn record(&mut self, variant: Arc<Variant>) {
        self.next_id = self.next_id.max(variant.id().0 + 1);
        self.source_digests.insert(variant.source().digest());
        self.index.insert(variant.id(), self.all.len());
        self.all.push(variant);
    }

    /// Replace the current population and advance the generation counter.
    pub fn proceed(&mut self, survivors: Vec<Arc<Variant>>) {
        self.current = survivors;
        self.generation += 1;
    }

    pub fn solutions(&self) -> Vec<Arc<Variant>> {
        self.all
            .iter()
            .filter(|v| v.is_complete())
            .cloned()
            .collect()
    }

    /// All ancestors of `id` (excluding itself), nearest first.
    ///
    /// Parents always carry smaller ids than their children, so the walk
    /// terminates at the initial variant.
    pub fn lineage(&self, id: VariantId) -> Vec<Arc<Variant>> {
        let mut seen = BTreeSet::new();
        let mut queue = std::collections::VecDeque::new();
        let mut out = Vec::new();

        if let Some(v) = self.get(id) {
            queue.extend(v.history().parents());
        }
        while let Some(parent) = queue.pop_front() {
            if !seen.insert(parent) {
                continue;
            }
            if let Some(v) = self.get(parent) {
                queue.extend(v.history().parents());
                out.push(Arc::clone(v));
            }
        }
        out
    }

    /// Read-only view for exporters.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            generation: self.generation,
            initial: self.initial.id(),
            current: self.current.iter().map(|v| v.id()).collect(),
            variants: self.all.iter().map(|v| VariantRecord::from(v.as_ref())).collect(),
        }
    }
}

/// Serializable summary of one variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantRecord {
    pub id: VariantId,
    pub generation: u32,
    pub gene: Gene,
    pub history: HistoricalElement,
    pub fitness: Fitness,
    pub fitness_value: Option<f64>,
    pub build_success: bool,
    pub passed_tests: Vec<String>,
    pub failed_tests: Vec<String>,
    pub complete: bool,
}

impl From<&Variant> for VariantRecord {
    fn from(v: &Variant) -> Self {
        let tests = v.test_results();
        Self {
            id: v.id(),
            generation: v.generation(),
            gene: v.gene().clone(),
            history: v.history().clone(),
            fitness: v.fitness(),
            fitness_value: v.fitness().value(),
            build_success: v.build().success,
            passed_tests: tests.passed_ids().into_iter().map(String::from).collect(),
            failed_tests: tests.failed_ids().into_iter().map(String::from).collect(),
            complete: v.is_complete(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub generation: u32,
    pub initial: VariantId,
    pub current: Vec<VariantId>,
    pub variants: Vec<VariantRecord>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::builder::BuildResult;
    use crate::source::GeneratedSource;
    use crate::test_results::TestResults;
    use crate::test_results::tests::result;
    use crate::variant::tests::{delete_at, gene_of};

    pub(crate) fn variant(id: u64, history: HistoricalElement, gene: Gene, passed: &[bool]) -> Variant {
        let tests = TestResults::new(
            passed
                .iter()
                .enumerate()
                .map(|(i, &p)| result(&format!("t{i}"), p, "A.java", &[]))
                .collect(),
        );
        Variant::new(
            VariantId(id),
            0,
            gene,
            history,
            Arc::new(GeneratedSource::default()),
            BuildResult::success(Default::default()),
            tests,
        )
    }

    fn mutation_of(parent: u64) -> HistoricalElement {
        HistoricalElement::Mutation {
            parent: VariantId(parent),
            appended: delete_at(1),
        }
    }

    #[test]
    fn lineage_walks_back_to_the_initial_variant() {
        let mut store =
            VariantStore::new(variant(0, HistoricalElement::Initial, Gene::default(), &[false]))
                .unwrap();
        store.add(variant(1, mutation_of(0), gene_of(&[1]), &[false])).unwrap();
        store.add(variant(2, mutation_of(0), gene_of(&[2]), &[false])).unwrap();
        store
            .add(variant(
                3,
                HistoricalElement::Crossover {
                    parent1: VariantId(1),
                    parent2: VariantId(2),
                    split1: 1,
                    split2: 0,
                },
                gene_of(&[1, 2]),
                &[true],
            ))
            .unwrap();

        let ids: Vec<_> = store.lineage(VariantId(3)).iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec![VariantId(1), VariantId(2), VariantId(0)]);

        for v in store.all() {
            let roots: Vec<_> = std::iter::once(Arc::clone(v))
                .chain(store.lineage(v.id()))
                .filter(|a| matches!(a.history(), HistoricalElement::Initial))
                .collect();
            assert_eq!(roots.len(), 1, "variant {} must reach exactly one root", v.id());
        }
        assert_eq!(store.solutions().len(), 1);
    }

    #[test]
    fn unknown_parents_are_rejected() {
        let mut store =
            VariantStore::new(variant(0, HistoricalElement::Initial, Gene::default(), &[false]))
                .unwrap();
        let err = store
            .add(variant(5, mutation_of(4), gene_of(&[1]), &[true]))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownParent {
                child: VariantId(5),
                parent: VariantId(4)
            }
        );
        assert_eq!(store.all().len(), 1);

        assert_eq!(
            store
                .add(variant(0, mutation_of(0), gene_of(&[1]), &[true]))
                .unwrap_err(),
            StoreError::Duplicate(VariantId(0))
        );
    }

    #[test]
    fn ids_are_allocated_past_stored_variants() {
        let mut store =
            VariantStore::new(variant(0, HistoricalElement::Initial, Gene::default(), &[false]))
                .unwrap();
        assert_eq!(store.next_id(), VariantId(1));
        store.add(variant(7, mutation_of(0), gene_of(&[1]), &[false])).unwrap();
        assert_eq!(store.next_id(), VariantId(8));
        assert_eq!(store.snapshot().variants.len(), 2);
    }
}
