use crate::error::SelectionInfeasible;
use crate::options::DonorSelection;
use crate::random::RandomSource;
use crate::roulette::{Roulette, subtree_weight};
use crate::source::GeneratedSource;
use crate::variant::DonorStatement;

/// One donor candidate and its roulette weight.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub donor: DonorStatement,
    pub weight: f64,
}

/// Every eligible statement of the original product sources, visited file by
/// file in path order and in pre-order within a file.
#[derive(Debug, Clone, Default)]
pub struct StatementCatalog {
    entries: Vec<CatalogEntry>,
}

impl StatementCatalog {
    pub fn from_source(source: &GeneratedSource) -> Self {
        let mut entries = Vec::new();
        for ast in source.product_asts() {
            for (path, stmt) in ast.walk() {
                if !stmt.kind.is_eligible() {
                    continue;
                }
                entries.push(CatalogEntry {
                    donor: DonorStatement {
                        kind: stmt.kind,
                        text: ast.text_of(stmt).to_string(),
                        origin: ast.location(path, stmt),
                    },
                    weight: subtree_weight(stmt.eligible_count()),
                });
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pick_uniform(&self, rng: &mut RandomSource) -> Result<&DonorStatement, SelectionInfeasible> {
        rng.choose(&self.entries)
            .map(|e| &e.donor)
            .ok_or(SelectionInfeasible::EmptyCandidates)
    }

    /// Roulette draw weighted towards small statements.
    pub fn pick_weighted(&self, rng: &mut RandomSource) -> Result<&DonorStatement, SelectionInfeasible> {
        let roulette = Roulette::new(&self.entries, |e| e.weight)?;
        Ok(&roulette.spin(rng).donor)
    }

    pub fn pick(
        &self,
        mode: DonorSelection,
        rng: &mut RandomSource,
    ) -> Result<&DonorStatement, SelectionInfeasible> {
        match mode {
            DonorSelection::Uniform => self.pick_uniform(rng),
            DonorSelection::Roulette => self.pick_weighted(rng),
        }
    }
}
