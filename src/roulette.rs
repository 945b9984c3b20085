use crate::error::SelectionInfeasible;
use crate::random::RandomSource;

/// Weighted random choice over a fixed candidate list.
#[derive(Debug, Clone)]
pub struct Roulette<'a, T> {
    candidates: &'a [T],
    cumulative: Vec<f64>,
    total: f64,
}

impl<'a, T> Roulette<'a, T> {
    /// Fails when there is nothing to choose from, including when every
    /// weight is zero.
    pub fn new(
        candidates: &'a [T],
        weight: impl Fn(&T) -> f64,
    ) -> Result<Self, SelectionInfeasible> {
        let mut total = 0.0;
        let cumulative: Vec<f64> = candidates
            .iter()
            .map(|c| {
                total += weight(c).max(0.0);
                total
            })
            .collect();
        if candidates.is_empty() || total <= 0.0 {
            return Err(SelectionInfeasible::EmptyCandidates);
        }
        Ok(Self {
            candidates,
            cumulative,
            total,
        })
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// The first candidate whose cumulative weight exceeds a uniform draw
    /// in `[0, total)`.
    pub fn spin(&self, rng: &mut RandomSource) -> &'a T {
        &self.candidates[self.spin_index(rng)]
    }

    /// Index form of [`spin`](Self::spin).
    pub fn spin_index(&self, rng: &mut RandomSource) -> usize {
        let draw = rng.below_f64(self.total);
        self.cumulative
            .partition_point(|&c| c <= draw)
            .min(self.candidates.len() - 1)
    }
}

/// Weight favoring small subtrees: `(1 / eligible statements in subtree)^2`.
pub fn subtree_weight(eligible_count: usize) -> f64 {
    let n = eligible_count.max(1) as f64;
    (1.0 / n).powi(2)
}
