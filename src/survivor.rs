use std::cmp::Ordering;
use std::sync::Arc;

use crate::variant::Variant;

/// Ranking used for survivor selection: fitter first, then shorter genes,
/// then older (lower id) variants.
pub fn rank_order(a: &Variant, b: &Variant) -> Ordering {
    b.fitness()
        .cmp(&a.fitness())
        .then_with(|| a.gene().len().cmp(&b.gene().len()))
        .then_with(|| a.id().cmp(&b.id()))
}

/// Keep the `headcount` best of `pool`. A pool smaller than `headcount` is
/// returned whole, ranked.
pub fn select_survivors(mut pool: Vec<Arc<Variant>>, headcount: usize) -> Vec<Arc<Variant>> {
    pool.sort_by(|a, b| rank_order(a, b));
    pool.dedup_by_key(|v| v.id());
    pool.truncate(headcount);
    pool
}
