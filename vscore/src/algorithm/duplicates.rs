//! Spatial duplicate resolution.
//!
//! Candidate cells detected in neighbouring blocks frequently describe the same
//! physical cell. Two valid cells are treated as duplicates when they share more
//! than half of their (mean) voxel count and their raw timeseries correlate
//! above the same threshold; the weaker of the two is then invalidated.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;

use crate::algorithm::utility::pearson_correlation;
use crate::data::cell::Cell;
use crate::data::volume::VolumeIndex;

/// Overlap ratio and correlation must both exceed this to call a pair a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Two cells sharing at least one voxel.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicatePair {
    /// Lower cell index.
    pub first: usize,
    /// Higher cell index.
    pub second: usize,
    /// Number of voxels occupied by both cells.
    pub shared_voxels: usize,
    /// Mean of the two cells' voxel counts.
    pub mean_length: f64,
    /// Pearson correlation of the raw timeseries.
    pub correlation: f64,
}

impl DuplicatePair {
    pub fn overlap_ratio(&self) -> f64 {
        self.shared_voxels as f64 / self.mean_length
    }

    pub fn is_duplicate(&self) -> bool {
        self.overlap_ratio() > SIMILARITY_THRESHOLD && self.correlation > SIMILARITY_THRESHOLD
    }
}

/// Outcome of one resolution pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DuplicateReport {
    /// Distinct co-occupying pairs examined.
    pub pairs: usize,
    /// Pairs that passed the overlap and correlation test.
    pub duplicates: usize,
    /// Cells invalidated by this pass, in the order they were removed.
    pub removed: Vec<usize>,
}

/// Count the voxels shared by every pair of distinct co-occupying cells.
///
/// The map is keyed by `(lower, higher)` cell index, so iteration yields the
/// pairs in lexicographic order.
pub fn count_shared_voxels(index: &VolumeIndex) -> BTreeMap<(usize, usize), usize> {
    let mut shared: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut occurrences = 0usize;

    for bucket in index.buckets().filter(|b| b.len() > 1) {
        for (&a, &b) in bucket.iter().tuple_combinations() {
            occurrences += 1;
            // a cell listing the same voxel twice does not pair with itself
            if a == b {
                continue;
            }
            *shared.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }

    debug_assert_eq!(
        occurrences,
        index
            .buckets()
            .map(|b| b.len() * b.len().saturating_sub(1) / 2)
            .sum::<usize>()
    );
    debug!(
        "{} pair occurrences over {} distinct cell pairs",
        occurrences,
        shared.len()
    );

    shared
}

/// Annotate every co-occupying pair with its overlap statistics, in ascending pair order.
pub fn enumerate_pairs(index: &VolumeIndex, cells: &[Cell]) -> Vec<DuplicatePair> {
    count_shared_voxels(index)
        .into_iter()
        .map(|((first, second), shared_voxels)| DuplicatePair {
            first,
            second,
            shared_voxels,
            mean_length: (cells[first].len() + cells[second].len()) as f64 / 2.0,
            correlation: pearson_correlation(&cells[first].timeseries, &cells[second].timeseries),
        })
        .collect()
}

/// Index of the pair member to drop: the smaller total weight, the lower index on a tie.
fn weaker(pair: &DuplicatePair, total_weights: &[f64]) -> usize {
    if total_weights[pair.second] < total_weights[pair.first] {
        pair.second
    } else {
        pair.first
    }
}

/// Invalidate the weaker member of every duplicate pair.
///
/// Pairs come from `index`, which must have been built from `cells` and the
/// current `valid` flags. The pair list and total weights are fixed before any
/// flag changes; pairs are then processed in ascending `(first, second)` order and
/// each invalidation is written to `valid` immediately.
pub fn resolve_duplicates(
    cells: &[Cell],
    valid: &mut [bool],
    index: &VolumeIndex,
) -> DuplicateReport {
    let pairs = enumerate_pairs(index, cells);
    let total_weights: Vec<f64> = cells.iter().map(Cell::total_weight).collect();

    let mut report = DuplicateReport {
        pairs: pairs.len(),
        ..Default::default()
    };

    for pair in pairs.iter().filter(|p| p.is_duplicate()) {
        report.duplicates += 1;
        let loser = weaker(pair, &total_weights);
        if valid[loser] {
            valid[loser] = false;
            report.removed.push(loser);
        }
    }

    debug!(
        "{} of {} overlapping pairs are duplicates, {} cells removed",
        report.duplicates,
        report.pairs,
        report.removed.len()
    );

    report
}
