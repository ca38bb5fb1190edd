//! Outlier weighting of candidate correspondences.

use super::correspondence::Matches;
use crate::core::types::PointCloud;

/// Per-correspondence weights, same `knn × n` shape as the matches.
///
/// A weight of exactly zero excludes the pair from the solve; weights are
/// non-negative and need not sum to one.
#[derive(Debug, Clone)]
pub struct WeightMatrix {
    rows: usize,
    cols: usize,
    weights: Vec<f32>,
}

impl WeightMatrix {
    /// Matrix with every entry set to `value`.
    pub fn uniform(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            weights: vec![value; rows * cols],
        }
    }

    /// Number of rows (neighbors per reading point).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (reading points).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Weight of reading point `i`'s k-th correspondence.
    #[inline]
    pub fn at(&self, k: usize, i: usize) -> f32 {
        self.weights[k * self.cols + i]
    }

    /// Set one weight.
    #[inline]
    pub fn set(&mut self, k: usize, i: usize, weight: f32) {
        self.weights[k * self.cols + i] = weight;
    }

    /// Count of non-zero entries.
    pub fn active_count(&self) -> usize {
        self.weights.iter().filter(|w| **w != 0.0).count()
    }
}

/// An outlier rejection strategy over candidate correspondences.
///
/// Closed set dispatched by match; each variant is a pure function
/// `(reading, reference, matches) -> weights`.
#[derive(Debug, Clone, Copy)]
pub enum OutlierFilter {
    /// Accept every correspondence with weight 1.
    None,
    /// Keep the best `keep_ratio` fraction of pairs by match distance,
    /// excluding the rest.
    TrimmedDistance {
        /// Fraction of pairs to keep, in (0, 1].
        keep_ratio: f32,
    },
    /// Exclude pairs farther apart than a fixed distance.
    MaxDistance {
        /// Cutoff in meters.
        max_distance: f32,
    },
}

impl Default for OutlierFilter {
    fn default() -> Self {
        OutlierFilter::TrimmedDistance { keep_ratio: 0.85 }
    }
}

impl OutlierFilter {
    /// Compute the weight matrix for a set of candidate correspondences.
    pub fn weights(
        &self,
        _reading: &PointCloud,
        _reference: &PointCloud,
        matches: &Matches,
    ) -> WeightMatrix {
        match self {
            OutlierFilter::None => WeightMatrix::uniform(matches.knn(), matches.cols(), 1.0),
            OutlierFilter::TrimmedDistance { keep_ratio } => {
                trimmed_distance(matches, *keep_ratio)
            }
            OutlierFilter::MaxDistance { max_distance } => {
                let cutoff_sq = max_distance * max_distance;
                let mut weights = WeightMatrix::uniform(matches.knn(), matches.cols(), 0.0);
                for k in 0..matches.knn() {
                    for i in 0..matches.cols() {
                        if matches.distance_sq(k, i) <= cutoff_sq {
                            weights.set(k, i, 1.0);
                        }
                    }
                }
                weights
            }
        }
    }
}

/// Weight 1 for pairs at or below the `keep_ratio` distance quantile,
/// 0 for the rest.
fn trimmed_distance(matches: &Matches, keep_ratio: f32) -> WeightMatrix {
    let total = matches.knn() * matches.cols();
    if total == 0 {
        return WeightMatrix::uniform(matches.knn(), matches.cols(), 0.0);
    }

    let keep_ratio = keep_ratio.clamp(0.0, 1.0);
    let keep_count = ((total as f32 * keep_ratio).ceil() as usize).min(total);
    if keep_count == 0 {
        return WeightMatrix::uniform(matches.knn(), matches.cols(), 0.0);
    }

    let mut sorted: Vec<f32> = matches.distances_sq().to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let cutoff_sq = sorted[keep_count - 1];

    let mut weights = WeightMatrix::uniform(matches.knn(), matches.cols(), 0.0);
    let mut kept = 0usize;
    for k in 0..matches.knn() {
        for i in 0..matches.cols() {
            // `kept` guard breaks ties at the cutoff so exactly the
            // requested fraction survives.
            if matches.distance_sq(k, i) <= cutoff_sq && kept < keep_count {
                weights.set(k, i, 1.0);
                kept += 1;
            }
        }
    }
    weights
}
