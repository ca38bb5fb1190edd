//! Nearest-neighbor correspondences and weighted pair extraction.

use super::{outlier::WeightMatrix, RegistrationError};
use crate::core::types::PointCloud;
use kiddo::{KdTree, SquaredEuclidean};

/// Nearest-neighbor correspondences from a reading set into a reference set.
///
/// Row-major `knn × n` layout: row `k` holds every reading point's
/// (k+1)-th nearest reference index and squared distance.
#[derive(Debug, Clone)]
pub struct Matches {
    knn: usize,
    cols: usize,
    ids: Vec<u32>,
    distances_sq: Vec<f32>,
}

impl Matches {
    /// Create from row-major index and squared-distance storage.
    pub fn new(knn: usize, cols: usize, ids: Vec<u32>, distances_sq: Vec<f32>) -> Self {
        debug_assert_eq!(ids.len(), knn * cols);
        debug_assert_eq!(distances_sq.len(), knn * cols);
        Self {
            knn,
            cols,
            ids,
            distances_sq,
        }
    }

    /// Number of neighbors per reading point (rows).
    #[inline]
    pub fn knn(&self) -> usize {
        self.knn
    }

    /// Number of reading points (columns).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Reference index of reading point `i`'s k-th neighbor.
    #[inline]
    pub fn id(&self, k: usize, i: usize) -> u32 {
        self.ids[k * self.cols + i]
    }

    /// Squared distance of reading point `i`'s k-th neighbor.
    #[inline]
    pub fn distance_sq(&self, k: usize, i: usize) -> f32 {
        self.distances_sq[k * self.cols + i]
    }

    /// All squared distances, row-major.
    #[inline]
    pub fn distances_sq(&self) -> &[f32] {
        &self.distances_sq
    }
}

/// Build a k-d tree over a cloud's points, indexed by position.
pub fn build_kdtree(cloud: &PointCloud) -> KdTree<f32, 3> {
    let mut tree: KdTree<f32, 3> = KdTree::new();
    for (i, p) in cloud.points().iter().enumerate() {
        tree.add(&p.to_array(), i as u64);
    }
    tree
}

/// Find the `knn` nearest reference points for every reading point,
/// querying a pre-built tree over the reference set.
///
/// `knn` is clamped to the reference size; the returned matrix always has
/// full rows.
pub fn find_matches_with_tree(
    reading: &PointCloud,
    reference_len: usize,
    reference_tree: &KdTree<f32, 3>,
    knn: usize,
) -> Matches {
    let knn = knn.max(1).min(reference_len.max(1));
    let cols = reading.len();
    let mut ids = vec![0u32; knn * cols];
    let mut distances_sq = vec![f32::MAX; knn * cols];

    for (i, point) in reading.points().iter().enumerate() {
        let neighbors = reference_tree.nearest_n::<SquaredEuclidean>(&point.to_array(), knn);
        for (k, neighbor) in neighbors.iter().enumerate() {
            ids[k * cols + i] = neighbor.item as u32;
            distances_sq[k * cols + i] = neighbor.distance;
        }
    }

    Matches::new(knn, cols, ids, distances_sq)
}

/// Find the `knn` nearest reference points for every reading point.
pub fn find_matches(reading: &PointCloud, reference: &PointCloud, knn: usize) -> Matches {
    let tree = build_kdtree(reference);
    find_matches_with_tree(reading, reference.len(), &tree, knn)
}

/// The surviving weighted correspondences: parallel kept-reading points,
/// matched reference points, and their weights.
#[derive(Debug, Clone)]
pub struct MatchedPairs {
    /// Kept reading points, in extraction order.
    pub reading: PointCloud,
    /// Matched reference points, parallel to `reading`.
    pub reference: PointCloud,
    /// Weights, parallel to both clouds. Never zero.
    pub weights: Vec<f32>,
}

impl MatchedPairs {
    /// Number of surviving pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Check whether any pair survived.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Extract the correspondences whose weight is non-zero.
///
/// Iterates k-major then i-minor: all reading points for the first
/// neighbor row, then all for the second, and so on. The output clouds
/// carry their sources' normals channels.
///
/// Shape preconditions are caller contract: the weight matrix must be
/// `matches.knn() × reading.len()` and the correspondences must have one
/// column per reading point.
pub fn matched_pairs(
    reading: &PointCloud,
    reference: &PointCloud,
    matches: &Matches,
    weights: &WeightMatrix,
) -> Result<MatchedPairs, RegistrationError> {
    if matches.cols() != reading.len() {
        return Err(RegistrationError::MatchColumnMismatch {
            expected: reading.len(),
            actual: matches.cols(),
        });
    }
    if weights.rows() != matches.knn() || weights.cols() != reading.len() {
        return Err(RegistrationError::WeightShapeMismatch {
            rows: weights.rows(),
            cols: weights.cols(),
            expected_rows: matches.knn(),
            expected_cols: reading.len(),
        });
    }

    let capacity = matches.knn() * reading.len();
    let mut kept_reading = PointCloud::with_capacity(capacity);
    let mut kept_reference = PointCloud::with_capacity(capacity);
    let mut kept_weights = Vec::with_capacity(capacity);

    for k in 0..matches.knn() {
        for i in 0..reading.len() {
            let weight = weights.at(k, i);
            if weight == 0.0 {
                continue;
            }
            let ref_idx = matches.id(k, i) as usize;
            if ref_idx >= reference.len() {
                return Err(RegistrationError::MatchIndexOutOfRange {
                    index: ref_idx,
                    len: reference.len(),
                });
            }
            match reading.normal_at(i) {
                Some(normal) => kept_reading.push_with_normal(reading.point_at(i), normal),
                None => kept_reading.push(reading.point_at(i)),
            }
            match reference.normal_at(ref_idx) {
                Some(normal) => kept_reference.push_with_normal(reference.point_at(ref_idx), normal),
                None => kept_reference.push(reference.point_at(ref_idx)),
            }
            kept_weights.push(weight);
        }
    }

    Ok(MatchedPairs {
        reading: kept_reading,
        reference: kept_reference,
        weights: kept_weights,
    })
}
