//! K-means clustering implementation.

use std::time::Instant;

use aligned_vec::AVec;
use log::debug;
use rand::Rng;
use rayon::prelude::*;

use crate::distance::{argmin, squared_euclidean};
use crate::error::{Error, Result};
use crate::sampling::subsample_with_replacement;

const RAYON_BLOCK_SIZE: usize = 64;

/// Assign vectors to centroids in single thread.
pub fn base_assign(vecs: &[f64], centroids: &[f64], dim: usize, labels: &mut [u32]) {
    let mut distances = vec![f64::MAX; centroids.len() / dim];
    for (i, vec) in vecs.chunks(dim).enumerate() {
        for (j, centroid) in centroids.chunks(dim).enumerate() {
            distances[j] = squared_euclidean(vec, centroid);
        }
        labels[i] = argmin(&distances) as u32;
    }
}

/// Assign vectors to centroids in multi-threads.
///
/// Each block of points writes to its own slice of `labels`, and the call
/// returns only after every block is done.
pub fn base_assign_parallel(vecs: &[f64], centroids: &[f64], dim: usize, labels: &mut [u32]) {
    labels
        .par_chunks_mut(RAYON_BLOCK_SIZE)
        .zip(vecs.par_chunks(dim * RAYON_BLOCK_SIZE))
        .for_each(|(par_labels, block)| {
            let mut par_distances = vec![f64::MAX; centroids.len() / dim];
            for (i, v) in block.chunks(dim).enumerate() {
                for (j, centroid) in centroids.chunks(dim).enumerate() {
                    par_distances[j] = squared_euclidean(v, centroid);
                }
                par_labels[i] = argmin(&par_distances) as u32;
            }
        });
}

fn assign(vecs: &[f64], centroids: &[f64], dim: usize, labels: &mut [u32]) {
    #[cfg(feature = "perf")]
    base_assign(vecs, centroids, dim, labels);
    #[cfg(not(feature = "perf"))]
    base_assign_parallel(vecs, centroids, dim, labels);
}

/// What to do with a centroid that lost all of its points.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum EmptyClusterPolicy {
    /// Keep the previous centroid unchanged.
    Retain,
    /// Move the centroid onto the point that is farthest from its own
    /// centroid. Several empty clusters take distinct points, farthest first.
    #[default]
    FarthestPoint,
}

/// Outcome of one update stage.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct UpdateStats {
    /// Total squared movement of all centroids.
    pub shift: f64,
    /// Number of clusters without any assigned point.
    pub empty: usize,
}

/// Update centroids to the mean of assigned vectors.
///
/// Points are grouped by label first, then the mean of every cluster is
/// computed in parallel. Each task only writes its own centroid row.
pub fn update_centroids(
    vecs: &[f64],
    centroids: &mut [f64],
    dim: usize,
    labels: &[u32],
    policy: EmptyClusterPolicy,
) -> UpdateStats {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); centroids.len() / dim];
    for (i, &label) in labels.iter().enumerate() {
        members[label as usize].push(i);
    }
    let empty: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_empty())
        .map(|(j, _)| j)
        .collect();

    // pick the replacements against the centroids the labels were computed with
    let replacements = match policy {
        EmptyClusterPolicy::FarthestPoint if !empty.is_empty() => {
            farthest_points(vecs, centroids, dim, labels, empty.len())
        }
        _ => Vec::new(),
    };

    let mut shift: f64 = centroids
        .par_chunks_mut(dim)
        .zip(members.par_iter())
        .map(|(centroid, member)| {
            if member.is_empty() {
                return 0.0;
            }
            // scale before summing, a sum of large finite values can overflow
            let divider = (member.len() as f64).recip();
            let mut mean = vec![0.0; dim];
            for &i in member {
                mean.iter_mut()
                    .zip(vecs[i * dim..(i + 1) * dim].iter())
                    .for_each(|(m, &v)| *m += v * divider);
            }
            let diff = squared_euclidean(centroid, &mean);
            centroid.copy_from_slice(&mean);
            diff
        })
        .sum();

    for (&j, &idx) in empty.iter().zip(replacements.iter()) {
        debug!("move empty cluster {} to point {}", j, idx);
        let point = &vecs[idx * dim..(idx + 1) * dim];
        let centroid = &mut centroids[j * dim..(j + 1) * dim];
        shift += squared_euclidean(centroid, point);
        centroid.copy_from_slice(point);
    }
    if !empty.is_empty() {
        debug!("{} empty clusters ({:?})", empty.len(), policy);
    }

    UpdateStats {
        shift,
        empty: empty.len(),
    }
}

/// Indices of the `count` points farthest from their assigned centroid.
fn farthest_points(
    vecs: &[f64],
    centroids: &[f64],
    dim: usize,
    labels: &[u32],
    count: usize,
) -> Vec<usize> {
    let distances: Vec<f64> = vecs
        .par_chunks(dim)
        .zip(labels.par_iter())
        .map(|(vec, &label)| {
            let label = label as usize;
            squared_euclidean(vec, &centroids[label * dim..(label + 1) * dim])
        })
        .collect();
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    order.truncate(count);
    order
}

/// Result of a k-means run.
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Final centroids, `n_cluster * dim` values in row-major order.
    pub centroids: AVec<f64>,
    /// Cluster label of every input point.
    pub labels: Vec<u32>,
    /// Dimension of the points and the centroids.
    pub dim: usize,
    /// Number of assign/update rounds that were executed.
    pub iterations: u32,
    /// Whether the run stopped early because the centroid shift fell below
    /// the tolerance. Always `false` in the fixed-budget mode.
    pub converged: bool,
}

/// K-means clustering algorithm.
///
/// By default it runs exactly `max_iter` rounds of assignment and update,
/// even if the labels stopped changing long before. Early stop is opt-in
/// with [`KMeans::with_tolerance`].
#[derive(Debug, Clone)]
pub struct KMeans {
    n_cluster: u32,
    max_iter: u32,
    tolerance: Option<f64>,
    empty_cluster: EmptyClusterPolicy,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_cluster: 3,
            max_iter: 100,
            tolerance: None,
            empty_cluster: EmptyClusterPolicy::default(),
        }
    }
}

impl KMeans {
    /// Create a new KMeans instance with a fixed iteration budget.
    ///
    /// # Arguments
    ///
    /// * `n_cluster` - number of clusters, must be in [1, number of points]
    /// * `max_iter` - number of assign/update rounds, `0` only assigns the
    ///   points to the initial centroids
    pub fn new(n_cluster: u32, max_iter: u32) -> Self {
        Self {
            n_cluster,
            max_iter,
            ..Default::default()
        }
    }

    /// Stop as soon as the total squared centroid shift is below `tolerance`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Set the policy applied to clusters that end up without points.
    pub fn with_empty_cluster_policy(mut self, policy: EmptyClusterPolicy) -> Self {
        self.empty_cluster = policy;
        self
    }

    fn check(&self, vecs: &[f64], dim: usize) -> Result<usize> {
        if dim == 0 {
            return Err(Error::InvalidParameter("dimension must be greater than 0".into()));
        }
        if vecs.len() % dim != 0 {
            return Err(Error::InvalidParameter(format!(
                "{} values cannot be split into points of dimension {}",
                vecs.len(),
                dim
            )));
        }
        let num = vecs.len() / dim;
        if self.n_cluster < 1 {
            return Err(Error::InvalidParameter("n_cluster must be greater than 0".into()));
        }
        if num < self.n_cluster as usize {
            return Err(Error::InvalidParameter(format!(
                "n_cluster ({}) is larger than the number of points ({})",
                self.n_cluster, num
            )));
        }
        if let Some(tolerance) = self.tolerance {
            if tolerance.is_nan() || tolerance < 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "tolerance must be a non-negative number, got {}",
                    tolerance
                )));
            }
        }
        Ok(num)
    }

    /// Pick the initial centroids at random (with replacement) and run.
    pub fn fit<R: Rng>(&self, vecs: &[f64], dim: usize, rng: &mut R) -> Result<Clustering> {
        self.check(vecs, dim)?;
        let centroids = subsample_with_replacement(self.n_cluster as usize, vecs, dim, rng);
        self.fit_from(vecs, dim, centroids)
    }

    /// Run from the given initial centroids (`n_cluster * dim` values).
    pub fn fit_from(&self, vecs: &[f64], dim: usize, mut centroids: AVec<f64>) -> Result<Clustering> {
        let num = self.check(vecs, dim)?;
        if centroids.len() != self.n_cluster as usize * dim {
            return Err(Error::InvalidParameter(format!(
                "expect {} initial centroids of dimension {}, got {} values",
                self.n_cluster,
                dim,
                centroids.len()
            )));
        }
        debug!(
            "num of points: {}, num of clusters: {}, dim: {}",
            num, self.n_cluster, dim
        );

        let mut labels: Vec<u32> = vec![0; num];
        if self.max_iter == 0 {
            assign(vecs, &centroids, dim, &mut labels);
            return Ok(Clustering {
                centroids,
                labels,
                dim,
                iterations: 0,
                converged: false,
            });
        }

        let mut iterations = 0;
        let mut converged = false;
        for i in 0..self.max_iter {
            let start_time = Instant::now();
            assign(vecs, &centroids, dim, &mut labels);
            let stats = update_centroids(vecs, &mut centroids, dim, &labels, self.empty_cluster);
            iterations = i + 1;
            debug!(
                "iter {} takes {} s, shift {}",
                i,
                start_time.elapsed().as_secs_f32(),
                stats.shift
            );
            if let Some(tolerance) = self.tolerance {
                if stats.shift < tolerance {
                    debug!("converged at iter {}", i);
                    converged = true;
                    break;
                }
            }
        }

        Ok(Clustering {
            centroids,
            labels,
            dim,
            iterations,
            converged,
        })
    }
}
