//! k-means scenario reduction
//!
//! Reduces a set of trajectories to a few representatives. Initialization is
//! k-means++ driven by a fixed seed, so the same input always yields the same
//! centers regardless of the caller's sampling seed.

use ndarray::{Array2, ArrayView1, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use super::ScenarioError;

/// Representatives kept after reduction.
pub const DEFAULT_CLUSTERS: usize = 3;

/// Seed of the k-means++ initialization.
pub const CLUSTERING_SEED: u64 = 0;

/// k-means configuration
#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: DEFAULT_CLUSTERS,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: CLUSTERING_SEED,
        }
    }
}

/// Fitted k-means model
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    pub centers: Array2<f64>,
    pub labels: Vec<usize>,
    pub inertia: f64,
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: ArrayView1<'_, f64>, centers: &Array2<f64>) -> (usize, f64) {
    centers
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

impl KMeans {
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    /// Fit on the rows of `data`, keeping the run with the lowest inertia.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansModel, ScenarioError> {
        if data.nrows() < self.k {
            return Err(ScenarioError::TooFewTrajectories {
                required: self.k,
                actual: data.nrows(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansModel> = None;
        for _ in 0..self.n_init.max(1) {
            let init = self.init_plus_plus(data, &mut rng);
            let model = self.lloyd(data, init);
            if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }

        let model = best.ok_or(ScenarioError::TooFewTrajectories {
            required: self.k,
            actual: 0,
        })?;
        debug!(k = self.k, inertia = model.inertia, "k-means fitted");
        Ok(model)
    }

    fn init_plus_plus(&self, data: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = data.nrows();
        let mut centers = Array2::zeros((self.k, data.ncols()));
        let first = rng.gen_range(0..n);
        centers.row_mut(0).assign(&data.row(first));

        for c in 1..self.k {
            let chosen = centers.slice(ndarray::s![..c, ..]).to_owned();
            let weights: Vec<f64> = data.rows().into_iter().map(|p| nearest(p, &chosen).1).collect();
            let next = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                // every point already sits on a center
                Err(_) => rng.gen_range(0..n),
            };
            centers.row_mut(c).assign(&data.row(next));
        }
        centers
    }

    fn lloyd(&self, data: &Array2<f64>, mut centers: Array2<f64>) -> KMeansModel {
        let mut labels = vec![0; data.nrows()];
        // tolerance is relative to the mean per-slot variance
        let threshold = self.tolerance * data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
        for _ in 0..self.max_iter {
            for (i, p) in data.rows().into_iter().enumerate() {
                labels[i] = nearest(p, &centers).0;
            }

            let mut next = centers.clone();
            for c in 0..self.k {
                let members: Vec<usize> = (0..data.nrows()).filter(|i| labels[*i] == c).collect();
                if members.is_empty() {
                    continue;
                }
                if let Some(mean) = data.select(Axis(0), &members).mean_axis(Axis(0)) {
                    next.row_mut(c).assign(&mean);
                }
            }

            let shift: f64 = (&next - &centers).mapv(|v| v * v).sum();
            centers = next;
            if shift <= threshold {
                break;
            }
        }

        let inertia: f64 = data
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let (label, dist) = nearest(p, &centers);
                labels[i] = label;
                dist
            })
            .sum();

        KMeansModel {
            centers,
            labels,
            inertia,
        }
    }
}

impl KMeansModel {
    pub fn predict(&self, point: ArrayView1<'_, f64>) -> usize {
        nearest(point, &self.centers).0
    }

    pub fn predict_rows(&self, data: &Array2<f64>) -> Vec<usize> {
        data.rows().into_iter().map(|p| self.predict(p)).collect()
    }
}

/// Mean silhouette coefficient with Euclidean distance.
///
/// Points alone in their cluster score 0. Returns `None` when fewer than two
/// clusters are populated.
pub fn silhouette_score(data: &Array2<f64>, labels: &[usize]) -> Option<f64> {
    let n = data.nrows();
    let mut clusters: Vec<usize> = labels.to_vec();
    clusters.sort_unstable();
    clusters.dedup();
    if clusters.len() < 2 || n < 2 {
        return None;
    }

    let distance = |i: usize, j: usize| squared_distance(data.row(i), data.row(j)).sqrt();

    let total: f64 = (0..n)
        .map(|i| {
            let own = labels[i];
            let own_size = labels.iter().filter(|l| **l == own).count();
            if own_size <= 1 {
                return 0.0;
            }
            let a = (0..n)
                .filter(|j| *j != i && labels[*j] == own)
                .map(|j| distance(i, j))
                .sum::<f64>()
                / (own_size - 1) as f64;
            let b = clusters
                .iter()
                .filter(|c| **c != own)
                .map(|c| {
                    let members: Vec<usize> = (0..n).filter(|j| labels[*j] == *c).collect();
                    members.iter().map(|j| distance(i, *j)).sum::<f64>() / members.len() as f64
                })
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .sum();

    Some(total / n as f64)
}

/// Outcome of reducing a trajectory set to representatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    /// One representative per row
    pub centers: Array2<f64>,
    /// Row replaced by the forced point estimate, if any
    pub forced_index: Option<usize>,
    /// Fit-quality diagnostic over source rows plus centers
    pub silhouette: Option<f64>,
}

/// Reduce `trajectories` to [`DEFAULT_CLUSTERS`] representatives.
///
/// When `forced` is given, the center of the cluster that contains it is
/// replaced by `forced` itself, so the point estimate appears verbatim.
/// `reference` rows are included in the silhouette diagnostic (defaults to
/// `trajectories`).
pub fn reduce(
    trajectories: &Array2<f64>,
    forced: Option<ArrayView1<'_, f64>>,
    reference: Option<&Array2<f64>>,
) -> Result<Reduction, ScenarioError> {
    let model = KMeans::default().fit(trajectories)?;
    let mut centers = model.centers.clone();

    let forced_index = match forced {
        Some(point) => {
            if point.len() != centers.ncols() {
                return Err(ScenarioError::LengthMismatch {
                    expected: centers.ncols(),
                    actual: point.len(),
                });
            }
            let idx = model.predict(point);
            centers.row_mut(idx).assign(&point);
            Some(idx)
        }
        None => None,
    };

    let reference = reference.unwrap_or(trajectories);
    let silhouette = ndarray::concatenate(Axis(0), &[reference.view(), centers.view()])
        .ok()
        .and_then(|union| silhouette_score(&union, &model.predict_rows(&union)));

    Ok(Reduction {
        centers,
        forced_index,
        silhouette,
    })
}
