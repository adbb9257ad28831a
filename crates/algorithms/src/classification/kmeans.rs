//! K-means clustering for multi-band rasters
//!
//! Pixels valid in every band form feature vectors. The model is fitted on a
//! bounded random sample (k-means++ seeding, Lloyd iterations) and every
//! valid pixel is then labelled with its nearest centroid. Label numbering
//! follows seeding order and carries no meaning; callers that need ordered
//! classes must rank the clusters themselves.

use crate::maybe_rayon::*;
use orbita_core::raster::Raster;
use orbita_core::{Error, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Nodata label in the output raster
pub const UNLABELLED: i32 = -1;

/// Parameters for K-means clustering
#[derive(Debug, Clone)]
pub struct KmeansParams {
    /// Number of clusters (default: 3)
    pub k: usize,
    /// Maximum Lloyd iterations (default: 100)
    pub max_iterations: usize,
    /// Stop when no centroid moves more than this (default: 1e-6)
    pub convergence: f64,
    /// Seed for sampling and k-means++ seeding (default: 42)
    pub seed: u64,
    /// Upper bound on pixels used for fitting; `None` fits on all (default: 5000)
    pub sample_size: Option<usize>,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 100,
            convergence: 1e-6,
            seed: 42,
            sample_size: Some(5000),
        }
    }
}

/// Fitted centroids
#[derive(Debug, Clone)]
pub struct KmeansModel {
    pub centroids: Vec<Vec<f64>>,
    pub iterations: usize,
    /// Number of points the model was fitted on
    pub fitted_on: usize,
}

impl KmeansModel {
    /// Index of the nearest centroid (squared Euclidean distance)
    pub fn predict(&self, point: &[f64]) -> usize {
        nearest(&self.centroids, point)
    }
}

/// Labels of every pixel plus the model that produced them
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster id per pixel, [`UNLABELLED`] where any band is invalid
    pub labels: Raster<i32>,
    pub model: KmeansModel,
    /// Pixels that received a label
    pub valid_pixels: usize,
}

/// Fit k-means on feature vectors of equal dimension.
pub fn fit_kmeans(points: &[Vec<f64>], params: &KmeansParams) -> Result<KmeansModel> {
    if params.k < 2 {
        return Err(Error::Algorithm("K-means requires k >= 2".into()));
    }
    if points.len() < params.k {
        return Err(Error::Algorithm(format!(
            "Not enough points ({}) for {} clusters",
            points.len(),
            params.k
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = seed_plus_plus(points, params.k, &mut rng)?;
    let dim = centroids[0].len();
    let mut labels = vec![0usize; points.len()];
    let mut iterations = 0;

    for _ in 0..params.max_iterations {
        iterations += 1;

        labels
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, label)| *label = nearest(&centroids, &points[i]));

        let mut sums = vec![vec![0.0; dim]; params.k];
        let mut counts = vec![0usize; params.k];
        for (point, &label) in points.iter().zip(labels.iter()) {
            counts[label] += 1;
            for (s, v) in sums[label].iter_mut().zip(point) {
                *s += v;
            }
        }

        let mut max_shift = 0.0_f64;
        for (k, centroid) in centroids.iter_mut().enumerate() {
            // empty clusters keep their previous centroid
            if counts[k] == 0 {
                continue;
            }
            let updated: Vec<f64> = sums[k].iter().map(|s| s / counts[k] as f64).collect();
            max_shift = max_shift.max(squared_distance(centroid, &updated).sqrt());
            *centroid = updated;
        }

        if max_shift < params.convergence {
            break;
        }
    }

    Ok(KmeansModel {
        centroids,
        iterations,
        fitted_on: points.len(),
    })
}

/// Cluster the pixels of co-registered bands.
///
/// A pixel takes part when it is finite in every band and `mask` (if given)
/// is non-zero there.
pub fn kmeans_bands(
    bands: &[&Raster<f64>],
    mask: Option<&Raster<u8>>,
    params: &KmeansParams,
) -> Result<KmeansResult> {
    let template = *bands
        .first()
        .ok_or_else(|| Error::Algorithm("K-means needs at least one band".into()))?;
    for band in &bands[1..] {
        template.ensure_same_shape(*band)?;
    }
    if let Some(m) = mask {
        template.ensure_same_shape(m)?;
    }

    let (rows, cols) = template.shape();
    let mut cells = Vec::new();
    let mut features = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if mask.is_some_and(|m| m.data()[(row, col)] == 0) {
                continue;
            }
            let feature: Vec<f64> = bands.iter().map(|b| b.data()[(row, col)]).collect();
            if feature.iter().all(|v| v.is_finite()) {
                cells.push((row, col));
                features.push(feature);
            }
        }
    }

    if features.len() < params.k {
        return Err(Error::Algorithm(format!(
            "Not enough valid pixels ({}) for {} clusters",
            features.len(),
            params.k
        )));
    }

    let sample: Vec<Vec<f64>> = match params.sample_size {
        Some(limit) if limit < features.len() => {
            let mut rng = StdRng::seed_from_u64(params.seed);
            rand::seq::index::sample(&mut rng, features.len(), limit)
                .into_iter()
                .map(|i| features[i].clone())
                .collect()
        }
        _ => features.clone(),
    };

    let model = fit_kmeans(&sample, params)?;

    let mut labels = template.like_with(UNLABELLED);
    labels.set_nodata(Some(UNLABELLED));
    for ((row, col), feature) in cells.iter().zip(&features) {
        labels.data_mut()[(*row, *col)] = model.predict(feature) as i32;
    }

    Ok(KmeansResult {
        labels,
        model,
        valid_pixels: cells.len(),
    })
}

/// k-means++ seeding: first centre uniform, then proportional to D².
fn seed_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Result<Vec<Vec<f64>>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
    let mut dist: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let chooser = WeightedIndex::new(&dist).map_err(|_| {
            Error::Algorithm(format!(
                "fewer than {} distinct feature vectors to seed clusters",
                k
            ))
        })?;
        let next = points[chooser.sample(rng)].clone();
        for (d, p) in dist.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &next));
        }
        centroids.push(next);
    }
    Ok(centroids)
}

fn nearest(centroids: &[Vec<f64>], point: &[f64]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, point);
        if d < best_dist {
            best_dist = d;
            best = k;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbita_core::GeoTransform;

    fn three_groups() -> (Raster<f64>, Raster<f64>) {
        // columns 0-3 low, 4-7 mid, 8-11 high vigour
        let gt = GeoTransform::new(0.0, 6.0, 1.0, -1.0);
        let mut a = Raster::new(6, 12).with_geo(gt, None);
        let mut b = Raster::new(6, 12).with_geo(gt, None);
        for row in 0..6 {
            for col in 0..12 {
                let level = (col / 4) as f64;
                let jitter = (row as f64) * 0.001;
                a.set(row, col, 0.2 + level * 0.25 + jitter).unwrap();
                b.set(row, col, 0.1 + level * 0.15 - jitter).unwrap();
            }
        }
        (a, b)
    }

    #[test]
    fn test_kmeans_separates_groups() {
        let (a, b) = three_groups();
        let result = kmeans_bands(&[&a, &b], None, &KmeansParams::default()).unwrap();

        let low = result.labels.get(0, 0).unwrap();
        let mid = result.labels.get(0, 5).unwrap();
        let high = result.labels.get(0, 10).unwrap();
        assert!(low != mid && mid != high && low != high);
        assert_eq!(result.labels.get(5, 3).unwrap(), low);
        assert_eq!(result.valid_pixels, 72);
    }

    #[test]
    fn test_kmeans_is_deterministic_for_seed() {
        let (a, b) = three_groups();
        let params = KmeansParams {
            sample_size: Some(20),
            ..Default::default()
        };
        let r1 = kmeans_bands(&[&a, &b], None, &params).unwrap();
        let r2 = kmeans_bands(&[&a, &b], None, &params).unwrap();
        assert_eq!(r1.labels.data(), r2.labels.data());
        assert_eq!(r1.model.fitted_on, 20);
    }

    #[test]
    fn test_invalid_and_masked_pixels_unlabelled() {
        let (mut a, b) = three_groups();
        a.set(0, 0, f64::NAN).unwrap();
        let mut mask = a.like_with(1u8);
        mask.set(1, 1, 0).unwrap();

        let result = kmeans_bands(&[&a, &b], Some(&mask), &KmeansParams::default()).unwrap();
        assert_eq!(result.labels.get(0, 0).unwrap(), UNLABELLED);
        assert_eq!(result.labels.get(1, 1).unwrap(), UNLABELLED);
        assert_eq!(result.valid_pixels, 70);
    }

    #[test]
    fn test_kmeans_k_too_large() {
        let r = Raster::filled(1, 2, 1.0);
        assert!(kmeans_bands(&[&r], None, &KmeansParams::default()).is_err());
    }

    #[test]
    fn test_identical_points_cannot_seed() {
        let r = Raster::filled(5, 5, 0.4);
        let err = kmeans_bands(&[&r], None, &KmeansParams::default()).unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn test_kmeans_k_one() {
        let points = vec![vec![0.0], vec![1.0]];
        let params = KmeansParams {
            k: 1,
            ..Default::default()
        };
        assert!(fit_kmeans(&points, &params).is_err());
    }
}
