//! Temporal median compositing and ROI clipping

use super::indices::{IndexSet, SpectralIndex};
use crate::maybe_rayon::*;
use orbita_core::raster::Raster;
use orbita_core::{Error, Result};

/// Parameters for median compositing
#[derive(Debug, Clone, Copy)]
pub struct CompositeParams {
    /// Pixels with fewer valid observations are masked (default: 1)
    pub min_observations: usize,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self { min_observations: 1 }
    }
}

/// Median composite of a window, plus how many scenes fed each pixel
#[derive(Debug, Clone)]
pub struct Composite {
    pub indices: IndexSet,
    /// Valid NDVI observations per pixel
    pub observations: Raster<u32>,
    pub scene_count: usize,
}

/// Median of finite values; NaN for an empty slice.
///
/// Even counts average the two middle values.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Per-pixel median over a stack of rasters on the same grid.
pub fn median_stack(stack: &[&Raster<f64>], params: CompositeParams) -> Result<Raster<f64>> {
    let template = *stack
        .first()
        .ok_or_else(|| Error::Algorithm("cannot composite an empty stack".into()))?;
    for layer in &stack[1..] {
        template.ensure_same_shape(*layer)?;
    }

    let min_obs = params.min_observations.max(1);
    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values = Vec::with_capacity(stack.len());
            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();
                values.extend(
                    stack
                        .iter()
                        .map(|layer| layer.data()[(row, col)])
                        .filter(|v| v.is_finite()),
                );
                if values.len() >= min_obs {
                    *out = median(&mut values);
                }
            }
            row_data
        })
        .collect();

    Ok(Raster::from_vec(data, rows, cols)?
        .with_geo(*template.transform(), template.crs().copied()))
}

/// Median composite of every index across the given scenes.
pub fn median_composite(scenes: &[IndexSet], params: CompositeParams) -> Result<Composite> {
    let first = scenes
        .first()
        .ok_or_else(|| Error::Algorithm("cannot composite zero scenes".into()))?;

    let layer = |index: SpectralIndex| -> Result<Raster<f64>> {
        let stack: Vec<&Raster<f64>> = scenes.iter().map(|s| s.get(index)).collect();
        median_stack(&stack, params)
    };

    let (rows, cols) = first.shape();
    let mut observations = first.ndvi.like_with(0u32);
    for scene in scenes {
        first.ndvi.ensure_same_shape(&scene.ndvi)?;
        for row in 0..rows {
            for col in 0..cols {
                if scene.ndvi.data()[(row, col)].is_finite() {
                    observations.data_mut()[(row, col)] += 1;
                }
            }
        }
    }

    Ok(Composite {
        indices: IndexSet {
            ndvi: layer(SpectralIndex::NDVI)?,
            ndwi: layer(SpectralIndex::NDWI)?,
            evi: layer(SpectralIndex::EVI)?,
            ndci: layer(SpectralIndex::NDCI)?,
            savi: layer(SpectralIndex::SAVI)?,
            osavi: layer(SpectralIndex::OSAVI)?,
            ndci_fallback: scenes.iter().any(|s| s.ndci_fallback),
        },
        observations,
        scene_count: scenes.len(),
    })
}

/// Set every cell outside `mask` (0) to NaN
pub fn apply_mask(raster: &mut Raster<f64>, mask: &Raster<u8>) -> Result<()> {
    raster.ensure_same_shape(mask)?;
    ndarray::Zip::from(raster.data_mut())
        .and(mask.data())
        .for_each(|v, &m| {
            if m == 0 {
                *v = f64::NAN;
            }
        });
    Ok(())
}

/// Clip every index of a set to `mask`
pub fn clip_indices(set: &mut IndexSet, mask: &Raster<u8>) -> Result<()> {
    for index in SpectralIndex::ALL {
        apply_mask(set.get_mut(index), mask)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn set_with_ndvi(values: Vec<f64>, fallback: bool) -> IndexSet {
        let r = Raster::from_vec(values, 1, 3).unwrap();
        IndexSet {
            ndvi: r.clone(),
            ndwi: r.clone(),
            evi: r.clone(),
            ndci: r.clone(),
            savi: r.clone(),
            osavi: r,
            ndci_fallback: fallback,
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_relative_eq!(median(&mut [0.3, 0.1, 0.2]), 0.2);
        assert_relative_eq!(median(&mut [0.4, 0.1, 0.2, 0.3]), 0.25);
        assert!(median(&mut []).is_nan());
    }

    #[test]
    fn composite_ignores_masked_observations() {
        let scenes = vec![
            set_with_ndvi(vec![0.2, f64::NAN, 0.5], false),
            set_with_ndvi(vec![0.4, f64::NAN, f64::NAN], true),
            set_with_ndvi(vec![0.3, 0.6, f64::NAN], false),
        ];
        let c = median_composite(&scenes, CompositeParams::default()).unwrap();

        assert_relative_eq!(c.indices.ndvi.get(0, 0).unwrap(), 0.3);
        assert_relative_eq!(c.indices.ndvi.get(0, 1).unwrap(), 0.6);
        assert_relative_eq!(c.indices.ndvi.get(0, 2).unwrap(), 0.5);
        assert_eq!(c.observations.get(0, 0).unwrap(), 3);
        assert_eq!(c.observations.get(0, 1).unwrap(), 1);
        assert!(c.indices.ndci_fallback);
        assert_eq!(c.scene_count, 3);
    }

    #[test]
    fn min_observations_masks_sparse_pixels() {
        let scenes = vec![
            set_with_ndvi(vec![0.2, f64::NAN, 0.5], false),
            set_with_ndvi(vec![0.4, 0.1, f64::NAN], false),
        ];
        let c = median_composite(&scenes, CompositeParams { min_observations: 2 }).unwrap();
        assert_relative_eq!(c.indices.ndvi.get(0, 0).unwrap(), 0.3);
        assert!(c.indices.ndvi.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn empty_window_is_an_error() {
        assert!(median_composite(&[], CompositeParams::default()).is_err());
    }

    #[test]
    fn mask_clips_outside_cells() {
        let mut r = Raster::from_vec(vec![0.1, 0.2, 0.3], 1, 3).unwrap();
        let mask = Raster::from_vec(vec![1u8, 0, 1], 1, 3).unwrap();
        apply_mask(&mut r, &mask).unwrap();
        assert!(r.get(0, 1).unwrap().is_nan());
        assert_relative_eq!(r.get(0, 2).unwrap(), 0.3);
    }
}
