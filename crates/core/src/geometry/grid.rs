//! Analysis grid covering an ROI, and rasterization of the ROI onto it.

use super::{meters_to_degrees, Roi};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use serde::{Deserialize, Serialize};

/// North-up EPSG:4326 grid every scene of a request is delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisGrid {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl AnalysisGrid {
    /// Grid over the ROI bounding box with pixels of roughly `scale_m` meters.
    ///
    /// Fails with `InvalidParameter` when the grid would exceed `max_pixels`.
    pub fn for_roi(roi: &Roi, scale_m: f64, max_pixels: u64) -> Result<Self> {
        if !(scale_m > 0.0) {
            return Err(Error::InvalidParameter {
                name: "scale_m",
                value: scale_m.to_string(),
                reason: "must be positive".into(),
            });
        }

        let b = roi.bounds();
        let (_, lat) = roi.centroid();
        let (dlon, dlat) = meters_to_degrees(scale_m, lat);

        let cols = (((b.max_lon - b.min_lon) / dlon).ceil() as usize).max(1);
        let rows = (((b.max_lat - b.min_lat) / dlat).ceil() as usize).max(1);

        let pixels = rows as u64 * cols as u64;
        if pixels > max_pixels {
            return Err(Error::InvalidParameter {
                name: "max_pixels",
                value: pixels.to_string(),
                reason: format!("grid of {}x{} exceeds limit {}", rows, cols, max_pixels),
            });
        }

        Ok(Self {
            transform: GeoTransform::new(b.min_lon, b.max_lat, dlon, -dlat),
            rows,
            cols,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn crs(&self) -> CRS {
        CRS::wgs84()
    }

    /// Empty float raster on this grid, every cell NaN
    pub fn empty_raster(&self) -> Raster<f64> {
        Raster::filled(self.rows, self.cols, f64::NAN).with_geo(self.transform, Some(self.crs()))
    }

    /// Whether `raster` is georeferenced exactly on this grid
    pub fn matches<T: crate::raster::RasterElement>(&self, raster: &Raster<T>) -> bool {
        raster.shape() == self.shape() && *raster.transform() == self.transform
    }

    /// 1 where the pixel center is inside the ROI, 0 elsewhere.
    ///
    /// An ROI smaller than one pixel still covers the pixel holding its
    /// centroid, so the mask is never empty.
    pub fn rasterize(&self, roi: &Roi) -> Raster<u8> {
        let mut mask: Raster<u8> =
            Raster::new(self.rows, self.cols).with_geo(self.transform, Some(self.crs()));
        let data = mask.data_mut();
        let mut inside = 0usize;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let (lon, lat) = self.transform.pixel_to_geo(col, row);
                if roi.contains(lon, lat) {
                    data[(row, col)] = 1;
                    inside += 1;
                }
            }
        }
        if inside == 0 {
            let (lon, lat) = roi.centroid();
            let (px, py) = self.transform.geo_to_pixel(lon, lat);
            let col = (px.floor().max(0.0) as usize).min(self.cols - 1);
            let row = (py.floor().max(0.0) as usize).min(self.rows - 1);
            data[(row, col)] = 1;
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roi() -> Roi {
        Roi::from_ring(
            vec![[-4.0, 37.0], [-3.99, 37.0], [-3.99, 37.01], [-4.0, 37.01]],
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn grid_covers_roi_at_scale() {
        let grid = AnalysisGrid::for_roi(&roi(), 10.0, 1_000_000_000).unwrap();
        // ~889 m wide, ~1112 m tall
        assert!((88..=91).contains(&grid.cols));
        assert!((110..=113).contains(&grid.rows));
        assert!(grid.transform.pixel_height < 0.0);
    }

    #[test]
    fn pixel_limit() {
        let err = AnalysisGrid::for_roi(&roi(), 10.0, 1_000).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "max_pixels", .. }));
    }

    #[test]
    fn rasterized_square_fills_grid_interior() {
        let grid = AnalysisGrid::for_roi(&roi(), 100.0, 1_000_000).unwrap();
        let mask = grid.rasterize(&roi());
        let inside = mask.data().iter().filter(|v| **v == 1).count();
        // every pixel center except the partial last row/column is inside
        assert!(inside >= (grid.rows - 1) * (grid.cols - 1));
        assert!(grid.matches(&mask));
    }

    #[test]
    fn tiny_roi_keeps_centroid_pixel() {
        let tiny = Roi::from_ring(
            vec![[-4.0, 37.0], [-3.99995, 37.0], [-3.99995, 37.00005], [-4.0, 37.00005]],
            0.0,
        )
        .unwrap();
        let grid = AnalysisGrid::for_roi(&tiny, 30.0, 1_000).unwrap();
        let mask = grid.rasterize(&tiny);
        assert_eq!(mask.data().iter().filter(|v| **v == 1).count(), 1);
    }
}
