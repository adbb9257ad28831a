//! Georeferenced cell grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid.
///
/// Bands, index layers and zone maps all share this type. Cells are stored
/// row-major in an `ndarray::Array2` with an affine transform, an optional
/// CRS and an optional nodata value.
///
/// ```ignore
/// use orbita_core::Raster;
///
/// let mut ndvi: Raster<f64> = Raster::filled(100, 100, f64::NAN);
/// ndvi.set(10, 20, 0.62)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Builder-style georeferencing
    pub fn with_geo(mut self, transform: GeoTransform, crs: Option<CRS>) -> Self {
        self.transform = transform;
        self.crs = crs;
        self
    }

    /// Same grid and CRS, different cell type, filled with `fill`
    pub fn like_with<U: RasterElement>(&self, fill: U) -> Raster<U> {
        Raster {
            data: Array2::from_elem(self.data.dim(), fill),
            transform: self.transform,
            crs: self.crs,
            nodata: None,
        }
    }

    /// Apply `f` to every cell, keeping the georeferencing
    pub fn map<U: RasterElement>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
            crs: self.crs,
            nodata: None,
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fails with `SizeMismatch` unless `other` has the same shape
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let (er, ec) = self.shape();
        let (ar, ac) = other.shape();
        if er != ar || ec != ac {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Whether the grid is in degrees. A raster without CRS is treated as metric.
    pub fn is_geographic(&self) -> bool {
        self.crs.as_ref().is_some_and(CRS::is_geographic)
    }

    /// Ground area of a cell in `row`, square meters
    pub fn cell_area_m2(&self, row: usize) -> f64 {
        self.transform.cell_area_m2(row, self.is_geographic())
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_raster_is_zeroed_and_metric() {
        let raster: Raster<f64> = Raster::new(100, 200);
        assert_eq!(raster.shape(), (100, 200));
        assert!(raster.data().iter().all(|v| *v == 0.0));
        assert!(!raster.is_geographic());
    }

    #[test]
    fn out_of_range_writes_fail() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.set(10, 0, 1.0).is_err());
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a: Raster<f64> = Raster::new(2, 2);
        let b: Raster<i32> = Raster::new(2, 3);
        assert!(matches!(a.ensure_same_shape(&b), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn map_keeps_georeference() {
        let r = Raster::filled(2, 2, 0.5f64)
            .with_geo(GeoTransform::new(-4.0, 38.0, 1e-4, -1e-4), Some(CRS::wgs84()));
        let mask = r.map(|v| u8::from(v > 0.4));
        assert_eq!(mask.get(1, 1).unwrap(), 1);
        assert!(mask.is_geographic());
        assert_eq!(mask.transform(), r.transform());
    }
}
