//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (IUGG)
pub(crate) const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// North-up affine transform between pixel and map coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative for north-up grids. Orbita never receives
/// rotated grids from the compute platform, so rotation terms are not kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates `(col, row)`; NaN for a degenerate transform
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width.abs() < 1e-15 || self.pixel_height.abs() < 1e-15 {
            return (f64::NAN, f64::NAN);
        }
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` for a grid of the given size
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let x1 = self.origin_x + width as f64 * self.pixel_width;
        let y1 = self.origin_y + height as f64 * self.pixel_height;
        (
            self.origin_x.min(x1),
            self.origin_y.min(y1),
            self.origin_x.max(x1),
            self.origin_y.max(y1),
        )
    }

    /// Ground area of one cell in row `row`, in square meters.
    ///
    /// Geographic grids use the spherical zone formula
    /// `R² · Δλ · |sin φ₂ − sin φ₁|`; projected grids are assumed metric.
    pub fn cell_area_m2(&self, row: usize, geographic: bool) -> f64 {
        if !geographic {
            return (self.pixel_width * self.pixel_height).abs();
        }
        let lat_top = self.origin_y + row as f64 * self.pixel_height;
        let lat_bottom = lat_top + self.pixel_height;
        let dlon = self.pixel_width.abs().to_radians();
        EARTH_RADIUS_M
            * EARTH_RADIUS_M
            * dlon
            * (lat_top.to_radians().sin() - lat_bottom.to_radians().sin()).abs()
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_centers_map_back_inside_the_cell() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn bounds_of_a_north_up_grid() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn projected_cells_are_metric() {
        let gt = GeoTransform::new(500_000.0, 4_200_000.0, 10.0, -10.0);
        assert_relative_eq!(gt.cell_area_m2(0, false), 100.0);
    }

    #[test]
    fn geographic_cells_shrink_with_latitude() {
        // ~10 m cells at the equator and at 60°N
        let deg = 10.0 / 111_195.0;
        let equator = GeoTransform::new(0.0, deg, deg, -deg);
        let north = GeoTransform::new(0.0, 60.0, deg, -deg);

        assert_relative_eq!(equator.cell_area_m2(0, true), 100.0, max_relative = 1e-3);
        assert_relative_eq!(north.cell_area_m2(0, true), 50.0, max_relative = 1e-2);
    }
}
