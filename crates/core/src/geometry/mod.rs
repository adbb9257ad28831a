//! Region-of-interest geometry
//!
//! Every analysis runs over a single closed ring in WGS84 longitude/latitude.
//! [`resolve_roi`] turns the loosely shaped GeoJSON clients send into that
//! ring; [`Roi`] guarantees it is closed, non-degenerate and simple.

mod buffer;
mod grid;
mod resolve;

pub use buffer::{buffer_ring, meters_to_degrees};
pub use grid::AnalysisGrid;
pub use resolve::{extract_ring, resolve_roi, resolve_roi_str};

use crate::error::{Error, Result};
use geo::{BoundingRect, Centroid, Contains, ConvexHull, GeodesicArea, Intersects};
use geo_types::{Coord, Line, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Rings smaller than this are treated as degenerate
const MIN_AREA_M2: f64 = 1e-3;

/// Axis-aligned bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// `[min_lon, min_lat, max_lon, max_lat]`, the order map clients expect
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// Canonical analysis region: one closed exterior ring plus the buffer that
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    polygon: Polygon<f64>,
    buffer_m: f64,
}

impl Roi {
    /// Validate a ring of `[lon, lat]` positions and close it if needed.
    ///
    /// Fails when fewer than 3 distinct vertices remain, a coordinate is not
    /// finite, the ring has no area or it crosses itself.
    pub fn from_ring(mut ring: Vec<[f64; 2]>, buffer_m: f64) -> Result<Self> {
        if !(buffer_m >= 0.0) || !buffer_m.is_finite() {
            return Err(Error::geometry(format!(
                "buffer must be a finite number of meters >= 0, got {}",
                buffer_m
            )));
        }
        if ring.iter().flatten().any(|c| !c.is_finite()) {
            return Err(Error::geometry("ring contains non-finite coordinates"));
        }

        ring.dedup();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(Error::geometry(format!(
                "ring needs at least 3 distinct vertices, got {}",
                ring.len()
            )));
        }
        if has_self_intersection(&ring) {
            return Err(Error::geometry("ring is self-intersecting"));
        }

        let mut coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
        coords.push(coords[0]);
        let polygon = Polygon::new(LineString::new(coords), vec![]);

        let roi = Self { polygon, buffer_m: 0.0 };
        if roi.area_m2() < MIN_AREA_M2 {
            return Err(Error::geometry("ring has zero area"));
        }

        if buffer_m > 0.0 {
            let mut buffered = buffer_ring(&ring, buffer_m);
            if has_self_intersection(&buffered) {
                // deep concavities fold the offset ring; buffer the hull instead
                buffered = buffer_ring(&convex_hull(&ring), buffer_m);
            }
            let mut roi = Self::from_ring(buffered, 0.0)?;
            roi.buffer_m = buffer_m;
            return Ok(roi);
        }
        Ok(roi)
    }

    /// Closed ring as `[lon, lat]` positions, first == last
    pub fn ring(&self) -> Vec<[f64; 2]> {
        self.polygon.exterior().coords().map(|c| [c.x, c.y]).collect()
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Buffer applied when building this ROI, meters
    pub fn buffer_m(&self) -> f64 {
        self.buffer_m
    }

    pub fn bounds(&self) -> Bounds {
        // a validated ring always has a bounding rect
        let rect = self
            .polygon
            .bounding_rect()
            .unwrap_or_else(|| geo_types::Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }));
        Bounds {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        }
    }

    /// `(lon, lat)` centroid
    pub fn centroid(&self) -> (f64, f64) {
        self.polygon
            .centroid()
            .map(|p| (p.x(), p.y()))
            .unwrap_or_else(|| {
                let b = self.bounds();
                ((b.min_lon + b.max_lon) / 2.0, (b.min_lat + b.max_lat) / 2.0)
            })
    }

    /// Geodesic area on the WGS84 ellipsoid, square meters
    pub fn area_m2(&self) -> f64 {
        self.polygon.geodesic_area_unsigned()
    }

    /// Geodesic area in hectares
    pub fn area_ha(&self) -> f64 {
        self.area_m2() / 10_000.0
    }

    /// Whether `(lon, lat)` lies strictly inside the ring
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygon.contains(&Point::new(lon, lat))
    }

    /// GeoJSON Polygon geometry for this ROI
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [self.ring()],
        })
    }
}

fn convex_hull(ring: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let points: Vec<Point<f64>> = ring.iter().map(|p| Point::new(p[0], p[1])).collect();
    let hull = geo_types::MultiPoint::new(points).convex_hull();
    let mut out: Vec<[f64; 2]> = hull.exterior().coords().map(|c| [c.x, c.y]).collect();
    out.pop();
    out
}

/// Any two non-adjacent edges touching means the ring is not simple.
fn has_self_intersection(ring: &[[f64; 2]]) -> bool {
    let n = ring.len();
    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            Line::new(Coord { x: a[0], y: a[1] }, Coord { x: b[0], y: b[1] })
        })
        .collect();

    for i in 0..n {
        for j in (i + 2)..n {
            // first and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<[f64; 2]> {
        vec![[-4.0, 37.0], [-3.99, 37.0], [-3.99, 37.01], [-4.0, 37.01]]
    }

    #[test]
    fn ring_is_closed() {
        let roi = Roi::from_ring(square(), 0.0).unwrap();
        let ring = roi.ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn duplicate_closing_vertex_is_accepted() {
        let mut ring = square();
        ring.push(ring[0]);
        assert!(Roi::from_ring(ring, 0.0).is_ok());
    }

    #[test]
    fn too_few_vertices() {
        let err = Roi::from_ring(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]], 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
    }

    #[test]
    fn bowtie_is_rejected() {
        let ring = vec![[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let err = Roi::from_ring(ring, 0.0).unwrap_err();
        assert!(err.to_string().contains("self-intersecting"));
    }

    #[test]
    fn collinear_ring_has_no_area() {
        let ring = vec![[0.0, 0.0], [0.0005, 0.0], [0.001, 0.0]];
        assert!(Roi::from_ring(ring, 0.0).is_err());
    }

    #[test]
    fn negative_buffer_is_rejected() {
        assert!(Roi::from_ring(square(), -5.0).is_err());
    }

    #[test]
    fn area_of_small_square() {
        // 0.01° x 0.01° at 37°N is ~ 889 m x 1109 m
        let roi = Roi::from_ring(square(), 0.0).unwrap();
        assert_relative_eq!(roi.area_ha(), 98.6, max_relative = 0.02);
    }

    #[test]
    fn buffer_grows_area_and_bounds() {
        let plain = Roi::from_ring(square(), 0.0).unwrap();
        let buffered = Roi::from_ring(square(), 50.0).unwrap();

        assert!(buffered.area_m2() > plain.area_m2());
        assert!(buffered.bounds().min_lon < plain.bounds().min_lon);
        assert_eq!(buffered.buffer_m(), 50.0);
    }

    #[test]
    fn contains_center() {
        let roi = Roi::from_ring(square(), 0.0).unwrap();
        assert!(roi.contains(-3.995, 37.005));
        assert!(!roi.contains(-3.98, 37.005));
    }
}
