//! Outward buffering of a lon/lat ring by a distance in meters.
//!
//! Vertices are projected to a local equirectangular plane centred on the
//! ring, offset along the bisector of their two edge normals (miter join,
//! capped at [`MITER_LIMIT`] times the distance) and projected back.

use crate::raster::EARTH_RADIUS_M;

/// Maximum miter length as a multiple of the buffer distance
const MITER_LIMIT: f64 = 4.0;

/// Degrees per meter `(dlon, dlat)` at latitude `lat`
pub fn meters_to_degrees(meters: f64, lat: f64) -> (f64, f64) {
    let m_per_deg_lat = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
    let m_per_deg_lon = m_per_deg_lat * lat.to_radians().cos().max(1e-6);
    (meters / m_per_deg_lon, meters / m_per_deg_lat)
}

/// Offset an open ring (no repeated closing vertex) outward by `distance_m`.
///
/// Returns an open ring with the same number of vertices.
pub fn buffer_ring(ring: &[[f64; 2]], distance_m: f64) -> Vec<[f64; 2]> {
    let n = ring.len();
    if n < 3 || distance_m <= 0.0 {
        return ring.to_vec();
    }

    let lon0 = ring.iter().map(|p| p[0]).sum::<f64>() / n as f64;
    let lat0 = ring.iter().map(|p| p[1]).sum::<f64>() / n as f64;
    let (deg_lon, deg_lat) = meters_to_degrees(1.0, lat0);

    let local: Vec<(f64, f64)> = ring
        .iter()
        .map(|p| ((p[0] - lon0) / deg_lon, (p[1] - lat0) / deg_lat))
        .collect();

    // Outward normal of edge (dx, dy) is (dy, -dx) for counter-clockwise rings
    let signed_area: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = local[i];
            let (x2, y2) = local[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();
    let orientation = if signed_area >= 0.0 { 1.0 } else { -1.0 };

    let edge_normal = |i: usize| -> (f64, f64) {
        let (x1, y1) = local[i];
        let (x2, y2) = local[(i + 1) % n];
        let (dx, dy) = (x2 - x1, y2 - y1);
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            return (0.0, 0.0);
        }
        (orientation * dy / len, -orientation * dx / len)
    };

    (0..n)
        .map(|i| {
            let prev = edge_normal((i + n - 1) % n);
            let next = edge_normal(i);
            let (mut bx, mut by) = (prev.0 + next.0, prev.1 + next.1);
            let blen = (bx * bx + by * by).sqrt();

            let (ox, oy) = if blen < 1e-12 {
                // reversal: push straight along one normal
                (next.0 * distance_m, next.1 * distance_m)
            } else {
                bx /= blen;
                by /= blen;
                let cos_half = (bx * next.0 + by * next.1).max(1.0 / MITER_LIMIT);
                let miter = distance_m / cos_half;
                (bx * miter, by * miter)
            };

            let (x, y) = local[i];
            [lon0 + (x + ox) * deg_lon, lat0 + (y + oy) * deg_lat]
        })
        .collect()
}
