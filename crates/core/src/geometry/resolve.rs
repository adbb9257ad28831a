//! GeoJSON-ish input to a single exterior ring.
//!
//! Accepted shapes, unwrapped in this order:
//! - JSON text (parsed first)
//! - `FeatureCollection` → first feature
//! - `Feature` → its geometry
//! - `MultiPolygon` → first polygon
//! - `Polygon` → exterior ring
//! - bare `{ "coordinates": ... }` without a type, where nesting depth decides
//!   between MultiPolygon, Polygon and a plain ring

use super::Roi;
use crate::error::{Error, Result};
use serde_json::Value;

/// Resolve a GeoJSON value into a validated [`Roi`] buffered by `buffer_m`.
pub fn resolve_roi(input: &Value, buffer_m: f64) -> Result<Roi> {
    let ring = extract_ring(input)?;
    Roi::from_ring(ring, buffer_m)
}

/// Same as [`resolve_roi`] for JSON text.
pub fn resolve_roi_str(input: &str, buffer_m: f64) -> Result<Roi> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| Error::geometry(format!("ROI is not valid JSON: {}", e)))?;
    resolve_roi(&value, buffer_m)
}

/// Extract the exterior ring as `[lon, lat]` positions without validating it.
pub fn extract_ring(input: &Value) -> Result<Vec<[f64; 2]>> {
    match input {
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text)
                .map_err(|e| Error::geometry(format!("ROI is not valid JSON: {}", e)))?;
            extract_ring(&parsed)
        }
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                let first = map
                    .get("features")
                    .and_then(Value::as_array)
                    .and_then(|f| f.first())
                    .ok_or_else(|| Error::geometry("FeatureCollection has no features"))?;
                extract_ring(first)
            }
            Some("Feature") => {
                let geometry = map
                    .get("geometry")
                    .filter(|g| !g.is_null())
                    .ok_or_else(|| Error::geometry("Feature has no geometry"))?;
                extract_ring(geometry)
            }
            Some("Polygon") => polygon_exterior(coordinates(map)?),
            Some("MultiPolygon") => {
                let first = coordinates(map)?
                    .as_array()
                    .and_then(|polys| polys.first())
                    .ok_or_else(|| Error::geometry("MultiPolygon has no polygons"))?;
                polygon_exterior(first)
            }
            Some(other) => Err(Error::geometry(format!(
                "unsupported geometry type '{}'",
                other
            ))),
            None => bare_coordinates(coordinates(map)?),
        },
        _ => Err(Error::geometry("ROI must be a GeoJSON object")),
    }
}

fn coordinates(map: &serde_json::Map<String, Value>) -> Result<&Value> {
    map.get("coordinates")
        .ok_or_else(|| Error::geometry("no coordinates found"))
}

fn polygon_exterior(polygon: &Value) -> Result<Vec<[f64; 2]>> {
    let ring = polygon
        .as_array()
        .and_then(|rings| rings.first())
        .ok_or_else(|| Error::geometry("polygon has no exterior ring"))?;
    parse_ring(ring)
}

/// Legacy input: `coordinates` alone, typed only by how deep the arrays nest.
fn bare_coordinates(coords: &Value) -> Result<Vec<[f64; 2]>> {
    match depth(coords) {
        4 => coords
            .as_array()
            .and_then(|polys| polys.first())
            .ok_or_else(|| Error::geometry("empty coordinates"))
            .and_then(polygon_exterior),
        3 => polygon_exterior(coords),
        2 => parse_ring(coords),
        d => Err(Error::geometry(format!(
            "cannot interpret coordinates nested {} levels deep",
            d
        ))),
    }
}

/// Array nesting depth following first elements; a position is depth 1.
fn depth(value: &Value) -> usize {
    match value.as_array().and_then(|a| a.first()) {
        Some(first) => 1 + depth(first),
        None if value.is_array() => 1,
        None => 0,
    }
}

fn parse_ring(ring: &Value) -> Result<Vec<[f64; 2]>> {
    let positions = ring
        .as_array()
        .ok_or_else(|| Error::geometry("ring is not an array"))?;
    if positions.is_empty() {
        return Err(Error::geometry("no coordinates found"));
    }
    positions.iter().map(parse_position).collect()
}

fn parse_position(position: &Value) -> Result<[f64; 2]> {
    let pair = position
        .as_array()
        .filter(|p| p.len() >= 2)
        .ok_or_else(|| Error::geometry(format!("invalid position {}", position)))?;
    match (pair[0].as_f64(), pair[1].as_f64()) {
        (Some(lon), Some(lat)) => Ok([lon, lat]),
        _ => Err(Error::geometry(format!("non-numeric position {}", position))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ring_coords() -> Value {
        json!([[-4.0, 37.0], [-3.99, 37.0], [-3.99, 37.01], [-4.0, 37.01], [-4.0, 37.0]])
    }

    #[test]
    fn polygon() {
        let v = json!({"type": "Polygon", "coordinates": [ring_coords()]});
        assert_eq!(extract_ring(&v).unwrap().len(), 5);
    }

    #[test]
    fn feature_collection_uses_first_feature() {
        let v = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [ring_coords()]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0]]]}}
            ]
        });
        let ring = extract_ring(&v).unwrap();
        assert_eq!(ring[0], [-4.0, 37.0]);
    }

    #[test]
    fn multipolygon_uses_first_polygon() {
        let v = json!({"type": "MultiPolygon", "coordinates": [[ring_coords()], [[[1.0, 1.0]]]]});
        assert_eq!(extract_ring(&v).unwrap().len(), 5);
    }

    #[test]
    fn legacy_bare_coordinates_by_depth() {
        let poly = json!({"coordinates": [ring_coords()]});
        let multi = json!({"coordinates": [[ring_coords()]]});
        assert_eq!(extract_ring(&poly).unwrap().len(), 5);
        assert_eq!(extract_ring(&multi).unwrap().len(), 5);
    }

    #[test]
    fn json_text_is_parsed() {
        let text = json!({"type": "Polygon", "coordinates": [ring_coords()]}).to_string();
        let roi = resolve_roi(&Value::String(text.clone()), 0.0).unwrap();
        assert_eq!(roi.ring().len(), 5);
        assert!(resolve_roi_str(&text, 10.0).is_ok());
    }

    #[test]
    fn missing_coordinates() {
        let err = extract_ring(&json!({"type": "Feature", "geometry": null})).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert!(extract_ring(&json!({"foo": 1})).is_err());
        assert!(extract_ring(&json!({"type": "Point", "coordinates": [1.0, 2.0]})).is_err());
    }

    #[test]
    fn unclosed_ring_is_closed_by_resolver() {
        let v = json!({"type": "Polygon", "coordinates": [[[-4.0, 37.0], [-3.99, 37.0], [-3.99, 37.01]]]});
        let roi = resolve_roi(&v, 0.0).unwrap();
        let ring = roi.ring();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], ring[3]);
    }
}
