//! Planar geometry helpers for projected (metric) coordinates.

use geo::{Area, BooleanOps, EuclideanDistance, Geometry, MultiPolygon};
use wkt::{ToWkt, TryFromWkt};

use crate::error::{NaturwbError, Result};

/// Parse a WKT `POLYGON` or `MULTIPOLYGON` into a multipolygon.
pub fn parse_polygon_wkt(text: &str) -> Result<MultiPolygon<f64>> {
    let geometry = Geometry::<f64>::try_from_wkt_str(text.trim())
        .map_err(|e| NaturwbError::InvalidGeometry(e.to_string()))?;
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(NaturwbError::InvalidGeometry(format!(
            "expected a polygon, got {}",
            geometry_kind(&other)
        ))),
    }
}

pub fn to_wkt(geometry: &MultiPolygon<f64>) -> String {
    geometry.wkt_string()
}

pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

pub fn intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    a.intersection(b)
}

/// Smallest distance between two multipolygons; zero when they touch or overlap.
pub fn distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.iter()
        .flat_map(|pa| b.iter().map(move |pb| pa.euclidean_distance(pb)))
        .fold(f64::INFINITY, f64::min)
}

/// True if `geometry` intersects the buffer of `around` with radius `radius_m`.
pub fn within_buffer(geometry: &MultiPolygon<f64>, around: &MultiPolygon<f64>, radius_m: f64) -> bool {
    distance(geometry, around) <= radius_m
}

/// Reject empty input geometries and those without any area.
pub fn validate_input(geometry: &MultiPolygon<f64>) -> Result<()> {
    if geometry.0.is_empty() {
        return Err(NaturwbError::InvalidGeometry("empty geometry".into()));
    }
    let area = area(geometry);
    if !area.is_finite() || area <= 0.0 {
        return Err(NaturwbError::InvalidGeometry(format!(
            "geometry has no area ({area})"
        )));
    }
    Ok(())
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) => "LINE",
        Geometry::LineString(_) => "LINESTRING",
        Geometry::Polygon(_) => "POLYGON",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        Geometry::Rect(_) => "RECT",
        Geometry::Triangle(_) => "TRIANGLE",
    }
}

#[cfg(test)]
pub(crate) fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    parse_polygon_wkt(&format!(
        "POLYGON(({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))"
    ))
    .unwrap()
}
