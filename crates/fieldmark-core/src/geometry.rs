//! Geometry types for survey features.
//!
//! Converts raw coordinate rows into the point and line geometries stored
//! with Track, Note, and Image records. Coordinates are WGS84 and follow
//! the storage convention of (longitude, latitude); callers must not swap
//! these. Geometry is stored exactly as captured: no reprojection, no
//! simplification.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A 2-D WGS84 point in (longitude, latitude) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude in decimal degrees (positive = East, negative = West)
    pub lon: f64,
    /// Latitude in decimal degrees (positive = North, negative = South)
    pub lat: f64,
}

impl Point {
    /// Create a point from (longitude, latitude).
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convert to PostGIS-compatible WKT format.
    ///
    /// Returns a WKT string for use with `ST_GeomFromText(..., 4326)`.
    ///
    /// # Example
    /// ```
    /// use fieldmark_core::geometry::Point;
    ///
    /// let p = Point::new(2.2945, 48.8584);
    /// assert_eq!(p.to_wkt(), "POINT(2.2945 48.8584)");
    /// ```
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.lon, self.lat)
    }
}

/// An ordered sequence of vertices forming a line geometry.
///
/// Vertex order is capture-time order and is preserved verbatim; the line
/// a device recorded is the line that gets stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    vertices: Vec<Point>,
}

impl LineGeometry {
    /// Build a line from an ordered point sequence.
    ///
    /// Requires at least one point. A single-point sequence yields a
    /// degenerate single-vertex line; tracks with exactly one GPS fix are
    /// valid and must not fail here.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for an empty sequence.
    pub fn from_points(points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::InvalidInput(
                "line geometry requires at least one point".to_string(),
            ));
        }
        Ok(Self { vertices: points })
    }

    /// The ordered vertices of this line.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Convert to PostGIS-compatible WKT format.
    ///
    /// # Example
    /// ```
    /// use fieldmark_core::geometry::{LineGeometry, Point};
    ///
    /// let line = LineGeometry::from_points(vec![
    ///     Point::new(11.0, 46.0),
    ///     Point::new(11.1, 46.1),
    /// ])
    /// .unwrap();
    /// assert_eq!(line.to_wkt(), "LINESTRING(11 46, 11.1 46.1)");
    /// ```
    pub fn to_wkt(&self) -> String {
        let coords: Vec<String> = self
            .vertices
            .iter()
            .map(|p| format!("{} {}", p.lon, p.lat))
            .collect();
        format!("LINESTRING({})", coords.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_to_wkt() {
        let p = Point::new(2.2945, 48.8584);
        assert_eq!(p.to_wkt(), "POINT(2.2945 48.8584)");
    }

    #[test]
    fn test_point_to_wkt_negative_coords() {
        let p = Point::new(-74.006, 40.7128);
        assert_eq!(p.to_wkt(), "POINT(-74.006 40.7128)");
    }

    #[test]
    fn test_line_from_points_empty_fails() {
        let result = LineGeometry::from_points(vec![]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_line_single_point_is_valid() {
        // A track with exactly one GPS fix still produces a geometry.
        let line = LineGeometry::from_points(vec![Point::new(11.5, 46.5)]).unwrap();
        assert_eq!(line.vertex_count(), 1);
        assert_eq!(line.to_wkt(), "LINESTRING(11.5 46.5)");
    }

    #[test]
    fn test_line_preserves_vertex_order() {
        let points = vec![
            Point::new(11.0, 46.0),
            Point::new(11.2, 46.1),
            Point::new(11.1, 46.3),
        ];
        let line = LineGeometry::from_points(points.clone()).unwrap();
        assert_eq!(line.vertices(), points.as_slice());
    }

    #[test]
    fn test_line_to_wkt() {
        let line = LineGeometry::from_points(vec![
            Point::new(11.0, 46.0),
            Point::new(11.1, 46.1),
            Point::new(11.2, 46.2),
        ])
        .unwrap();
        assert_eq!(line.to_wkt(), "LINESTRING(11 46, 11.1 46.1, 11.2 46.2)");
    }

    #[test]
    fn test_line_no_simplification() {
        // Repeated identical fixes are stored as captured.
        let points = vec![
            Point::new(11.0, 46.0),
            Point::new(11.0, 46.0),
            Point::new(11.0, 46.0),
        ];
        let line = LineGeometry::from_points(points).unwrap();
        assert_eq!(line.vertex_count(), 3);
    }

    #[test]
    fn test_point_serde_roundtrip() {
        let p = Point::new(11.3426, 46.4983);
        let json = serde_json::to_string(&p).unwrap();
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
