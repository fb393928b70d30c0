//! Geographic regions: bounding rectangles and single points.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors from validating geographic coordinates.
#[derive(Debug, Error, PartialEq)]
pub enum RegionError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Check whether a point falls inside the box (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// The box corners as a closed GeoJSON polygon ring.
    pub fn polygon_ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.min_lon, self.min_lat],
            [self.max_lon, self.min_lat],
            [self.max_lon, self.max_lat],
            [self.min_lon, self.max_lat],
            [self.min_lon, self.min_lat],
        ]
    }
}

/// The fixed service-area box, approximating Central Asia.
pub fn service_area() -> BoundingBox {
    BoundingBox::new(46.0, 35.0, 87.5, 55.5)
}

/// A spatial scope for a catalog query: a rectangle or a single point.
///
/// Immutable once constructed; every query carries one so the catalog search
/// is always spatially bounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoRegion {
    Rect(BoundingBox),
    Point { lon: f64, lat: f64 },
}

impl GeoRegion {
    /// Build a point region, validating coordinate ranges.
    ///
    /// NaN and infinite values fail the range checks.
    pub fn point(lon: f64, lat: f64) -> Result<Self, RegionError> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(RegionError::LongitudeOutOfRange(lon));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(RegionError::LatitudeOutOfRange(lat));
        }
        Ok(GeoRegion::Point { lon, lat })
    }

    /// GeoJSON-style geometry encoding for the backend.
    pub fn to_geometry(&self) -> Value {
        match self {
            GeoRegion::Rect(bbox) => json!({
                "type": "Polygon",
                "coordinates": [bbox.polygon_ring()],
            }),
            GeoRegion::Point { lon, lat } => json!({
                "type": "Point",
                "coordinates": [lon, lat],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_area_is_plausible() {
        let area = service_area();
        assert!(area.min_lon < area.max_lon);
        assert!(area.min_lat < area.max_lat);
        // Tashkent is inside the service area.
        assert!(area.contains(69.24, 41.31));
        // Lisbon is not.
        assert!(!area.contains(-9.14, 38.72));
    }

    #[test]
    fn test_point_validation() {
        assert!(GeoRegion::point(69.2, 41.3).is_ok());
        assert_eq!(
            GeoRegion::point(69.2, 91.0),
            Err(RegionError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            GeoRegion::point(-181.0, 41.3),
            Err(RegionError::LongitudeOutOfRange(-181.0))
        );
        assert!(GeoRegion::point(f64::NAN, 41.3).is_err());
        assert!(GeoRegion::point(69.2, f64::INFINITY).is_err());
    }

    #[test]
    fn test_rect_geometry_ring_is_closed() {
        let geom = GeoRegion::Rect(BoundingBox::new(0.0, 0.0, 10.0, 5.0)).to_geometry();
        assert_eq!(geom["type"], "Polygon");
        let ring = geom["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_point_geometry() {
        let geom = GeoRegion::point(69.2, 41.3).unwrap().to_geometry();
        assert_eq!(geom["type"], "Point");
        assert_eq!(geom["coordinates"][0], 69.2);
        assert_eq!(geom["coordinates"][1], 41.3);
    }
}
