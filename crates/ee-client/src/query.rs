//! Image query assembly: the fixed pipeline from catalog to composite.

use ndvi_common::{GeoRegion, TimeWindow};

use crate::bands;
use crate::expr::{ImageCollectionExpr, ImageExpr};

/// Surface-reflectance catalog the pipeline draws from.
pub const COLLECTION_ID: &str = "COPERNICUS/S2_HARMONIZED";

/// Per-image metadata property holding the scene cloud percentage.
pub const CLOUD_COVER_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";

/// Scenes at or above this cloud percentage are filtered out.
pub const MAX_CLOUD_COVER_PCT: f64 = 20.0;

/// Per-image metadata property holding the acquisition timestamp.
pub const ACQUISITION_TIME_PROPERTY: &str = "system:time_start";

/// Window length for wide-area tile queries.
pub const TILE_WINDOW_DAYS: i64 = 120;

/// Window length for point-sample queries.
pub const POINT_WINDOW_DAYS: i64 = 90;

/// Reduction scale matching the sensor's ground sampling distance, meters.
pub const SAMPLE_SCALE_METERS: f64 = 10.0;

/// A fully determined catalog query: region, window, and the fixed cloud
/// threshold. Immutable after construction; the expression builders below
/// are the only consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    pub region: GeoRegion,
    pub window: TimeWindow,
}

impl ImageQuery {
    pub fn new(region: GeoRegion, window: TimeWindow) -> Self {
        Self { region, window }
    }

    /// The deferred composite: filter by bounds, then date, then cloud
    /// cover; mask clouds per image; pick the most recent survivor.
    pub fn composite(&self) -> ImageExpr {
        ImageCollectionExpr::catalog(COLLECTION_ID)
            .filter_bounds(&self.region)
            .filter_date(&self.window)
            .filter_lt(CLOUD_COVER_PROPERTY, MAX_CLOUD_COVER_PCT)
            .map_cloud_mask()
            .most_recent(ACQUISITION_TIME_PROPERTY)
    }

    /// The deferred NDVI image derived from the composite.
    pub fn ndvi(&self) -> ImageExpr {
        self.composite()
            .normalized_difference(bands::NIR, bands::RED, bands::NDVI)
    }

    /// Human-readable description of the query scope, used in error
    /// messages.
    pub fn describe(&self) -> String {
        let days = (self.window.end - self.window.start).num_days();
        match self.region {
            GeoRegion::Point { lon, lat } => {
                format!("point ({}, {}), last {} days", lon, lat, days)
            }
            GeoRegion::Rect(bbox) => format!(
                "area [{}, {}, {}, {}], last {} days",
                bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat, days
            ),
        }
    }
}
