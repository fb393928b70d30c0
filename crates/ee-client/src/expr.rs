//! The deferred expression graph.
//!
//! An [`Expr`] describes a server-side computation over the imagery catalog:
//! filters, per-image transforms, composite selection, band math, and
//! reductions. Building one is pure: no remote call, no materialized
//! pixels. The graph is serialized and shipped to the backend only at an
//! evaluation boundary (see [`crate::backend`]).

use serde::Serialize;
use serde_json::Value;

use ndvi_common::{GeoRegion, TimeWindow};

use crate::mask;

/// A node in the deferred computation graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    /// Root node: a named image catalog.
    ImageCollection { id: String },

    /// Keep images whose footprint intersects a geometry.
    FilterBounds { input: Box<Expr>, geometry: Value },

    /// Keep images acquired within `[start, end)` (RFC 3339).
    FilterDate {
        input: Box<Expr>,
        start: String,
        end: String,
    },

    /// Keep images whose metadata property is strictly below a value.
    FilterLt {
        input: Box<Expr>,
        property: String,
        value: f64,
    },

    /// Per-image transform: drop pixels with either cloud bit set in the
    /// quality band, rescale survivors by the divisor.
    MapCloudMask {
        input: Box<Expr>,
        qa_band: String,
        opaque_cloud_bit: u8,
        cirrus_bit: u8,
        divisor: f64,
    },

    /// Order a collection by a metadata property, newest first.
    SortDescending { input: Box<Expr>, property: String },

    /// Take the first image of a collection. Undefined content when the
    /// collection is empty; consumers needing a guaranteed answer probe
    /// existence first.
    First { input: Box<Expr> },

    /// Band math: (a − b) / (a + b) over the named band pair.
    NormalizedDifference {
        input: Box<Expr>,
        bands: [String; 2],
        output_band: String,
    },

    /// Spatial reduction of an image over a geometry at a given scale.
    ReduceRegion {
        input: Box<Expr>,
        reducer: String,
        geometry: Value,
        scale: f64,
    },
}

impl Expr {
    /// The operation name of this node, matching the serialized `op` tag.
    pub fn op_name(&self) -> &'static str {
        match self {
            Expr::ImageCollection { .. } => "image_collection",
            Expr::FilterBounds { .. } => "filter_bounds",
            Expr::FilterDate { .. } => "filter_date",
            Expr::FilterLt { .. } => "filter_lt",
            Expr::MapCloudMask { .. } => "map_cloud_mask",
            Expr::SortDescending { .. } => "sort_descending",
            Expr::First { .. } => "first",
            Expr::NormalizedDifference { .. } => "normalized_difference",
            Expr::ReduceRegion { .. } => "reduce_region",
        }
    }

    /// The node this one consumes, if any.
    pub fn input(&self) -> Option<&Expr> {
        match self {
            Expr::ImageCollection { .. } => None,
            Expr::FilterBounds { input, .. }
            | Expr::FilterDate { input, .. }
            | Expr::FilterLt { input, .. }
            | Expr::MapCloudMask { input, .. }
            | Expr::SortDescending { input, .. }
            | Expr::First { input }
            | Expr::NormalizedDifference { input, .. }
            | Expr::ReduceRegion { input, .. } => Some(input),
        }
    }

    /// Operation names from this node down to the root.
    pub fn op_chain(&self) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut node = Some(self);
        while let Some(expr) = node {
            chain.push(expr.op_name());
            node = expr.input();
        }
        chain
    }
}

/// Builder for deferred collection expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollectionExpr(Expr);

impl ImageCollectionExpr {
    /// Start from a named catalog.
    pub fn catalog(id: impl Into<String>) -> Self {
        Self(Expr::ImageCollection { id: id.into() })
    }

    /// Scope the collection to a region. Applied first so the backend
    /// narrows its search space before scanning metadata.
    pub fn filter_bounds(self, region: &GeoRegion) -> Self {
        Self(Expr::FilterBounds {
            input: Box::new(self.0),
            geometry: region.to_geometry(),
        })
    }

    /// Keep images acquired within the window.
    pub fn filter_date(self, window: &TimeWindow) -> Self {
        Self(Expr::FilterDate {
            input: Box::new(self.0),
            start: window.start_rfc3339(),
            end: window.end_rfc3339(),
        })
    }

    /// Keep images whose metadata property is strictly below `value`.
    pub fn filter_lt(self, property: impl Into<String>, value: f64) -> Self {
        Self(Expr::FilterLt {
            input: Box::new(self.0),
            property: property.into(),
            value,
        })
    }

    /// Describe the cloud mask over every image in the collection.
    pub fn map_cloud_mask(self) -> Self {
        Self(Expr::MapCloudMask {
            input: Box::new(self.0),
            qa_band: mask::QA_BAND.to_string(),
            opaque_cloud_bit: mask::OPAQUE_CLOUD_BIT,
            cirrus_bit: mask::CIRRUS_BIT,
            divisor: mask::REFLECTANCE_DIVISOR,
        })
    }

    /// Select the most recently acquired image: sort newest-first on the
    /// acquisition property and take the head. Ties resolve by catalog
    /// order.
    pub fn most_recent(self, acquisition_property: impl Into<String>) -> ImageExpr {
        let sorted = Expr::SortDescending {
            input: Box::new(self.0),
            property: acquisition_property.into(),
        };
        ImageExpr(Expr::First {
            input: Box::new(sorted),
        })
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }
}

/// Builder for deferred single-image expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageExpr(Expr);

impl ImageExpr {
    /// Derive the normalized-difference band (a − b) / (a + b).
    pub fn normalized_difference(self, band_a: &str, band_b: &str, output_band: &str) -> Self {
        Self(Expr::NormalizedDifference {
            input: Box::new(self.0),
            bands: [band_a.to_string(), band_b.to_string()],
            output_band: output_band.to_string(),
        })
    }

    /// Mean-reduce the image at a point geometry at the given scale. For a
    /// one-pixel query the mean equals the pixel value.
    pub fn reduce_mean_at(self, lon: f64, lat: f64, scale_m: f64) -> Expr {
        Expr::ReduceRegion {
            input: Box::new(self.0),
            reducer: "mean".to_string(),
            geometry: serde_json::json!({
                "type": "Point",
                "coordinates": [lon, lat],
            }),
            scale: scale_m,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndvi_common::BoundingBox;

    fn sample_region() -> GeoRegion {
        GeoRegion::Rect(BoundingBox::new(46.0, 35.0, 87.5, 55.5))
    }

    fn sample_window() -> TimeWindow {
        use chrono::TimeZone;
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        TimeWindow::last_days(90, now)
    }

    #[test]
    fn test_bounds_filter_applied_before_date_and_metadata() {
        let expr = ImageCollectionExpr::catalog("catalog/test")
            .filter_bounds(&sample_region())
            .filter_date(&sample_window())
            .filter_lt("CLOUDY_PIXEL_PERCENTAGE", 20.0)
            .into_expr();

        // Innermost-first: the bounds filter must sit closest to the root.
        let mut chain = expr.op_chain();
        chain.reverse();
        assert_eq!(
            chain,
            vec!["image_collection", "filter_bounds", "filter_date", "filter_lt"]
        );
    }

    #[test]
    fn test_most_recent_is_sort_then_first() {
        let image = ImageCollectionExpr::catalog("catalog/test")
            .filter_bounds(&sample_region())
            .most_recent("system:time_start");
        assert_eq!(
            image.expr().op_chain()[..2],
            ["first", "sort_descending"][..]
        );
    }

    #[test]
    fn test_cloud_mask_carries_bit_constants() {
        let expr = ImageCollectionExpr::catalog("catalog/test")
            .map_cloud_mask()
            .into_expr();
        match expr {
            Expr::MapCloudMask {
                qa_band,
                opaque_cloud_bit,
                cirrus_bit,
                divisor,
                ..
            } => {
                assert_eq!(qa_band, "QA60");
                assert_eq!(opaque_cloud_bit, 10);
                assert_eq!(cirrus_bit, 11);
                assert_eq!(divisor, 10000.0);
            }
            other => panic!("expected MapCloudMask, got {:?}", other),
        }
    }

    #[test]
    fn test_serialized_op_tags() {
        let expr = ImageCollectionExpr::catalog("catalog/test")
            .filter_bounds(&sample_region())
            .into_expr();
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["op"], "filter_bounds");
        assert_eq!(json["input"]["op"], "image_collection");
        assert_eq!(json["input"]["id"], "catalog/test");
    }

    #[test]
    fn test_reduce_mean_at_point() {
        let expr = ImageCollectionExpr::catalog("catalog/test")
            .most_recent("system:time_start")
            .reduce_mean_at(69.2, 41.3, 10.0);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["op"], "reduce_region");
        assert_eq!(json["reducer"], "mean");
        assert_eq!(json["scale"], 10.0);
        assert_eq!(json["geometry"]["coordinates"][0], 69.2);
    }
}
