//! Common types and utilities shared across all ndvi services.

pub mod error;
pub mod region;
pub mod tile;
pub mod time;
pub mod viz;

pub use error::{NdviError, NdviResult};
pub use region::{service_area, BoundingBox, GeoRegion, RegionError};
pub use tile::{TileCoord, TileDescriptor, TileTemplateError};
pub use time::TimeWindow;
pub use viz::Visualization;
