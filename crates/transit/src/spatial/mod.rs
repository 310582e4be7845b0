//! Spatial indexing and query utilities.

pub mod queries;

pub use queries::{haversine_distance, BoundingBox, LongitudeRange, EARTH_RADIUS_M};
