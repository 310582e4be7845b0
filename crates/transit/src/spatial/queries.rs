//! Spatial query utilities for distance calculations.
//!
//! Proximity search is two-stage:
//! 1. **Bounding box filter**: a cheap latitude/longitude range the store can
//!    answer from its coordinate index
//! 2. **Haversine filter**: exact great-circle distance on the candidates
//!
//! The box is larger than the search circle, so stage 1
//! never drops a stop stage 2 would keep.

use geo::Point;

/// Mean Earth radius used for all distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude, rounded down.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Inflation applied to the bounding box.
const BOUNDING_BOX_SAFETY_FACTOR: f64 = 1.5;

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let d_lat = (p2.y() - p1.y()).to_radians();
    let d_lon = (p2.x() - p1.x()).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Longitude window of a [`BoundingBox`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LongitudeRange {
    /// `min <= lon <= max`
    Contiguous { min: f64, max: f64 },
    /// The window crosses the antimeridian: `lon >= min || lon <= max`
    Wrapped { min: f64, max: f64 },
    /// The window covers every longitude (near the poles or huge radii)
    All,
}

impl LongitudeRange {
    pub fn contains(&self, lon: f64) -> bool {
        match *self {
            Self::Contiguous { min, max } => lon >= min && lon <= max,
            Self::Wrapped { min, max } => lon >= min || lon <= max,
            Self::All => true,
        }
    }
}

/// Coarse pre-filter around a query point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub longitude: LongitudeRange,
}

impl BoundingBox {
    /// Box around `center` covering at least `radius_m` meters in every
    /// direction. Latitude degrees are converted directly; longitude degrees
    /// are scaled by the cosine of the query latitude.
    pub fn around(center: Point, radius_m: f64) -> Self {
        let lat = center.y();
        let lon = center.x();

        let lat_offset = radius_m / METERS_PER_DEGREE * BOUNDING_BOX_SAFETY_FACTOR;
        let lon_offset =
            radius_m / (METERS_PER_DEGREE * lat.to_radians().cos()) * BOUNDING_BOX_SAFETY_FACTOR;

        // A circle that reaches a pole spans every longitude.
        let reaches_pole = lat.abs() + lat_offset >= 90.0;
        let longitude = if reaches_pole || !lon_offset.is_finite() || lon_offset >= 180.0 {
            LongitudeRange::All
        } else {
            let (min, max) = (lon - lon_offset, lon + lon_offset);
            if min < -180.0 {
                LongitudeRange::Wrapped { min: min + 360.0, max }
            } else if max > 180.0 {
                LongitudeRange::Wrapped { min, max: max - 360.0 }
            } else {
                LongitudeRange::Contiguous { min, max }
            }
        };

        Self {
            min_lat: (lat - lat_offset).max(-90.0),
            max_lat: (lat + lat_offset).min(90.0),
            longitude,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.y() >= self.min_lat && point.y() <= self.max_lat && self.longitude.contains(point.x())
    }
}
