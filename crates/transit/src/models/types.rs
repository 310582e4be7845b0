//! Core data types and enums for cached feed data.

use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;
use crate::models::agency::Agency;

// ============================================================================
// Enums
// ============================================================================

/// GTFS route types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RouteType {
    Tram = 0,
    Subway = 1,
    Rail = 2,
    Bus = 3,
    Ferry = 4,
    CableTram = 5,
    AerialLift = 6,
    Funicular = 7,
    Trolleybus = 11,
    Monorail = 12,
}

impl RouteType {
    pub fn from_gtfs(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Tram),
            1 => Some(Self::Subway),
            2 => Some(Self::Rail),
            3 => Some(Self::Bus),
            4 => Some(Self::Ferry),
            5 => Some(Self::CableTram),
            6 => Some(Self::AerialLift),
            7 => Some(Self::Funicular),
            11 => Some(Self::Trolleybus),
            12 => Some(Self::Monorail),
            _ => None,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A boarding location as persisted in the store.
///
/// `location` follows the `geo` convention: x is longitude, y is latitude.
#[derive(Clone, Debug, PartialEq)]
pub struct Stop {
    pub id: StopIdentifier,
    pub name: Arc<str>,
    pub code: Option<Arc<str>>,
    pub location: Point,
    /// Operating agency code, `None` when ingestion could not resolve one.
    pub agency: Option<Arc<str>>,
}

impl Stop {
    pub fn latitude(&self) -> f64 {
        self.location.y()
    }

    pub fn longitude(&self) -> f64 {
        self.location.x()
    }

    /// The identifier riders see on the pole: the short code when the feed
    /// has one, the stop id otherwise.
    pub fn public_code(&self) -> &str {
        self.code.as_deref().unwrap_or(self.id.as_str())
    }

    /// The agency, if it is one this crate knows how to query live.
    pub fn known_agency(&self) -> Option<Agency> {
        self.agency.as_deref().and_then(Agency::from_code)
    }
}

/// A stop returned by a proximity query, with its great-circle distance from
/// the query point in meters.
#[derive(Clone, Debug, PartialEq)]
pub struct NearbyStop {
    pub stop: Stop,
    pub distance_m: f64,
}

/// A route as persisted in the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub id: RouteIdentifier,
    pub short_name: Option<Arc<str>>,
    pub long_name: Option<Arc<str>>,
    pub route_type: Option<RouteType>,
    pub color: Option<Arc<str>>,
    pub text_color: Option<Arc<str>>,
    pub agency_id: Option<Arc<str>>,
}

impl Route {
    /// Short name for display, falling back to the long name, then the id.
    pub fn display_name(&self) -> &str {
        self.short_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.long_name.as_deref())
            .unwrap_or(self.id.as_str())
    }

    pub fn known_agency(&self) -> Option<Agency> {
        self.agency_id.as_deref().and_then(Agency::from_code)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Stop cache not initialized, call initialize() first")]
    NotReady,

    #[error("Store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No store connection available: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type Result<T> = std::result::Result<T, TransitError>;
