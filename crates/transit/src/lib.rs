//! # transit-cache
//!
//! Local, read-optimized snapshot of a static transit feed with proximity
//! queries on top.
//!
//! ## Features
//!
//! - **Ingestion**: flat feed files into an embedded SQLite store, with stop
//!   agencies resolved from an explicit mapping or inferred from ids and URLs
//! - **Spatial queries**: bounding-box pre-filter, exact great-circle distance
//! - **Coverage deduplication**: nearby stops picked for route diversity,
//!   using a pluggable live route lookup
//!
//! ## Example
//!
//! ```no_run
//! use transit_cache::prelude::*;
//! use geo::Point;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! build_store(&ImportOptions::new("feed/"), std::path::Path::new("gtfs.db"))?;
//!
//! let cache = StopCache::open("gtfs.db")?;
//! let point = Point::new(-122.4194, 37.7749); // Market St
//! for nearby in cache.find_nearby_stops(point, 500.0, Some(5))? {
//!     println!("{} ({:.0} m)", nearby.stop.name, nearby.distance_m);
//! }
//! # Ok(())
//! # }
//! ```

pub mod coverage;
pub mod feed;
pub mod identifiers;
pub mod ingest;
pub mod models;
pub mod network;
pub mod spatial;
pub mod store;

#[cfg(test)]
mod test_fixtures;

// Re-exports for convenience
pub mod prelude {
    pub use crate::coverage::{find_nearest_stops, select_covering_stops, CoverageOptions, CoveredStop};
    pub use crate::identifiers::*;
    pub use crate::ingest::{build_store, import, ImportOptions, ImportReport, IngestError};
    pub use crate::models::{traits::*, types::*, Agency};
    pub use crate::network::{EnrichmentError, RouteEnrichment, StopMonitoringClient};
    pub use crate::store::{nearest_stops_on_route, RouteStops, StopCache};
}

pub use prelude::*;
