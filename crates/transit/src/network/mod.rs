//! Live route data.

pub mod stop_monitoring;
pub mod traits;

pub use stop_monitoring::{route_names_from_payload, StopMonitoringClient};
pub use traits::{EnrichmentError, RouteEnrichment, RoutesFuture};
