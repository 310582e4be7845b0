//! The query interface consumed by callers of the cache.
//!
//! `StopCache` is the store-backed implementation. Callers that only need
//! lookups (the coverage flow, the route-stops flow, tests) take a
//! `&dyn StopDirectory` so they can run against any implementation.

use geo::Point;

use crate::identifiers::*;
use crate::models::types::*;

/// Default cap for [`StopDirectory::search_stops`].
pub const DEFAULT_SEARCH_RESULTS: usize = 10;

pub trait StopDirectory: Send + Sync {
    /// Stops within `radius_m` meters of `point`, nearest first, each with its
    /// distance attached. Truncated to `max_results` when given.
    fn find_nearby_stops(
        &self,
        point: Point,
        radius_m: f64,
        max_results: Option<usize>,
    ) -> Result<Vec<NearbyStop>>;

    /// Exact primary-key lookup.
    fn get_stop(&self, id: &StopIdentifier) -> Result<Option<Stop>>;

    /// Case-insensitive exact match on stop id or stop code.
    ///
    /// Queries shorter than two characters return nothing.
    fn search_stops(&self, query: &str, max_results: usize) -> Result<Vec<Stop>>;

    /// Case-insensitive exact match on route short name.
    fn find_route(&self, query: &str) -> Result<Option<Route>>;

    fn stop_has_route(&self, stop_id: &StopIdentifier, route_id: &RouteIdentifier) -> Result<bool>;
}
