//! "Where can I catch route X near here?"

use geo::Point;
use tracing::debug;

use crate::models::{Agency, NearbyStop, Result, Route, StopDirectory};

/// Search radius around the caller, two miles.
pub const ROUTE_SEARCH_RADIUS_M: f64 = 3218.0;

/// How many stops on the route are returned.
pub const ROUTE_STOP_RESULTS: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct RouteStops {
    pub route: Route,
    /// Stops serving `route`, nearest first.
    pub stops: Vec<NearbyStop>,
}

impl RouteStops {
    /// `None` when the route's agency has no live data source.
    pub fn agency(&self) -> Option<Agency> {
        self.route.known_agency()
    }
}

/// Resolve `route_query` by short name and return the nearest stops around
/// `point` that the route serves. `None` if no route matches.
pub fn nearest_stops_on_route(
    directory: &dyn StopDirectory,
    route_query: &str,
    point: Point,
) -> Result<Option<RouteStops>> {
    let Some(route) = directory.find_route(route_query)? else {
        debug!(query = route_query, "No route with that short name");
        return Ok(None);
    };

    let mut stops = Vec::with_capacity(ROUTE_STOP_RESULTS);
    for candidate in directory.find_nearby_stops(point, ROUTE_SEARCH_RADIUS_M, None)? {
        if stops.len() == ROUTE_STOP_RESULTS {
            break;
        }
        if directory.stop_has_route(&candidate.stop.id, &route.id)? {
            stops.push(candidate);
        }
    }

    Ok(Some(RouteStops { route, stops }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{build_cache, SAMPLE_FEED};

    fn market_and_4th() -> Point {
        Point::new(-122.4194, 37.7749)
    }

    fn ids(found: &RouteStops) -> Vec<&str> {
        found.stops.iter().map(|s| s.stop.id.as_str()).collect()
    }

    #[test]
    fn test_route_stops_filtered_by_association() {
        let (_dir, cache) = build_cache(SAMPLE_FEED);

        let k = nearest_stops_on_route(&cache, "k", market_and_4th()).unwrap().unwrap();
        assert_eq!(k.route.id.as_str(), "K");
        assert_eq!(ids(&k), vec!["S1", "SF:100"]);
        assert_eq!(k.agency(), Some(Agency::Muni));

        let n = nearest_stops_on_route(&cache, "N", market_and_4th()).unwrap().unwrap();
        assert_eq!(ids(&n), vec!["S1", "S2"]);
    }

    #[test]
    fn test_route_stops_outside_radius() {
        let (_dir, cache) = build_cache(SAMPLE_FEED);
        // Diridon, nowhere near the K.
        let found = nearest_stops_on_route(&cache, "K", Point::new(-121.9026, 37.3297))
            .unwrap()
            .unwrap();
        assert!(found.stops.is_empty());
    }

    #[test]
    fn test_unknown_route() {
        let (_dir, cache) = build_cache(SAMPLE_FEED);
        assert!(nearest_stops_on_route(&cache, "38R", market_and_4th()).unwrap().is_none());
    }

    #[test]
    fn test_capped_at_three() {
        let stops = "stop_id,stop_name,stop_lat,stop_lon\n\
                     A,A,37.0000,-122.0\n\
                     B,B,37.0010,-122.0\n\
                     C,C,37.0020,-122.0\n\
                     D,D,37.0030,-122.0\n\
                     E,E,37.0040,-122.0\n";
        let stop_times = "trip_id,stop_id\nt,A\nt,B\nt,C\nt,D\nt,E\n";
        let (_dir, cache) = build_cache(&[
            ("stops.txt", stops),
            ("routes.txt", "route_id,route_short_name,agency_id\n22,22,SF\n"),
            ("trips.txt", "trip_id,route_id\nt,22\n"),
            ("stop_times.txt", stop_times),
        ]);

        let found = nearest_stops_on_route(&cache, "22", Point::new(-122.0, 37.0))
            .unwrap()
            .unwrap();
        assert_eq!(ids(&found), vec!["A", "B", "C"]);
    }
}
