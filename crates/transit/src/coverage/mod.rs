//! Route-coverage deduplication.
//!
//! Picks nearby stops for diversity rather than raw proximity: a stop is only
//! selected if it brings at least one route that no earlier selection already
//! covers. Candidates are visited nearest first and selection order follows
//! that rank.

use std::collections::BTreeSet;
use std::time::Duration;

use geo::Point;
use tracing::{debug, warn};

use crate::models::{NearbyStop, Result, StopDirectory};
use crate::network::{EnrichmentError, RouteEnrichment};

/// Search radius for the "closest stops" flow, one mile.
pub const NEARBY_RADIUS_M: f64 = 1609.0;

/// Candidates considered by the "closest stops" flow before deduplication.
pub const NEARBY_CANDIDATES: usize = 50;

#[derive(Clone, Debug)]
pub struct CoverageOptions {
    pub max_results: usize,
    /// Upper bound on each enrichment call. A candidate that times out is skipped.
    pub enrichment_timeout: Duration,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            max_results: 3,
            enrichment_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoveredStop {
    pub stop: NearbyStop,
    /// Every route serving the stop, sorted. Not only the new ones.
    pub route_names: Vec<String>,
}

pub async fn select_covering_stops(
    candidates: Vec<NearbyStop>,
    enrichment: &dyn RouteEnrichment,
    options: &CoverageOptions,
) -> Vec<CoveredStop> {
    let mut selected = Vec::with_capacity(options.max_results);
    let mut covered: BTreeSet<String> = BTreeSet::new();

    for candidate in candidates {
        if selected.len() >= options.max_results {
            break;
        }

        if candidate.stop.known_agency().is_none() {
            debug!(stop_id = %candidate.stop.id, agency = ?candidate.stop.agency, "Skipping unsupported agency");
            continue;
        }

        let routes = match tokio::time::timeout(
            options.enrichment_timeout,
            enrichment.routes_serving(&candidate.stop),
        )
        .await
        {
            Ok(Ok(routes)) => routes,
            Ok(Err(e)) => {
                warn!(stop_id = %candidate.stop.id, error = %e, "Failed to fetch routes for stop");
                continue;
            }
            Err(_) => {
                let e = EnrichmentError::Timeout(options.enrichment_timeout);
                warn!(stop_id = %candidate.stop.id, error = %e, "Failed to fetch routes for stop");
                continue;
            }
        };

        if routes.is_subset(&covered) {
            debug!(stop_id = %candidate.stop.id, "No new routes");
            continue;
        }

        covered.extend(routes.iter().cloned());
        selected.push(CoveredStop {
            stop: candidate,
            route_names: routes.into_iter().collect(),
        });
    }

    selected
}

/// Nearby stops within a mile, deduplicated by the routes serving them.
pub async fn find_nearest_stops(
    directory: &dyn StopDirectory,
    enrichment: &dyn RouteEnrichment,
    point: Point,
    options: &CoverageOptions,
) -> Result<Vec<CoveredStop>> {
    let candidates = directory.find_nearby_stops(point, NEARBY_RADIUS_M, Some(NEARBY_CANDIDATES))?;
    debug!(candidates = candidates.len(), "Selecting covering stops");
    Ok(select_covering_stops(candidates, enrichment, options).await)
}
