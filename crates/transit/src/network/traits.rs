//! Pluggable route enrichment.
//!
//! The coverage selector asks an implementation of [`RouteEnrichment`] which
//! routes serve a stop right now. The live implementation is
//! [`super::StopMonitoringClient`]; tests plug in canned answers.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::models::Stop;

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {0}")]
    Status(reqwest::StatusCode),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Agency {0:?} has no live data source")]
    UnsupportedAgency(String),
}

pub type RoutesFuture<'a> =
    Pin<Box<dyn Future<Output = Result<BTreeSet<String>, EnrichmentError>> + Send + 'a>>;

/// Live "which routes serve this stop" lookup.
pub trait RouteEnrichment: Send + Sync {
    /// Route names currently serving `stop`. An empty set is a valid answer.
    fn routes_serving<'a>(&'a self, stop: &'a Stop) -> RoutesFuture<'a>;
}
