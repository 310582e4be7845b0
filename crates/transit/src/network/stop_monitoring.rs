//! 511 SF Bay StopMonitoring client.

use std::collections::BTreeSet;

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::traits::{EnrichmentError, RouteEnrichment, RoutesFuture};
use crate::models::{Agency, Stop};

pub const DEFAULT_BASE_URL: &str = "https://api.511.org/transit";

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct StopMonitoringResponse {
    #[serde(default)]
    service_delivery: ServiceDelivery,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ServiceDelivery {
    #[serde(default)]
    stop_monitoring_delivery: StopMonitoringDelivery,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct StopMonitoringDelivery {
    #[serde(default)]
    monitored_stop_visit: Vec<MonitoredStopVisit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredStopVisit {
    #[serde(default)]
    monitored_vehicle_journey: Option<MonitoredVehicleJourney>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredVehicleJourney {
    #[serde(default)]
    published_line_name: Option<String>,
}

/// Distinct, non-empty published line names in a StopMonitoring payload.
///
/// 511 prefixes its JSON with a UTF-8 byte order mark.
pub fn route_names_from_payload(payload: &[u8]) -> Result<BTreeSet<String>, EnrichmentError> {
    let payload = payload.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(payload);
    let response: StopMonitoringResponse = serde_json::from_slice(payload)?;

    Ok(response
        .service_delivery
        .stop_monitoring_delivery
        .monitored_stop_visit
        .into_iter()
        .filter_map(|visit| visit.monitored_vehicle_journey?.published_line_name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

pub struct StopMonitoringClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl StopMonitoringClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn request_url(&self, agency: Agency, stop: &Stop) -> Result<Url, EnrichmentError> {
        let endpoint = format!("{}/StopMonitoring", self.base_url.trim_end_matches('/'));
        Url::parse_with_params(
            &endpoint,
            [
                ("api_key", self.api_key.as_str()),
                ("agency", agency.code()),
                ("stopcode", stop.public_code()),
                ("format", "json"),
            ],
        )
        .map_err(|e| EnrichmentError::InvalidUrl(format!("{endpoint}: {e}")))
    }

    async fn fetch_routes(&self, stop: &Stop) -> Result<BTreeSet<String>, EnrichmentError> {
        let agency = stop.known_agency().ok_or_else(|| {
            EnrichmentError::UnsupportedAgency(stop.agency.as_deref().unwrap_or_default().to_string())
        })?;

        let url = self.request_url(agency, stop)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status));
        }

        let routes = route_names_from_payload(&response.bytes().await?)?;
        debug!(stop_id = %stop.id, agency = agency.code(), routes = routes.len(), "Fetched live routes");
        Ok(routes)
    }
}

impl RouteEnrichment for StopMonitoringClient {
    fn routes_serving<'a>(&'a self, stop: &'a Stop) -> RoutesFuture<'a> {
        Box::pin(self.fetch_routes(stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::StopIdentifier;
    use geo::Point;

    const PAYLOAD: &str = r#"{
        "ServiceDelivery": {
            "ResponseTimestamp": "2026-03-02T08:00:00Z",
            "StopMonitoringDelivery": {
                "version": "1.4",
                "MonitoredStopVisit": [
                    {"MonitoredVehicleJourney": {"LineRef": "38R", "PublishedLineName": "38R"}},
                    {"MonitoredVehicleJourney": {"LineRef": "38", "PublishedLineName": "38"}},
                    {"MonitoredVehicleJourney": {"LineRef": "38R", "PublishedLineName": "38R"}},
                    {"MonitoredVehicleJourney": {"LineRef": "X", "PublishedLineName": ""}},
                    {"MonitoredVehicleJourney": {"LineRef": "Y"}},
                    {}
                ]
            }
        }
    }"#;

    fn stop(code: Option<&str>, agency: Option<&str>) -> Stop {
        Stop {
            id: StopIdentifier::new("SF:15731"),
            name: "Geary Blvd & Masonic Ave".into(),
            code: code.map(Into::into),
            location: Point::new(-122.4469, 37.7822),
            agency: agency.map(Into::into),
        }
    }

    #[test]
    fn test_route_names_deduplicated() {
        let names = route_names_from_payload(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["38", "38R"]);
    }

    #[test]
    fn test_route_names_with_bom() {
        let mut payload = b"\xEF\xBB\xBF".to_vec();
        payload.extend_from_slice(PAYLOAD.as_bytes());
        assert_eq!(route_names_from_payload(&payload).unwrap().len(), 2);
    }

    #[test]
    fn test_route_names_no_visits() {
        let empty = r#"{"ServiceDelivery": {"StopMonitoringDelivery": {"MonitoredStopVisit": []}}}"#;
        assert!(route_names_from_payload(empty.as_bytes()).unwrap().is_empty());
        assert!(route_names_from_payload(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_route_names_malformed() {
        assert!(matches!(
            route_names_from_payload(b"<html>rate limited</html>"),
            Err(EnrichmentError::Decode(_))
        ));
    }

    #[test]
    fn test_request_url() {
        let client = StopMonitoringClient::with_base_url("secret", "http://localhost:9/transit/");
        let url = client
            .request_url(Agency::Muni, &stop(Some("15731"), Some("SF")))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9/transit/StopMonitoring?api_key=secret&agency=SF&stopcode=15731&format=json"
        );

        let url = client.request_url(Agency::Muni, &stop(None, Some("SF"))).unwrap();
        assert!(url.as_str().contains("stopcode=SF%3A15731"));
    }

    #[tokio::test]
    async fn test_unsupported_agency_skips_request() {
        let client = StopMonitoringClient::with_base_url("secret", "http://localhost:9/transit");
        let result = client.routes_serving(&stop(None, Some("mtc:regional"))).await;
        assert!(matches!(result, Err(EnrichmentError::UnsupportedAgency(code)) if code == "mtc:regional"));

        let result = client.routes_serving(&stop(None, None)).await;
        assert!(matches!(result, Err(EnrichmentError::UnsupportedAgency(_))));
    }
}
