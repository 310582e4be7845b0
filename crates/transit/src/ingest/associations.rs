//! Stop ↔ route associations, derived by joining stop times to trips.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::{feed_rows, open_feed, ImportReport, IngestError};
use crate::identifiers::{RouteIdentifier, TripIdentifier};

const INSERT_ASSOCIATION: &str = "INSERT OR IGNORE INTO stop_routes (stop_id, route_id) VALUES (?1, ?2)";

/// Trip → route lookup. Lives only for the duration of one association build.
struct TripRouteIndex {
    routes: HashMap<TripIdentifier, RouteIdentifier>,
}

impl TripRouteIndex {
    fn load(path: &Path) -> Result<Option<Self>, IngestError> {
        let Some(reader) = open_feed(path)? else {
            return Ok(None);
        };
        let [trip_col, route_col] = reader.columns().resolve(["trip_id", "route_id"]);
        if trip_col.is_none() || route_col.is_none() {
            warn!(file = %path.display(), "Trips file lacks trip_id or route_id, skipping");
            return Ok(None);
        }

        let mut routes = HashMap::new();
        for row in feed_rows(reader, path) {
            let row = row?;
            if let (Some(trip_id), Some(route_id)) = (row.get(trip_col), row.get(route_col)) {
                routes.insert(TripIdentifier::new(trip_id), RouteIdentifier::new(route_id));
            }
        }
        Ok(Some(Self { routes }))
    }

    fn route_for(&self, trip_id: &str) -> Option<&RouteIdentifier> {
        self.routes.get(trip_id)
    }

    fn len(&self) -> usize {
        self.routes.len()
    }
}

pub(super) fn build(
    conn: &mut Connection,
    trips_path: &Path,
    stop_times_path: &Path,
    report: &mut ImportReport,
) -> Result<(), IngestError> {
    let Some(reader) = open_feed(stop_times_path)? else {
        return Ok(());
    };
    let [trip_col, stop_col] = reader.columns().resolve(["trip_id", "stop_id"]);
    if trip_col.is_none() || stop_col.is_none() {
        warn!(file = %stop_times_path.display(), "Stop times file lacks trip_id or stop_id, skipping");
        return Ok(());
    }

    let Some(trips) = TripRouteIndex::load(trips_path)? else {
        return Ok(());
    };
    info!(trips = trips.len(), "Loaded trip index");

    let tx = conn.transaction()?;
    {
        let mut insert = tx.prepare(INSERT_ASSOCIATION)?;
        for row in feed_rows(reader, stop_times_path) {
            let row = row?;
            let (Some(trip_id), Some(stop_id)) = (row.get(trip_col), row.get(stop_col)) else {
                continue;
            };
            let Some(route_id) = trips.route_for(trip_id) else {
                report.orphaned_stop_times += 1;
                continue;
            };
            match insert.execute(params![stop_id, route_id]) {
                Ok(inserted) => report.associations_written += inserted,
                Err(e) => warn!(stop_id, route_id = %route_id, error = %e, "Failed to write stop route"),
            }
        }
    }
    tx.commit()?;

    info!(
        associations = report.associations_written,
        orphaned = report.orphaned_stop_times,
        "Built stop-route associations"
    );
    Ok(())
}
