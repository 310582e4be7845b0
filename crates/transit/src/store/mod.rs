//! Read-only query engine over a built store.
//!
//! A [`StopCache`] is an explicit handle with two states. It starts
//! uninitialized; [`StopCache::initialize`] opens the store file read-only and
//! is idempotent. Every query on an uninitialized handle fails with
//! [`TransitError::NotReady`].
//!
//! Reads go through a small pool of read-only connections, so concurrent
//! queries do not wait on each other.
//!
//! The handle never writes. Replacing the store file underneath an open
//! handle is not supported; build a new store with
//! [`crate::ingest::build_store`] and open a fresh handle on it.

pub mod route_stops;
pub mod schema;

pub use route_stops::{nearest_stops_on_route, RouteStops, ROUTE_SEARCH_RADIUS_M, ROUTE_STOP_RESULTS};

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use geo::Point;
use r2d2::{ManageConnection, Pool, PooledConnection};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params, Row};
use tracing::debug;

use crate::identifiers::*;
use crate::models::agency::EXCLUDED_AGENCY_PREFIX;
use crate::models::{NearbyStop, Result, Route, RouteType, Stop, StopDirectory, TransitError};
use crate::spatial::{haversine_distance, BoundingBox, LongitudeRange};

const STOP_COLUMNS: &str = "stop_id, stop_name, stop_code, stop_lat, stop_lon, agency";

const ROUTE_COLUMNS: &str =
    "route_id, route_short_name, route_long_name, route_type, route_color, route_text_color, agency_id";

/// Minimum query length for [`StopDirectory::search_stops`].
const MIN_SEARCH_LEN: usize = 2;

/// Upper bound on simultaneously open read connections.
const MAX_READERS: u32 = 8;

/// Opens read-only connections to one store file.
#[derive(Debug)]
struct ReadOnlyManager {
    path: PathBuf,
}

impl ManageConnection for ReadOnlyManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn is_valid(&self, conn: &mut Connection) -> rusqlite::Result<()> {
        conn.query_row("SELECT 1", [], |_| Ok(()))
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

pub struct StopCache {
    path: PathBuf,
    readers: OnceLock<Pool<ReadOnlyManager>>,
}

impl StopCache {
    /// Handle on the store at `path`. Nothing is opened until
    /// [`initialize`](Self::initialize).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            readers: OnceLock::new(),
        }
    }

    /// Create and initialize in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self::new(path);
        cache.initialize()?;
        Ok(cache)
    }

    /// Open the store read-only. Calling this again is a no-op.
    pub fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let manager = ReadOnlyManager {
            path: self.path.clone(),
        };
        // Open one connection up front so a missing or unreadable store fails here.
        let first = manager.connect()?;
        drop(first);

        let pool = Pool::builder()
            .max_size(MAX_READERS)
            .min_idle(Some(1))
            .test_on_check_out(false)
            .build_unchecked(manager);
        // Another thread may have won the race; its pool is as good as ours.
        let _ = self.readers.set(pool);
        debug!(store = %self.path.display(), readers = MAX_READERS, "Stop cache initialized");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.readers.get().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<PooledConnection<ReadOnlyManager>> {
        let readers = self.readers.get().ok_or(TransitError::NotReady)?;
        Ok(readers.get()?)
    }
}

fn query_stops(conn: &Connection, sql: &str, params: impl Params) -> rusqlite::Result<Vec<Stop>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, stop_from_row)?;
    rows.collect()
}

fn stop_from_row(row: &Row<'_>) -> rusqlite::Result<Stop> {
    Ok(Stop {
        id: row.get(0)?,
        name: row.get::<_, String>(1)?.into(),
        code: row.get::<_, Option<String>>(2)?.map(Into::into),
        location: Point::new(row.get(4)?, row.get(3)?),
        agency: row.get::<_, Option<String>>(5)?.map(Into::into),
    })
}

fn route_from_row(row: &Row<'_>) -> rusqlite::Result<Route> {
    let route_type = row
        .get::<_, Option<i64>>(3)?
        .and_then(|t| u16::try_from(t).ok())
        .and_then(RouteType::from_gtfs);

    Ok(Route {
        id: row.get(0)?,
        short_name: row.get::<_, Option<String>>(1)?.map(Into::into),
        long_name: row.get::<_, Option<String>>(2)?.map(Into::into),
        route_type,
        color: row.get::<_, Option<String>>(4)?.map(Into::into),
        text_color: row.get::<_, Option<String>>(5)?.map(Into::into),
        agency_id: row.get::<_, Option<String>>(6)?.map(Into::into),
    })
}

fn sql_limit(max_results: usize) -> i64 {
    i64::try_from(max_results).unwrap_or(i64::MAX)
}

impl StopDirectory for StopCache {
    fn find_nearby_stops(
        &self,
        point: Point,
        radius_m: f64,
        max_results: Option<usize>,
    ) -> Result<Vec<NearbyStop>> {
        let conn = self.connection()?;

        if !radius_m.is_finite() || radius_m < 0.0 {
            return Ok(Vec::new());
        }

        // Candidates come back ordered by id so that equal distances resolve
        // the same way regardless of how the store was filled.
        let bbox = BoundingBox::around(point, radius_m);
        let candidates = match bbox.longitude {
            LongitudeRange::Contiguous { min, max } => query_stops(
                &conn,
                &format!(
                    "SELECT {STOP_COLUMNS} FROM stops \
                     WHERE stop_lat BETWEEN ?1 AND ?2 AND stop_lon BETWEEN ?3 AND ?4 \
                     ORDER BY stop_id"
                ),
                params![bbox.min_lat, bbox.max_lat, min, max],
            )?,
            LongitudeRange::Wrapped { min, max } => query_stops(
                &conn,
                &format!(
                    "SELECT {STOP_COLUMNS} FROM stops \
                     WHERE stop_lat BETWEEN ?1 AND ?2 AND (stop_lon >= ?3 OR stop_lon <= ?4) \
                     ORDER BY stop_id"
                ),
                params![bbox.min_lat, bbox.max_lat, min, max],
            )?,
            LongitudeRange::All => query_stops(
                &conn,
                &format!(
                    "SELECT {STOP_COLUMNS} FROM stops \
                     WHERE stop_lat BETWEEN ?1 AND ?2 \
                     ORDER BY stop_id"
                ),
                params![bbox.min_lat, bbox.max_lat],
            )?,
        };
        let candidate_count = candidates.len();

        let mut nearby: Vec<NearbyStop> = candidates
            .into_iter()
            .filter_map(|stop| {
                let distance_m = haversine_distance(point, stop.location);
                (distance_m <= radius_m).then_some(NearbyStop { stop, distance_m })
            })
            .collect();

        // Stable: ties keep id order.
        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        if let Some(max) = max_results {
            nearby.truncate(max);
        }

        debug!(
            candidates = candidate_count,
            results = nearby.len(),
            radius_m,
            "Nearby stop search"
        );
        Ok(nearby)
    }

    fn get_stop(&self, id: &StopIdentifier) -> Result<Option<Stop>> {
        let conn = self.connection()?;
        let stop = conn
            .prepare_cached(&format!("SELECT {STOP_COLUMNS} FROM stops WHERE stop_id = ?1"))?
            .query_row([id], stop_from_row)
            .optional()?;
        Ok(stop)
    }

    fn search_stops(&self, query: &str, max_results: usize) -> Result<Vec<Stop>> {
        let conn = self.connection()?;

        let normalized = query.trim().to_ascii_lowercase();
        if normalized.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        // LIKE ignores ASCII case: "MTC:" agencies are hidden as well.
        let stops = query_stops(
            &conn,
            &format!(
                "SELECT {STOP_COLUMNS} FROM stops \
                 WHERE (LOWER(stop_id) = ?1 OR LOWER(stop_code) = ?1) \
                   AND (agency IS NULL OR agency NOT LIKE ?2) \
                 ORDER BY stop_id \
                 LIMIT ?3"
            ),
            params![normalized, format!("{EXCLUDED_AGENCY_PREFIX}%"), sql_limit(max_results)],
        )?;
        Ok(stops)
    }

    fn find_route(&self, query: &str) -> Result<Option<Route>> {
        let conn = self.connection()?;

        let normalized = query.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Ok(None);
        }

        // Duplicate short names resolve to the smallest route id.
        let route = conn
            .prepare_cached(&format!(
                "SELECT {ROUTE_COLUMNS} FROM routes \
                 WHERE UPPER(route_short_name) = ?1 \
                 ORDER BY route_id \
                 LIMIT 1"
            ))?
            .query_row([normalized], route_from_row)
            .optional()?;
        Ok(route)
    }

    fn stop_has_route(&self, stop_id: &StopIdentifier, route_id: &RouteIdentifier) -> Result<bool> {
        let conn = self.connection()?;
        let exists = conn
            .prepare_cached("SELECT EXISTS (SELECT 1 FROM stop_routes WHERE stop_id = ?1 AND route_id = ?2)")?
            .query_row(params![stop_id, route_id], |row| row.get(0))?;
        Ok(exists)
    }
}
