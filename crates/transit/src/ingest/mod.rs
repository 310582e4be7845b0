//! Batch import of a flat feed directory into a fresh store.
//!
//! The import runs as a fixed sequence of steps. Each step reads at most one
//! or two feed files, writes inside its own transaction, and is skipped when
//! its input file is absent. Rows that cannot be used are logged and counted,
//! never fatal. Only a missing schema, an unreadable file or a failed commit
//! stops the run.

mod agency;
mod associations;
mod routes;
mod stops;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::feed::{self, FeedReader, FeedRow};
use crate::store::schema::{self, SchemaSource};

pub use agency::infer_agency;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Schema definition not found: {}", .0.display())]
    SchemaMissing(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// What to import and with which schema.
#[derive(Clone, Debug)]
pub struct ImportOptions {
    pub feed_dir: PathBuf,
    pub schema: SchemaSource,
}

impl ImportOptions {
    pub fn new(feed_dir: impl Into<PathBuf>) -> Self {
        Self {
            feed_dir: feed_dir.into(),
            schema: SchemaSource::Bundled,
        }
    }

    pub fn with_schema(mut self, schema: SchemaSource) -> Self {
        self.schema = schema;
        self
    }

    fn feed_file(&self, name: &str) -> PathBuf {
        self.feed_dir.join(name)
    }
}

/// Row counts for one import run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub stops_written: usize,
    pub stops_skipped: usize,
    pub agencies_mapped: usize,
    pub agencies_inferred: usize,
    pub stops_without_agency: usize,
    pub routes_written: usize,
    pub routes_skipped: usize,
    pub associations_written: usize,
    pub orphaned_stop_times: usize,
}

impl ImportReport {
    pub fn log_summary(&self) {
        info!("=== Import Summary ===");
        info!("Stops written: {}", self.stops_written);
        info!(
            "Agencies resolved: {} mapped, {} inferred",
            self.agencies_mapped, self.agencies_inferred
        );
        info!("Routes written: {}", self.routes_written);
        info!("Stop-route associations: {}", self.associations_written);
        if self.stops_skipped > 0 || self.routes_skipped > 0 {
            warn!(
                "Rows skipped: {} stops, {} routes",
                self.stops_skipped, self.routes_skipped
            );
        }
        if self.stops_without_agency > 0 {
            warn!("Stops without agency: {}", self.stops_without_agency);
        }
        if self.orphaned_stop_times > 0 {
            info!("Stop times for unknown trips: {}", self.orphaned_stop_times);
        }
    }
}

/// Import the feed into an open read-write connection, replacing whatever the
/// three tables held before.
pub fn import(conn: &mut Connection, options: &ImportOptions) -> Result<ImportReport, IngestError> {
    let schema_sql = options.schema.load()?;
    run(conn, options, &schema_sql)
}

/// Build a new store at `db_path`.
///
/// The import writes to a staging file next to `db_path` and renames it into
/// place only after every step has committed, so readers holding the old file
/// never observe a half-built store. On failure the staging file is removed
/// and any existing store is left untouched.
pub fn build_store(options: &ImportOptions, db_path: &Path) -> Result<ImportReport, IngestError> {
    let schema_sql = options.schema.load()?;
    let staging = staging_path(db_path);
    remove_stale(&staging)?;

    match build_at(&staging, options, &schema_sql) {
        Ok(report) => {
            fs::rename(&staging, db_path).map_err(|source| IngestError::Io {
                path: db_path.to_path_buf(),
                source,
            })?;
            info!(store = %db_path.display(), "Store replaced");
            Ok(report)
        }
        Err(e) => {
            let _ = fs::remove_file(&staging);
            Err(e)
        }
    }
}

fn build_at(path: &Path, options: &ImportOptions, schema_sql: &str) -> Result<ImportReport, IngestError> {
    let mut conn = Connection::open(path)?;
    let report = run(&mut conn, options, schema_sql)?;
    conn.close().map_err(|(_, e)| e)?;
    Ok(report)
}

fn run(conn: &mut Connection, options: &ImportOptions, schema_sql: &str) -> Result<ImportReport, IngestError> {
    schema::apply(conn, schema_sql)?;
    info!("Schema initialized");

    let mut report = ImportReport::default();

    stops::import(conn, &options.feed_file(feed::STOPS_FILE), &mut report)?;
    agency::apply_mapping(conn, &options.feed_file(feed::STOP_AGENCY_MAP_FILE), &mut report)?;
    agency::infer_missing(conn, &mut report)?;
    routes::import(conn, &options.feed_file(feed::ROUTES_FILE), &mut report)?;
    associations::build(
        conn,
        &options.feed_file(feed::TRIPS_FILE),
        &options.feed_file(feed::STOP_TIMES_FILE),
        &mut report,
    )?;

    report.log_summary();
    Ok(report)
}

fn staging_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".building");
    PathBuf::from(name)
}

fn remove_stale(path: &Path) -> Result<(), IngestError> {
    match fs::remove_file(path) {
        Ok(()) => {
            warn!(file = %path.display(), "Removed stale staging store");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(IngestError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Open a feed file, or `None` (logged) when it is absent.
fn open_feed(path: &Path) -> Result<Option<FeedReader<BufReader<File>>>, IngestError> {
    let reader = FeedReader::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if reader.is_none() {
        info!(file = %path.display(), "Feed file absent, skipping");
    }
    Ok(reader)
}

/// Data rows of a feed file. Lines that are not valid UTF-8 are skipped;
/// any other read error ends the step.
fn feed_rows<'a, R: BufRead + 'a>(
    reader: FeedReader<R>,
    path: &'a Path,
) -> impl Iterator<Item = Result<FeedRow, IngestError>> + 'a {
    reader.filter_map(move |row| match row {
        Ok(row) => Some(Ok(row)),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!(file = %path.display(), error = %e, "Skipping unreadable line");
            None
        }
        Err(source) => Some(Err(IngestError::Io {
            path: path.to_path_buf(),
            source,
        })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{write_feed, SAMPLE_FEED};

    fn table_dump(conn: &Connection, sql: &str) -> Vec<Vec<Option<String>>> {
        let mut stmt = conn.prepare(sql).unwrap();
        let columns = stmt.column_count();
        stmt.query_map([], |row| {
            (0..columns)
                .map(|i| {
                    row.get::<_, rusqlite::types::Value>(i).map(|v| match v {
                        rusqlite::types::Value::Null => None,
                        other => Some(format!("{other:?}")),
                    })
                })
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
    }

    fn import_sample() -> (tempfile::TempDir, Connection, ImportReport) {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), SAMPLE_FEED);
        let mut conn = Connection::open_in_memory().unwrap();
        let report = import(&mut conn, &ImportOptions::new(dir.path())).unwrap();
        (dir, conn, report)
    }

    #[test]
    fn test_import_counts() {
        let (_dir, _conn, report) = import_sample();

        assert_eq!(
            report,
            ImportReport {
                stops_written: 6,
                stops_skipped: 2,
                agencies_mapped: 2,
                agencies_inferred: 3,
                stops_without_agency: 1,
                routes_written: 3,
                routes_skipped: 1,
                associations_written: 4,
                orphaned_stop_times: 1,
            }
        );
    }

    #[test]
    fn test_agency_resolution() {
        let (_dir, conn, _) = import_sample();
        let agency = |id: &str| -> Option<String> {
            conn.query_row("SELECT agency FROM stops WHERE stop_id = ?1", [id], |row| row.get(0))
                .unwrap()
        };

        // Mapping file wins over the SF: prefix.
        assert_eq!(agency("SF:100").as_deref(), Some("BA"));
        // Unrecognized mapping codes pass through.
        assert_eq!(agency("S2").as_deref(), Some("mtc:regional"));
        // Prefix inference is case-insensitive.
        assert_eq!(agency("sf:200").as_deref(), Some("SF"));
        // URL inference.
        assert_eq!(agency("S1").as_deref(), Some("SF"));
        assert_eq!(agency("VT:9").as_deref(), Some("VT"));
        // Neither rule applies.
        assert_eq!(agency("S3"), None);
    }

    #[test]
    fn test_associations_are_deduplicated() {
        let (_dir, conn, _) = import_sample();
        let pairs = table_dump(&conn, "SELECT stop_id, route_id FROM stop_routes ORDER BY stop_id, route_id");
        assert_eq!(
            pairs,
            vec![
                vec![Some(r#"Text("S1")"#.into()), Some(r#"Text("K")"#.into())],
                vec![Some(r#"Text("S1")"#.into()), Some(r#"Text("N")"#.into())],
                vec![Some(r#"Text("S2")"#.into()), Some(r#"Text("N")"#.into())],
                vec![Some(r#"Text("SF:100")"#.into()), Some(r#"Text("K")"#.into())],
            ]
        );
    }

    #[test]
    fn test_import_is_idempotent() {
        let (dir, mut conn, first) = import_sample();
        let stops_before = table_dump(&conn, "SELECT * FROM stops ORDER BY stop_id");
        let routes_before = table_dump(&conn, "SELECT * FROM routes ORDER BY route_id");
        let pairs_before = table_dump(&conn, "SELECT * FROM stop_routes ORDER BY stop_id, route_id");

        let second = import(&mut conn, &ImportOptions::new(dir.path())).unwrap();

        assert_eq!(first, second);
        assert_eq!(stops_before, table_dump(&conn, "SELECT * FROM stops ORDER BY stop_id"));
        assert_eq!(routes_before, table_dump(&conn, "SELECT * FROM routes ORDER BY route_id"));
        assert_eq!(
            pairs_before,
            table_dump(&conn, "SELECT * FROM stop_routes ORDER BY stop_id, route_id")
        );
    }

    #[test]
    fn test_missing_optional_files() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(
            dir.path(),
            &[("stops.txt", "stop_id,stop_name,stop_lat,stop_lon\nS1,One,37.0,-122.0\n")],
        );
        let mut conn = Connection::open_in_memory().unwrap();
        let report = import(&mut conn, &ImportOptions::new(dir.path())).unwrap();

        assert_eq!(report.stops_written, 1);
        assert_eq!(report.routes_written, 0);
        assert_eq!(report.associations_written, 0);
        assert_eq!(report.stops_without_agency, 1);
    }

    #[test]
    fn test_empty_feed_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let report = import(&mut conn, &ImportOptions::new(dir.path())).unwrap();
        assert_eq!(report, ImportReport::default());
    }

    #[test]
    fn test_missing_schema_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), SAMPLE_FEED);
        let db_path = dir.path().join("gtfs.db");
        let options = ImportOptions::new(dir.path())
            .with_schema(SchemaSource::File(dir.path().join("schema.sql")));

        let err = build_store(&options, &db_path).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMissing(_)));
        assert!(!db_path.exists());
        assert!(!staging_path(&db_path).exists());
    }

    #[test]
    fn test_build_store_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), SAMPLE_FEED);
        let db_path = dir.path().join("gtfs.db");
        std::fs::write(&db_path, b"not a database").unwrap();

        let report = build_store(&ImportOptions::new(dir.path()), &db_path).unwrap();
        assert_eq!(report.stops_written, 6);
        assert!(!staging_path(&db_path).exists());

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stops", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_failed_build_keeps_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), SAMPLE_FEED);
        let schema_path = dir.path().join("broken.sql");
        std::fs::write(&schema_path, "CREATE TABLE stops (").unwrap();
        let db_path = dir.path().join("gtfs.db");
        std::fs::write(&db_path, b"previous store").unwrap();

        let options = ImportOptions::new(dir.path()).with_schema(SchemaSource::File(schema_path));
        assert!(matches!(
            build_store(&options, &db_path),
            Err(IngestError::Sqlite(_))
        ));
        assert_eq!(std::fs::read(&db_path).unwrap(), b"previous store");
        assert!(!staging_path(&db_path).exists());
    }
}
