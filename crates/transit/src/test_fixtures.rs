//! Feed directories and stores shared by the unit tests.

use std::path::Path;

use crate::ingest::{build_store, ImportOptions};
use crate::store::StopCache;

/// A small feed exercising every ingestion rule: quoted fields, malformed
/// rows, mapped/inferred/unresolved agencies, duplicate route short names,
/// duplicate and orphaned stop times.
pub const SAMPLE_FEED: &[(&str, &str)] = &[
    (
        "stops.txt",
        "stop_id,stop_name,stop_code,stop_lat,stop_lon,stop_url\n\
         S1,Market St & 4th St,15731,37.7749,-122.4194,https://www.sfmta.com/stops/15731\n\
         S2,\"Mission St, 5th St\",,37.7750,-122.4200,\n\
         S3,Far Away,,38.5,-121.5,\n\
         SF:100,Embarcadero,EMBR,37.7929,-122.3971,\n\
         sf:200,Powell St,,37.7844,-122.4079,\n\
         VT:9,Diridon,,37.3297,-121.9026,https://www.vta.org/stops/9\n\
         ,No Id,,37.0,-122.0,\n\
         S9,No Coordinates,,,-122.0,\n",
    ),
    (
        "stop_agency_map.json",
        r#"{"SF:100": "BA", "S2": "mtc:regional", "GHOST": "SF"}"#,
    ),
    (
        "routes.txt",
        "route_id,agency_id,route_short_name,route_long_name,route_type,route_color,route_text_color,route_url\n\
         K,SF,K,Ingleside,0,,,\n\
         N,SF,N,Judah,0,,,\n\
         K2,AC,k,Duplicate short name,3,,,\n\
         ,SF,X,Missing id,3,,,\n",
    ),
    (
        "trips.txt",
        "route_id,service_id,trip_id\n\
         K,weekday,t1\n\
         K,weekday,t2\n\
         N,weekday,t3\n",
    ),
    (
        "stop_times.txt",
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         t1,08:00:00,08:00:00,S1,1\n\
         t1,08:05:00,08:05:00,SF:100,2\n\
         t2,09:00:00,09:00:00,S1,1\n\
         t3,08:00:00,08:00:00,S1,1\n\
         t3,08:10:00,08:10:00,S2,2\n\
         ghost,08:00:00,08:00:00,S3,1\n\
         t1,,,,3\n",
    ),
];

/// Two stops, one route, one association.
pub const TWO_STOP_FEED: &[(&str, &str)] = &[
    (
        "stops.txt",
        "stop_id,stop_name,stop_lat,stop_lon\n\
         S1,First,37.7749,-122.4194\n\
         S2,Second,37.7750,-122.4200\n",
    ),
    (
        "routes.txt",
        "route_id,route_short_name,route_long_name,route_type,agency_id\n\
         K,K,Ingleside,0,SF\n",
    ),
    ("trips.txt", "trip_id,route_id\nt1,K\n"),
    ("stop_times.txt", "trip_id,stop_id\nt1,S1\n"),
];

pub fn write_feed(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

/// Import `files` into a fresh store file and open it read-only.
pub fn build_cache(files: &[(&str, &str)]) -> (tempfile::TempDir, StopCache) {
    let dir = tempfile::tempdir().unwrap();
    write_feed(dir.path(), files);
    let db_path = dir.path().join("gtfs.db");
    build_store(&ImportOptions::new(dir.path()), &db_path).unwrap();
    let cache = StopCache::open(&db_path).unwrap();
    (dir, cache)
}
