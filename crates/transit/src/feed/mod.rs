//! Flat feed files: names and parsing.

pub mod parser;

pub use parser::{parse_line, ColumnMap, FeedReader, FeedRow};

pub const STOPS_FILE: &str = "stops.txt";
pub const ROUTES_FILE: &str = "routes.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const STOP_AGENCY_MAP_FILE: &str = "stop_agency_map.json";
