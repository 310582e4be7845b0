use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geo::Point;
use tracing_subscriber::EnvFilter;

use transit_cache::coverage::{find_nearest_stops, CoverageOptions, CoveredStop, NEARBY_RADIUS_M};
use transit_cache::ingest::{build_store, ImportOptions};
use transit_cache::models::{NearbyStop, Stop, StopDirectory, DEFAULT_SEARCH_RESULTS};
use transit_cache::network::StopMonitoringClient;
use transit_cache::store::schema::SchemaSource;
use transit_cache::store::{nearest_stops_on_route, StopCache};

#[derive(Parser, Debug)]
#[command(
    name = "transit-cache",
    author,
    version,
    about = "Build and query a local transit stop cache",
    long_about = "Imports a static transit feed directory (stops.txt, routes.txt, trips.txt, \
                  stop_times.txt and an optional stop_agency_map.json) into a local SQLite \
                  store, then answers proximity queries against it.\n\n\
                  The closest command asks the 511 StopMonitoring API which routes serve each \
                  nearby stop and keeps only stops that add a route not already listed."
)]
struct Args {
    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a fresh store from a feed directory
    Import {
        /// Directory holding the feed files
        #[arg(short, long)]
        feed_dir: PathBuf,

        /// Store file to create or replace
        #[arg(long)]
        db: PathBuf,

        /// Schema definition to use instead of the bundled one
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Stops within a radius, nearest first
    Nearby {
        #[arg(long)]
        db: PathBuf,

        #[command(flatten)]
        location: Location,

        /// Search radius in meters
        #[arg(short, long, default_value_t = NEARBY_RADIUS_M)]
        radius: f64,

        /// Maximum number of stops
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Nearby stops picked so that each one adds a route, using live 511 data
    Closest {
        #[arg(long)]
        db: PathBuf,

        #[command(flatten)]
        location: Location,

        /// Number of stops to select
        #[arg(short, long, default_value_t = 3)]
        count: usize,

        /// 511 API key
        #[arg(long, env = "API_511_KEY", hide_env_values = true)]
        api_key: String,

        /// Per-stop timeout for the live route lookup, in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Nearest stops served by a route
    Route {
        #[arg(long)]
        db: PathBuf,

        /// Route short name, e.g. "38R"
        #[arg(short, long)]
        route: String,

        #[command(flatten)]
        location: Location,
    },

    /// Look up stops by exact id or stop code
    Stop {
        #[arg(long)]
        db: PathBuf,

        query: String,

        #[arg(short, long, default_value_t = DEFAULT_SEARCH_RESULTS)]
        limit: usize,
    },
}

#[derive(clap::Args, Debug)]
struct Location {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
}

impl Location {
    fn point(&self) -> Result<Point> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            bail!("Coordinates out of range: {}, {}", self.lat, self.lon);
        }
        Ok(Point::new(self.lon, self.lat))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match args.command {
        Command::Import { feed_dir, db, schema } => {
            if !feed_dir.is_dir() {
                bail!("Feed directory does not exist: {}", feed_dir.display());
            }

            tracing::info!("=== Transit Cache Import ===");
            tracing::info!("Feed: {}", feed_dir.display());
            tracing::info!("Store: {}", db.display());

            let mut options = ImportOptions::new(feed_dir);
            if let Some(path) = schema {
                options = options.with_schema(SchemaSource::File(path));
            }
            build_store(&options, &db).context("Import failed")?;
            tracing::info!("Done!");
        }

        Command::Nearby { db, location, radius, limit } => {
            let cache = open_cache(db)?;
            let stops = cache
                .find_nearby_stops(location.point()?, radius, limit)
                .context("Nearby search failed")?;
            if stops.is_empty() {
                println!("No stops within {radius:.0} m");
            }
            for nearby in &stops {
                print_nearby(nearby);
            }
        }

        Command::Closest { db, location, count, api_key, timeout } => {
            let cache = open_cache(db)?;
            let client = StopMonitoringClient::new(api_key);
            let options = CoverageOptions {
                max_results: count,
                enrichment_timeout: Duration::from_secs(timeout),
            };

            let selected = find_nearest_stops(&cache, &client, location.point()?, &options)
                .await
                .context("Closest stop search failed")?;
            if selected.is_empty() {
                println!("No stops with live service nearby");
            }
            for covered in &selected {
                print_covered(covered);
            }
        }

        Command::Route { db, route, location } => {
            let cache = open_cache(db)?;
            let Some(found) = nearest_stops_on_route(&cache, &route, location.point()?)
                .context("Route search failed")?
            else {
                bail!("Route {} not found", route.to_uppercase());
            };

            let Some(agency) = found.agency() else {
                bail!(
                    "Agency {:?} is not supported",
                    found.route.agency_id.as_deref().unwrap_or_default()
                );
            };

            println!("{} {} ({})", agency.display_name(), found.route.display_name(), found.route.id);
            if found.stops.is_empty() {
                println!("No stops on this route nearby");
            }
            for nearby in &found.stops {
                print_nearby(nearby);
            }
        }

        Command::Stop { db, query, limit } => {
            let cache = open_cache(db)?;
            let stops = cache.search_stops(&query, limit).context("Stop search failed")?;
            if stops.is_empty() {
                println!("No stop matches {query:?}");
            }
            for stop in &stops {
                println!("{}", describe(stop));
            }
        }
    }

    Ok(())
}

fn open_cache(db: PathBuf) -> Result<StopCache> {
    if !db.exists() {
        bail!("Store does not exist: {} (run `transit-cache import` first)", db.display());
    }
    StopCache::open(&db).with_context(|| format!("Failed to open store {}", db.display()))
}

fn describe(stop: &Stop) -> String {
    let agency = stop
        .known_agency()
        .map(|a| a.display_name())
        .or(stop.agency.as_deref())
        .unwrap_or("unknown agency");
    format!(
        "{} [{}] {} ({:.5}, {:.5})",
        stop.public_code(),
        agency,
        stop.name,
        stop.latitude(),
        stop.longitude()
    )
}

fn print_nearby(nearby: &NearbyStop) {
    println!("{:>6.0} m  {}", nearby.distance_m, describe(&nearby.stop));
}

fn print_covered(covered: &CoveredStop) {
    print_nearby(&covered.stop);
    println!("          routes: {}", covered.route_names.join(", "));
}
