//! Cached feed data models, types, and traits.

pub mod agency;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use agency::Agency;
pub use traits::{StopDirectory, DEFAULT_SEARCH_RESULTS};
pub use types::{NearbyStop, Result, Route, RouteType, Stop, TransitError};
