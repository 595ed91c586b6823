mod connection;
mod resources;
mod scans;
mod schema;
mod stats;

pub(in crate::db) use connection::Result;
pub use connection::{DbError, ScanDb};
pub use resources::ResourceFilter;
pub use stats::{DailyActivity, GLOBAL_REGION, RegionBreakdown, ServiceBreakdown, StoreStats};
