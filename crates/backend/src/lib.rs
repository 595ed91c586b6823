pub mod actor;
pub mod db;
pub mod ingest;
pub mod scrape;

mod domain;
pub use domain::{config, record, scan};

pub mod dirs;
