use std::path::{Path, PathBuf};

use lancedb::{Connection, connect};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::schema::{resources_schema, scans_schema};

pub(in crate::db) const SCANS_TABLE: &str = "scans";
pub(in crate::db) const RESOURCES_TABLE: &str = "resources";

#[derive(Error, Debug)]
pub enum DbError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Invalid data: {0}")]
  InvalidData(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Connection to the scan store
pub struct ScanDb {
  pub path: PathBuf,
  pub connection: Connection,
}

impl ScanDb {
  /// Open or create the store at `db_path`
  pub async fn open(db_path: &Path) -> Result<Self> {
    tokio::fs::create_dir_all(db_path).await?;

    info!(path = %db_path.display(), "Opening database connection");
    let connection = match connect(db_path.to_string_lossy().as_ref()).execute().await {
      Ok(conn) => {
        debug!(path = %db_path.display(), "Database connection established");
        conn
      }
      Err(e) => {
        error!(path = %db_path.display(), err = %e, "Failed to connect to database");
        return Err(e.into());
      }
    };

    let db = Self {
      path: db_path.to_path_buf(),
      connection,
    };

    debug!("Initializing database schema");
    db.ensure_tables().await?;

    Ok(db)
  }

  /// Ensure all required tables exist
  async fn ensure_tables(&self) -> Result<()> {
    let table_names = self.connection.table_names().execute().await?;
    debug!(existing_tables = table_names.len(), "Checking required tables");

    if !table_names.iter().any(|t| t == SCANS_TABLE) {
      debug!("Creating scans table");
      self
        .connection
        .create_empty_table(SCANS_TABLE, scans_schema())
        .execute()
        .await?;
    }

    if !table_names.iter().any(|t| t == RESOURCES_TABLE) {
      debug!("Creating resources table");
      self
        .connection
        .create_empty_table(RESOURCES_TABLE, resources_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  /// Get the scans table
  pub async fn scans_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(SCANS_TABLE).execute().await?)
  }

  /// Get the resources table
  pub async fn resources_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(RESOURCES_TABLE).execute().await?)
  }
}

/// Quote-escape a value interpolated into a filter expression
pub(in crate::db) fn escape_sql(s: &str) -> String {
  s.replace('\'', "''")
}
