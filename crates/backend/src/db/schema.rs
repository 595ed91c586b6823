use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema for the scans table (one row per scan session)
pub fn scans_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("started_at", DataType::Int64, false), // Unix timestamp ms
    Field::new("ended_at", DataType::Int64, true),
    Field::new("directory", DataType::Utf8, false),
    Field::new("log_directory", DataType::Utf8, false),
    Field::new("command", DataType::Utf8, false), // JSON array
    Field::new("services", DataType::Utf8, true), // JSON array
    Field::new("regions", DataType::Utf8, true),  // JSON array
    Field::new("profile", DataType::Utf8, true),
    Field::new("return_code", DataType::Int32, true),
    Field::new("expected_files", DataType::Int64, false),
    Field::new("processed_files", DataType::Int64, false),
    Field::new("outcome", DataType::Utf8, false),
    Field::new("error", DataType::Utf8, true),
  ]))
}

/// Schema for the resources table (one row per ingested file)
pub fn resources_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("scan_id", DataType::Utf8, false),
    Field::new("service", DataType::Utf8, false),
    Field::new("operation", DataType::Utf8, false),
    Field::new("region", DataType::Utf8, true),
    Field::new("account", DataType::Utf8, true),
    Field::new("filename", DataType::Utf8, false),
    Field::new("file_path", DataType::Utf8, false),
    Field::new("ingested_at", DataType::Int64, false), // Unix timestamp ms
    Field::new("payload", DataType::Utf8, false),      // JSON document, verbatim
  ]))
}
