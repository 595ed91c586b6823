use std::path::Path;

use serde_json::Value;

/// Why a file's content could not be turned into a payload
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("File is empty")]
  Empty,
  #[error("Invalid JSON: {0}")]
  Parse(#[from] serde_json::Error),
}

impl ContentError {
  /// Missing or locked files may succeed on a later attempt
  pub fn is_transient(&self) -> bool {
    matches!(self, ContentError::Io(_))
  }
}

/// Parse raw bytes as the tool's structured output format.
///
/// Surrounding whitespace is ignored; a blank file is [`ContentError::Empty`]
/// rather than a parse error.
pub fn parse_content(raw: &[u8]) -> Result<Value, ContentError> {
  let trimmed = raw.trim_ascii();
  if trimmed.is_empty() {
    return Err(ContentError::Empty);
  }
  Ok(serde_json::from_slice(trimmed)?)
}

/// Read a file in full and parse it
pub async fn read_content(path: &Path) -> Result<Value, ContentError> {
  let raw = tokio::fs::read(path).await?;
  parse_content(&raw)
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_parse_valid_document() {
    let value = parse_content(br#"  {"Reservations": [{"Instances": []}]}  "#).unwrap();
    assert_eq!(value, json!({"Reservations": [{"Instances": []}]}));
  }

  #[test]
  fn test_parse_scalar_and_array_payloads() {
    assert_eq!(parse_content(b"[1, 2, 3]").unwrap(), json!([1, 2, 3]));
    assert_eq!(parse_content(b"null").unwrap(), Value::Null);
  }

  #[test]
  fn test_parse_empty_and_whitespace() {
    assert!(matches!(parse_content(b""), Err(ContentError::Empty)));
    assert!(matches!(parse_content(b" \n\t "), Err(ContentError::Empty)));
  }

  #[test]
  fn test_parse_truncated_document() {
    let err = parse_content(br#"{"Buckets": [{"Name": "a"#).unwrap_err();
    assert!(matches!(err, ContentError::Parse(_)));
    assert!(!err.is_transient());
  }

  #[tokio::test]
  async fn test_read_missing_file_is_transient() {
    let temp = TempDir::new().unwrap();
    let err = read_content(&temp.path().join("missing.json")).await.unwrap_err();
    assert!(err.is_transient());
  }

  #[tokio::test]
  async fn test_read_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("s3_ListBuckets.json");
    std::fs::write(&path, r#"{"Buckets": []}"#).unwrap();
    assert_eq!(read_content(&path).await.unwrap(), json!({"Buckets": []}));
  }
}
