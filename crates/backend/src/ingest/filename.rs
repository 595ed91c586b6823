//! Filename heuristics for the enumeration tool's output naming convention.
//!
//! Files are named `service_operation_region_account.json`, with the literal
//! `None` standing in for an absent region or account. Names that do not follow
//! the convention are still accepted and mapped to best-effort defaults.

const DELIMITER: &str = "_";
const ABSENT: &str = "None";
const UNKNOWN: &str = "unknown";

/// Fields recovered from an output filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
  pub service: String,
  pub operation: String,
  pub region: Option<String>,
  pub account: Option<String>,
}

/// Split a filename into service/operation/region/account.
///
/// `extension` is the content extension without its dot; it is stripped only
/// from the end of the name. Never fails: short or malformed names fall back
/// to `unknown` fields.
pub fn parse_filename(filename: &str, extension: &str) -> ParsedFilename {
  let name = filename
    .strip_suffix(extension)
    .and_then(|rest| rest.strip_suffix('.'))
    .unwrap_or(filename);
  let parts: Vec<&str> = if name.is_empty() {
    Vec::new()
  } else {
    name.split(DELIMITER).collect()
  };

  match parts.as_slice() {
    [service, operation, region, account, ..] => ParsedFilename {
      service: service.to_string(),
      operation: operation.to_string(),
      region: present(region),
      account: present(account),
    },
    [service, operation, region] => ParsedFilename {
      service: service.to_string(),
      operation: operation.to_string(),
      region: present(region),
      account: None,
    },
    [service, rest @ ..] => ParsedFilename {
      service: service.to_string(),
      operation: if rest.is_empty() {
        UNKNOWN.to_string()
      } else {
        rest.join(DELIMITER)
      },
      region: None,
      account: None,
    },
    [] => ParsedFilename {
      service: UNKNOWN.to_string(),
      operation: UNKNOWN.to_string(),
      region: None,
      account: None,
    },
  }
}

fn present(token: &str) -> Option<String> {
  (token != ABSENT).then(|| token.to_string())
}
