//! Building and running the enumeration tool

use std::{
  path::Path,
  process::Stdio,
  time::{Duration, Instant},
};

use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::ScrapeRequest;

/// How the tool run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
  /// Exited on its own; `None` when terminated by a signal
  Exited(Option<i32>),
  TimedOut,
  FailedToStart(String),
}

impl ToolOutcome {
  pub fn return_code(&self) -> Option<i32> {
    match self {
      ToolOutcome::Exited(code) => *code,
      ToolOutcome::TimedOut | ToolOutcome::FailedToStart(_) => None,
    }
  }
}

/// `<tool> query --directory <dir> [--service S]... [--region R]... [--profile P]`
pub fn build_command(tool: &str, output_dir: &Path, request: &ScrapeRequest, default_profile: Option<&str>) -> Vec<String> {
  let mut command = vec![
    tool.to_string(),
    "query".to_string(),
    "--directory".to_string(),
    output_dir.to_string_lossy().into_owned(),
  ];

  for service in &request.services {
    command.push("--service".to_string());
    command.push(service.clone());
  }

  for region in &request.regions {
    command.push("--region".to_string());
    command.push(region.clone());
  }

  if let Some(profile) = request.profile.as_deref().or(default_profile) {
    command.push("--profile".to_string());
    command.push(profile.to_string());
  }

  command
}

/// Run `command` with stdout/stderr captured into `log_dir`, killing it after `timeout`
pub async fn run_tool(command: &[String], log_dir: &Path, timeout: Duration) -> ToolOutcome {
  let Some((program, args)) = command.split_first() else {
    return ToolOutcome::FailedToStart("empty command".to_string());
  };

  let (stdout, stderr) = match open_logs(log_dir) {
    Ok(files) => files,
    Err(e) => {
      error!(log_dir = %log_dir.display(), err = %e, "Failed to create tool log files");
      return ToolOutcome::FailedToStart(format!("failed to create log files: {e}"));
    }
  };

  info!(command = %command.join(" "), "Running enumeration tool");
  let start = Instant::now();

  let mut cmd = Command::new(program);
  cmd
    .args(args)
    .stdin(Stdio::null())
    .stdout(Stdio::from(stdout))
    .stderr(Stdio::from(stderr))
    .kill_on_drop(true);

  let mut child = match cmd.spawn() {
    Ok(child) => child,
    Err(e) => {
      error!(program = %program, err = %e, "Failed to spawn enumeration tool");
      return ToolOutcome::FailedToStart(format!("failed to start {program}: {e}"));
    }
  };

  match tokio::time::timeout(timeout, child.wait()).await {
    Ok(Ok(status)) => {
      debug!(
        exit_code = ?status.code(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Enumeration tool exited"
      );
      ToolOutcome::Exited(status.code())
    }
    Ok(Err(e)) => {
      error!(err = %e, "Failed to wait for enumeration tool");
      ToolOutcome::FailedToStart(format!("failed to wait for {program}: {e}"))
    }
    Err(_) => {
      warn!(
        timeout_secs = timeout.as_secs(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Enumeration tool timed out, killing it"
      );
      if let Err(e) = child.kill().await {
        warn!(err = %e, "Failed to kill enumeration tool");
      }
      ToolOutcome::TimedOut
    }
  }
}

fn open_logs(log_dir: &Path) -> std::io::Result<(std::fs::File, std::fs::File)> {
  std::fs::create_dir_all(log_dir)?;
  let stdout = std::fs::File::create(log_dir.join("stdout.log"))?;
  let stderr = std::fs::File::create(log_dir.join("stderr.log"))?;
  Ok((stdout, stderr))
}
