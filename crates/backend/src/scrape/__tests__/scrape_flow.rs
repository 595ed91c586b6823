//! End-to-end scrape tests driving a fake enumeration tool.

#[cfg(all(test, unix))]
mod tests {
  use std::time::Duration;

  use chrono::Utc;
  use pretty_assertions::assert_eq;

  use crate::{
    db::ResourceFilter,
    domain::scan::{ScanOutcome, ScanSession},
    scrape::{FAIL_MARKER, METADATA_FILE, SUCCESS_MARKER, ScrapeRequest, __tests__::helpers::ScrapeTestContext},
  };

  #[tokio::test]
  async fn test_successful_scrape_ingests_all_files() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.install_tool(
      r#"echo "querying into $dir"
printf '{"Buckets": [{"Name": "logs"}]}' > "$dir/s3_ListBuckets_None_None.json"
sleep 0.2
printf '{"Vpcs": []}' > "$dir/ec2_DescribeVpcs_us-east-1_123456789012.json"
echo "throttled once" >&2
exit 0"#,
    );

    let request = ScrapeRequest {
      services: vec!["s3".into(), "ec2".into()],
      ..Default::default()
    };
    let session = ctx.orchestrator().scrape(&request).await.unwrap();

    assert_eq!(session.outcome, ScanOutcome::Success);
    assert_eq!(session.return_code, Some(0));
    assert_eq!(session.expected_files, 2);
    assert_eq!(session.processed_files, 2);
    assert_eq!(session.error, None);
    assert!(session.command.contains(&"--service".to_string()));

    let stored = ctx.db.get_scan(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.outcome, ScanOutcome::Success);
    assert_eq!(stored.services, Some(vec!["s3".to_string(), "ec2".to_string()]));

    let records = ctx
      .db
      .query_resources(&ResourceFilter::for_scan(&session.id), None, 0)
      .await
      .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| r.service == "s3" && r.region.is_none()));
    assert!(
      records
        .iter()
        .any(|r| r.service == "ec2" && r.account.as_deref() == Some("123456789012"))
    );

    let metadata = std::fs::read_to_string(session.directory.join(METADATA_FILE)).unwrap();
    let written: ScanSession = serde_json::from_str(&metadata).unwrap();
    assert_eq!(written.id, session.id);
    let status_dir = ctx.config.scrape.status_dir().join(&session.id);
    assert!(status_dir.join("metadata.json").exists());
    assert!(status_dir.join(SUCCESS_MARKER).exists());
    assert!(!status_dir.join(FAIL_MARKER).exists());
  }

  #[tokio::test]
  async fn test_scan_details_include_files_and_logs() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.install_tool(
      r#"echo "querying"
printf '[]' > "$dir/iam_ListUsers_None_None.json"
echo "warning" >&2"#,
    );

    let orchestrator = ctx.orchestrator();
    let session = orchestrator.scrape(&ScrapeRequest::default()).await.unwrap();
    let details = orchestrator.scan_details(&session.id).await.unwrap().unwrap();

    assert_eq!(details.session.id, session.id);
    assert_eq!(details.files.len(), 1);
    assert_eq!(details.files[0].name, "iam_ListUsers_None_None.json");
    assert_eq!(details.files[0].size, 2);
    assert_eq!(details.stdout.as_deref(), Some("querying\n"));
    assert_eq!(details.stderr.as_deref(), Some("warning\n"));

    assert!(orchestrator.scan_details("scrape_missing").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_nonzero_exit_is_failure() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.install_tool("echo 'access denied' >&2\nexit 3");

    let session = ctx.orchestrator().scrape(&ScrapeRequest::default()).await.unwrap();

    assert_eq!(session.outcome, ScanOutcome::Failure);
    assert_eq!(session.return_code, Some(3));
    assert_eq!(session.expected_files, 0);
    assert_eq!(session.error.as_deref(), Some("Tool exited with status 3"));

    let status_dir = ctx.config.scrape.status_dir().join(&session.id);
    assert!(status_dir.join(FAIL_MARKER).exists());
    assert!(!status_dir.join(SUCCESS_MARKER).exists());
  }

  #[tokio::test]
  async fn test_aborted_scrape_is_recorded_as_failure() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.install_tool(r#"rm -rf "$dir"
exit 0"#);

    let result = ctx.orchestrator().scrape(&ScrapeRequest::default()).await;
    assert!(result.is_err());

    let scans = ctx.db.list_scans(false, None, 0).await.unwrap();
    assert_eq!(scans.len(), 1);
    let stored = &scans[0];
    assert_eq!(stored.outcome, ScanOutcome::Failure);
    assert!(stored.ended_at.is_some());
    assert!(stored.error.is_some());
    assert_eq!(stored.return_code, Some(0));

    let status_dir = ctx.config.scrape.status_dir().join(&stored.id);
    assert!(status_dir.join(FAIL_MARKER).exists());
  }

  #[tokio::test]
  async fn test_missing_tool_is_failure() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.config.scrape.tool = ctx.base.path().join("no-such-tool").to_string_lossy().into_owned();

    let session = ctx.orchestrator().scrape(&ScrapeRequest::default()).await.unwrap();

    assert_eq!(session.outcome, ScanOutcome::Failure);
    assert_eq!(session.return_code, None);
    assert!(session.error.is_some());
    assert!(session.ended_at.is_some());
  }

  #[tokio::test]
  async fn test_slow_tool_times_out() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.config.scrape.tool_timeout_secs = 1;
    ctx.install_tool("sleep 10");

    let start = std::time::Instant::now();
    let session = ctx.orchestrator().scrape(&ScrapeRequest::default()).await.unwrap();

    assert_eq!(session.outcome, ScanOutcome::Timeout);
    assert!(start.elapsed() < Duration::from_secs(8));
  }

  #[tokio::test]
  async fn test_unparseable_output_fails_ingestion() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.config.scrape.completion_timeout_secs = 1;
    ctx.install_tool(r#"printf '{"Functions": [' > "$dir/lambda_ListFunctions_us-east-1_None.json""#);

    let session = ctx.orchestrator().scrape(&ScrapeRequest::default()).await.unwrap();

    assert_eq!(session.outcome, ScanOutcome::Failure);
    assert_eq!(session.return_code, Some(0));
    assert_eq!(session.expected_files, 1);
    assert_eq!(session.processed_files, 0);
    assert_eq!(ctx.db.count_resources(Some(&session.id)).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_delete_and_cleanup() {
    let mut ctx = ScrapeTestContext::new().await;
    ctx.install_tool(r#"printf '{}' > "$dir/sns_ListTopics_None_None.json""#);
    let orchestrator = ctx.orchestrator();

    let first = orchestrator.scrape(&ScrapeRequest::default()).await.unwrap();
    let second = orchestrator.scrape(&ScrapeRequest::default()).await.unwrap();

    assert!(orchestrator.delete_scan(&first.id).await.unwrap());
    assert!(!first.directory.exists());
    assert!(!first.log_directory.exists());
    assert!(ctx.db.get_scan(&first.id).await.unwrap().is_none());
    assert_eq!(ctx.db.count_resources(Some(&first.id)).await.unwrap(), 0);
    assert!(!orchestrator.delete_scan(&first.id).await.unwrap());
    assert!(orchestrator.delete_scan("../escape").await.is_err());

    // backdate the remaining scan past the retention window
    let mut aged = ctx.db.get_scan(&second.id).await.unwrap().unwrap();
    aged.started_at = Utc::now() - chrono::Duration::days(40);
    ctx.db.update_scan(&aged).await.unwrap();

    assert_eq!(orchestrator.cleanup_old_scans(30).await.unwrap(), 1);
    assert!(ctx.db.get_scan(&second.id).await.unwrap().is_none());
    assert!(!second.directory.exists());
    assert_eq!(orchestrator.cleanup_old_scans(30).await.unwrap(), 0);
  }
}
