//! End-to-end tests for the directory watcher against the real filesystem.

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use pretty_assertions::assert_eq;
  use tokio::time::{sleep, timeout};

  use crate::actor::__tests__::helpers::{MemorySink, WatcherTestContext, fast_config};

  #[tokio::test]
  async fn test_sequential_files_are_ingested() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    let names = [
      "ec2_DescribeInstances_us-east-1_None.json",
      "s3_ListBuckets_None_None.json",
      "lambda_ListFunctions_eu-west-1_123456789012.json",
    ];
    for (i, name) in names.iter().enumerate() {
      ctx.write_file(name, &format!(r#"{{"Items": [{i}]}}"#));
      sleep(Duration::from_millis(200)).await;
    }

    assert!(ctx.watcher.wait_for_completion(3, Duration::from_secs(10)).await);

    let records = ctx.sink.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.scan_id == "s1"));

    let mut filenames: Vec<_> = records.iter().map(|r| r.filename.clone()).collect();
    filenames.sort();
    let mut expected: Vec<_> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(filenames, expected);

    ctx.watcher.stop().await;
    assert!(!ctx.watcher.is_watching());
    assert_eq!(ctx.watcher.processed_count(), 3);
  }

  #[tokio::test]
  async fn test_truncated_json_is_never_ingested() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    let path = ctx.write_file("dynamodb_ListTables_us-east-1_None.json", r#"{"TableNames": ["orders", "#);

    assert!(!ctx.watcher.wait_for_completion(1, Duration::from_secs(2)).await);
    assert_eq!(ctx.sink.records_for(&path), 0);
    assert_eq!(ctx.sink.insert_calls(), 0);

    ctx.watcher.stop().await;
    assert_eq!(ctx.watcher.processed_count(), 0);
  }

  #[tokio::test]
  async fn test_excluded_and_foreign_files_are_skipped() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    ctx.write_file("scrape_metadata.json", r#"{"scan_id": "s1"}"#);
    ctx.write_file("notes.txt", "hello");
    ctx.write_file("ec2_DescribeVpcs_us-east-1_None.json", r#"{"Vpcs": []}"#);

    assert!(ctx.watcher.wait_for_completion(1, Duration::from_secs(5)).await);
    // leave time for any wrongly dispatched worker to finish
    sleep(Duration::from_millis(500)).await;

    let records = ctx.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "ec2_DescribeVpcs_us-east-1_None.json");

    ctx.watcher.stop().await;
  }

  #[tokio::test]
  async fn test_gate_times_out_short_of_expected() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    for name in ["a_List_None_None.json", "b_List_None_None.json", "c_List_None_None.json"] {
      ctx.write_file(name, "[]");
    }

    let start = std::time::Instant::now();
    assert!(!ctx.watcher.wait_for_completion(5, Duration::from_secs(2)).await);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(ctx.watcher.processed_count(), 3);

    ctx.watcher.stop().await;
    assert_eq!(ctx.watcher.processed_count(), 3);
  }

  #[tokio::test]
  async fn test_gate_with_zero_expected_returns_immediately() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    let result = timeout(Duration::from_millis(20), ctx.watcher.wait_for_completion(0, Duration::from_secs(60))).await;
    assert_eq!(result.ok(), Some(true));

    ctx.watcher.stop().await;
  }

  #[tokio::test]
  async fn test_start_creates_missing_directory() {
    let ctx = WatcherTestContext::new();
    let nested = ctx.dir().join("scrapes").join("scan-1");
    let mut watcher = crate::actor::DirectoryWatcher::new(fast_config(), ctx.sink.clone());

    watcher.start(&nested, "scan-1").await.unwrap();
    assert!(nested.is_dir());
    assert_eq!(watcher.scan_id(), Some("scan-1"));

    watcher.stop().await;
    assert_eq!(watcher.scan_id(), None);
  }

  #[tokio::test]
  async fn test_restart_resets_counts() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("first").await;

    ctx.write_file("ec2_DescribeVpcs_us-east-1_None.json", r#"{"Vpcs": []}"#);
    assert!(ctx.watcher.wait_for_completion(1, Duration::from_secs(5)).await);

    // starting again stops the previous session first
    ctx.start("second").await;
    assert_eq!(ctx.watcher.scan_id(), Some("second"));
    assert_eq!(ctx.watcher.processed_count(), 0);

    ctx.write_file("s3_ListBuckets_None_None.json", r#"{"Buckets": []}"#);
    assert!(ctx.watcher.wait_for_completion(1, Duration::from_secs(5)).await);
    ctx.watcher.stop().await;

    let records = ctx.sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].scan_id, "first");
    assert_eq!(records[1].scan_id, "second");
  }

  #[tokio::test]
  async fn test_stop_when_idle_is_noop() {
    let mut ctx = WatcherTestContext::new();
    ctx.watcher.stop().await;
    assert_eq!(ctx.watcher.processed_count(), 0);
    assert!(!ctx.watcher.wait_for_completion(1, Duration::from_secs(1)).await);
  }

  #[tokio::test]
  async fn test_stop_tears_down_workers_past_grace_period() {
    let config = crate::domain::config::WatcherConfig {
      stop_grace_secs: 1,
      ..fast_config()
    };
    let mut ctx = WatcherTestContext::with_sink(MemorySink::stalling(Duration::from_secs(30)), config);
    ctx.start("s1").await;

    ctx.write_file("kms_ListKeys_us-east-1_None.json", r#"{"Keys": []}"#);
    assert!(ctx.wait_for_insert_calls(1, Duration::from_secs(5)).await);

    let start = std::time::Instant::now();
    ctx.watcher.stop().await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "stop returned before the grace period: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "stop waited on the stalled worker: {elapsed:?}");
    assert!(!ctx.watcher.is_watching());
    assert_eq!(ctx.watcher.processed_count(), 0);

    // the torn-down worker must not land a record or bump the frozen count later
    sleep(Duration::from_millis(500)).await;
    assert!(ctx.sink.records().is_empty());
    assert_eq!(ctx.sink.insert_calls(), 1);
    assert_eq!(ctx.watcher.processed_count(), 0);
  }

  #[tokio::test]
  async fn test_directory_with_candidate_name_is_not_ingested() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    std::fs::create_dir(ctx.dir().join("ec2_DescribeRegions_None_None.json")).unwrap();
    ctx.write_file("ec2_DescribeVpcs_us-east-1_None.json", r#"{"Vpcs": []}"#);

    assert!(ctx.watcher.wait_for_completion(1, Duration::from_secs(5)).await);
    sleep(Duration::from_millis(500)).await;

    let records = ctx.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "ec2_DescribeVpcs_us-east-1_None.json");

    ctx.watcher.stop().await;
  }
}
