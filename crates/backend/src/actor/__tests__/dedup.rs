//! Duplicate-event handling: one path, one worker, one insert.

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tokio::time::sleep;

  use crate::actor::__tests__::helpers::WatcherTestContext;

  #[tokio::test]
  async fn test_duplicate_events_produce_one_insert() {
    let mut ctx = WatcherTestContext::new();
    let path = ctx.write_file("ec2_DescribeSubnets_us-west-2_None.json", r#"{"Subnets": []}"#);
    ctx.start("s1").await;

    let dispatcher = ctx.watcher.dispatcher().expect("watching");
    let handles: Vec<_> = (0..100)
      .map(|_| {
        let dispatcher = dispatcher.clone();
        let path = path.clone();
        tokio::spawn(async move { dispatcher.dispatch(&path) })
      })
      .collect();

    let mut spawned = 0;
    for handle in handles {
      if handle.await.unwrap() {
        spawned += 1;
      }
    }
    assert_eq!(spawned, 1);

    assert!(ctx.watcher.wait_for_completion(1, Duration::from_secs(5)).await);
    // late duplicates after processing must not re-ingest
    for _ in 0..10 {
      assert!(!dispatcher.dispatch(&path));
    }
    sleep(Duration::from_millis(300)).await;

    assert_eq!(ctx.sink.insert_calls(), 1);
    assert_eq!(ctx.sink.records_for(&path), 1);

    ctx.watcher.stop().await;
    assert_eq!(ctx.watcher.processed_count(), 1);
  }

  #[tokio::test]
  async fn test_rewrites_while_in_flight_do_not_duplicate() {
    let mut ctx = WatcherTestContext::new();
    ctx.start("s1").await;

    let name = "rds_DescribeDBClusters_us-east-1_None.json";
    for i in 0..5 {
      ctx.write_file(name, &format!(r#"{{"DBClusters": [{i}]}}"#));
      sleep(Duration::from_millis(20)).await;
    }

    assert!(ctx.watcher.wait_for_completion(1, Duration::from_secs(5)).await);
    sleep(Duration::from_millis(500)).await;

    assert_eq!(ctx.sink.insert_calls(), 1);
    ctx.watcher.stop().await;
  }
}
