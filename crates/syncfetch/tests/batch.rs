//! Batch fetching through the bridge with a scripted worker.

#![cfg(unix)]

use std::path::PathBuf;

use syncfetch::{Bridge, BridgeConfig};

// Replies by URL: "one" and "two" succeed, "fail" reports an HTTP error,
// "hang" never answers.
const ROUTING_WORKER: &str = r#"read -r url
case "$url" in
  *fail*) printf '{"error":"HTTP 500"}' ;;
  *hang*) sleep 5 ;;
  *one*) printf '{"data":"b25l"}' ;;
  *two*) printf '{"data":"dHdv"}' ;;
  *) printf '{"error":"unknown"}' ;;
esac"#;

fn bridge(concurrency: usize) -> Bridge {
    let mut config = BridgeConfig::default();
    config.worker.program = Some(PathBuf::from("sh"));
    config.worker.args = vec!["-c".to_string(), ROUTING_WORKER.to_string()];
    config.worker.timeout = "1s".to_string();
    config.batch.concurrency = concurrency;
    Bridge::new(config).unwrap()
}

#[test]
fn failed_url_is_omitted_and_order_kept() {
    let out = bridge(4).fetch_all([
        "https://example.com/one",
        "https://example.com/fail",
        "https://example.com/two",
    ]);
    assert_eq!(
        out,
        vec![
            ("https://example.com/one".to_string(), b"one".to_vec()),
            ("https://example.com/two".to_string(), b"two".to_vec()),
        ]
    );
}

#[test]
fn sequential_batch_matches_concurrent_batch() {
    let urls = [
        "https://example.com/two",
        "https://example.com/one",
        "https://example.com/fail",
        "https://example.com/two",
    ];
    let sequential = bridge(1).fetch_all(urls);
    let concurrent = bridge(8).fetch_all(urls);
    assert_eq!(sequential, concurrent);
    let names: Vec<_> = sequential.iter().map(|(url, _)| url.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "https://example.com/two",
            "https://example.com/one",
            "https://example.com/two",
        ]
    );
}

#[test]
fn timed_out_url_is_omitted() {
    let out = bridge(2).fetch_all(["https://example.com/hang", "https://example.com/one"]);
    assert_eq!(
        out,
        vec![("https://example.com/one".to_string(), b"one".to_vec())]
    );
}

#[test]
fn all_failures_give_an_empty_list() {
    let out = bridge(2).fetch_all(["https://example.com/fail", "https://example.com/nope"]);
    assert!(out.is_empty());
}

#[test]
fn missing_worker_gives_an_empty_list() {
    let mut config = BridgeConfig::default();
    config.worker.program = Some(PathBuf::from("/nonexistent/syncfetch-worker"));
    let bridge = Bridge::new(config).unwrap();
    assert!(bridge.fetch_all(["https://example.com/one"]).is_empty());
}
