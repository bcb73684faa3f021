//! The real worker binary driven through the blocking bridge.

mod common;

use std::path::PathBuf;

use syncfetch::{Bridge, BridgeConfig, ConsumeBody, ErrorKind, Request, RequestInit};

fn bridge(timeout: &str) -> Bridge {
    let mut config = BridgeConfig::default();
    config.worker.program = Some(PathBuf::from(env!("CARGO_BIN_EXE_syncfetch-worker")));
    config.worker.timeout = timeout.to_string();
    Bridge::new(config).unwrap()
}

#[test]
fn fetch_one_returns_body_bytes() {
    let addr = common::spawn_server_thread();
    let bytes = bridge("10s").fetch_one(&format!("http://{addr}/ok")).unwrap();
    assert_eq!(bytes, b"hello");
}

#[test]
fn fetch_one_raises_http_status() {
    let addr = common::spawn_server_thread();
    let bridge = bridge("10s");
    let url = format!("http://{addr}/missing");
    let err = bridge.fetch_one(&url).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("404"));
    assert_eq!(bridge.fetch_sync(&url), None);
}

#[test]
fn full_fetch_round_trip() {
    let addr = common::spawn_server_thread();
    let mut resp = bridge("10s")
        .fetch_url(
            &format!("http://{addr}/echo"),
            RequestInit {
                method: Some("PUT".into()),
                body: Some(vec![b'a', b'b', b'c'].into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("x-echo-content-type").unwrap().as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(resp.text().unwrap(), "PUT abc");
}

#[test]
fn full_fetch_reports_network_failure() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = bridge("10s")
        .fetch(&Request::get(&format!("http://{addr}/")).unwrap())
        .unwrap_err();
    let transport = err.as_transport().unwrap();
    assert_eq!(transport.code.as_deref(), Some("ECONNREFUSED"));
}

#[test]
fn batch_keeps_successes_in_order() {
    let addr = common::spawn_server_thread();
    let urls = [
        format!("http://{addr}/big"),
        format!("http://{addr}/missing"),
        format!("http://{addr}/ok"),
    ];
    let out = bridge("10s").fetch_all(urls.clone());
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].0, urls[0]);
    assert_eq!(out[0].1.len(), 10_000);
    assert_eq!(out[1], (urls[2].clone(), b"hello".to_vec()));
}

#[test]
fn slow_server_hits_the_bridge_timeout() {
    let addr = common::spawn_server_thread();
    let err = bridge("500ms")
        .fetch_one(&format!("http://{addr}/slow"))
        .unwrap_err();
    assert!(err.is_timeout());
}
