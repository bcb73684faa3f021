//! The syncfetch worker: one HTTP request per process.
//!
//! The bridge writes either a bare URL or a JSON request record to the
//! worker's stdin and closes it. The worker performs the fetch and answers
//! with exactly one JSON document on stdout:
//!
//! - bare URL in, `{"data": "<base64>"}` or `{"error": "<message>"}` out;
//!   a non-2xx status is reported as `{"error": "HTTP <status>"}`.
//! - request record in (input starting with `[`), response record out:
//!   `[0, body, init]` or `[1, [name, [message, type, systemError]]]`.
//!
//! Every failure, including unreadable input, still produces a reply.
//! Logs go to stderr only.

pub mod client;
pub mod tls;

pub use client::{Client, DEFAULT_FOLLOW, FetchedResponse};
pub use tls::TlsConfig;

use serde::Serialize;
use syncfetch::protocol::{self, TransportRequest, TransportResponse, WorkerReply};
use syncfetch::{Request, TransportError};
use tracing::debug;

/// How the worker interprets its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A bare URL, answered with a [`WorkerReply`].
    Simple,
    /// A [`TransportRequest`] record, answered with a [`TransportResponse`].
    Full,
}

impl Mode {
    pub fn detect(input: &str) -> Self {
        if input.trim_start().starts_with('[') {
            Mode::Full
        } else {
            Mode::Simple
        }
    }
}

/// Handle one worker input with a default client and return the reply
/// document.
pub async fn handle(input: &str) -> String {
    match Client::new() {
        Ok(client) => handle_with(&client, input).await,
        Err(e) => {
            let message = format!("failed to initialize TLS: {e}");
            match Mode::detect(input) {
                Mode::Simple => to_json(&WorkerReply::Error(message)),
                Mode::Full => to_json(&TransportResponse::failure(
                    &TransportError::fetch_error(message, "system"),
                )),
            }
        }
    }
}

pub async fn handle_with(client: &Client, input: &str) -> String {
    let input = input.trim();
    match Mode::detect(input) {
        Mode::Simple => to_json(&fetch_simple(client, input).await),
        Mode::Full => to_json(&fetch_full(client, input).await),
    }
}

async fn fetch_simple(client: &Client, url: &str) -> WorkerReply {
    let request = match Request::get(url) {
        Ok(request) => request,
        Err(e) => return WorkerReply::Error(e.to_string()),
    };
    match client.fetch(&request).await {
        Ok(response) if response.ok() => {
            debug!(url = %response.url, bytes = response.body.len(), "fetched");
            WorkerReply::data(&response.body)
        }
        Ok(response) => WorkerReply::Error(format!("HTTP {}", response.status)),
        Err(e) => WorkerReply::Error(e.message),
    }
}

async fn fetch_full(client: &Client, input: &str) -> TransportResponse {
    let record: TransportRequest = match serde_json::from_str(input) {
        Ok(record) => record,
        Err(e) => {
            return TransportResponse::failure(&TransportError::type_error(format!(
                "invalid request record: {e}"
            )));
        }
    };
    debug!(request = %record, "full fetch");
    let request = match protocol::decode_request(record) {
        Ok(request) => request,
        Err(e) => return TransportResponse::failure(&TransportError::type_error(e.to_string())),
    };
    match client.fetch(&request).await {
        Ok(response) => response.into_record(),
        Err(e) => TransportResponse::failure(&e),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}
