//! Wire format between the bridge and the worker process.
//!
//! Every record is plain JSON so it can cross a process boundary:
//!
//! ```text
//! request  = [url, {body?, cache, credentials, destination, headers: [[name, value]...],
//!                   integrity, keepalive, method, mode, redirect, referrer,
//!                   referrerPolicy, follow?, timeoutMs?, compress?, maxSizeBytes?}]
//! response = [0, base64Body, {status, statusText, headers, url, redirected, type}, bodyError?]
//!          | [1, [errorName, [message, type, systemError]]]
//! reply    = {"data": base64Bytes} | {"error": message}
//! ```
//!
//! Bodies travel base64-encoded. Headers travel as one `[name, value]`
//! pair per name, with multiple values already joined by `", "`.
//! Cancellation signals never cross the boundary.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyInit, ConsumeBody};
use crate::error::{Error, Result, TransportError, TransportErrorName};
use crate::header::{Headers, HeadersInit};
use crate::request::{Request, RequestInit};
use crate::response::{Response, ResponseType};

// ── Records ─────────────────────────────────────────────────────────

/// Request options in transport form. Missing keys take the request
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireRequestInit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub cache: String,
    pub credentials: String,
    pub destination: String,
    pub headers: Vec<(String, String)>,
    pub integrity: String,
    pub keepalive: bool,
    pub method: String,
    pub mode: String,
    pub redirect: String,
    pub referrer: String,
    pub referrer_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
}

impl Default for WireRequestInit {
    fn default() -> Self {
        Self {
            body: None,
            cache: "default".into(),
            credentials: "same-origin".into(),
            destination: String::new(),
            headers: Vec::new(),
            integrity: String::new(),
            keepalive: false,
            method: "GET".into(),
            mode: "cors".into(),
            redirect: "follow".into(),
            referrer: "about:client".into(),
            referrer_policy: String::new(),
            follow: None,
            timeout_ms: None,
            compress: None,
            max_size_bytes: None,
        }
    }
}

/// `[url, init]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRequest(pub String, pub WireRequestInit);

impl TransportRequest {
    pub fn url(&self) -> &str {
        &self.0
    }

    pub fn init(&self) -> &WireRequestInit {
        &self.1
    }
}

impl fmt::Display for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.1.method, self.0)
    }
}

/// Response metadata in transport form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponseInit {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub redirected: bool,
    #[serde(default, rename = "type")]
    pub response_type: ResponseType,
}

/// OS-level detail attached to a fetch error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemError {
    pub code: String,
}

/// `[message, type, systemError]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInit(pub String, pub Option<String>, pub Option<SystemError>);

/// `[errorName, [message, type, systemError]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError(pub String, pub ErrorInit);

/// The worker's answer to a [`TransportRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
    Success {
        /// Base64-encoded body.
        body: String,
        init: WireResponseInit,
        body_error: Option<SerializedError>,
    },
    Failure(SerializedError),
}

impl TransportResponse {
    /// A successful response record for a fully read body.
    pub fn success(
        status: u16,
        status_text: impl Into<String>,
        headers: &Headers,
        url: impl Into<String>,
        redirected: bool,
        body: &[u8],
    ) -> Self {
        TransportResponse::Success {
            body: STANDARD.encode(body),
            init: WireResponseInit {
                status,
                status_text: status_text.into(),
                headers: headers.entries(),
                url: url.into(),
                redirected,
                response_type: ResponseType::Basic,
            },
            body_error: None,
        }
    }

    pub fn failure(error: &TransportError) -> Self {
        TransportResponse::Failure(encode_error(error))
    }
}

impl Serialize for TransportResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TransportResponse::Success {
                body,
                init,
                body_error,
            } => {
                let len = if body_error.is_some() { 4 } else { 3 };
                let mut seq = serializer.serialize_seq(Some(len))?;
                seq.serialize_element(&0u8)?;
                seq.serialize_element(body)?;
                seq.serialize_element(init)?;
                if let Some(err) = body_error {
                    seq.serialize_element(err)?;
                }
                seq.end()
            }
            TransportResponse::Failure(err) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&1u8)?;
                seq.serialize_element(err)?;
                seq.end()
            }
        }
    }
}

fn element<T: DeserializeOwned, E: de::Error>(
    values: &mut std::vec::IntoIter<serde_json::Value>,
    what: &str,
) -> std::result::Result<T, E> {
    let value = values
        .next()
        .ok_or_else(|| E::custom(format!("response record is missing {what}")))?;
    serde_json::from_value(value).map_err(|e| E::custom(format!("invalid {what}: {e}")))
}

impl<'de> Deserialize<'de> for TransportResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let mut values = values.into_iter();
        let status: u64 = element::<_, D::Error>(&mut values, "status code")?;
        if status == 0 {
            let body = element::<_, D::Error>(&mut values, "body")?;
            let init = element::<_, D::Error>(&mut values, "response init")?;
            let body_error = match values.next() {
                None | Some(serde_json::Value::Null) => None,
                Some(value) => Some(serde_json::from_value(value).map_err(|e| {
                    <D::Error as de::Error>::custom(format!("invalid body error: {e}"))
                })?),
            };
            Ok(TransportResponse::Success {
                body,
                init,
                body_error,
            })
        } else {
            Ok(TransportResponse::Failure(element::<_, D::Error>(
                &mut values,
                "error",
            )?))
        }
    }
}

/// Single-URL worker reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerReply {
    /// Base64-encoded body of a 2xx response.
    Data(String),
    Error(String),
}

impl WorkerReply {
    pub fn data(bytes: &[u8]) -> Self {
        WorkerReply::Data(STANDARD.encode(bytes))
    }
}

// ── Errors ──────────────────────────────────────────────────────────

pub fn encode_error(error: &TransportError) -> SerializedError {
    SerializedError(
        error.name.as_str().to_string(),
        ErrorInit(
            error.message.clone(),
            error.error_type.clone(),
            error.code.clone().map(|code| SystemError { code }),
        ),
    )
}

/// Rebuild an error: `TypeError` stays a type error, any other name
/// becomes a fetch error with the same type and code.
pub fn decode_error(error: SerializedError) -> TransportError {
    let SerializedError(name, ErrorInit(message, error_type, system)) = error;
    let name = TransportErrorName::from_wire(&name);
    TransportError {
        name,
        message,
        error_type: match name {
            TransportErrorName::TypeError => None,
            TransportErrorName::FetchError => error_type,
        },
        code: match name {
            TransportErrorName::TypeError => None,
            TransportErrorName::FetchError => system.map(|s| s.code),
        },
    }
}

// ── Requests ────────────────────────────────────────────────────────

fn decode_base64(data: &str, what: &str) -> Result<Bytes> {
    STANDARD
        .decode(data)
        .map(Bytes::from)
        .map_err(|e| Error::Protocol(format!("{what} is not valid base64: {e}")))
}

pub fn encode_request(request: &Request) -> TransportRequest {
    TransportRequest(
        request.url().to_string(),
        WireRequestInit {
            body: request.body().map(|bytes| STANDARD.encode(bytes)),
            cache: request.cache().to_string(),
            credentials: request.credentials().to_string(),
            destination: request.destination().to_string(),
            headers: request.headers().entries(),
            integrity: request.integrity().to_string(),
            keepalive: request.keepalive(),
            method: request.method().to_string(),
            mode: request.mode().to_string(),
            redirect: request.redirect().to_string(),
            referrer: request.referrer().to_string(),
            referrer_policy: request.referrer_policy().to_string(),
            follow: request.follow(),
            timeout_ms: request.timeout_ms(),
            compress: request.compress(),
            max_size_bytes: request.max_size_bytes(),
        },
    )
}

/// Rebuild a [`Request`] on the worker side. String options come back
/// exactly as sent; only an empty method falls back to `GET`.
///
/// Headers arrive one pair per name, so a name that held several values
/// comes back holding the single joined value. `get` agrees with the
/// original; `raw` does not.
pub fn decode_request(record: TransportRequest) -> Result<Request> {
    let TransportRequest(url, init) = record;
    let method = Some(init.method).filter(|m| !m.is_empty());

    let body = match init.body {
        Some(data) => Some(BodyInit::Bytes(decode_base64(&data, "request body")?)),
        None => None,
    };
    let headers = Headers::try_from_pairs(init.headers)?;

    Request::new(
        &url,
        RequestInit {
            method,
            headers: Some(HeadersInit::Headers(headers)),
            body,
            cache: Some(init.cache),
            credentials: Some(init.credentials),
            destination: Some(init.destination),
            integrity: Some(init.integrity),
            keepalive: Some(init.keepalive),
            mode: Some(init.mode),
            redirect: Some(init.redirect),
            referrer: Some(init.referrer),
            referrer_policy: Some(init.referrer_policy),
            follow: init.follow,
            timeout_ms: init.timeout_ms,
            compress: init.compress,
            max_size_bytes: init.max_size_bytes,
        },
    )
}

// ── Responses ───────────────────────────────────────────────────────

/// Encode a response, including any recorded body error. The body bytes
/// are read without consuming.
pub fn encode_response(response: &Response) -> TransportResponse {
    TransportResponse::Success {
        body: STANDARD.encode(response.body().map(|b| &b[..]).unwrap_or_default()),
        init: WireResponseInit {
            status: response.status(),
            status_text: response.status_text().to_string(),
            headers: response.headers().entries(),
            url: response.url().to_string(),
            redirected: response.redirected(),
            response_type: response.response_type(),
        },
        body_error: response.body_state().error().map(encode_error),
    }
}

/// Turn a worker record into a [`Response`], or raise the error it carries.
///
/// As with requests, each header name holds one joined value.
pub fn decode_response(record: TransportResponse) -> Result<Response> {
    match record {
        TransportResponse::Success {
            body,
            init,
            body_error,
        } => {
            let bytes = decode_base64(&body, "response body")?;
            let headers = Headers::try_from_pairs(init.headers)?;
            Response::from_parts(
                init.status,
                init.status_text,
                headers,
                init.url,
                init.redirected,
                init.response_type,
                Body::new(Some(bytes)).with_error(body_error.map(decode_error)),
            )
        }
        TransportResponse::Failure(err) => Err(Error::Transport(decode_error(err))),
    }
}

/// Turn a single-URL worker reply into bytes, or raise its error.
pub fn decode_reply(reply: WorkerReply) -> Result<Vec<u8>> {
    match reply {
        WorkerReply::Data(data) => Ok(decode_base64(&data, "reply data")?.to_vec()),
        WorkerReply::Error(message) => Err(Error::Transport(TransportError {
            name: TransportErrorName::FetchError,
            message,
            error_type: None,
            code: None,
        })),
    }
}
