//! Single-use body state shared by [`Request`](crate::Request) and
//! [`Response`](crate::Response).
//!
//! A [`Body`] holds the buffered bytes plus a `used` flag. The
//! [`ConsumeBody`] trait provides the consumption accessors
//! (`array_buffer`, `text`, `json`, `buffer`, `blob`); the first call to
//! any of them flips the flag and every later call fails, whichever
//! accessor it is.

use std::fmt;
use std::io::Read;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result, TransportError, TransportErrorName};
use crate::header::Headers;
use crate::mime::MimeType;

// ── Body input shapes ───────────────────────────────────────────────

/// The accepted shapes of a request or response body.
pub enum BodyInit {
    Text(String),
    /// URL-encoded form fields, serialized as
    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    Bytes(Bytes),
    /// A window of `len` bytes starting at `offset` into `buffer`.
    View {
        buffer: Bytes,
        offset: usize,
        len: usize,
    },
    /// Streaming bodies cannot be buffered synchronously and are rejected.
    Stream(Box<dyn Read + Send>),
}

impl BodyInit {
    pub fn kind(&self) -> &'static str {
        match self {
            BodyInit::Text(_) => "text",
            BodyInit::Form(_) => "form",
            BodyInit::Bytes(_) => "bytes",
            BodyInit::View { .. } => "view",
            BodyInit::Stream(_) => "stream",
        }
    }

    /// The `content-type` implied by this shape when none was supplied.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            BodyInit::Text(_) => Some("text/plain;charset=UTF-8"),
            BodyInit::Form(_) => Some("application/x-www-form-urlencoded;charset=UTF-8"),
            BodyInit::Bytes(_) | BodyInit::View { .. } => Some("application/octet-stream"),
            BodyInit::Stream(_) => None,
        }
    }

    /// Normalize to a byte buffer.
    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            BodyInit::Text(text) => Ok(Bytes::from(text)),
            BodyInit::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish();
                Ok(Bytes::from(encoded))
            }
            BodyInit::Bytes(bytes) => Ok(bytes),
            BodyInit::View {
                buffer,
                offset,
                len,
            } => {
                let end = offset.checked_add(len).unwrap_or(usize::MAX);
                if end > buffer.len() {
                    return Err(Error::InvalidBodyView {
                        offset,
                        end,
                        len: buffer.len(),
                    });
                }
                Ok(buffer.slice(offset..end))
            }
            BodyInit::Stream(_) => Err(Error::UnsupportedBody("stream")),
        }
    }
}

impl fmt::Debug for BodyInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyInit::Text(text) => f.debug_tuple("Text").field(text).finish(),
            BodyInit::Form(fields) => f.debug_tuple("Form").field(fields).finish(),
            BodyInit::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            BodyInit::View { offset, len, .. } => f
                .debug_struct("View")
                .field("offset", offset)
                .field("len", len)
                .finish(),
            BodyInit::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<String> for BodyInit {
    fn from(text: String) -> Self {
        BodyInit::Text(text)
    }
}

impl From<&str> for BodyInit {
    fn from(text: &str) -> Self {
        BodyInit::Text(text.to_string())
    }
}

impl From<Vec<u8>> for BodyInit {
    fn from(bytes: Vec<u8>) -> Self {
        BodyInit::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for BodyInit {
    fn from(bytes: Bytes) -> Self {
        BodyInit::Bytes(bytes)
    }
}

// ── Body state ──────────────────────────────────────────────────────

/// Buffered body bytes with at-most-once consumption.
#[derive(Debug, Clone, Default)]
pub struct Body {
    bytes: Option<Bytes>,
    used: bool,
    error: Option<TransportError>,
}

impl Body {
    pub fn new(bytes: Option<Bytes>) -> Self {
        Self {
            bytes,
            used: false,
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach an error that every consumption accessor re-raises.
    pub fn with_error(mut self, error: Option<TransportError>) -> Self {
        self.error = error;
        self
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// The stored bytes, without consuming. `None` when no body was given.
    pub fn bytes(&self) -> Option<&Bytes> {
        self.bytes.as_ref()
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    pub(crate) fn check(&self, url: &str) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(Error::Transport(err.clone()));
        }
        if self.used {
            return Err(Error::BodyUsed {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    fn consume(&mut self, url: &str) -> Result<Bytes> {
        self.check(url)?;
        self.used = true;
        Ok(self.bytes.clone().unwrap_or_default())
    }
}

/// Bytes plus the content type they were served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    content_type: String,
}

impl Blob {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Serialized MIME type, or empty when unknown.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

// ── Consumption accessors ───────────────────────────────────────────

/// Body-reading behavior shared by requests and responses.
pub trait ConsumeBody {
    fn body_state(&self) -> &Body;

    fn body_state_mut(&mut self) -> &mut Body;

    /// URL reported in consumption errors.
    fn body_url(&self) -> &str;

    fn body_headers(&self) -> &Headers;

    fn body_used(&self) -> bool {
        self.body_state().is_used()
    }

    /// Peek at the stored bytes without consuming them.
    fn body(&self) -> Option<&Bytes> {
        self.body_state().bytes()
    }

    fn array_buffer(&mut self) -> Result<Bytes> {
        let url = self.body_url().to_string();
        self.body_state_mut().consume(&url)
    }

    fn buffer(&mut self) -> Result<Vec<u8>> {
        Ok(self.array_buffer()?.to_vec())
    }

    /// Decode as UTF-8, replacing invalid sequences.
    fn text(&mut self) -> Result<String> {
        let bytes = self.array_buffer()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let url = self.body_url().to_string();
        let bytes = self.array_buffer()?;
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidJson {
            url,
            reason: e.to_string(),
        })
    }

    fn blob(&mut self) -> Result<Blob> {
        let bytes = self.array_buffer()?;
        let content_type = blob_content_type(self.body_headers())?;
        Ok(Blob {
            bytes,
            content_type,
        })
    }

    fn text_converted(&mut self) -> Result<String> {
        Err(Error::Transport(TransportError {
            name: TransportErrorName::FetchError,
            message: "textConverted not implemented".to_string(),
            error_type: None,
            code: None,
        }))
    }
}

/// Fold every stored `content-type` value into one MIME type. A value
/// that repeats the previous essence without a charset inherits the
/// earlier charset.
fn blob_content_type(headers: &Headers) -> Result<String> {
    let Some(values) = headers.raw_values("content-type") else {
        return Ok(String::new());
    };

    let mut essence: Option<String> = None;
    let mut charset: Option<String> = None;
    let mut last: Option<MimeType> = None;
    for value in values {
        let mut mime: MimeType = value.parse()?;
        if essence.as_deref() != Some(mime.essence().as_str()) {
            charset = mime.parameters().get("charset").map(str::to_string);
            essence = Some(mime.essence());
        } else if !mime.parameters().has("charset") {
            if let Some(charset) = &charset {
                mime.parameters_mut().set("charset", charset.clone())?;
            }
        }
        last = Some(mime);
    }
    Ok(last.map(|m| m.to_string()).unwrap_or_default())
}
