use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyInit, ConsumeBody};
use crate::error::{Error, Result};
use crate::header::{Headers, HeadersInit};

/// The fetch response type tag, carried through from the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Basic,
    Cors,
    #[default]
    Default,
    Error,
    Opaque,
    Opaqueredirect,
}

/// Options for building a [`Response`] directly.
#[derive(Debug, Default)]
pub struct ResponseInit {
    /// Defaults to 200.
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Option<HeadersInit>,
    pub url: Option<String>,
}

/// A fetch response with a fully buffered, single-use body.
///
/// Built by the protocol decoder (or directly, for tests and local
/// synthesis) and never mutated afterward; only the body's `used` flag
/// changes as it is consumed.
#[derive(Debug)]
pub struct Response {
    status: u16,
    status_text: String,
    headers: Headers,
    url: String,
    redirected: bool,
    response_type: ResponseType,
    body: Body,
}

impl Response {
    /// Build a response. When a body is given and no `content-type`
    /// header was supplied, one is inferred from the body shape.
    pub fn new(body: Option<BodyInit>, init: ResponseInit) -> Result<Self> {
        let status = init.status.unwrap_or(200);
        if status > 599 {
            return Err(Error::InvalidStatus(status));
        }

        let mut headers = match init.headers {
            Some(headers) => Headers::from_init(headers)?,
            None => Headers::new(),
        };

        let bytes = match body {
            Some(body_init) => {
                let inferred = body_init.content_type();
                let bytes = body_init.into_bytes()?;
                if let Some(content_type) = inferred {
                    if !headers.has("content-type")? {
                        headers.append("content-type", content_type)?;
                    }
                }
                Some(bytes)
            }
            None => None,
        };

        Ok(Self {
            status,
            status_text: init.status_text.unwrap_or_default(),
            headers,
            url: init.url.unwrap_or_default(),
            redirected: false,
            response_type: ResponseType::Default,
            body: Body::new(bytes),
        })
    }

    /// Assemble a response from already-validated parts, as decoded from
    /// the wire. No content type is inferred.
    pub(crate) fn from_parts(
        status: u16,
        status_text: String,
        headers: Headers,
        url: String,
        redirected: bool,
        response_type: ResponseType,
        body: Body,
    ) -> Result<Self> {
        if status > 599 {
            return Err(Error::InvalidStatus(status));
        }
        Ok(Self {
            status,
            status_text,
            headers,
            url,
            redirected,
            response_type,
            body,
        })
    }

    /// An independent copy. Fails if the body was already consumed.
    pub fn try_clone(&self) -> Result<Self> {
        self.body.check(&self.url)?;
        Ok(Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            url: self.url.clone(),
            redirected: self.redirected,
            response_type: self.response_type,
            body: Body::new(self.body.bytes().cloned()),
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn redirected(&self) -> bool {
        self.redirected
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }
}

impl ConsumeBody for Response {
    fn body_state(&self) -> &Body {
        &self.body
    }

    fn body_state_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn body_url(&self) -> &str {
        &self.url
    }

    fn body_headers(&self) -> &Headers {
        &self.headers
    }
}
