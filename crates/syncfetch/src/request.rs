use url::Url;

use crate::body::{Body, BodyInit, ConsumeBody};
use crate::error::{Error, Result};
use crate::header::{Headers, HeadersInit};
use crate::mime::is_token;

/// Options for building a [`Request`]. Unset fields fall back to the
/// source request (see [`Request::from_request`]) and then to the fetch
/// defaults.
#[derive(Debug, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: Option<HeadersInit>,
    pub body: Option<BodyInit>,
    pub cache: Option<String>,
    pub credentials: Option<String>,
    pub destination: Option<String>,
    pub integrity: Option<String>,
    pub keepalive: Option<bool>,
    pub mode: Option<String>,
    pub redirect: Option<String>,
    pub referrer: Option<String>,
    pub referrer_policy: Option<String>,
    /// Maximum redirects to follow.
    pub follow: Option<u32>,
    pub timeout_ms: Option<u64>,
    /// Request and decode compressed bodies.
    pub compress: Option<bool>,
    pub max_size_bytes: Option<u64>,
}

/// An outgoing fetch request.
///
/// Immutable once built; [`try_clone`](Request::try_clone) produces an
/// independent copy with a fresh, unread body over the same bytes.
#[derive(Debug)]
pub struct Request {
    url: String,
    method: String,
    headers: Headers,
    body: Body,
    cache: String,
    credentials: String,
    destination: String,
    integrity: String,
    keepalive: bool,
    mode: String,
    redirect: String,
    referrer: String,
    referrer_policy: String,
    follow: Option<u32>,
    timeout_ms: Option<u64>,
    compress: Option<bool>,
    max_size_bytes: Option<u64>,
}

fn normalize_method(method: &str) -> Result<String> {
    if method.is_empty() || !is_token(method) {
        return Err(Error::InvalidMethod(method.to_string()));
    }
    let upper = method.to_ascii_uppercase();
    match upper.as_str() {
        "CONNECT" | "TRACE" | "TRACK" => Err(Error::ForbiddenMethod(method.to_string())),
        "DELETE" | "GET" | "HEAD" | "OPTIONS" | "POST" | "PUT" => Ok(upper),
        _ => Ok(method.to_string()),
    }
}

fn pick(value: Option<String>, inherited: Option<&String>, default: &str) -> String {
    value
        .or_else(|| inherited.cloned())
        .unwrap_or_else(|| default.to_string())
}

fn parse_url(input: &str) -> Result<String> {
    Url::parse(input)
        .map(|url| url.to_string())
        .map_err(|e| Error::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })
}

impl Request {
    pub fn new(url: &str, init: RequestInit) -> Result<Self> {
        Self::build(url, None, init)
    }

    /// A request for `url` with every option at its default.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(url, RequestInit::default())
    }

    /// Build a request from `source`, with `init` overriding its options.
    /// The source body is carried over when `init` supplies none.
    pub fn from_request(source: &Request, init: RequestInit) -> Result<Self> {
        Self::build(&source.url, Some(source), init)
    }

    fn build(url: &str, base: Option<&Request>, init: RequestInit) -> Result<Self> {
        let url = parse_url(url)?;

        let mut headers = match init.headers {
            Some(headers) => Headers::from_init(headers)?,
            None => base.map(|b| b.headers.clone()).unwrap_or_default(),
        };

        let body = match init.body {
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
            None => base.and_then(|b| b.body.bytes().cloned()),
        };

        let method = match init.method {
            Some(method) => normalize_method(&method)?,
            None => base.map_or_else(|| "GET".to_string(), |b| b.method.clone()),
        };
        if body.is_some() && (method == "GET" || method == "HEAD") {
            return Err(Error::BodyNotAllowed(method));
        }

        Ok(Self {
            url,
            method,
            headers,
            body: Body::new(body),
            cache: pick(init.cache, base.map(|b| &b.cache), "default"),
            credentials: pick(init.credentials, base.map(|b| &b.credentials), "same-origin"),
            destination: pick(init.destination, base.map(|b| &b.destination), ""),
            integrity: pick(init.integrity, base.map(|b| &b.integrity), ""),
            keepalive: init
                .keepalive
                .or(base.map(|b| b.keepalive))
                .unwrap_or(false),
            mode: pick(init.mode, base.map(|b| &b.mode), "cors"),
            redirect: pick(init.redirect, base.map(|b| &b.redirect), "follow"),
            referrer: pick(init.referrer, base.map(|b| &b.referrer), "about:client"),
            referrer_policy: pick(init.referrer_policy, base.map(|b| &b.referrer_policy), ""),
            follow: init.follow.or(base.and_then(|b| b.follow)),
            timeout_ms: init.timeout_ms.or(base.and_then(|b| b.timeout_ms)),
            compress: init.compress.or(base.and_then(|b| b.compress)),
            max_size_bytes: init.max_size_bytes.or(base.and_then(|b| b.max_size_bytes)),
        })
    }

    /// An independent copy. Fails if the body was already consumed.
    pub fn try_clone(&self) -> Result<Self> {
        self.body.check(&self.url)?;
        Self::from_request(self, RequestInit::default())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn cache(&self) -> &str {
        &self.cache
    }

    pub fn credentials(&self) -> &str {
        &self.credentials
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn integrity(&self) -> &str {
        &self.integrity
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn redirect(&self) -> &str {
        &self.redirect
    }

    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    pub fn referrer_policy(&self) -> &str {
        &self.referrer_policy
    }

    pub fn follow(&self) -> Option<u32> {
        self.follow
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    pub fn compress(&self) -> Option<bool> {
        self.compress
    }

    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_size_bytes
    }
}

impl ConsumeBody for Request {
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
