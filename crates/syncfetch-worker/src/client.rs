//! A small HTTP/1.1 client on hyper.
//!
//! One connection per request (`connection: close`), TLS through rustls,
//! redirect following, gzip/deflate decoding, and optional size and time
//! limits. Failures come back as [`TransportError`]s shaped the way the
//! bridge reconstructs them.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use syncfetch::protocol::TransportResponse;
use syncfetch::{ConsumeBody, Headers, Request, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;
use url::{Host, Position, Url};

use crate::tls::TlsConfig;

/// Redirects followed when the request does not say.
pub const DEFAULT_FOLLOW: u32 = 20;

/// A completed fetch with its body fully read and decoded.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    /// Final URL after redirects.
    pub url: String,
    pub redirected: bool,
    pub body: Bytes,
}

impl FetchedResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_record(self) -> TransportResponse {
        TransportResponse::success(
            self.status,
            self.status_text,
            &self.headers,
            self.url,
            self.redirected,
            &self.body,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    tls: TlsConfig,
    user_agent: String,
}

impl Client {
    /// A client trusting the webpki root set.
    pub fn new() -> Result<Self, String> {
        Ok(Self::with_tls(TlsConfig::with_webpki_roots()?))
    }

    pub fn with_tls(tls: TlsConfig) -> Self {
        Self {
            tls,
            user_agent: format!("syncfetch-worker/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Perform `request`, honoring its redirect, compression, size and
    /// timeout options.
    pub async fn fetch(&self, request: &Request) -> Result<FetchedResponse, TransportError> {
        match request.timeout_ms().filter(|ms| *ms > 0) {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), self.fetch_inner(request))
                .await
                .map_err(|_| {
                    TransportError::fetch_error(
                        format!("network timeout at: {}", request.url()),
                        "request-timeout",
                    )
                })?,
            None => self.fetch_inner(request).await,
        }
    }

    async fn fetch_inner(&self, request: &Request) -> Result<FetchedResponse, TransportError> {
        let mut url = Url::parse(request.url())
            .map_err(|e| TransportError::type_error(format!("Invalid URL: {e}")))?;
        let mut method = Method::from_bytes(request.method().as_bytes()).map_err(|_| {
            TransportError::type_error(format!("Invalid method: {}", request.method()))
        })?;
        let mut headers = request.headers().clone();
        let mut body = request.body().cloned();
        let follow = request.follow().unwrap_or(DEFAULT_FOLLOW);
        let compress = request.compress().unwrap_or(true);
        let max_size = request.max_size_bytes().filter(|n| *n > 0);
        let mut redirects = 0u32;

        loop {
            let response = self
                .send(&method, &url, &headers, body.clone(), compress)
                .await?;
            let status = response.status();
            let location = response
                .headers()
                .get(header::LOCATION)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

            if let (true, Some(location)) = (is_redirect(status), location) {
                match request.redirect() {
                    "error" => {
                        return Err(TransportError::fetch_error(
                            format!(
                                "uri requested responds with a redirect, redirect mode is set to error: {url}"
                            ),
                            "no-redirect",
                        ));
                    }
                    "manual" => {}
                    _ => {
                        if redirects >= follow {
                            return Err(TransportError::fetch_error(
                                format!("maximum redirect reached at: {url}"),
                                "max-redirect",
                            ));
                        }
                        let next = url.join(&location).map_err(|_| {
                            TransportError::fetch_error(
                                format!(
                                    "uri requested responds with an invalid redirect URL: {location}"
                                ),
                                "invalid-redirect",
                            )
                        })?;
                        if status == StatusCode::SEE_OTHER
                            || (matches!(status.as_u16(), 301 | 302) && method == Method::POST)
                        {
                            method = Method::GET;
                            body = None;
                            let _ = headers.delete("content-length");
                        }
                        strip_cross_host_credentials(&mut headers, &url, &next);
                        debug!(from = %url, to = %next, status = status.as_u16(), "following redirect");
                        redirects += 1;
                        url = next;
                        continue;
                    }
                }
            }

            return read_response(response, &url, redirects > 0, compress, max_size).await;
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &Headers,
        body: Option<Bytes>,
        compress: bool,
    ) -> Result<http::Response<Incoming>, TransportError> {
        let https = match url.scheme() {
            "http" => false,
            "https" => true,
            _ => {
                return Err(TransportError::type_error(
                    "Only HTTP(S) protocols are supported",
                ));
            }
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(TransportError::type_error(format!("Invalid URL: {url}"))),
        };
        let host_str = url.host_str().unwrap_or_default();
        let port = url
            .port_or_known_default()
            .unwrap_or(if https { 443 } else { 80 });
        let authority = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };

        let request = build_request(
            method,
            &url[Position::BeforePath..Position::AfterQuery],
            &authority,
            headers,
            body,
            compress,
            &self.user_agent,
        )?;

        let address = format!("{host_str}:{port}");
        let tcp = TcpStream::connect(&address)
            .await
            .map_err(|e| system_error(url, &e))?;
        let _ = tcp.set_nodelay(true);
        debug!(%address, https, method = %method, "connected");

        if https {
            let server_name = rustls::pki_types::ServerName::try_from(host.as_str())
                .map_err(|e| {
                    TransportError::type_error(format!("invalid tls server name '{host}': {e}"))
                })?
                .to_owned();
            let connector = tokio_rustls::TlsConnector::from(self.tls.client_config.clone());
            let stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| system_error(url, &e))?;
            send_over(stream, request, url).await
        } else {
            send_over(tcp, request, url).await
        }
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Credentials are not forwarded to a different host.
fn strip_cross_host_credentials(headers: &mut Headers, from: &Url, to: &Url) {
    if from.host_str() != to.host_str() {
        for name in ["authorization", "www-authenticate", "cookie", "cookie2"] {
            let _ = headers.delete(name);
        }
    }
}

fn has(headers: &Headers, name: &str) -> bool {
    headers.has(name).unwrap_or(false)
}

/// Header values are stored as code points up to U+00FF; send them as
/// the corresponding single bytes.
fn latin1_value(value: &str) -> Result<HeaderValue, TransportError> {
    let bytes: Vec<u8> = value.chars().map(|c| c as u32 as u8).collect();
    HeaderValue::from_bytes(&bytes)
        .map_err(|e| TransportError::type_error(format!("invalid header value {value:?}: {e}")))
}

fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn build_request(
    method: &Method,
    target: &str,
    authority: &str,
    headers: &Headers,
    body: Option<Bytes>,
    compress: bool,
    user_agent: &str,
) -> Result<http::Request<Full<Bytes>>, TransportError> {
    let mut builder = http::Request::builder()
        .method(method.clone())
        .uri(target)
        .header(header::HOST, authority);

    for (name, value) in headers {
        if name == "host" || name == "content-length" || name == "connection" {
            continue;
        }
        builder = builder.header(name, latin1_value(&value)?);
    }
    if !has(headers, "accept") {
        builder = builder.header(header::ACCEPT, "*/*");
    }
    if !has(headers, "user-agent") {
        builder = builder.header(header::USER_AGENT, user_agent);
    }
    if compress && !has(headers, "accept-encoding") {
        builder = builder.header(header::ACCEPT_ENCODING, "gzip, deflate");
    }

    let needs_length = body.is_some() || *method == Method::POST || *method == Method::PUT;
    let body = body.unwrap_or_default();
    if needs_length {
        builder = builder.header(header::CONTENT_LENGTH, body.len());
    }
    builder = builder.header(header::CONNECTION, "close");

    builder
        .body(Full::new(body))
        .map_err(|e| TransportError::type_error(format!("Invalid request: {e}")))
}

async fn send_over<T>(
    io: T,
    request: http::Request<Full<Bytes>>,
    url: &Url,
) -> Result<http::Response<Incoming>, TransportError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| hyper_error(url, &e))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "connection closed with error");
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| hyper_error(url, &e))
}

async fn read_response(
    response: http::Response<Incoming>,
    url: &Url,
    redirected: bool,
    compress: bool,
    max_size: Option<u64>,
) -> Result<FetchedResponse, TransportError> {
    let (parts, mut incoming) = response.into_parts();

    let status_text = parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| parts.status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        if let Err(e) = headers.append(name.as_str(), &latin1_string(value.as_bytes())) {
            debug!(header = %name, error = %e, "dropping unrepresentable response header");
        }
    }

    let body_error = |e: String| {
        TransportError::fetch_error(
            format!("Invalid response body while trying to fetch {url}: {e}"),
            "system",
        )
    };
    let over_limit = |limit: u64| {
        TransportError::fetch_error(
            format!("content size at {url} over limit: {limit}"),
            "max-size",
        )
    };

    let mut raw = Vec::new();
    while let Some(frame) = incoming.frame().await {
        let frame = frame.map_err(|e| body_error(e.to_string()))?;
        if let Ok(data) = frame.into_data() {
            if let Some(limit) = max_size {
                if (raw.len() + data.len()) as u64 > limit {
                    return Err(over_limit(limit));
                }
            }
            raw.extend_from_slice(&data);
        }
    }

    let encoding = parts
        .headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase());
    let body = match encoding.as_deref() {
        _ if !compress || raw.is_empty() => raw,
        Some("gzip") | Some("x-gzip") => decompress_gzip(&raw, max_size).map_err(body_error)?,
        Some("deflate") | Some("x-deflate") => {
            decompress_deflate(&raw, max_size).map_err(body_error)?
        }
        _ => raw,
    };
    // The decoded size is what the limit bounds.
    if let Some(limit) = max_size {
        if body.len() as u64 > limit {
            return Err(over_limit(limit));
        }
    }

    debug!(
        url = %url,
        status = parts.status.as_u16(),
        bytes = body.len(),
        "response read"
    );
    Ok(FetchedResponse {
        status: parts.status.as_u16(),
        status_text,
        headers,
        url: url.to_string(),
        redirected,
        body: Bytes::from(body),
    })
}

/// Read a decoder to the end, stopping one byte past `limit` so an
/// oversized body is detectable without inflating all of it.
fn read_limited<R: Read>(mut reader: R, limit: Option<u64>) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match limit {
        Some(limit) => reader.take(limit.saturating_add(1)).read_to_end(&mut out)?,
        None => reader.read_to_end(&mut out)?,
    };
    Ok(out)
}

fn decompress_gzip(input: &[u8], limit: Option<u64>) -> Result<Vec<u8>, String> {
    read_limited(flate2::read::GzDecoder::new(input), limit)
        .map_err(|error| format!("gzip decode failed: {error}"))
}

/// `deflate` is zlib-wrapped per the RFC, but some servers send raw
/// deflate streams.
fn decompress_deflate(input: &[u8], limit: Option<u64>) -> Result<Vec<u8>, String> {
    if let Ok(out) = read_limited(flate2::read::ZlibDecoder::new(input), limit) {
        return Ok(out);
    }
    read_limited(flate2::read::DeflateDecoder::new(input), limit)
        .map_err(|error| format!("deflate decode failed: {error}"))
}

fn system_error(url: &Url, e: &std::io::Error) -> TransportError {
    use std::io::ErrorKind;

    let err = TransportError::fetch_error(
        format!("request to {url} failed, reason: {e}"),
        "system",
    );
    let code = match e.kind() {
        ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => Some("ECONNRESET"),
        ErrorKind::TimedOut => Some("ETIMEDOUT"),
        ErrorKind::AddrNotAvailable => Some("EADDRNOTAVAIL"),
        _ if e.to_string().contains("lookup address") => Some("ENOTFOUND"),
        _ => None,
    };
    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

fn hyper_error(url: &Url, e: &hyper::Error) -> TransportError {
    let err = TransportError::fetch_error(
        format!("request to {url} failed, reason: {e}"),
        "system",
    );
    if e.is_incomplete_message() || e.is_closed() {
        err.with_code("ECONNRESET")
    } else {
        err
    }
}
