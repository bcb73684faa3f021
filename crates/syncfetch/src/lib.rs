//! Blocking fetch over an out-of-process HTTP worker.
//!
//! Provides fetch-style [`Request`] and [`Response`] types with
//! case-insensitive [`Headers`], a WHATWG [`MimeType`] parser, and
//! single-use buffered bodies, plus a [`Bridge`] that performs the actual
//! network request in a short-lived worker process and blocks the calling
//! thread until it answers.
//!
//! # Process Model
//!
//! Every bridge call spawns one worker, writes one JSON record (or a bare
//! URL) to its stdin, and reads exactly one JSON document from its stdout.
//! The wire records are defined in [`protocol`]. Calls are independent:
//! the only shared state is the read-only [`BridgeConfig`].
//!
//! # Errors
//!
//! All fallible operations return [`Error`]. [`Error::kind`] sorts them
//! into validation, body-consumed, parse, protocol, transport, and config
//! failures. A non-2xx status is not an error; it is a [`Response`] with
//! [`Response::ok`] false.
//!
//! # Batches
//!
//! [`Bridge::fetch_all`] fetches many URLs with bounded concurrency and
//! returns only the successes, in input order.

pub mod batch;
mod body;
mod bridge;
pub mod config;
mod error;
mod header;
pub mod mime;
pub mod protocol;
mod request;
mod response;

pub use body::{Blob, Body, BodyInit, ConsumeBody};
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{Error, ErrorKind, Result, TransportError, TransportErrorName};
pub use header::{Headers, HeadersInit};
pub use mime::{MimeParameters, MimeType};
pub use request::{Request, RequestInit};
pub use response::{Response, ResponseInit, ResponseType};
