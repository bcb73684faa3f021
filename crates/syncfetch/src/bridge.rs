//! The blocking process bridge.
//!
//! Each call spawns one worker process, writes the request to its stdin,
//! closes stdin, and waits for the worker to exit under a wall-clock
//! timeout. The worker's entire stdout is the reply; its stderr is
//! re-logged at debug level. Exit status is not consulted.
//!
//! The blocking methods drive a private single-threaded tokio runtime and
//! hold the calling thread for the whole round trip. The `*_async`
//! methods do the same work on the caller's runtime.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, warn};

use crate::batch;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::protocol::{
    TransportResponse, WorkerReply, decode_reply, decode_response, encode_request,
};
use crate::request::{Request, RequestInit};
use crate::response::Response;

/// Runs fetches through short-lived worker processes.
pub struct Bridge {
    config: BridgeConfig,
    program: PathBuf,
    timeout: Duration,
    runtime: Runtime,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.timeout()?;
        let program = config.worker_program();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to build bridge runtime: {e}")))?;
        debug!(program = %program.display(), ?timeout, "bridge configured");
        Ok(Self {
            config,
            program,
            timeout,
            runtime,
        })
    }

    /// A bridge configured from defaults and `SYNCFETCH_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::new(BridgeConfig::from_env()?)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── Blocking surface ────────────────────────────────────────────

    /// Send raw bytes to a worker and return its raw stdout.
    pub fn execute_raw(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.block_on(self.run_worker(input))
    }

    /// Send a JSON record to a worker and decode its JSON reply.
    pub fn execute<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.block_on(self.execute_async(request))
    }

    /// Full fetch. Non-2xx statuses come back as ordinary responses;
    /// network failures are raised as transport errors.
    pub fn fetch(&self, request: &Request) -> Result<Response> {
        self.block_on(self.fetch_async(request))
    }

    pub fn fetch_url(&self, url: &str, init: RequestInit) -> Result<Response> {
        let request = Request::new(url, init)?;
        self.fetch(&request)
    }

    /// Body bytes of a 2xx GET. Any other outcome is raised.
    pub fn fetch_one(&self, url: &str) -> Result<Vec<u8>> {
        self.block_on(self.fetch_one_async(url))
    }

    /// Like [`fetch_one`](Bridge::fetch_one), but failures are logged and
    /// mapped to `None`.
    pub fn fetch_sync(&self, url: &str) -> Option<Vec<u8>> {
        match self.fetch_one(url) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(url = %url, error = %e, "fetch failed");
                None
            }
        }
    }

    /// Fetch every URL, keeping only successes, in input order.
    pub fn fetch_all<I, S>(&self, urls: I) -> Vec<(String, Vec<u8>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.block_on(async { Ok(self.fetch_all_async(urls).await) }) {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "batch fetch skipped");
                Vec::new()
            }
        }
    }

    fn block_on<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if Handle::try_current().is_ok() {
            return Err(Error::Protocol(
                "blocking bridge called from inside an async runtime; use the async methods"
                    .into(),
            ));
        }
        self.runtime.block_on(future)
    }

    // ── Async surface ───────────────────────────────────────────────

    pub async fn execute_async<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let input = serde_json::to_vec(request)
            .map_err(|e| Error::Protocol(format!("failed to encode request: {e}")))?;
        let output = self.run_worker(&input).await?;
        parse_output(&output)
    }

    pub async fn fetch_async(&self, request: &Request) -> Result<Response> {
        let record: TransportResponse = self.execute_async(&encode_request(request)).await?;
        let response = decode_response(record)?;
        debug!(url = %request.url(), status = response.status(), "fetch complete");
        Ok(response)
    }

    pub async fn fetch_one_async(&self, url: &str) -> Result<Vec<u8>> {
        let output = self.run_worker(url.as_bytes()).await?;
        let reply: WorkerReply = parse_output(&output)?;
        decode_reply(reply)
    }

    pub async fn fetch_all_async<I, S>(&self, urls: I) -> Vec<(String, Vec<u8>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls = urls.into_iter().map(Into::into);
        batch::fetch_all(urls, self.config.batch.concurrency, |url| async move {
            self.fetch_one_async(&url).await
        })
        .await
    }

    // ── Worker process ──────────────────────────────────────────────

    async fn run_worker(&self, input: &[u8]) -> Result<Vec<u8>> {
        let started = Instant::now();
        let program = self.program.display().to_string();

        let mut child = Command::new(&self.program)
            .args(&self.config.worker.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.clone(),
                source,
            })?;
        debug!(program = %program, pid = ?child.id(), bytes = input.len(), "spawned worker");

        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                // A worker may exit without draining stdin; its stdout
                // still decides the outcome.
                if let Err(e) = stdin.write_all(input).await {
                    debug!(error = %e, "worker closed stdin early");
                }
            }
            child.wait_with_output().await
        };

        // Dropping the exchange on expiry drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                result.map_err(|e| Error::Protocol(format!("failed to read worker output: {e}")))?
            }
            Err(_) => {
                warn!(
                    program = %program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "worker timed out, killed"
                );
                return Err(Error::Timeout(self.timeout));
            }
        };

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(target: "syncfetch::worker", "{line}");
        }
        debug!(
            status = ?output.status,
            bytes = output.stdout.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "worker exited"
        );
        Ok(output.stdout)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("program", &self.program)
            .field("timeout", &self.timeout)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Decode the worker's stdout as one JSON document.
pub(crate) fn parse_output<T: DeserializeOwned>(stdout: &[u8]) -> Result<T> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Protocol("worker produced no output".into()));
    }
    serde_json::from_slice(stdout).map_err(|e| {
        let preview: String = String::from_utf8_lossy(stdout).chars().take(120).collect();
        Error::Protocol(format!("unexpected worker output {preview:?}: {e}"))
    })
}
