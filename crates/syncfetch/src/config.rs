//! Bridge configuration: `syncfetch.toml` plus environment overrides.
//!
//! ```toml
//! [worker]
//! program = "/usr/local/bin/syncfetch-worker"
//! args = []
//! timeout = "30s"
//!
//! [batch]
//! concurrency = 4
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Overrides the worker executable path.
pub const ENV_WORKER: &str = "SYNCFETCH_WORKER";
/// Overrides the worker timeout, e.g. `"10s"` or `"500ms"`.
pub const ENV_TIMEOUT: &str = "SYNCFETCH_TIMEOUT";
/// Overrides the batch concurrency.
pub const ENV_CONCURRENCY: &str = "SYNCFETCH_CONCURRENCY";

/// Name of the worker binary looked up when no program is configured.
pub const WORKER_BINARY: &str = "syncfetch-worker";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub worker: WorkerConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker executable. Discovered next to the current executable when unset.
    pub program: Option<PathBuf>,
    /// Extra arguments passed before any request data.
    pub args: Vec<String>,
    pub timeout: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout: "30s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum worker processes in flight during a batch. `0` runs one at
    /// a time.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl BridgeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults with the `SYNCFETCH_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps an environment variable
    /// name to its value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(program) = lookup(ENV_WORKER).filter(|v| !v.is_empty()) {
            self.worker.program = Some(PathBuf::from(program));
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT).filter(|v| !v.is_empty()) {
            self.worker.timeout = timeout;
        }
        if let Some(concurrency) = lookup(ENV_CONCURRENCY).filter(|v| !v.is_empty()) {
            self.batch.concurrency = concurrency.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_CONCURRENCY} must be a non-negative integer"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout()?.is_zero() {
            return Err(Error::Config("worker timeout must be greater than zero".into()));
        }
        Ok(())
    }

    /// The parsed worker timeout.
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.worker.timeout).ok_or_else(|| {
            Error::Config(format!("invalid worker timeout {:?}", self.worker.timeout))
        })
    }

    /// The configured worker program, or the discovered default.
    pub fn worker_program(&self) -> PathBuf {
        self.worker
            .program
            .clone()
            .unwrap_or_else(|| default_worker_path().to_path_buf())
    }
}

/// Parse `"500ms"`, `"30s"`, `"2m"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Where the worker binary is expected: beside the current executable,
/// one level up (test binaries live in `target/<profile>/deps`), or on
/// `PATH`. Resolved once per process.
pub fn default_worker_path() -> &'static Path {
    static WORKER_PATH: OnceLock<PathBuf> = OnceLock::new();
    WORKER_PATH.get_or_init(|| {
        let name = format!("{WORKER_BINARY}{}", std::env::consts::EXE_SUFFIX);
        if let Ok(exe) = std::env::current_exe() {
            let mut dir = exe.parent();
            for _ in 0..2 {
                let Some(d) = dir else { break };
                let candidate = d.join(&name);
                if candidate.is_file() {
                    return candidate;
                }
                dir = d.parent();
            }
        }
        PathBuf::from(name)
    })
}
