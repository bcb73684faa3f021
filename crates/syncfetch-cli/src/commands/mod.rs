pub mod get;
pub mod get_all;
pub mod request;

use std::path::Path;

use syncfetch::BridgeConfig;

/// Config file (or defaults), then `SYNCFETCH_*` variables, then flags.
pub fn load_config(
    path: Option<&Path>,
    timeout: Option<&str>,
    worker: Option<&Path>,
) -> anyhow::Result<BridgeConfig> {
    let base = match path {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    let mut config = base.with_overrides(|key| std::env::var(key).ok())?;
    if let Some(timeout) = timeout {
        config.worker.timeout = timeout.to_string();
    }
    if let Some(worker) = worker {
        config.worker.program = Some(worker.to_path_buf());
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncfetch.toml");
        std::fs::write(&path, "[worker]\ntimeout = \"5s\"\n[batch]\nconcurrency = 2\n").unwrap();

        let config = load_config(Some(&path), Some("750ms"), Some(Path::new("/opt/worker")))
            .unwrap();
        assert_eq!(config.timeout().unwrap(), Duration::from_millis(750));
        assert_eq!(config.batch.concurrency, 2);
        assert_eq!(config.worker_program(), Path::new("/opt/worker"));
    }

    #[test]
    fn bad_timeout_flag_is_rejected() {
        assert!(load_config(None, Some("whenever"), None).is_err());
    }
}
