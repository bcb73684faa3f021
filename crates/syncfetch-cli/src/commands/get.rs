use std::io::Write;
use std::path::Path;

use syncfetch::Bridge;
use tracing::info;

pub fn get(bridge: &Bridge, url: &str, output: Option<&Path>) -> anyhow::Result<()> {
    info!("Fetching {url} via {}", bridge.program().display());
    let bytes = match bridge.fetch_one(url) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Fetch failed: {e}");
            return Err(e.into());
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            eprintln!("✓ {} bytes → {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
