use std::path::Path;

use syncfetch::Bridge;
use tracing::info;

pub fn get_all(bridge: &Bridge, urls: Vec<String>, out_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let requested = urls.len();
    info!(
        "Fetching {requested} URLs with concurrency {}",
        bridge.config().batch.concurrency
    );
    let results = bridge.fetch_all(urls);

    for (index, (url, bytes)) in results.iter().enumerate() {
        let path = out_dir.join(file_name(index, url));
        std::fs::write(&path, bytes)?;
        println!("{url} → {} ({} bytes)", path.display(), bytes.len());
    }
    eprintln!("✓ Fetched {} of {requested}", results.len());
    Ok(())
}

/// `<index>-<last path segment>`, reduced to filesystem-safe characters.
fn file_name(index: usize, url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("index");
    let safe: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{index:03}-{safe}")
}
