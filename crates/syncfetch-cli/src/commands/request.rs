use std::io::Write;

use anyhow::{Context, bail};
use syncfetch::{Bridge, BodyInit, ConsumeBody, HeadersInit, RequestInit};
use tracing::info;

pub fn request(
    bridge: &Bridge,
    url: &str,
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> anyhow::Result<()> {
    let init = RequestInit {
        method: Some(method.to_string()),
        headers: Some(parse_headers(headers)?),
        body: data.map(BodyInit::Text),
        ..Default::default()
    };

    info!("{method} {url}");
    let mut response = bridge
        .fetch_url(url, init)
        .with_context(|| format!("request to {url} failed"))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "HTTP {} {}", response.status(), response.status_text())?;
    for (name, value) in response.headers() {
        writeln!(stdout, "{name}: {value}")?;
    }
    writeln!(stdout)?;
    stdout.write_all(&response.array_buffer()?)?;
    stdout.flush()?;
    Ok(())
}

/// Parse `Name: value` flags into header pairs.
fn parse_headers(raw: &[String]) -> anyhow::Result<HeadersInit> {
    let mut pairs = Vec::with_capacity(raw.len());
    for header in raw {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header {header:?}, expected 'Name: value'");
        };
        pairs.push(vec![name.trim().to_string(), value.trim().to_string()]);
    }
    Ok(HeadersInit::Pairs(pairs))
}
