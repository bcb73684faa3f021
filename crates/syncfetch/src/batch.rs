//! Batch fetching: many URLs, successes only, input order preserved.

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::Result;

/// Run `fetch` for every URL with at most `concurrency` in flight.
///
/// Results come back in input order. A URL whose fetch fails is logged
/// and omitted, so the output is always an ordered subsequence of the
/// input.
pub async fn fetch_all<I, F, Fut>(
    urls: I,
    concurrency: usize,
    fetch: F,
) -> Vec<(String, Vec<u8>)>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let fetch = &fetch;
    let results: Vec<(String, Vec<u8>)> = stream::iter(urls)
        .map(|url| async move {
            let result = fetch(url.clone()).await;
            (url, result)
        })
        .buffered(concurrency.max(1))
        .filter_map(|(url, result)| async move {
            match result {
                Ok(bytes) => {
                    debug!(url = %url, bytes = bytes.len(), "fetched");
                    Some((url, bytes))
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "omitting failed fetch");
                    None
                }
            }
        })
        .collect()
        .await;
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TransportError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn fake_fetch(url: String) -> Result<Vec<u8>> {
        if url.contains("fail") {
            return Err(Error::Transport(TransportError::fetch_error("HTTP 500", "http")));
        }
        Ok(url.into_bytes())
    }

    #[tokio::test]
    async fn failures_are_omitted_in_order() {
        let out = fetch_all(urls(&["ok-url", "failing-url", "ok-url-2"]), 4, fake_fetch).await;
        assert_eq!(
            out,
            vec![
                ("ok-url".to_string(), b"ok-url".to_vec()),
                ("ok-url-2".to_string(), b"ok-url-2".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn order_survives_out_of_order_completion() {
        // Earlier URLs finish last.
        let out = fetch_all(urls(&["a", "b", "c", "d"]), 4, |url| async move {
            let delay = match url.as_str() {
                "a" => 40,
                "b" => 30,
                "c" => 20,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(url.into_bytes())
        })
        .await;
        let names: Vec<_> = out.into_iter().map(|(url, _)| url).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn duplicates_are_kept() {
        let out = fetch_all(urls(&["x", "x", "fail", "x"]), 2, fake_fetch).await;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|(url, _)| url == "x"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let out = fetch_all(urls(&["1", "2", "3", "4", "5", "6"]), 2, |url| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(url.into_bytes())
            }
        })
        .await;
        assert_eq!(out.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs() {
        let out = fetch_all(urls(&["only"]), 0, fake_fetch).await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn empty_input_gives_empty_output() {
        let out = fetch_all(Vec::new(), 4, fake_fetch).await;
        assert!(out.is_empty());
    }
}
