//! Minimal HTTP(S)/file:// fetcher used for metadata-only queries. This is
//! not a full pull implementation; it loads single URIs.

use std::time::Duration;

use fn_error_context::context;
use tracing::trace;

use crate::error::{Result, StoreError};

const USER_AGENT: &str = "ostree ";
const TIMEOUT: Duration = Duration::from_secs(60);
const DEBUG_HTTP_ENV: &str = "OSTREE_DEBUG_HTTP";
/// Matches the original's `soup_logger_new(SOUP_LOGGER_LOG_BODY, 500)`: only
/// the first 500 bytes of a logged body are kept.
const DEBUG_BODY_LIMIT: usize = 500;

/// Build the blocking HTTP client used for all remote fetches. Honors
/// `http_proxy` if set and parseable; an unparseable value is logged and
/// ignored rather than treated as fatal.
pub fn build_client() -> Result<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(TIMEOUT)
        .connect_timeout(TIMEOUT);

    if let Ok(proxy) = std::env::var("http_proxy") {
        match reqwest::Proxy::http(&proxy) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!("ignoring unparseable http_proxy {proxy:?}: {e}"),
        }
    }

    builder.build().map_err(StoreError::from)
}

fn http_debug_enabled() -> bool {
    std::env::var_os(DEBUG_HTTP_ENV).is_some()
}

/// Load the bytes at `uri`. Supports `file://`, `http://`, and `https://`.
#[context("Loading {uri}")]
pub fn load_uri(client: &reqwest::blocking::Client, uri: &str) -> Result<Vec<u8>> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(std::fs::read(path)?);
    }

    if uri.starts_with("http://") || uri.starts_with("https://") {
        let resp = client.get(uri).send()?;
        let status = resp.status();
        let body = resp.bytes()?;
        if http_debug_enabled() {
            let truncated = &body[..body.len().min(DEBUG_BODY_LIMIT)];
            trace!(
                "GET {uri} -> {status}\n{}",
                String::from_utf8_lossy(truncated)
            );
        }
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Err(StoreError::NotFound(format!("{uri} returned {status}")));
        }
        if !status.is_success() {
            return Err(StoreError::Failed(format!("{uri} returned {status}")));
        }
        return Ok(body.to_vec());
    }

    Err(StoreError::Failed(format!("unsupported scheme in {uri}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_scheme_reads_local_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("data");
        std::fs::write(&path, b"hello").unwrap();
        let client = build_client().unwrap();
        let uri = format!("file://{}", path.display());
        let bytes = load_uri(&client, &uri).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_unsupported_scheme_is_failed() {
        let client = build_client().unwrap();
        let err = load_uri(&client, "ftp://example.com/x").unwrap_err();
        assert!(matches!(err, StoreError::Failed(_)));
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
