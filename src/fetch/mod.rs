mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::{Context, Result};
use reqwest::StatusCode;

/// GETs `url` and decodes the body as JSON.
///
/// Returns `Ok(None)` for a 404 so callers can tell a missing document from
/// a failed request.
pub async fn fetch_json<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Option<serde_json::Value>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid URL '{url}'"))?,
    );

    let resp = client.execute(req).await?;
    let status = resp.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("GET {} returned status {}: {}", url, status, body));
    }

    Ok(Some(resp.json().await?))
}
