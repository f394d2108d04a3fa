//! HTTP fetching behind the [`HttpClient`] seam.

mod basic;
mod client;
mod headers;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use headers::WithHeader;

use anyhow::Result;
use tracing::debug;

pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    let bytes = resp.bytes().await?.to_vec();
    debug!(url, bytes = bytes.len(), "Fetched");
    Ok(bytes)
}

pub async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<String> {
    let bytes = fetch_bytes(client, url).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
