//! HTTP transport for the two upstream sources.
//!
//! [`BusSource`] and [`TrainSource`] are the seams the aggregator depends on;
//! [`BusTimeClient`] and [`SubwayFeedClient`] implement them on top of any
//! [`HttpClient`], so authentication is layered in with the [`auth`] wrappers.

mod basic;
mod bus;
mod client;
mod subway;
pub mod auth;

pub use basic::BasicClient;
pub use bus::{BUS_TIME_URL, BusSource, BusTimeClient};
pub use client::HttpClient;
pub use subway::{SubwayFeedClient, TrainSource, feed_url_for_route};

use crate::error::{ArrivalError, Result};

/// Performs a GET against `url` and returns the body bytes.
///
/// Non-success statuses are reported as [`ArrivalError::Transport`].
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let url = reqwest::Url::parse(url)
        .map_err(|e| ArrivalError::config(format!("invalid URL '{url}': {e}")))?;
    fetch_url(client, url).await
}

pub(crate) async fn fetch_url<C: HttpClient>(client: &C, url: reqwest::Url) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}
