use async_trait::async_trait;
use tracing::debug;

use super::client::HttpClient;
use super::fetch_url;
use crate::error::{ArrivalError, Result};

/// SIRI stop-monitoring endpoint of MTA Bus Time.
pub const BUS_TIME_URL: &str = "https://bustime.mta.info/api/siri/stop-monitoring.json";

/// Agency prefix prepended to a bare route to form a SIRI `LineRef`.
const LINE_REF_PREFIX: &str = "MTA NYCT_";

/// Fetches raw stop-monitoring payloads for one bus stop.
#[async_trait]
pub trait BusSource: Send + Sync {
    async fn fetch_bus(&self, stop_id: &str, route_filter: Option<&str>) -> Result<Vec<u8>>;
}

/// [`BusSource`] backed by the MTA Bus Time SIRI API.
///
/// The API key is not handled here; wrap the client in
/// [`UrlParam`](super::auth::UrlParam) to attach it.
pub struct BusTimeClient<C> {
    client: C,
    base_url: String,
    max_stop_visits: usize,
}

impl<C: HttpClient> BusTimeClient<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            base_url: BUS_TIME_URL.to_string(),
            max_stop_visits: 10,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_stop_visits(mut self, max_stop_visits: usize) -> Self {
        self.max_stop_visits = max_stop_visits;
        self
    }

    fn line_ref(&self, route: &str) -> String {
        if route.contains('_') {
            route.to_string()
        } else {
            format!("{LINE_REF_PREFIX}{}", route.to_uppercase())
        }
    }

    fn request_url(&self, stop_id: &str, route_filter: Option<&str>) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ArrivalError::config(format!("invalid bus URL '{}': {e}", self.base_url)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("MonitoringRef", stop_id)
                .append_pair("MaximumStopVisits", &self.max_stop_visits.to_string());
            if let Some(route) = route_filter {
                query.append_pair("LineRef", &self.line_ref(route));
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl<C: HttpClient> BusSource for BusTimeClient<C> {
    #[tracing::instrument(skip(self), fields(source = "bus"))]
    async fn fetch_bus(&self, stop_id: &str, route_filter: Option<&str>) -> Result<Vec<u8>> {
        let url = self.request_url(stop_id, route_filter)?;
        let bytes = fetch_url(&self.client, url).await?;
        debug!(bytes = bytes.len(), "Bus payload received");
        Ok(bytes)
    }
}
