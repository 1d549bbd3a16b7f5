use async_trait::async_trait;
use tracing::debug;

use super::client::HttpClient;
use super::fetch_bytes;
use crate::error::Result;

const FEED_BASE_URL: &str = "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2F";

/// Fetches raw GTFS-realtime bytes covering one station.
///
/// The feeds are not queryable by route or station; `station_id` is recorded
/// on the fetch span and lets implementations pick a feed.
#[async_trait]
pub trait TrainSource: Send + Sync {
    async fn fetch_train(&self, station_id: &str) -> Result<Vec<u8>>;
}

/// [`TrainSource`] reading a single NYCT GTFS-realtime feed URL.
pub struct SubwayFeedClient<C> {
    client: C,
    feed_url: String,
}

impl<C: HttpClient> SubwayFeedClient<C> {
    pub fn new(client: C, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> TrainSource for SubwayFeedClient<C> {
    #[tracing::instrument(
        skip_all,
        fields(source = "train", station = station_id, feed = %self.feed_url)
    )]
    async fn fetch_train(&self, station_id: &str) -> Result<Vec<u8>> {
        let bytes = fetch_bytes(&self.client, &self.feed_url).await?;
        debug!(bytes = bytes.len(), "Train feed received");
        Ok(bytes)
    }
}

/// Returns the NYCT feed that carries `route`, if the route is known.
///
/// Express variants (`6X`, `7X`, `FX`) share their base route's feed.
pub fn feed_url_for_route(route: &str) -> Option<String> {
    let group = match route {
        "SI" | "SIR" => "gtfs-si",
        "GS" => "gtfs",
        "FS" | "H" => "gtfs-ace",
        _ => match route.chars().next()? {
            '1'..='7' | 'S' => "gtfs",
            'A' | 'C' | 'E' => "gtfs-ace",
            'B' | 'D' | 'F' | 'M' => "gtfs-bdfm",
            'G' => "gtfs-g",
            'J' | 'Z' => "gtfs-jz",
            'N' | 'Q' | 'R' | 'W' => "gtfs-nqrw",
            'L' => "gtfs-l",
            _ => return None,
        },
    };
    Some(format!("{FEED_BASE_URL}{group}"))
}
