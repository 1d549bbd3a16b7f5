//! Runs the configured fetch → decode → normalize pipelines for one cycle.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::arrival::{ArrivalKind, ArrivalRecord};
use crate::config::{BusConfig, MonitorConfig, TrainConfig};
use crate::error::{ArrivalError, Result};
use crate::fetch::auth::{ApiKey, UrlParam};
use crate::fetch::{BasicClient, BusSource, BusTimeClient, SubwayFeedClient, TrainSource};
use crate::normalize::{normalize_bus, normalize_train};
use crate::parser::{parse_feed, parse_siri};

/// Arrivals for one source in one cycle, or the reason there are none.
pub type SourceResult = Result<Vec<ArrivalRecord>>;

/// Output of [`SourceAggregator::poll`]. `None` means the source is not
/// configured, which is different from a failed fetch.
#[derive(Debug)]
pub struct PollOutcome {
    pub bus: Option<SourceResult>,
    pub train: Option<SourceResult>,
}

struct BusPipeline {
    source: Box<dyn BusSource>,
    stop_id: String,
    route_filter: Option<String>,
    max_results: usize,
}

impl BusPipeline {
    async fn run(&self) -> SourceResult {
        let raw = self
            .source
            .fetch_bus(&self.stop_id, self.route_filter.as_deref())
            .await?;
        let fetched_at = Utc::now();
        let payload = parse_siri(&raw)?;
        normalize_bus(
            &payload,
            self.route_filter.as_deref(),
            self.max_results,
            fetched_at,
        )
    }
}

struct TrainPipeline {
    source: Box<dyn TrainSource>,
    station_id: String,
    route_filter: Option<String>,
    max_results: usize,
}

impl TrainPipeline {
    async fn run(&self) -> SourceResult {
        let raw = self.source.fetch_train(&self.station_id).await?;
        let fetched_at = Utc::now();
        let feed = parse_feed(&raw)?;
        normalize_train(
            &feed,
            &self.station_id,
            self.route_filter.as_deref(),
            self.max_results,
            fetched_at,
        )
    }
}

/// Holds zero, one or two source pipelines and polls them in isolation.
#[derive(Default)]
pub struct SourceAggregator {
    bus: Option<BusPipeline>,
    train: Option<TrainPipeline>,
}

impl SourceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds HTTP-backed pipelines for every source enabled in `config`.
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let http = || {
            BasicClient::with_timeout(config.http_timeout)
                .map_err(|e| ArrivalError::config(format!("failed to build HTTP client: {e}")))
        };

        let mut aggregator = Self::new();

        if let Some(bus) = &config.bus {
            let client = BusTimeClient::new(UrlParam::bus_time_key(http()?, bus.api_key.clone()))
                .with_base_url(bus.base_url.clone())
                .with_max_stop_visits(bus.max_results.max(10));
            aggregator = aggregator.with_bus(client, bus);
        }

        if let Some(train) = &config.train {
            aggregator = match &train.api_key {
                Some(key) => aggregator.with_train(
                    SubwayFeedClient::new(ApiKey::x_api_key(http()?, key)?, train.feed_url.clone()),
                    train,
                ),
                None => aggregator.with_train(
                    SubwayFeedClient::new(http()?, train.feed_url.clone()),
                    train,
                ),
            };
        }

        Ok(aggregator)
    }

    pub fn with_bus(mut self, source: impl BusSource + 'static, config: &BusConfig) -> Self {
        self.bus = Some(BusPipeline {
            source: Box::new(source),
            stop_id: config.stop_id.clone(),
            route_filter: config.route_filter.clone(),
            max_results: config.max_results,
        });
        self
    }

    pub fn with_train(mut self, source: impl TrainSource + 'static, config: &TrainConfig) -> Self {
        self.train = Some(TrainPipeline {
            source: Box::new(source),
            station_id: config.station_id.clone(),
            route_filter: config.route_filter.clone(),
            max_results: config.max_results,
        });
        self
    }

    pub fn configured_sources(&self) -> BTreeSet<ArrivalKind> {
        let mut kinds = BTreeSet::new();
        if self.bus.is_some() {
            kinds.insert(ArrivalKind::Bus);
        }
        if self.train.is_some() {
            kinds.insert(ArrivalKind::Train);
        }
        kinds
    }

    /// Fetches every configured source once, concurrently, and waits for all.
    ///
    /// A failure in one source is captured in its own result and never
    /// affects the other.
    pub async fn poll(&self) -> PollOutcome {
        let bus = async {
            let pipeline = self.bus.as_ref()?;
            Some(log_outcome(ArrivalKind::Bus, pipeline.run().await))
        };
        let train = async {
            let pipeline = self.train.as_ref()?;
            Some(log_outcome(ArrivalKind::Train, pipeline.run().await))
        };

        let (bus, train) = tokio::join!(bus, train);
        PollOutcome { bus, train }
    }
}

fn log_outcome(kind: ArrivalKind, result: SourceResult) -> SourceResult {
    match &result {
        Ok(records) => debug!(source = %kind, arrivals = records.len(), "Source polled"),
        Err(e) => warn!(source = %kind, error = %e, "Source poll failed"),
    }
    result
}
