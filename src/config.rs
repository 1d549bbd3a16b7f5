//! Command-line and environment configuration.
//!
//! [`SourceArgs`] is what the user types (or exports); [`SourceArgs::resolve`]
//! validates it into the read-only [`MonitorConfig`] the rest of the crate
//! consumes.

use clap::Args;
use std::time::Duration;

use crate::error::{ArrivalError, Result};
use crate::fetch::{BUS_TIME_URL, feed_url_for_route};

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// MTA Bus Time API key
    #[arg(long, env = "MTA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Bus stop to monitor (e.g. MTA_305423); enables the bus section
    #[arg(long, env = "MTA_STOP_ID")]
    pub stop_id: Option<String>,

    /// Only show this bus route (e.g. B69)
    #[arg(long, env = "MTA_ROUTE")]
    pub route: Option<String>,

    /// Subway station to monitor, without direction suffix (e.g. R16); enables the train section
    #[arg(long, env = "MTA_STATION_ID")]
    pub station_id: Option<String>,

    /// Only show this subway route (exact, case-sensitive, e.g. Q)
    #[arg(long, env = "MTA_TRAIN_ROUTE")]
    pub train_route: Option<String>,

    /// GTFS-realtime feed URL; derived from --train-route when omitted
    #[arg(long, env = "MTA_TRAIN_FEED_URL")]
    pub train_feed_url: Option<String>,

    /// Optional x-api-key header value for the subway feed
    #[arg(long, env = "MTA_FEED_API_KEY", hide_env_values = true)]
    pub feed_api_key: Option<String>,

    /// Seconds between refreshes
    #[arg(short = 'r', long, env = "MTA_REFRESH_INTERVAL", default_value_t = 30)]
    pub refresh_interval: u64,

    /// Maximum arrivals shown per section
    #[arg(short = 'n', long, env = "MTA_MAX_RESULTS", default_value_t = 10)]
    pub max_results: usize,

    /// HTTP request timeout in seconds
    #[arg(long, env = "MTA_HTTP_TIMEOUT", default_value_t = 10)]
    pub http_timeout: u64,

    /// SIRI stop-monitoring endpoint
    #[arg(long, env = "MTA_BUS_URL", default_value = BUS_TIME_URL)]
    pub bus_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub stop_id: String,
    pub route_filter: Option<String>,
    pub max_results: usize,
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainConfig {
    pub station_id: String,
    pub route_filter: Option<String>,
    pub max_results: usize,
    pub feed_url: String,
    pub api_key: Option<String>,
}

/// Validated configuration. Read-only once the monitor starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub refresh_interval: Duration,
    pub http_timeout: Duration,
    pub bus: Option<BusConfig>,
    pub train: Option<TrainConfig>,
}

impl SourceArgs {
    /// Validates the arguments and decides which sources are enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ArrivalError::Config`] for zero intervals or caps, a bus stop
    /// without an API key, a station whose feed cannot be determined, or when
    /// no source is enabled at all.
    pub fn resolve(&self) -> Result<MonitorConfig> {
        if self.refresh_interval == 0 {
            return Err(ArrivalError::config("refresh interval must be greater than 0"));
        }
        if self.max_results == 0 {
            return Err(ArrivalError::config("max results must be greater than 0"));
        }
        if self.http_timeout == 0 {
            return Err(ArrivalError::config("HTTP timeout must be greater than 0"));
        }

        let config = MonitorConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval),
            http_timeout: Duration::from_secs(self.http_timeout),
            bus: self.bus_config()?,
            train: self.train_config()?,
        };

        if config.bus.is_none() && config.train.is_none() {
            return Err(ArrivalError::config(
                "no sources enabled: set --stop-id (MTA_STOP_ID) and/or --station-id (MTA_STATION_ID)",
            ));
        }
        Ok(config)
    }

    fn bus_config(&self) -> Result<Option<BusConfig>> {
        let Some(stop_id) = non_empty(&self.stop_id) else {
            return Ok(None);
        };
        let api_key = non_empty(&self.api_key).ok_or_else(|| {
            ArrivalError::config("MTA_API_KEY is required to monitor a bus stop")
        })?;

        Ok(Some(BusConfig {
            stop_id,
            route_filter: non_empty(&self.route),
            max_results: self.max_results,
            api_key,
            base_url: self.bus_url.clone(),
        }))
    }

    fn train_config(&self) -> Result<Option<TrainConfig>> {
        let Some(station_id) = non_empty(&self.station_id) else {
            return Ok(None);
        };
        let route_filter = non_empty(&self.train_route);
        let feed_url = match non_empty(&self.train_feed_url) {
            Some(url) => url,
            None => route_filter
                .as_deref()
                .and_then(feed_url_for_route)
                .ok_or_else(|| {
                    ArrivalError::config(
                        "cannot choose a subway feed: set --train-feed-url or a known --train-route",
                    )
                })?,
        };

        Ok(Some(TrainConfig {
            station_id,
            route_filter,
            max_results: self.max_results,
            feed_url,
            api_key: non_empty(&self.feed_api_key),
        }))
    }
}

/// Empty environment variables count as unset.
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
