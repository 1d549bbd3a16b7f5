//! The fetch → render → sleep loop.
//!
//! [`MonitorLoop`] owns the aggregator and presenter and drives them on a
//! fixed cadence until its [`CancellationToken`] fires. Cancellation is
//! checked while fetching and while sleeping, never in the middle of a
//! render, so every frame the presenter receives is complete.

use chrono::Local;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::SourceAggregator;
use crate::error::{ArrivalError, Result};
use crate::output::Presenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Rendering,
    Sleeping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles that reached the presenter.
    pub cycles: u64,
}

pub struct MonitorLoop<P> {
    aggregator: SourceAggregator,
    presenter: P,
    refresh_interval: Duration,
    state: LoopState,
}

impl<P: Presenter> MonitorLoop<P> {
    pub fn new(aggregator: SourceAggregator, presenter: P, refresh_interval: Duration) -> Self {
        Self {
            aggregator,
            presenter,
            refresh_interval,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Runs cycles until `cancel` fires.
    ///
    /// Per-cycle fetch or decode failures are rendered and the loop carries
    /// on; they never end it.
    ///
    /// # Errors
    ///
    /// Returns [`ArrivalError::Config`] before the first cycle when no source
    /// is configured or the refresh interval is zero.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<LoopSummary> {
        self.check_config()?;
        info!(
            refresh_secs = self.refresh_interval.as_secs(),
            sources = ?self.aggregator.configured_sources(),
            "Monitoring started"
        );

        let mut cycles = 0;
        while !cancel.is_cancelled() {
            if !self.cycle(&cancel).await {
                break;
            }
            cycles += 1;

            self.transition(LoopState::Sleeping);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.refresh_interval) => {}
            }
        }

        self.transition(LoopState::Stopped);
        info!(cycles, "Monitoring stopped");
        Ok(LoopSummary { cycles })
    }

    /// Performs a single fetch and render.
    pub async fn run_once(&mut self) -> Result<LoopSummary> {
        self.check_config()?;
        let rendered = self.cycle(&CancellationToken::new()).await;
        self.transition(LoopState::Stopped);
        Ok(LoopSummary {
            cycles: u64::from(rendered),
        })
    }

    fn check_config(&self) -> Result<()> {
        if self.aggregator.configured_sources().is_empty() {
            return Err(ArrivalError::config("no arrival sources configured"));
        }
        if self.refresh_interval.is_zero() {
            return Err(ArrivalError::config("refresh interval must be greater than 0"));
        }
        Ok(())
    }

    /// Returns `false` when cancelled before anything was rendered.
    async fn cycle(&mut self, cancel: &CancellationToken) -> bool {
        self.transition(LoopState::Fetching);
        let timestamp = Local::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            outcome = self.aggregator.poll() => outcome,
        };

        self.transition(LoopState::Rendering);
        self.presenter
            .render(timestamp, outcome.bus.as_ref(), outcome.train.as_ref());
        true
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "Monitor state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SourceResult;
    use crate::config::{BusConfig, TrainConfig};
    use crate::fetch::{BusSource, TrainSource};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SIRI_EMPTY: &[u8] =
        br#"{"Siri":{"ServiceDelivery":{"StopMonitoringDelivery":[{"MonitoredStopVisit":[]}]}}}"#;

    struct CountingBus {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl BusSource for CountingBus {
        async fn fetch_bus(&self, _stop_id: &str, _route: Option<&str>) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ArrivalError::transport("timed out"))
            } else {
                Ok(SIRI_EMPTY.to_vec())
            }
        }
    }

    /// Never answers, like a fetch stuck on a dead connection.
    struct HangingTrain;

    #[async_trait]
    impl TrainSource for HangingTrain {
        async fn fetch_train(&self, _station_id: &str) -> Result<Vec<u8>> {
            std::future::pending().await
        }
    }

    /// Records each frame and cancels the loop after `cancel_after` frames.
    struct RecordingPresenter {
        frames: Vec<(bool, bool)>,
        cancel: CancellationToken,
        cancel_after: Option<usize>,
    }

    impl RecordingPresenter {
        fn new(cancel: &CancellationToken, cancel_after: Option<usize>) -> Self {
            Self {
                frames: Vec::new(),
                cancel: cancel.clone(),
                cancel_after,
            }
        }
    }

    impl Presenter for RecordingPresenter {
        fn render(
            &mut self,
            _timestamp: DateTime<Local>,
            bus: Option<&SourceResult>,
            train: Option<&SourceResult>,
        ) {
            self.frames.push((
                bus.is_some_and(|r| r.is_ok()),
                train.is_some(),
            ));
            if self.cancel_after == Some(self.frames.len()) {
                self.cancel.cancel();
            }
        }
    }

    fn bus_config() -> BusConfig {
        BusConfig {
            stop_id: "MTA_305423".to_string(),
            route_filter: None,
            max_results: 10,
            api_key: "k".to_string(),
            base_url: "http://localhost".to_string(),
        }
    }

    fn bus_aggregator(calls: &Arc<AtomicUsize>, fail: bool) -> SourceAggregator {
        SourceAggregator::new().with_bus(
            CountingBus {
                calls: calls.clone(),
                fail,
            },
            &bus_config(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_sleeping_skips_next_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let presenter = RecordingPresenter::new(&cancel, Some(1));
        let mut monitor =
            MonitorLoop::new(bus_aggregator(&calls, false), presenter, Duration::from_secs(30));

        let summary = monitor.run(cancel).await.unwrap();

        assert_eq!(summary.cycles, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_cancelled_between_cycles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let presenter = RecordingPresenter::new(&cancel, None);
        let mut monitor =
            MonitorLoop::new(bus_aggregator(&calls, false), presenter, Duration::from_secs(30));

        let timer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(75)).await;
            timer.cancel();
        });

        let summary = monitor.run(cancel).await.unwrap();

        // cycles at t=0, 30 and 60; cancelled during the sleep before t=90
        assert_eq!(summary.cycles, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let presenter = RecordingPresenter::new(&cancel, Some(3));
        let mut monitor =
            MonitorLoop::new(bus_aggregator(&calls, true), presenter, Duration::from_secs(5));

        let summary = monitor.run(cancel).await.unwrap();

        assert_eq!(summary.cycles, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(monitor.presenter().frames.iter().all(|&(bus_ok, _)| !bus_ok));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_fetch_skips_render() {
        let cancel = CancellationToken::new();
        let aggregator = SourceAggregator::new().with_train(
            HangingTrain,
            &TrainConfig {
                station_id: "R16".to_string(),
                route_filter: None,
                max_results: 10,
                feed_url: "http://localhost".to_string(),
                api_key: None,
            },
        );
        let presenter = RecordingPresenter::new(&cancel, None);
        let mut monitor = MonitorLoop::new(aggregator, presenter, Duration::from_secs(30));

        let timer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            timer.cancel();
        });

        let summary = monitor.run(cancel).await.unwrap();

        assert_eq!(summary.cycles, 0);
        assert!(monitor.presenter().frames.is_empty());
    }

    #[tokio::test]
    async fn test_no_sources_is_fatal_before_first_cycle() {
        let cancel = CancellationToken::new();
        let presenter = RecordingPresenter::new(&cancel, None);
        let mut monitor =
            MonitorLoop::new(SourceAggregator::new(), presenter, Duration::from_secs(30));

        let result = monitor.run(cancel).await;

        assert!(matches!(result, Err(ArrivalError::Config(_))));
        assert!(monitor.presenter().frames.is_empty());
        assert_eq!(monitor.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_does_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let presenter = RecordingPresenter::new(&cancel, None);
        let mut monitor =
            MonitorLoop::new(bus_aggregator(&calls, false), presenter, Duration::from_secs(30));

        let summary = monitor.run(cancel).await.unwrap();

        assert_eq!(summary.cycles, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_once_renders_single_frame() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let presenter = RecordingPresenter::new(&cancel, None);
        let mut monitor =
            MonitorLoop::new(bus_aggregator(&calls, false), presenter, Duration::from_secs(30));

        let summary = monitor.run_once().await.unwrap();

        assert_eq!(summary.cycles, 1);
        assert_eq!(monitor.presenter().frames, [(true, false)]);
    }
}
