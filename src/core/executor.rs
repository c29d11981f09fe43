//! Poll scheduler.
//!
//! The `Executor` runs the fetch → extract → publish cycle followed by a fixed
//! pause, over and over, until its cancellation token fires. Cycles never
//! overlap, so snapshots reach the store in cycle order.

use std::{sync::Arc, time::Duration};

use time::{macros::format_description, OffsetDateTime};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::{
    backoff::FixedBackoff,
    error::FetchError,
    extractor::{extract_all, MetricValue},
    fetcher::{error_chain, fetch_with_retry, SensorSource},
    publisher::Publisher,
};
use crate::config::{metrics::MetricsCatalog, monitor::PollerConfig};

/// How one cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The snapshot reached the store.
    Published,
    /// A snapshot was extracted but the store write failed.
    PublishFailed,
    /// Every fetch attempt failed; nothing was published.
    FetchFailed,
    /// Shutdown was requested mid-cycle.
    Cancelled,
}

/// Long-lived owner of the source, the publisher and the catalog.
pub struct Executor {
    source: Arc<dyn SensorSource>,
    publisher: Arc<dyn Publisher>,
    catalog: Arc<MetricsCatalog>,
    interval: Duration,
    backoff: FixedBackoff,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(
        source: Arc<dyn SensorSource>,
        publisher: Arc<dyn Publisher>,
        catalog: Arc<MetricsCatalog>,
        poller: &PollerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            publisher,
            catalog,
            interval: poller.interval(),
            backoff: FixedBackoff::new(poller.retry_interval(), poller.max_attempts),
            cancel,
        }
    }

    /// Runs cycles until the cancellation token fires.
    pub async fn run(mut self) {
        info!(
            "Polling {} every {}s ({} attempts, {}s apart), publishing to {}",
            self.source.describe(),
            self.interval.as_secs(),
            self.backoff.max_attempts(),
            self.backoff.interval().as_secs(),
            self.publisher.describe()
        );

        loop {
            if self.run_cycle().await == CycleOutcome::Cancelled {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!("Polling stopped");
    }

    /// Runs exactly one fetch/extract/publish cycle.
    #[instrument(skip(self), level = "debug")]
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let tree = match fetch_with_retry(self.source.as_ref(), &mut self.backoff, &self.cancel).await {
            Ok(tree) => tree,
            Err(FetchError::Cancelled) => return CycleOutcome::Cancelled,
            Err(_) => return CycleOutcome::FetchFailed,
        };

        let snapshot = extract_all(&tree, &self.catalog);
        for reading in snapshot.readings() {
            if let MetricValue::Unresolved(reason) = &reading.value {
                debug!("Metric '{}' unresolved: {}", reading.name, reason);
            }
        }

        match self.publisher.publish(&snapshot).await {
            Ok(()) => {
                info!(
                    "Metrics stored [{}] - {}",
                    snapshot.summary(),
                    wall_clock()
                );
                CycleOutcome::Published
            }
            Err(e) => {
                error!(
                    "Publishing to {} failed: {}",
                    self.publisher.describe(),
                    error_chain(&e)
                );
                CycleOutcome::PublishFailed
            }
        }
    }
}

/// Current time as `HH:MM:SS UTC`.
///
/// `time` refuses to read the local offset once other threads are running,
/// which is always the case inside the multi-threaded runtime.
fn wall_clock() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[hour]:[minute]:[second] UTC"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::Instant;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        config::metrics::MetricDefinition,
        core::{
            extractor::MetricSnapshot,
            fetcher::tests::{sample_tree, ScriptedSource},
            publisher::{MemoryStore, PublishError, StoreError, StreamPublisher, StreamTrim},
        },
    };

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<MetricSnapshot>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, snapshot: &MetricSnapshot) -> Result<(), PublishError> {
            if self.fail {
                return Err(StoreError::Timeout(Duration::from_secs(5)).into());
            }
            self.published.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "recorder".into()
        }
    }

    impl RecordingPublisher {
        fn count(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    fn catalog() -> Arc<MetricsCatalog> {
        Arc::new(MetricsCatalog::new(vec![MetricDefinition {
            name: "cpu_temp_tctl".into(),
            description: "CPU Tctl".into(),
            path: vec!["CPU".into(), "Core Tctl|Tctl".into()],
            unit: "°C".into(),
        }]))
    }

    fn poller(max_attempts: u32) -> PollerConfig {
        PollerConfig {
            interval: 10,
            max_attempts,
            retry_interval: 12,
        }
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_cycle_publishes_extracted_snapshot() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut executor = Executor::new(
            Arc::new(ScriptedSource::failing_then(0, sample_tree())),
            publisher.clone(),
            catalog(),
            &poller(5),
            CancellationToken::new(),
        );

        assert_eq!(executor.run_cycle().await, CycleOutcome::Published);

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].get("cpu_temp_tctl"), Some(55.0));
        assert_eq!(published[0].host.as_deref(), Some("PC"));
        assert!(logs_contain("Metrics stored [cpu_temp_tctl=55.0°C]"));
    }

    #[test]
    fn test_wall_clock_is_utc() {
        let clock = wall_clock();
        assert_eq!(clock.len(), "00:00:00 UTC".len());
        assert!(clock.ends_with(" UTC"));
        assert_eq!(clock.matches(':').count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_skips_publish() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut executor = Executor::new(
            Arc::new(ScriptedSource::new(vec![])),
            publisher.clone(),
            catalog(),
            &poller(3),
            CancellationToken::new(),
        );

        assert_eq!(executor.run_cycle().await, CycleOutcome::FetchFailed);
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_publish_failure_is_logged_not_fatal() {
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let mut executor = Executor::new(
            Arc::new(ScriptedSource::new(vec![Some(sample_tree()), Some(sample_tree())])),
            publisher,
            catalog(),
            &poller(1),
            CancellationToken::new(),
        );

        assert_eq!(executor.run_cycle().await, CycleOutcome::PublishFailed);
        assert!(logs_contain("Publishing to recorder failed"));
        assert_eq!(executor.run_cycle().await, CycleOutcome::PublishFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_resets_every_cycle() {
        let source = Arc::new(ScriptedSource::new(vec![
            None,
            None,
            None,
            Some(sample_tree()),
        ]));
        let publisher = Arc::new(RecordingPublisher::default());
        let mut executor = Executor::new(
            source.clone(),
            publisher.clone(),
            catalog(),
            &poller(3),
            CancellationToken::new(),
        );

        assert_eq!(executor.run_cycle().await, CycleOutcome::FetchFailed);
        assert_eq!(source.calls(), 3);

        assert_eq!(executor.run_cycle().await, CycleOutcome::Published);
        assert_eq!(source.calls(), 4);
        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_between_cycles_and_stops_on_cancel() {
        let tree = sample_tree();
        let source = Arc::new(ScriptedSource::new(vec![Some(tree.clone()); 10]));
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(StreamPublisher::new(
            store.clone(),
            "hardware:metrics",
            "data",
            StreamTrim::Exact(100),
            false,
        ));
        let cancel = CancellationToken::new();
        let executor = Executor::new(source.clone(), publisher, catalog(), &poller(5), cancel.clone());

        let started = Instant::now();
        let handle = tokio::spawn(executor.run());

        // Cycles start at t=0, 10 and 20; cancel before the fourth.
        sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(store.entries("hardware:metrics").len(), 3);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_ends_run() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let publisher = Arc::new(RecordingPublisher::default());
        let cancel = CancellationToken::new();
        let executor = Executor::new(source.clone(), publisher.clone(), catalog(), &poller(5), cancel.clone());

        let handle = tokio::spawn(executor.run());
        sleep(Duration::from_secs(13)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(publisher.count(), 0);
    }
}
