use std::{path::Path, process, sync::Arc};

use hwpulse::{
    config::{metrics::MetricsCatalog, Config},
    core::{
        executor::Executor,
        fetcher::HttpSensorSource,
        publisher::{build_publisher, RedisStore, SnapshotStore},
    },
    logger::LoggerManager,
    print_error,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn log_catalog_table(catalog: &MetricsCatalog) {
    let name_width = catalog
        .iter()
        .map(|m| m.name.len())
        .max()
        .unwrap_or(0)
        .max("Metric".len());

    info!("{:<width$} | Unit | Path", "Metric", width = name_width);
    info!("{}-+------+-{}", "-".repeat(name_width), "-".repeat(24));

    for metric in catalog.iter() {
        info!(
            "{:<width$} | {:<4} | {}",
            metric.name,
            metric.unit,
            metric.path.join(" > "),
            width = name_width
        );
    }
}

#[tokio::main]
async fn main() {
    let cfg = Config::new().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting hwpulse version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg);

    let catalog = MetricsCatalog::load(Path::new(&cfg.metrics.definitions)).unwrap_or_else(|e| {
        error!("Failed to load {}: {}", cfg.metrics.definitions, e);
        process::exit(1);
    });
    if catalog.is_empty() {
        warn!(
            "{} defines no metrics, snapshots will only carry the timestamp and host",
            cfg.metrics.definitions
        );
    } else {
        info!(
            "Loaded {} metrics from {}: {}",
            catalog.len(),
            cfg.metrics.definitions,
            catalog.names().join(", ")
        );
    }
    log_catalog_table(&catalog);

    let source = HttpSensorSource::from_config(&cfg.monitor).unwrap_or_else(|e| {
        error!("Failed to create HTTP client: {}", e);
        process::exit(1);
    });
    info!("Hardware monitor endpoint: {}", source.url());

    let store = RedisStore::from_config(&cfg.store).unwrap_or_else(|e| {
        error!("Failed to configure store: {}", e);
        process::exit(1);
    });
    info!("Store endpoint: {}", store.endpoint());

    let store: Arc<dyn SnapshotStore> = Arc::new(store);
    let publisher = build_publisher(store, &cfg.publisher, cfg.metrics.report_unresolved);
    info!("Publisher mode: {}", cfg.publisher.mode);

    let cancel = CancellationToken::new();
    let executor = Executor::new(
        Arc::new(source),
        publisher,
        Arc::new(catalog),
        &cfg.poller,
        cancel.clone(),
    );

    let mut polling = tokio::spawn(executor.run());

    tokio::select! {
        result = &mut polling => {
            if let Err(e) = result {
                error!("Executor task failed: {}", e);
                process::exit(1);
            }
            error!("Executor unexpectedly finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
            if let Err(e) = polling.await {
                error!("Executor task failed during shutdown: {}", e);
            }
            info!("Shutdown complete");
        }
    }
}
