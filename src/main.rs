//! Supervisor binary: wires the five pipeline components together and
//! spawns one `tokio::task` per logical stage.
//!
//! Loads config, initializes logging, then spawns long-running workers
//! under a shared cancellation signal.

use std::sync::Arc;

use custody_intake_pipeline::classifier::{self, Disposition};
use custody_intake_pipeline::config::PipelineConfig;
use custody_intake_pipeline::custody::ReqwestCustodyClient;
use custody_intake_pipeline::dispatcher::TransferDispatcher;
use custody_intake_pipeline::logging::{self, LogOptions};
use custody_intake_pipeline::poller::SnapshotPoller;
use custody_intake_pipeline::settlement::SettlementWriter;
use custody_intake_pipeline::{db, PipelineError};

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "pipeline.yaml".to_string());
    let config = PipelineConfig::from_file(&config_path)?;

    let _log_guard = logging::init_logging(&LogOptions::default());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "starting intake/settlement pipeline"
    );

    let pool = db::connect(&config.database.url).await.map_err(|e| {
        custody_intake_pipeline::error::SettlementError::Database(e)
    })?;
    db::init_schema(&pool).await.map_err(custody_intake_pipeline::error::SettlementError::Database)?;

    let custody = Arc::new(ReqwestCustodyClient::new(
        config.custody.base_url.clone(),
        std::env::var("CUSTODY_PIN_MATERIAL").unwrap_or_default(),
    ));
    let writer = Arc::new(SettlementWriter::new(
        pool.clone(),
        config.market.clone(),
        config.fees.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let poller_handle = {
        let custody = custody.clone();
        let pool = pool.clone();
        let service = config.service.clone();
        let market = config.market.clone();
        let writer = writer.clone();
        let shutdown_rx = shutdown_rx.clone();
        let snapshot_limit = config.custody.snapshot_limit;
        let retry_delay_ms = config.service.retry_delay_ms;
        tokio::spawn(async move {
            let mut poller = SnapshotPoller::new(custody, pool, service.clone(), snapshot_limit);
            let account_id = service.account_id.clone();
            let result = poller
                .run(shutdown_rx, |snapshot| {
                    let market = market.clone();
                    let account_id = account_id.clone();
                    let writer = writer.clone();
                    async move {
                        let disposition = classifier::classify(&snapshot, &market, &account_id);
                        if matches!(disposition, Disposition::Ignore) {
                            return;
                        }
                        // Retried indefinitely: the checkpoint must not
                        // advance past a snapshot that has not yet been
                        // durably applied.
                        loop {
                            match writer.apply(disposition.clone(), &snapshot).await {
                                Ok(()) => break,
                                Err(err) => {
                                    tracing::warn!(error = %err, snapshot_id = %snapshot.snapshot_id, "settlement write failed, retrying");
                                    tokio::time::sleep(std::time::Duration::from_millis(retry_delay_ms)).await;
                                }
                            }
                        }
                    }
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "snapshot poller exited");
            }
        })
    };

    const DISPATCHER_WORKERS: usize = 2;
    let mut dispatcher_handles = Vec::with_capacity(DISPATCHER_WORKERS);
    for worker_id in 0..DISPATCHER_WORKERS {
        let custody = custody.clone();
        let pool = pool.clone();
        let service = config.service.clone();
        let shutdown_rx = shutdown_rx.clone();
        dispatcher_handles.push(tokio::spawn(async move {
            tracing::info!(worker_id, "transfer dispatcher started");
            let dispatcher = TransferDispatcher::new(custody, pool, service);
            dispatcher.run(shutdown_rx).await;
        }));
    }

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = poller_handle.await;
    for handle in dispatcher_handles {
        let _ = handle.await;
    }

    Ok(())
}
