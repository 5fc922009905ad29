//! Fulfillment service - producer surface and pipeline wiring
//!
//! [`FulfillmentService`] is what the rest of the application touches:
//! order creation and manual re-queue call `request_print`, settings
//! screens read and write the print policy. The worker and scheduler
//! never surface here.
//!
//! [`FulfillmentPipeline::start`] wires the whole pipeline once at
//! process start: storage, printer station + connection monitor,
//! backend order source, renderer, worker and scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::policy::PolicyGate;
use super::renderer::TicketRenderer;
use super::scheduler::{AppLifecycle, PrintScheduler, SchedulerConfig};
use super::storage::{FulfillmentStorage, StorageResult};
use super::types::PrintPolicy;
use super::worker::PrintWorker;
use crate::client::BackendClient;
use crate::core::Config;
use urchin_printer::{ConnectionMonitor, NetworkPrinter, ThermalStation};

/// Queue and ledger sizes, for diagnostics screens
#[derive(Debug, Clone, Copy)]
pub struct FulfillmentStats {
    pub queued: u64,
    pub printed_total: u64,
}

/// Producer-facing fulfillment surface
#[derive(Clone)]
pub struct FulfillmentService {
    storage: FulfillmentStorage,
}

impl FulfillmentService {
    pub fn new(storage: FulfillmentStorage) -> Self {
        Self { storage }
    }

    /// Queue an order for automatic printing
    ///
    /// Idempotent. A storage failure is logged and swallowed: the caller
    /// just created an order and must not fail because the receipt
    /// backlog could not be written; manual print remains available.
    pub fn request_print(&self, order_id: &str) {
        match self.storage.enqueue(order_id) {
            Ok(true) => {
                tracing::debug!(order_id = %order_id, "Order queued for auto-print");
            }
            Ok(false) => {
                tracing::debug!(order_id = %order_id, "Order already queued");
            }
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "Failed to queue order for auto-print");
            }
        }
    }

    /// Re-queue an order after operator intervention
    pub fn requeue(&self, order_id: &str) {
        tracing::info!(order_id = %order_id, "Order re-queued manually");
        self.request_print(order_id);
    }

    /// Current print policy (defaults if never saved)
    pub fn policy(&self) -> PrintPolicy {
        match self.storage.load_policy() {
            Ok(Some(policy)) => policy,
            Ok(None) => PrintPolicy::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load print policy");
                PrintPolicy::default()
            }
        }
    }

    /// Persist a new print policy
    pub fn update_policy(&self, policy: &PrintPolicy) -> StorageResult<()> {
        self.storage.save_policy(policy)?;
        tracing::info!(
            auto_print = policy.auto_print_enabled,
            auto_cut = policy.auto_cut_enabled,
            "Print policy updated"
        );
        Ok(())
    }

    pub fn stats(&self) -> StorageResult<FulfillmentStats> {
        Ok(FulfillmentStats {
            queued: self.storage.queue_len()?,
            printed_total: self.storage.ledger_len()?,
        })
    }
}

impl std::fmt::Debug for FulfillmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentService").finish_non_exhaustive()
    }
}

/// Running fulfillment pipeline
///
/// Owns the background tasks. Dropping the handle does not stop them;
/// call [`FulfillmentPipeline::shutdown`] from the UI teardown path.
pub struct FulfillmentPipeline {
    service: FulfillmentService,
    worker: Arc<PrintWorker>,
    lifecycle_tx: mpsc::Sender<AppLifecycle>,
    shutdown: CancellationToken,
}

impl FulfillmentPipeline {
    /// Wire and start the pipeline
    ///
    /// Spawns the printer connection monitor and the trigger scheduler;
    /// the worker is marked ready by the scheduler once running.
    pub fn start(config: &Config) -> anyhow::Result<Self> {
        let db_path = std::path::Path::new(&config.work_dir).join("fulfillment.redb");
        let storage = FulfillmentStorage::open(&db_path)?;

        let printer = NetworkPrinter::from_addr(&config.printer_addr)?;
        let station = Arc::new(ThermalStation::with_printer(printer.clone()));
        let status = station.status();

        let shutdown = CancellationToken::new();

        let monitor = ConnectionMonitor::new(
            printer,
            status.clone(),
            Duration::from_millis(config.printer_probe_interval_ms),
        );
        tokio::spawn(monitor.run(shutdown.clone()));

        let source = Arc::new(BackendClient::new(&config.backend_url));
        let renderer = Arc::new(TicketRenderer::new(config.paper_width, config.timezone));

        let worker = Arc::new(PrintWorker::new(
            storage.clone(),
            PolicyGate::new(storage.clone(), status),
            source,
            renderer,
            station,
            Duration::from_millis(config.inter_print_delay_ms),
        ));

        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(16);
        let scheduler = PrintScheduler::new(
            worker.clone(),
            SchedulerConfig {
                warmup_delay: Duration::from_millis(config.startup_warmup_ms),
                interval: Duration::from_millis(config.print_interval_ms),
            },
        );
        tokio::spawn(scheduler.run(lifecycle_rx, shutdown.clone()));

        tracing::info!(db = %db_path.display(), "Fulfillment pipeline started");

        Ok(Self {
            service: FulfillmentService::new(storage),
            worker,
            lifecycle_tx,
            shutdown,
        })
    }

    pub fn service(&self) -> &FulfillmentService {
        &self.service
    }

    /// Sender for UI lifecycle transitions
    pub fn lifecycle_sender(&self) -> mpsc::Sender<AppLifecycle> {
        self.lifecycle_tx.clone()
    }

    /// Stop all background tasks and retire the worker
    pub fn shutdown(self) {
        self.worker.retire();
        self.shutdown.cancel();
        tracing::info!("Fulfillment pipeline shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_print_swallows_nothing_on_success() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        let service = FulfillmentService::new(storage.clone());

        service.request_print("order-1");
        service.request_print("order-1");

        assert_eq!(storage.peek_all().unwrap(), vec!["order-1"]);
    }

    #[test]
    fn test_policy_roundtrip() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        let service = FulfillmentService::new(storage);

        assert!(!service.policy().auto_print_enabled);

        service
            .update_policy(&PrintPolicy {
                auto_print_enabled: true,
                ..Default::default()
            })
            .unwrap();

        assert!(service.policy().auto_print_enabled);
    }

    #[test]
    fn test_stats() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        storage.enqueue("a").unwrap();
        storage.enqueue("b").unwrap();
        storage.mark_printed("z").unwrap();

        let service = FulfillmentService::new(storage);
        let stats = service.stats().unwrap();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.printed_total, 1);
    }
}
