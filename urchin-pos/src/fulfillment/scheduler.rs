//! Print trigger scheduler
//!
//! 三个触发源汇聚到同一个 `worker.run()`：
//! - 启动触发：进程启动后延迟一段预热时间执行一次，避开首屏渲染
//! - 前台触发：应用每次从后台切回前台
//! - 定时触发：前台期间按固定周期兜底（防漏掉前台事件、防运行中
//!   外部新增的队列条目一直积压）
//!
//! 调度器不关心 run 是否已在执行；重入保护是 Worker 自己的事。
//! 卸载时取消令牌停掉所有定时器，不会打到已拆除的 Worker 上。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::worker::PrintWorker;

/// 应用生命周期事件（UI 宿主投递）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    /// 切回前台
    Foreground,
    /// 切到后台/失活
    Background,
}

/// 调度参数
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 启动触发前的预热延迟
    pub warmup_delay: Duration,
    /// 前台期间的兜底周期
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warmup_delay: Duration::from_secs(5),
            interval: Duration::from_secs(30),
        }
    }
}

/// 打印触发调度器
pub struct PrintScheduler {
    worker: Arc<PrintWorker>,
    config: SchedulerConfig,
}

impl PrintScheduler {
    pub fn new(worker: Arc<PrintWorker>, config: SchedulerConfig) -> Self {
        Self { worker, config }
    }

    /// 运行调度循环（阻塞直到 shutdown 或生命周期通道关闭）
    ///
    /// 进入时标记 Worker 就绪，退出时标记失效，之后迟到的触发
    /// 一律 no-op。
    pub async fn run(self, mut lifecycle_rx: mpsc::Receiver<AppLifecycle>, shutdown: CancellationToken) {
        tracing::info!(
            warmup_ms = self.config.warmup_delay.as_millis() as u64,
            interval_ms = self.config.interval.as_millis() as u64,
            "Print scheduler started"
        );
        self.worker.mark_ready();

        // 启动触发：预热延迟后执行一次
        tokio::select! {
            _ = shutdown.cancelled() => {
                self.worker.retire();
                tracing::info!("Print scheduler stopped before warmup");
                return;
            }
            _ = tokio::time::sleep(self.config.warmup_delay) => {
                self.worker.run().await;
            }
        }

        // 应用进程从前台启动
        let mut foregrounded = true;
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Print scheduler received shutdown signal");
                    break;
                }
                event = lifecycle_rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Lifecycle channel closed, print scheduler stopping");
                        break;
                    };
                    match event {
                        AppLifecycle::Foreground => {
                            foregrounded = true;
                            // 前台事件刚触发过，兜底周期重新计时
                            ticker.reset();
                            self.worker.run().await;
                        }
                        AppLifecycle::Background => {
                            foregrounded = false;
                        }
                    }
                }
                _ = ticker.tick(), if foregrounded => {
                    self.worker.run().await;
                }
            }
        }

        self.worker.retire();
        tracing::info!("Print scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::policy::PolicyGate;
    use crate::fulfillment::renderer::TicketRenderer;
    use crate::fulfillment::storage::FulfillmentStorage;
    use crate::fulfillment::types::{OrderItem, OrderRecord, PrintPolicy, RunOutcome};
    use crate::fulfillment::worker::{OrderSource, PrinterConnection, SourceError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use urchin_printer::{PrintResult, PrinterStatus, ReceiptEncoding, TextSize};

    /// Synthesizes a record for every requested id
    struct EchoSource;

    #[async_trait]
    impl OrderSource for EchoSource {
        async fn fetch_many(&self, order_ids: &[String]) -> Result<Vec<OrderRecord>, SourceError> {
            Ok(order_ids
                .iter()
                .map(|id| OrderRecord {
                    id: id.clone(),
                    order_number: id.clone(),
                    customer_name: String::new(),
                    items: vec![OrderItem {
                        product_name: "Item".into(),
                        quantity: 1,
                        unit_price_cents: 100,
                        notes: None,
                    }],
                    created_at: 0,
                })
                .collect())
        }
    }

    struct RecordingPrinter {
        jobs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PrinterConnection for RecordingPrinter {
        async fn print(
            &self,
            _data: &[u8],
            _auto_cut: bool,
            _text_size: TextSize,
            _encoding: ReceiptEncoding,
            dedupe_key: &str,
        ) -> PrintResult<()> {
            self.jobs.lock().unwrap().push(dedupe_key.to_string());
            Ok(())
        }
    }

    fn build(
        storage: &FulfillmentStorage,
        printer: Arc<RecordingPrinter>,
    ) -> Arc<PrintWorker> {
        let status = PrinterStatus::new();
        status.set_connected(true);
        storage
            .save_policy(&PrintPolicy {
                auto_print_enabled: true,
                ..Default::default()
            })
            .unwrap();

        Arc::new(PrintWorker::new(
            storage.clone(),
            PolicyGate::new(storage.clone(), status),
            Arc::new(EchoSource),
            Arc::new(TicketRenderer::default()),
            printer,
            Duration::ZERO,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_three_triggers() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        let printer = Arc::new(RecordingPrinter {
            jobs: Mutex::new(Vec::new()),
        });
        let worker = build(&storage, printer.clone());

        storage.enqueue("startup-1").unwrap();

        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let scheduler = PrintScheduler::new(
            worker.clone(),
            SchedulerConfig {
                warmup_delay: Duration::from_secs(3),
                interval: Duration::from_secs(30),
            },
        );
        let handle = tokio::spawn(scheduler.run(rx, shutdown.clone()));

        // 预热期内不触发
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(printer.jobs.lock().unwrap().is_empty());

        // 启动触发
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*printer.jobs.lock().unwrap(), vec!["startup-1"]);

        // 前台触发
        storage.enqueue("fg-1").unwrap();
        tx.send(AppLifecycle::Foreground).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*printer.jobs.lock().unwrap(), vec!["startup-1", "fg-1"]);

        // 定时触发
        storage.enqueue("tick-1").unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(
            *printer.jobs.lock().unwrap(),
            vec!["startup-1", "fg-1", "tick-1"]
        );

        // 后台期间定时器静默
        tx.send(AppLifecycle::Background).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        storage.enqueue("bg-1").unwrap();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(printer.jobs.lock().unwrap().len(), 3);

        // 关闭后 Worker 失效，迟到触发是 no-op
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(worker.run().await, RunOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_warmup_cancels_startup_trigger() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        let printer = Arc::new(RecordingPrinter {
            jobs: Mutex::new(Vec::new()),
        });
        let worker = build(&storage, printer.clone());
        storage.enqueue("never").unwrap();

        let (_tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let scheduler = PrintScheduler::new(worker, SchedulerConfig::default());
        let handle = tokio::spawn(scheduler.run(rx, shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(printer.jobs.lock().unwrap().is_empty());
        assert_eq!(storage.peek_all().unwrap(), vec!["never"]);
    }
}
