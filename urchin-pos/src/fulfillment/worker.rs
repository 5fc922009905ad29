//! Receipt Print Worker
//!
//! 后台小票打印的执行核心。每次触发执行一整个批次：
//! 读队列 → 策略门 → 批量拉单 → 逐单渲染打印 → 清理批次。
//!
//! 并发约束：进程内最多一个 run 在执行（RunLock）。触发方重复调用
//! 是 no-op，不排队；剩余队列由下一次自然触发接手。
//!
//! 失败语义：
//! - 打印机离线 / 拉单失败 → 整批保留，下次触发重试
//! - 自动打印关闭 → 整批丢弃（操作员决定）
//! - 单笔渲染/打印失败 → 跳过该单继续，批次照常清理，不自动重试

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use urchin_printer::{NetworkPrinter, PrintResult, ReceiptEncoding, TextSize, ThermalStation};

use super::policy::PolicyGate;
use super::renderer::ReceiptRenderer;
use super::storage::FulfillmentStorage;
use super::types::{OrderRecord, PrintContext, RunOutcome};

/// Order data source failure
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// 订单数据源边界
///
/// 返回实际找到的子集；部分 ID 不存在不算错误。
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_many(&self, order_ids: &[String]) -> Result<Vec<OrderRecord>, SourceError>;
}

/// 打印机设备边界
///
/// 同一 dedupe_key 重复提交不得产生第二张物理小票
/// （设备层对账本丢失的兜底）。
#[async_trait]
pub trait PrinterConnection: Send + Sync {
    async fn print(
        &self,
        data: &[u8],
        auto_cut: bool,
        text_size: TextSize,
        encoding: ReceiptEncoding,
        dedupe_key: &str,
    ) -> PrintResult<()>;
}

#[async_trait]
impl PrinterConnection for ThermalStation<NetworkPrinter> {
    async fn print(
        &self,
        data: &[u8],
        auto_cut: bool,
        text_size: TextSize,
        encoding: ReceiptEncoding,
        dedupe_key: &str,
    ) -> PrintResult<()> {
        ThermalStation::print(self, data, auto_cut, text_size, encoding, dedupe_key).await
    }
}

/// 小票打印工作者
///
/// 所有触发源（启动、前台切换、定时器）都汇聚到 [`PrintWorker::run`]。
/// 队列和账本只由本类型写入。
pub struct PrintWorker {
    storage: FulfillmentStorage,
    gate: PolicyGate,
    source: Arc<dyn OrderSource>,
    renderer: Arc<dyn ReceiptRenderer>,
    printer: Arc<dyn PrinterConnection>,
    /// 热敏打印机出纸节流：两单之间的间隔
    inter_print_delay: Duration,
    /// RunLock：true 表示有 run 正在执行
    running: AtomicBool,
    /// 未就绪时所有触发都是 no-op（UI 宿主装配完成后置位）
    ready: AtomicBool,
}

impl PrintWorker {
    pub fn new(
        storage: FulfillmentStorage,
        gate: PolicyGate,
        source: Arc<dyn OrderSource>,
        renderer: Arc<dyn ReceiptRenderer>,
        printer: Arc<dyn PrinterConnection>,
        inter_print_delay: Duration,
    ) -> Self {
        Self {
            storage,
            gate,
            source,
            renderer,
            printer,
            inter_print_delay,
            running: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// 装配完成，允许 run 执行
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// 宿主卸载，后续触发一律 no-op
    pub fn retire(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// 执行一次打印批次
    ///
    /// 永不向调用方抛错；所有失败折叠进 [`RunOutcome`] 和日志。
    /// RunLock 在所有退出路径上释放。
    pub async fn run(&self) -> RunOutcome {
        if !self.ready.load(Ordering::Acquire) {
            tracing::trace!("Print worker not ready, trigger ignored");
            return RunOutcome::Skipped;
        }

        // 进入临界区；已有 run 在执行则直接放弃（不排队）
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Print run already in progress, trigger ignored");
            return RunOutcome::Skipped;
        }

        let outcome = self.run_batch().await;
        self.running.store(false, Ordering::Release);

        match &outcome {
            RunOutcome::Completed {
                printed,
                skipped,
                failed,
            } => {
                tracing::info!(printed, skipped, failed, "Print run completed");
            }
            RunOutcome::PolicyDisabled { discarded } => {
                tracing::info!(discarded, "Auto-print disabled, queued orders discarded");
            }
            RunOutcome::PrinterOffline => {
                tracing::warn!("Printer disconnected, batch kept for next trigger");
            }
            RunOutcome::FetchFailed => {
                tracing::warn!("Order fetch failed, batch kept for next trigger");
            }
            RunOutcome::StorageFailed => {}
            RunOutcome::Skipped | RunOutcome::QueueEmpty => {}
        }

        outcome
    }

    async fn run_batch(&self) -> RunOutcome {
        let batch = match self.storage.peek_all() {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read print queue");
                return RunOutcome::StorageFailed;
            }
        };

        if batch.is_empty() {
            return RunOutcome::QueueEmpty;
        }

        let state = self.gate.evaluate();

        // 离线是暂时的：整批留在队列里等下次触发
        if !state.printer_connected {
            return RunOutcome::PrinterOffline;
        }

        // 关闭自动打印 = 操作员决定丢弃积压，不是静默暂停
        if !state.auto_print_enabled {
            let discarded = batch.len();
            self.drop_batch(&batch);
            return RunOutcome::PolicyDisabled { discarded };
        }

        let orders = match self.source.fetch_many(&batch).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(error = %e, batch_len = batch.len(), "Failed to fetch orders");
                return RunOutcome::FetchFailed;
            }
        };

        if orders.is_empty() {
            tracing::info!(
                batch_len = batch.len(),
                "Queued orders no longer exist, dropping batch"
            );
            self.drop_batch(&batch);
            return RunOutcome::Completed {
                printed: 0,
                skipped: 0,
                failed: 0,
            };
        }

        let by_id: std::collections::HashMap<&str, &OrderRecord> =
            orders.iter().map(|o| (o.id.as_str(), o)).collect();

        let mut printed = 0;
        let mut skipped = 0;
        let mut failed = 0;

        // 按队列（入队）顺序逐单处理
        for order_id in &batch {
            let Some(order) = by_id.get(order_id.as_str()) else {
                tracing::debug!(order_id = %order_id, "Order not found in fetch result, skipping");
                skipped += 1;
                continue;
            };

            match self.storage.is_printed(order_id) {
                Ok(true) => {
                    // 上一次（可能被中断的）run 已经打过
                    tracing::debug!(order_id = %order_id, "Already printed, skipping");
                    skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    // 账本读不出来就不能保证幂等，宁可不打
                    tracing::error!(order_id = %order_id, error = %e, "Ledger check failed, skipping order");
                    failed += 1;
                    continue;
                }
            }

            let payload = self.renderer.render(order, &state, PrintContext::AutoPrint);

            match self
                .printer
                .print(
                    &payload,
                    state.auto_cut_enabled,
                    state.text_size,
                    state.encoding,
                    order_id,
                )
                .await
            {
                Ok(()) => {
                    // 先记账再打下一单：中途崩溃时已打的单不会重打
                    if let Err(e) = self.storage.mark_printed(order_id) {
                        tracing::error!(order_id = %order_id, error = %e, "Failed to record print in ledger");
                    }
                    printed += 1;

                    if !self.inter_print_delay.is_zero() {
                        tokio::time::sleep(self.inter_print_delay).await;
                    }
                }
                Err(e) => {
                    // 单笔失败不拖垮整批
                    tracing::error!(order_id = %order_id, error = %e, "Failed to print receipt");
                    failed += 1;
                }
            }
        }

        // 成功失败一并出队：不让一笔坏单饿死后面的队列
        self.drop_batch(&batch);

        RunOutcome::Completed {
            printed,
            skipped,
            failed,
        }
    }

    fn drop_batch(&self, batch: &[String]) {
        if let Err(e) = self.storage.remove_batch(batch) {
            tracing::error!(error = %e, "Failed to clear print queue batch");
        }
    }
}

impl std::fmt::Debug for PrintWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintWorker")
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
