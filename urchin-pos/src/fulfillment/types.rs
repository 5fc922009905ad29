//! Receipt fulfillment types

use serde::{Deserialize, Serialize};
use urchin_printer::{ReceiptEncoding, TextSize};

/// 订单行项目（后端返回的快照，小票渲染用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_name: String,
    pub quantity: i32,
    /// 单价（分，避免浮点误差）
    pub unit_price_cents: i64,
    pub notes: Option<String>,
}

/// 订单记录（后端返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub order_number: String,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    /// 创建时间 (Unix millis)
    #[serde(default)]
    pub created_at: i64,
}

impl OrderRecord {
    /// 订单总额（分）
    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .map(|i| i.unit_price_cents * i.quantity as i64)
            .sum()
    }
}

/// 持久化的打印配置（单例记录）
///
/// 从未保存过配置时，`auto_print_enabled` 默认 false：
/// 未经操作员显式开启绝不自动打印。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintPolicy {
    #[serde(default)]
    pub auto_print_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_cut_enabled: bool,
    #[serde(default)]
    pub text_size: TextSize,
    #[serde(default)]
    pub encoding: ReceiptEncoding,
}

fn default_true() -> bool {
    true
}

impl Default for PrintPolicy {
    fn default() -> Self {
        Self {
            auto_print_enabled: false,
            auto_cut_enabled: true,
            text_size: TextSize::default(),
            encoding: ReceiptEncoding::default(),
        }
    }
}

/// 单次 run 的策略快照（只读）
#[derive(Debug, Clone)]
pub struct PolicyState {
    pub auto_print_enabled: bool,
    pub auto_cut_enabled: bool,
    pub text_size: TextSize,
    pub encoding: ReceiptEncoding,
    /// run 开始时读取的打印机连接状态
    pub printer_connected: bool,
}

/// 打印触发来源，转发给渲染器（自动打印的小票带标记）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintContext {
    Manual,
    AutoPrint,
}

/// Worker 单次 run 的结果，仅用于日志和测试断言
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 已有 run 在执行或 worker 未就绪
    Skipped,
    /// 队列为空
    QueueEmpty,
    /// 队列读取失败，下次触发重试
    StorageFailed,
    /// 打印机离线，队列保留
    PrinterOffline,
    /// 自动打印关闭，队列按策略丢弃
    PolicyDisabled { discarded: usize },
    /// 订单拉取失败，队列保留
    FetchFailed,
    /// 批次处理完成
    Completed {
        printed: usize,
        skipped: usize,
        failed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_fail_closed_default() {
        let policy = PrintPolicy::default();
        assert!(!policy.auto_print_enabled);
        assert!(policy.auto_cut_enabled);
    }

    #[test]
    fn test_policy_missing_fields_deserialize_closed() {
        // 老版本配置缺字段时不能意外开启自动打印
        let policy: PrintPolicy = serde_json::from_str("{}").unwrap();
        assert!(!policy.auto_print_enabled);
    }

    #[test]
    fn test_order_total() {
        let order = OrderRecord {
            id: "o1".into(),
            order_number: "0042".into(),
            customer_name: "Ana".into(),
            items: vec![
                OrderItem {
                    product_name: "Americano".into(),
                    quantity: 2,
                    unit_price_cents: 250,
                    notes: None,
                },
                OrderItem {
                    product_name: "Croissant".into(),
                    quantity: 1,
                    unit_price_cents: 180,
                    notes: Some("warm".into()),
                },
            ],
            created_at: 0,
        };
        assert_eq!(order.total_cents(), 680);
    }
}
