//! Urchin POS - 零售订单管理应用核心
//!
//! # 架构概述
//!
//! 本模块是应用的 Rust 核心，UI 宿主通过进程内调用接入。
//! 核心职责是后台小票打印流水线：
//!
//! - **打印流水线** (`fulfillment`): 队列、账本、策略门、Worker、调度器
//! - **订单后端** (`client`): 按 ID 批量拉取订单快照
//! - **配置** (`core`): 环境变量驱动的运行参数
//!
//! # 模块结构
//!
//! ```text
//! urchin-pos/src/
//! ├── core/          # 配置
//! ├── fulfillment/   # 后台打印流水线
//! ├── client.rs      # 订单后端 HTTP 客户端
//! └── utils/         # 日志
//! ```
//!
//! 设备层（ESC/POS、网络打印、连接监控、任务去重）在 `urchin-printer`。

pub mod client;
pub mod core;
pub mod fulfillment;
pub mod utils;

// Re-export 公共类型
pub use client::BackendClient;
pub use crate::core::Config;
pub use fulfillment::{
    AppLifecycle, FulfillmentPipeline, FulfillmentService, PrintPolicy, PrintWorker, RunOutcome,
};
