//! Background Print Fulfillment Pipeline
//!
//! Turns queued order ids into printed receipts on a thermal printer,
//! at most once per order:
//! - durable FIFO queue + printed ledger (redb), crash-surviving
//! - policy gate (operator opt-in, fail-closed) read fresh per run
//! - one serialized worker behind a run-lock; triggers never stack
//! - startup / foreground / interval triggers converging on one entry point

pub mod policy;
pub mod renderer;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

pub use policy::PolicyGate;
pub use renderer::{ReceiptRenderer, TicketRenderer};
pub use scheduler::{AppLifecycle, PrintScheduler, SchedulerConfig};
pub use service::{FulfillmentPipeline, FulfillmentService, FulfillmentStats};
pub use storage::{FulfillmentStorage, StorageError, StorageResult};
pub use types::*;
pub use worker::{OrderSource, PrintWorker, PrinterConnection, SourceError};
