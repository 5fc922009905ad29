//! # urchin-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - GBK encoding for Chinese printers (UTF-8 passthrough otherwise)
//! - Network printing (TCP port 9100)
//! - Last-known connection status monitoring
//! - Device-level duplicate-job suppression
//!
//! Business logic (WHAT to print) should stay in application code:
//! - Receipt rendering → urchin-pos
//!
//! ## Example
//!
//! ```ignore
//! use urchin_printer::{EscPosBuilder, ReceiptEncoding, TextSize, ThermalStation};
//!
//! // Build ESC/POS content
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.double_size();
//! builder.line("RECEIPT");
//! builder.reset_size();
//! builder.sep_double();
//! builder.left();
//! builder.line_lr("Americano x2", "5.00");
//!
//! // Send to the station, keyed so a resubmission never prints twice
//! let station = ThermalStation::new("192.168.1.100", 9100)?;
//! station
//!     .print(&builder.build(), true, TextSize::Small, ReceiptEncoding::Gbk, "order-1")
//!     .await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod printer;
mod station;

// Re-exports
pub use encoding::{ReceiptEncoding, convert_to_gbk, encode_payload, gbk_width, pad_gbk, truncate_gbk};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use printer::{NetworkPrinter, Printer};
pub use station::{ConnectionMonitor, PrinterStatus, TextSize, ThermalStation};
