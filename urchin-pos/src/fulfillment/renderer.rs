//! Receipt renderer
//!
//! Renders an order into ESC/POS payload bytes for thermal printers.
//! The payload carries no INIT or cut framing; the printer station adds
//! those from the print parameters.

use chrono_tz::Tz;
use urchin_printer::EscPosBuilder;

use super::types::{OrderRecord, PolicyState, PrintContext};

/// Rendering boundary consumed by the print worker
///
/// Implementations must be pure: identical inputs produce identical
/// payloads.
pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, order: &OrderRecord, params: &PolicyState, context: PrintContext) -> Vec<u8>;
}

/// Default receipt renderer
///
/// Header with order number and timestamp, item lines with quantity and
/// price columns, total, and an unattended-print marker so staff can
/// tell an auto-printed ticket from a manual reprint.
pub struct TicketRenderer {
    width: usize,
    timezone: Tz,
}

impl TicketRenderer {
    /// Create a renderer with specified paper width and timezone
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize, timezone: Tz) -> Self {
        Self { width, timezone }
    }

    fn render_header(&self, b: &mut EscPosBuilder, order: &OrderRecord) {
        b.center();
        b.double_size();
        b.bold();
        b.line(&format!("#{}", order.order_number));
        b.bold_off();
        b.reset_size();

        if !order.customer_name.is_empty() {
            b.line(&order.customer_name);
        }
        b.line(&format_timestamp(order.created_at, self.timezone));

        b.left();
        b.sep_double();
    }

    fn render_items(&self, b: &mut EscPosBuilder, order: &OrderRecord) {
        for item in &order.items {
            let name = if item.quantity > 1 {
                format!("{} x{}", item.product_name, item.quantity)
            } else {
                item.product_name.clone()
            };
            let amount = format_cents(item.unit_price_cents * item.quantity as i64);

            b.line_lr(&name, &amount);

            if let Some(ref notes) = item.notes
                && !notes.is_empty()
            {
                b.line(&format!("   * {}", notes));
            }
        }

        b.sep_single();
        b.bold();
        b.line_lr("TOTAL", &format_cents(order.total_cents()));
        b.bold_off();
    }

    fn render_footer(&self, b: &mut EscPosBuilder, context: PrintContext) {
        if context == PrintContext::AutoPrint {
            b.newline();
            b.center();
            b.line("* auto *");
            b.left();
        }
    }
}

impl ReceiptRenderer for TicketRenderer {
    fn render(&self, order: &OrderRecord, _params: &PolicyState, context: PrintContext) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);

        self.render_header(&mut b, order);
        self.render_items(&mut b, order);
        self.render_footer(&mut b, context);

        b.build()
    }
}

impl Default for TicketRenderer {
    fn default() -> Self {
        Self::new(48, chrono_tz::Europe::Madrid)
    }
}

/// Format unix timestamp (millis) as MM-DD HH:mm:ss in the given timezone
fn format_timestamp(ts: i64, tz: Tz) -> String {
    if let Some(dt) = chrono::DateTime::from_timestamp_millis(ts) {
        dt.with_timezone(&tz).format("%m-%d %H:%M:%S").to_string()
    } else {
        "--".to_string()
    }
}

/// Format cents as a decimal amount
fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}
