//! Auto-print policy gate
//!
//! Decides whether a fulfillment run may print at all, and with which
//! parameters. Reads the persisted policy and the last-known printer
//! connectivity; never writes either.

use super::storage::FulfillmentStorage;
use super::types::{PolicyState, PrintPolicy};
use urchin_printer::PrinterStatus;

/// Policy gate
///
/// Fail-closed: an absent or unreadable policy evaluates to auto-print
/// disabled. Enabling auto-print requires an explicit operator opt-in
/// persisted through the service.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    storage: FulfillmentStorage,
    printer_status: PrinterStatus,
}

impl PolicyGate {
    pub fn new(storage: FulfillmentStorage, printer_status: PrinterStatus) -> Self {
        Self {
            storage,
            printer_status,
        }
    }

    /// Snapshot the policy and printer connectivity for one run
    pub fn evaluate(&self) -> PolicyState {
        let policy = match self.storage.load_policy() {
            Ok(Some(policy)) => policy,
            Ok(None) => PrintPolicy::default(),
            Err(e) => {
                // Corrupt or unreadable config falls back to disabled
                // instead of taking the worker down
                tracing::warn!(error = %e, "Failed to load print policy, auto-print disabled");
                PrintPolicy::default()
            }
        };

        PolicyState {
            auto_print_enabled: policy.auto_print_enabled,
            auto_cut_enabled: policy.auto_cut_enabled,
            text_size: policy.text_size,
            encoding: policy.encoding,
            printer_connected: self.printer_status.is_connected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_saved_evaluates_disabled() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        let status = PrinterStatus::new();
        status.set_connected(true);

        let gate = PolicyGate::new(storage, status);
        let state = gate.evaluate();

        assert!(!state.auto_print_enabled);
        assert!(state.printer_connected);
    }

    #[test]
    fn test_saved_policy_and_fresh_connectivity() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        storage
            .save_policy(&PrintPolicy {
                auto_print_enabled: true,
                ..Default::default()
            })
            .unwrap();

        let status = PrinterStatus::new();
        let gate = PolicyGate::new(storage, status.clone());

        assert!(!gate.evaluate().printer_connected);

        status.set_connected(true);
        let state = gate.evaluate();
        assert!(state.auto_print_enabled);
        assert!(state.printer_connected);
    }
}
