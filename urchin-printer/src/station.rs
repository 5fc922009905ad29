//! Stateful printer station
//!
//! Wraps a raw [`Printer`] with the state the application layer relies on:
//! - a last-known connection status, refreshed by a background monitor so
//!   reads never block on the network,
//! - a duplicate-job guard keyed by a caller-supplied job key, so the same
//!   logical ticket is never physically printed twice even if the caller
//!   resubmits it.

use crate::encoding::{ReceiptEncoding, encode_payload};
use crate::error::PrintResult;
use crate::printer::{NetworkPrinter, Printer};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Keep submitted job keys for 24h before pruning
const JOB_KEY_TTL_SECS: u64 = 24 * 60 * 60;
/// Prune the job-key table once it grows past this
const JOB_KEY_PRUNE_THRESHOLD: usize = 1024;

/// Base text size for a print job, persisted as part of the print policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl TextSize {
    /// GS ! n argument for this size
    fn size_byte(self) -> u8 {
        match self {
            TextSize::Small => 0x00,  // normal
            TextSize::Medium => 0x01, // double height
            TextSize::Large => 0x11,  // double width + height
        }
    }
}

/// Last-known printer connection status
///
/// Written by the [`ConnectionMonitor`], read by anyone. Starts out
/// disconnected until the first probe succeeds.
#[derive(Debug, Clone, Default)]
pub struct PrinterStatus {
    connected: Arc<AtomicBool>,
}

impl PrinterStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of the last-known state
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

/// Background probe loop keeping a [`PrinterStatus`] current
///
/// Periodically checks reachability and records the result. Transitions
/// are logged; repeated failures only bump a counter to avoid log spam.
pub struct ConnectionMonitor<P: Printer> {
    printer: P,
    status: PrinterStatus,
    probe_interval: Duration,
}

impl<P: Printer> ConnectionMonitor<P> {
    pub fn new(printer: P, status: PrinterStatus, probe_interval: Duration) -> Self {
        Self {
            printer,
            status,
            probe_interval,
        }
    }

    /// Run the probe loop until the token is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_ms = self.probe_interval.as_millis() as u64, "Printer monitor started");
        let mut ticker = tokio::time::interval(self.probe_interval);
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Printer monitor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let online = self.printer.is_online().await;
                    let was_online = self.status.is_connected();
                    self.status.set_connected(online);

                    if online {
                        if !was_online {
                            info!("Printer connection restored");
                        }
                        consecutive_failures = 0;
                    } else {
                        consecutive_failures += 1;
                        if was_online {
                            warn!("Printer connection lost");
                        } else if consecutive_failures % 10 == 0 {
                            warn!(failures = consecutive_failures, "Printer still unreachable");
                        }
                    }
                }
            }
        }
    }
}

/// Stateful thermal printer handle
///
/// Frames each payload with INIT + base text size up front and feed/cut
/// at the end, encodes it for the configured code page and ships it to
/// the underlying printer. A job key already seen is silently treated as
/// printed (the physical output exists, whatever the caller thinks).
pub struct ThermalStation<P: Printer = NetworkPrinter> {
    printer: P,
    status: PrinterStatus,
    submitted: DashMap<String, std::time::Instant>,
}

impl ThermalStation<NetworkPrinter> {
    /// Create a station for a network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        Ok(Self::with_printer(NetworkPrinter::new(host, port)?))
    }
}

impl<P: Printer> ThermalStation<P> {
    /// Create a station around an existing printer adapter
    pub fn with_printer(printer: P) -> Self {
        Self {
            printer,
            status: PrinterStatus::new(),
            submitted: DashMap::new(),
        }
    }

    /// Status handle shared with the [`ConnectionMonitor`]
    pub fn status(&self) -> PrinterStatus {
        self.status.clone()
    }

    /// Non-blocking last-known connectivity
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Whether a job key has already been submitted to the device
    pub fn was_submitted(&self, job_key: &str) -> bool {
        self.submitted.contains_key(job_key)
    }

    /// Print a rendered payload, at most once per job key
    ///
    /// The key is recorded only after the device accepted the job, so a
    /// failed submission stays retryable.
    #[instrument(skip(self, data), fields(job_key = %job_key, bytes = data.len()))]
    pub async fn print(
        &self,
        data: &[u8],
        auto_cut: bool,
        text_size: TextSize,
        encoding: ReceiptEncoding,
        job_key: &str,
    ) -> PrintResult<()> {
        if self.submitted.contains_key(job_key) {
            warn!("Duplicate job suppressed at device layer");
            return Ok(());
        }

        let mut framed = Vec::with_capacity(data.len() + 16);
        // ESC @ - initialize
        framed.extend_from_slice(&[0x1B, 0x40]);
        // GS ! n - base character size
        framed.extend_from_slice(&[0x1D, 0x21, text_size.size_byte()]);
        framed.extend_from_slice(data);
        if auto_cut {
            // GS V 66 n - feed then full cut, printer manages head-to-cutter gap
            framed.extend_from_slice(&[0x1D, 0x56, 0x42, 3]);
        } else {
            // ESC d n - feed only, tear-off
            framed.extend_from_slice(&[0x1B, 0x64, 4]);
        }

        let wire = encode_payload(&framed, encoding);
        self.printer.print(&wire).await?;

        self.submitted.insert(job_key.to_string(), std::time::Instant::now());
        self.prune_job_keys();
        Ok(())
    }

    fn prune_job_keys(&self) {
        if self.submitted.len() <= JOB_KEY_PRUNE_THRESHOLD {
            return;
        }
        let ttl = Duration::from_secs(JOB_KEY_TTL_SECS);
        self.submitted.retain(|_, submitted_at| submitted_at.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrintError;
    use std::sync::Mutex;

    /// Printer that records payloads and can be told to fail
    struct FakePrinter {
        jobs: Mutex<Vec<Vec<u8>>>,
        fail: AtomicBool,
    }

    impl FakePrinter {
        fn new() -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl Printer for &FakePrinter {
        async fn print(&self, data: &[u8]) -> PrintResult<()> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(PrintError::Offline("fake".into()));
            }
            self.jobs.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn is_online(&self) -> bool {
            !self.fail.load(Ordering::Relaxed)
        }
    }

    #[tokio::test]
    async fn test_duplicate_job_key_prints_once() {
        let fake = FakePrinter::new();
        let station = ThermalStation::with_printer(&fake);

        station
            .print(b"ticket", true, TextSize::Small, ReceiptEncoding::Utf8, "order-1")
            .await
            .unwrap();
        station
            .print(b"ticket", true, TextSize::Small, ReceiptEncoding::Utf8, "order-1")
            .await
            .unwrap();

        assert_eq!(fake.jobs.lock().unwrap().len(), 1);
        assert!(station.was_submitted("order-1"));
    }

    #[tokio::test]
    async fn test_failed_job_stays_retryable() {
        let fake = FakePrinter::new();
        let station = ThermalStation::with_printer(&fake);

        fake.fail.store(true, Ordering::Relaxed);
        assert!(
            station
                .print(b"ticket", false, TextSize::Small, ReceiptEncoding::Utf8, "order-2")
                .await
                .is_err()
        );
        assert!(!station.was_submitted("order-2"));

        fake.fail.store(false, Ordering::Relaxed);
        station
            .print(b"ticket", false, TextSize::Small, ReceiptEncoding::Utf8, "order-2")
            .await
            .unwrap();
        assert_eq!(fake.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_framing_init_size_cut() {
        let fake = FakePrinter::new();
        let station = ThermalStation::with_printer(&fake);

        station
            .print(b"x", true, TextSize::Large, ReceiptEncoding::Utf8, "order-3")
            .await
            .unwrap();

        let jobs = fake.jobs.lock().unwrap();
        let wire = &jobs[0];
        assert_eq!(&wire[..5], &[0x1B, 0x40, 0x1D, 0x21, 0x11]);
        assert_eq!(&wire[wire.len() - 4..], &[0x1D, 0x56, 0x42, 3]);
    }

    #[test]
    fn test_status_defaults_disconnected() {
        let status = PrinterStatus::new();
        assert!(!status.is_connected());
        status.set_connected(true);
        assert!(status.is_connected());
    }
}
