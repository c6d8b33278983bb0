//! Upload progress tracking.
//!
//! Byte progress of the request body maps onto `0..=UPLOAD_PHASE_MAX`.
//! Receiving response headers moves to `HEADERS_RECEIVED`, and only a fully
//! read successful body reaches `COMPLETE`. Values never decrease.

use std::sync::Arc;

use tokio::sync::watch;

/// Ceiling for the request-body phase.
pub const UPLOAD_PHASE_MAX: u8 = 90;
/// Response headers have arrived.
pub const HEADERS_RECEIVED: u8 = 95;
/// Response body fully received.
pub const COMPLETE: u8 = 100;

/// Callback invoked with every new progress value.
pub type ProgressObserver = Arc<dyn Fn(u8) + Send + Sync + 'static>;

/// Monotonic progress for one upload.
#[derive(Clone)]
pub struct UploadProgress {
    tx: Arc<watch::Sender<u8>>,
    observer: Option<ProgressObserver>,
}

impl UploadProgress {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            tx: Arc::new(tx),
            observer: None,
        }
    }

    /// Progress that also reports every change to `observer`.
    pub fn with_observer(observer: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            observer: Some(Arc::new(observer)),
            ..Self::new()
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }

    /// Record `sent` of `total` body bytes handed to the transport.
    pub fn record_bytes(&self, sent: u64, total: u64) {
        let value = if total == 0 {
            UPLOAD_PHASE_MAX
        } else {
            (sent.min(total) * u64::from(UPLOAD_PHASE_MAX) / total) as u8
        };
        self.advance(value);
    }

    pub fn headers_received(&self) {
        self.advance(HEADERS_RECEIVED);
    }

    pub fn complete(&self) {
        self.advance(COMPLETE);
    }

    fn advance(&self, value: u8) {
        let value = value.min(COMPLETE);
        let changed = self.tx.send_if_modified(|current| {
            if value > *current {
                *current = value;
                true
            } else {
                false
            }
        });

        if changed {
            if let Some(observer) = &self.observer {
                observer(value);
            }
        }
    }
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UploadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadProgress")
            .field("current", &self.current())
            .finish()
    }
}
