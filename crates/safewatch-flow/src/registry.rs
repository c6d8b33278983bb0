//! Display URL registry.
//!
//! Local stand-in for object URLs: every allocation must be matched by a
//! revocation, and the live count is observable so leaks show up in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;
use uuid::Uuid;

use safewatch_models::{DisplayUrl, LOCAL_URL_PREFIX};

/// Media reachable through a local display URL.
#[derive(Debug, Clone)]
pub struct RegisteredMedia {
    pub mime: String,
    pub data: Arc<[u8]>,
}

#[derive(Debug, Default)]
pub struct DisplayUrlRegistry {
    entries: Mutex<HashMap<DisplayUrl, RegisteredMedia>>,
}

impl DisplayUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new URL for `data`.
    pub fn allocate(&self, data: Arc<[u8]>, mime: &str) -> DisplayUrl {
        let url = DisplayUrl::new(format!("{}{}", LOCAL_URL_PREFIX, Uuid::new_v4()));
        self.entries().insert(
            url.clone(),
            RegisteredMedia {
                mime: mime.to_string(),
                data,
            },
        );
        trace!(url = %url, "Allocated display URL");
        url
    }

    /// Release a URL. Returns false if it was not live (or not local).
    pub fn revoke(&self, url: &DisplayUrl) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            trace!(url = %url, "Revoked display URL");
        }
        removed
    }

    pub fn resolve(&self, url: &DisplayUrl) -> Option<RegisteredMedia> {
        self.entries().get(url).cloned()
    }

    pub fn is_live(&self, url: &DisplayUrl) -> bool {
        self.entries().contains_key(url)
    }

    /// Number of URLs allocated and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    /// Release everything. Returns how many URLs were live.
    pub fn revoke_all(&self) -> usize {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        count
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DisplayUrl, RegisteredMedia>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
