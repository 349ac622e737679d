//! Receipt handle issuance and resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::core::actor::MessageHandle;
use crate::error::{Error, Result};
use crate::types::MessageId;

struct Entry {
    message: Arc<MessageHandle>,
    /// Receive generation at mint time. The handle resolves only while this
    /// matches the message's current count.
    generation: u32,
}

/// Per-queue table of outstanding receipt handles.
///
/// Handles are opaque random strings, never reused. When a message is
/// received again after a visibility expiry, the new handle supersedes the
/// old one: issuing prunes the superseded entry via the reverse map, and the
/// generation check rejects anything that slips through.
pub struct ReceiptTable {
    inner: Mutex<Tables>,
}

struct Tables {
    by_handle: HashMap<String, Entry>,
    /// Reverse lookup: message id to its latest handle.
    current: HashMap<MessageId, String>,
}

impl ReceiptTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables {
                by_handle: HashMap::new(),
                current: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint a fresh handle for a message that just went in-flight.
    pub fn issue(&self, message: Arc<MessageHandle>) -> String {
        let handle = Uuid::new_v4().to_string();
        let generation = message.generation();
        let mut tables = self.lock();
        if let Some(superseded) = tables
            .current
            .insert(message.message_id.clone(), handle.clone())
        {
            tables.by_handle.remove(&superseded);
        }
        tables.by_handle.insert(handle.clone(), Entry { message, generation });
        handle
    }

    /// Resolve a handle to its message, failing when the handle is unknown
    /// or no longer the latest one.
    pub fn resolve(&self, handle: &str) -> Result<Arc<MessageHandle>> {
        let tables = self.lock();
        let entry = tables
            .by_handle
            .get(handle)
            .ok_or(Error::ReceiptHandleIsInvalid)?;
        if entry.message.generation() != entry.generation {
            return Err(Error::ReceiptHandleIsInvalid);
        }
        Ok(entry.message.clone())
    }

    /// Remove a handle. Idempotent.
    pub fn revoke(&self, handle: &str) {
        let mut tables = self.lock();
        if let Some(entry) = tables.by_handle.remove(handle) {
            let is_current = tables
                .current
                .get(&entry.message.message_id)
                .is_some_and(|current| current.as_str() == handle);
            if is_current {
                tables.current.remove(&entry.message.message_id);
            }
        }
    }

    /// Drop every handle.
    pub fn clear(&self) {
        let mut tables = self.lock();
        tables.by_handle.clear();
        tables.current.clear();
    }

    /// Number of live handles; approximates the in-flight message count.
    pub fn len(&self) -> usize {
        self.lock().by_handle.len()
    }

    /// True when no handle is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReceiptTable {
    fn default() -> Self {
        Self::new()
    }
}
