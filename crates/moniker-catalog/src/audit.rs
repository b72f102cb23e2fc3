//! Append-only audit trail for mutating registry operations.
//!
//! Appends never fail the operation that produced them: the log is a
//! bounded in-memory ring, and when it is full the oldest entries are
//! dropped and counted so operators can alarm on audit loss.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Default ring capacity.
const DEFAULT_CAPACITY: usize = 10_000;

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    NodeAdded,
    NodeRemoved,
    BindingChanged,
    StatusChanged,
    CatalogReloaded,
    ReloadRejected,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub path: String,
    pub kind: AuditKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(actor: impl Into<String>, path: impl Into<String>, kind: AuditKind) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            path: path.into(),
            kind,
            before: None,
            after: None,
            reason: None,
        }
    }

    /// Records the before/after values of the change.
    #[must_use]
    pub fn with_change(
        mut self,
        before: Option<impl Into<String>>,
        after: Option<impl Into<String>>,
    ) -> Self {
        self.before = before.map(Into::into);
        self.after = after.map(Into::into);
        self
    }

    /// Records a free-form reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Bounded in-memory audit ring.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl AuditLog {
    /// Creates a log holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn append(&self, entry: AuditEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        entries.push_back(entry);
    }

    /// Returns entries, newest last, optionally filtered by path and capped.
    #[must_use]
    pub fn entries(&self, path: Option<&str>, limit: Option<usize>) -> Vec<AuditEntry> {
        let entries = self.entries.lock();
        let filtered: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| path.map_or(true, |p| e.path == p))
            .cloned()
            .collect();
        match limit {
            Some(limit) if filtered.len() > limit => {
                filtered[filtered.len() - limit..].to_vec()
            }
            _ => filtered,
        }
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries lost to the capacity bound.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
