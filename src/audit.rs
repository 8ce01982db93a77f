//! Audit trail for denials and upstream failures.
//!
//! Persistent audit storage belongs to the host. The core only emits
//! [`AuditEntry`] values to an [`AuditSink`]; the default sink forwards them to
//! the `log` facade.

use log::{error, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditSeverity::Info => write!(f, "Info"),
            AuditSeverity::Warning => write!(f, "Warning"),
            AuditSeverity::Error => write!(f, "Error"),
        }
    }
}

/// One audited event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub severity: AuditSeverity,
    pub message: String,
    pub tenant: String,
    /// Operation that produced the entry, e.g. `graph_get`
    pub api: String,
    pub username: String,
}

impl AuditEntry {
    pub fn new(
        severity: AuditSeverity,
        message: impl Into<String>,
        tenant: impl Into<String>,
        api: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            tenant: tenant.into(),
            api: api.into(),
            username: crate::principal::SYSTEM_ACTOR.to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}

/// Receiver of audit entries. Must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Writes entries through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, entry: AuditEntry) {
        match entry.severity {
            AuditSeverity::Info => info!(
                "audit [{}] tenant={} user={}: {}",
                entry.api, entry.tenant, entry.username, entry.message
            ),
            AuditSeverity::Warning => warn!(
                "audit [{}] tenant={} user={}: {}",
                entry.api, entry.tenant, entry.username, entry.message
            ),
            AuditSeverity::Error => error!(
                "audit [{}] tenant={} user={}: {}",
                entry.api, entry.tenant, entry.username, entry.message
            ),
        }
    }
}

/// Keeps the most recent entries in memory.
#[derive(Debug, Clone)]
pub struct MemoryAuditSink {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Entries oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Up to `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        self.entries().into_iter().rev().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}
