//! In-memory adapters for wiring the shared traits into tests.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};

/// Collects audit events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<AuditEventKind> {
        self.events.lock().iter().map(|event| event.kind).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
