//! Shared contracts reused across the chatgate crates. The wire types in
//! [`api`] are the exact JSON shape exchanged between the broker and a
//! forwarding agent, so every executor (local, static or remote) speaks the
//! same request/response vocabulary.

pub mod api;
pub mod audit;
pub mod paths;
pub mod reference;

pub use api::{AllowedCommand, CommandRequest, CommandResponse, IntentDecision};
pub use audit::{AuditEvent, AuditEventKind, AuditSink, NoopAuditSink};
pub use paths::{canonicalize_or_self, is_within, normalize_path};
pub use reference::MemoryAuditSink;
