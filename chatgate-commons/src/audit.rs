use std::fmt;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Category of an audited pipeline outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    AuthDenied,
    RateLimited,
    PolicyDenied,
    RoutingError,
    Execution,
}

impl AuditEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthDenied => "auth_denied",
            Self::RateLimited => "rate_limited",
            Self::PolicyDenied => "policy_denied",
            Self::RoutingError => "routing_error",
            Self::Execution => "execution",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AuditEventKind,
    pub user_id: i64,
    pub chat_id: i64,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub message: String,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, user_id: i64, chat_id: i64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            user_id,
            chat_id,
            command: String::new(),
            outcome: String::new(),
            message: String::new(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Single-line rendering used by file-backed sinks.
    ///
    /// Empty command and message fields are written as `-`. Quoted fields are
    /// escaped so one event always occupies exactly one line.
    pub fn to_line(&self) -> String {
        let command = if self.command.is_empty() {
            "-".to_string()
        } else {
            escape_field(&self.command)
        };
        let message = if self.message.is_empty() {
            "-".to_string()
        } else {
            escape_field(&self.message)
        };
        format!(
            "{} {} user={} chat={} cmd=\"{}\" outcome=\"{}\" msg=\"{}\"",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.kind,
            self.user_id,
            self.chat_id,
            command,
            escape_field(&self.outcome),
            message
        )
    }
}

fn escape_field(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            ch if ch.is_control() => escaped.extend(ch.escape_unicode()),
            ch => escaped.push(ch),
        }
    }
    escaped
}

/// Receives audit events from the pipeline.
///
/// Delivery is fire-and-forget from the caller's point of view: a returned
/// error is logged and never aborts request processing.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Sink that drops every event. Used when no audit file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) -> Result<()> {
        Ok(())
    }
}
