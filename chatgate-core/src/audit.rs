use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chatgate_commons::{AuditEvent, AuditSink, NoopAuditSink};
use chatgate_config::AuditConfig;
use parking_lot::Mutex;
use tracing::{info, warn};

/// Appends one line per event to a file readable only by its owner.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(&path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let line = event.to_line();
        let mut file = self.file.lock();
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append to audit log {}", self.path.display()))
    }

    fn flush(&self) -> Result<()> {
        self.file.lock().flush().context("Failed to flush audit log")
    }
}

/// Builds the configured sink. A missing path, or a file that cannot be
/// opened, yields a sink that drops events.
pub fn audit_sink_from_config(config: &AuditConfig) -> Arc<dyn AuditSink> {
    let Some(path) = &config.file_path else {
        return Arc::new(NoopAuditSink);
    };
    match FileAuditSink::open(path) {
        Ok(sink) => {
            info!(path = %path.display(), "audit log enabled");
            Arc::new(sink)
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "audit log disabled");
            Arc::new(NoopAuditSink)
        }
    }
}
