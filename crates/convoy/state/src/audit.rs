//! Append-only audit sink with optional file persistence.
//!
//! Every event is always recorded in-process. When persistence is
//! enabled, each event is additionally appended as one JSON line to
//! `<log_dir>/audit.log`; the file is never rewritten. Persistence I/O
//! failures are logged as warnings; auditing must never abort an
//! orchestration.

use std::path::PathBuf;
use std::sync::Mutex;

use convoy_types::AuditEvent;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// In-process audit buffer plus optional on-disk log.
pub struct AuditSink {
    events: Mutex<Vec<AuditEvent>>,
    log_path: Option<PathBuf>,
}

impl AuditSink {
    /// Sink writing to `<log_dir>/audit.log` when `log_dir` is given.
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            log_path: log_dir.map(|dir| dir.join("audit.log")),
        }
    }

    /// Record an event, appending to the persisted log when enabled.
    pub async fn record(&self, event: AuditEvent) {
        let line = serde_json::to_string(&event).ok();

        self.events
            .lock()
            .expect("audit buffer poisoned")
            .push(event);

        let (Some(path), Some(line)) = (&self.log_path, line) else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %path.display(), error = %e, "could not create audit log directory");
                return;
            }
        }

        let result = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await;

        match result {
            Ok(mut file) => {
                let mut buf = line.into_bytes();
                buf.push(b'\n');
                if let Err(e) = file.write_all(&buf).await {
                    warn!(path = %path.display(), error = %e, "audit log append failed");
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open audit log");
            }
        }
    }

    /// Snapshot of every event recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit buffer poisoned").clone()
    }
}
