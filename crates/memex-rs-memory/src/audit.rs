//! Append-only audit trail of memory decisions.

use crate::error::MemoryError;
use crate::model::{MemoryId, Scope};
use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Default audit file name.
pub const AUDIT_FILENAME: &str = "audit.jsonl";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Write,
    Filtered,
    Supersede,
    Recall,
    Inject,
    Error,
    Expire,
    Delete,
    Purge,
    Mask,
    Compact,
}

/// One audit line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(default)]
    pub memory_id: Option<MemoryId>,
    #[serde(default)]
    pub scope: Option<String>,
    pub detail: String,
}

impl AuditEntry {
    pub fn new(action: AuditAction, detail: impl Into<String>) -> Self {
        Self {
            id: format!("audit_{}", Uuid::new_v4().simple()),
            at: Utc::now(),
            action,
            memory_id: None,
            scope: None,
            detail: detail.into(),
        }
    }

    pub fn with_memory(mut self, id: impl Into<MemoryId>) -> Self {
        self.memory_id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: &Scope) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
    /// Append an entry.
    fn record(&self, entry: AuditEntry) -> Result<(), MemoryError>;
    /// Read back every entry in append order.
    fn entries(&self) -> Result<Vec<AuditEntry>, MemoryError>;
}

/// JSONL audit log on disk.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), MemoryError> {
        let serialized = serde_json::to_string(&entry)?;
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{serialized}")?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, MemoryError> {
        let _guard = self.lock.lock();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(trimmed) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!("invalid audit entry ignored: {err}"),
            }
        }
        Ok(entries)
    }
}

/// Audit log held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), MemoryError> {
        self.entries.lock().push(entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, MemoryError> {
        Ok(self.entries.lock().clone())
    }
}

/// Sink that drops everything; used when auditing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

impl AuditSink for NullAuditLog {
    fn record(&self, _entry: AuditEntry) -> Result<(), MemoryError> {
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, MemoryError> {
        Ok(Vec::new())
    }
}
