use chrono::{DateTime, Duration, Utc};
use memex_rs_memory::extractor::default_dimensions;
use memex_rs_memory::{
    Dimensions, MemoryId, MemoryRecord, MemoryStatus, MemoryType, Scope,
};

/// Fixture builder for memory records.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    scope: Scope,
    memory_type: MemoryType,
    text: String,
    id: Option<MemoryId>,
    dimensions: Dimensions,
    status: MemoryStatus,
    last_used_days_ago: i64,
    expires_in: Option<Duration>,
    supersedes: Option<MemoryId>,
}

impl RecordBuilder {
    /// Active record in `generic/default` with the type's default dimensions.
    pub fn new(memory_type: MemoryType, text: impl Into<String>) -> Self {
        Self {
            scope: Scope::new("generic", "default"),
            memory_type,
            text: text.into(),
            id: None,
            dimensions: default_dimensions(memory_type),
            status: MemoryStatus::Active,
            last_used_days_ago: 0,
            expires_in: None,
            supersedes: None,
        }
    }

    pub fn scope(mut self, platform: &str, namespace: &str) -> Self {
        self.scope = Scope::new(platform, namespace);
        self
    }

    pub fn id(mut self, id: impl Into<MemoryId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn status(mut self, status: MemoryStatus) -> Self {
        self.status = status;
        self
    }

    /// Backdate creation and last use by `days`.
    pub fn used_days_ago(mut self, days: i64) -> Self {
        self.last_used_days_ago = days;
        self
    }

    /// Expiry relative to the build time; negative durations are already past.
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = Some(duration);
        self
    }

    pub fn supersedes(mut self, id: impl Into<MemoryId>) -> Self {
        self.supersedes = Some(id.into());
        self
    }

    pub fn build(self) -> MemoryRecord {
        self.build_at(Utc::now())
    }

    pub fn build_at(self, now: DateTime<Utc>) -> MemoryRecord {
        let used_at = now - Duration::days(self.last_used_days_ago);
        let mut record = MemoryRecord::new(&self.scope, self.memory_type, self.text, used_at);
        if let Some(id) = self.id {
            record.meta.id = id;
        }
        record.meta.dimensions = self.dimensions;
        record.meta.lifecycle.status = self.status;
        record.meta.lifecycle.expires_at = self.expires_in.map(|duration| now + duration);
        record.meta.relations.supersedes = self.supersedes;
        record
    }
}
