//! Durable record storage.

mod compression;
mod file;
mod memory;
mod tiered;

pub use compression::{
    KEYWORD_LIMIT, MEDIUM_MAX_CHARS, SUMMARY_MAX_CHARS, compress, decompress,
};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use tiered::TieredStore;

use crate::error::MemoryError;
use crate::model::{MemoryFilter, MemoryRecord, MemoryStatus, new_memory_id};
use crate::text::text_similarity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Records at or above this similarity are treated as the same memory.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Records moved between tiers by one compaction cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub to_warm: usize,
    pub to_cold: usize,
}

impl CompactionReport {
    pub fn moved(&self) -> usize {
        self.to_warm + self.to_cold
    }
}

/// Storage backend for memory records.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a new record, assigning an id when it has none.
    async fn add(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError>;

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError>;

    /// Overwrite an existing record.
    async fn update(&self, record: MemoryRecord) -> Result<(), MemoryError>;

    /// Physically remove a record. Returns false when it did not exist.
    async fn purge(&self, id: &str) -> Result<bool, MemoryError>;

    /// Records matching `filter`, oldest first.
    async fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), MemoryError>;

    /// Tombstone a record by setting its status to `deleted`.
    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let Some(mut record) = self.get(id).await? else {
            return Ok(false);
        };
        record.set_status(MemoryStatus::Deleted, Utc::now());
        self.update(record).await?;
        Ok(true)
    }

    /// First active record in the same scope whose text is at least
    /// `SIMILARITY_THRESHOLD` similar to `record`.
    async fn find_similar(
        &self,
        record: &MemoryRecord,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let text = record.full_text();
        let existing = self
            .query(&MemoryFilter::active_in(&record.scope()))
            .await?;
        Ok(existing.into_iter().find(|candidate| {
            candidate.meta.id != record.meta.id
                && text_similarity(text, candidate.full_text()) >= SIMILARITY_THRESHOLD
        }))
    }

    /// Periodic maintenance; tiered stores migrate stale records down.
    async fn compact(&self, _now: DateTime<Utc>) -> Result<CompactionReport, MemoryError> {
        Ok(CompactionReport::default())
    }
}

/// Assign an id if missing and check the fields used as storage keys.
pub(crate) fn prepare_new(mut record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
    if record.meta.id.trim().is_empty() {
        record.meta.id = new_memory_id();
    }
    validate_record(&record)?;
    Ok(record)
}

pub(crate) fn validate_record(record: &MemoryRecord) -> Result<(), MemoryError> {
    for (field, value) in [
        ("meta.id", &record.meta.id),
        ("meta.platform", &record.meta.platform),
        ("meta.namespace", &record.meta.namespace),
    ] {
        if !is_safe_key(value) {
            return Err(MemoryError::InvalidRecord(format!(
                "{field} must be a non-empty path-safe name, got {value:?}"
            )));
        }
    }
    Ok(())
}

fn is_safe_key(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value
            .chars()
            .any(|ch| matches!(ch, '/' | '\\' | ':' | '\0') || ch.is_control())
}

/// Sort records by creation time, then id.
pub(crate) fn sort_oldest_first(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| {
        a.meta
            .lifecycle
            .created_at
            .cmp(&b.meta.lifecycle.created_at)
            .then_with(|| a.meta.id.cmp(&b.meta.id))
    });
}

#[cfg(test)]
mod tests {
    use super::{InMemoryStore, MemoryStore, prepare_new};
    use crate::error::MemoryError;
    use crate::model::{MemoryRecord, MemoryStatus, MemoryType, Scope};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn prepare_new_assigns_ids_and_rejects_unsafe_keys() {
        let now = Utc::now();
        let mut record = MemoryRecord::new(&Scope::new("generic", "default"), MemoryType::Core, "x", now);
        record.meta.id.clear();
        let record = prepare_new(record).expect("prepared");
        assert!(record.meta.id.starts_with("mem_"));

        let escaping = MemoryRecord::new(&Scope::new("generic", "../etc"), MemoryType::Core, "x", now);
        assert!(matches!(prepare_new(escaping), Err(MemoryError::InvalidRecord(_))));
    }

    #[tokio::test]
    async fn find_similar_returns_first_active_match_in_scope() {
        let store = InMemoryStore::new();
        let scope = Scope::new("generic", "default");
        let now = Utc::now();
        let older = MemoryRecord::new(&scope, MemoryType::Persona, "I like green tea a lot", now);
        let mut newer = MemoryRecord::new(&scope, MemoryType::Persona, "I like green tea a lot", now);
        newer.meta.lifecycle.created_at = now + Duration::seconds(1);
        let other_scope = MemoryRecord::new(
            &Scope::new("openai", "default"),
            MemoryType::Persona,
            "I like green tea a lot",
            now,
        );
        let older = store.add(older).await.expect("older");
        store.add(newer).await.expect("newer");
        store.add(other_scope).await.expect("other");

        let probe = MemoryRecord::new(&scope, MemoryType::Persona, "i like green tea a LOT", now);
        let found = store.find_similar(&probe).await.expect("find").expect("match");
        assert_eq!(found.meta.id, older.meta.id);

        let unrelated = MemoryRecord::new(&scope, MemoryType::Persona, "I like black coffee", now);
        assert_eq!(store.find_similar(&unrelated).await.expect("find"), None);
    }

    #[tokio::test]
    async fn delete_tombstones_instead_of_removing() {
        let store = InMemoryStore::new();
        let record = MemoryRecord::new(&Scope::new("generic", "default"), MemoryType::Core, "x", Utc::now());
        let record = store.add(record).await.expect("add");
        assert!(store.delete(&record.meta.id).await.expect("delete"));
        let stored = store.get(&record.meta.id).await.expect("get").expect("exists");
        assert_eq!(stored.status(), MemoryStatus::Deleted);
        assert!(!store.delete("mem_missing").await.expect("delete missing"));
    }
}
