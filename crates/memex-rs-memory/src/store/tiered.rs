use super::{
    CompactionReport, FileStore, InMemoryStore, MemoryStore, compress, decompress, prepare_new,
    sort_oldest_first,
};
use crate::error::MemoryError;
use crate::model::{MemoryFilter, MemoryRecord, StorageTier};
use crate::policy::TierPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::path::Path;

const TIERS: [StorageTier; 3] = [StorageTier::Hot, StorageTier::Warm, StorageTier::Cold];

/// Store that keeps records in hot, warm, and cold tiers by age since last use.
///
/// Records are compressed to their tier's level on write. Reading a warm or
/// cold record promotes it back to hot.
#[derive(Debug)]
pub struct TieredStore<S> {
    hot: S,
    warm: S,
    cold: S,
    policy: TierPolicy,
}

impl<S: MemoryStore> TieredStore<S> {
    pub fn new(hot: S, warm: S, cold: S, policy: TierPolicy) -> Self {
        Self {
            hot,
            warm,
            cold,
            policy,
        }
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    /// Tier recorded on a stored record; untagged records count as hot.
    pub fn tier_of(record: &MemoryRecord) -> StorageTier {
        record.meta.storage_tier.unwrap_or(StorageTier::Hot)
    }

    fn tier(&self, tier: StorageTier) -> &S {
        match tier {
            StorageTier::Hot => &self.hot,
            StorageTier::Warm => &self.warm,
            StorageTier::Cold => &self.cold,
        }
    }

    async fn locate(&self, id: &str) -> Result<Option<(StorageTier, MemoryRecord)>, MemoryError> {
        for tier in TIERS {
            if let Some(record) = self.tier(tier).get(id).await? {
                return Ok(Some((tier, record)));
            }
        }
        Ok(None)
    }

    /// Move a record into `target`, compressed for that tier.
    async fn place(
        &self,
        record: &MemoryRecord,
        from: Option<StorageTier>,
        target: StorageTier,
    ) -> Result<MemoryRecord, MemoryError> {
        let mut placed = compress(record, target.compression());
        placed.meta.storage_tier = Some(target);
        match from {
            Some(current) if current == target => {
                self.tier(target).update(placed.clone()).await?;
            }
            Some(current) => {
                self.tier(target).add(placed.clone()).await?;
                self.tier(current).purge(&placed.meta.id).await?;
            }
            None => {
                placed = self.tier(target).add(placed).await?;
            }
        }
        Ok(placed)
    }
}

impl TieredStore<InMemoryStore> {
    pub fn in_memory(policy: TierPolicy) -> Self {
        Self::new(
            InMemoryStore::new(),
            InMemoryStore::new(),
            InMemoryStore::new(),
            policy,
        )
    }
}

impl TieredStore<FileStore> {
    /// File tiers under `{base}/hot`, `{base}/warm`, and `{base}/cold`.
    pub fn open_file(base: impl AsRef<Path>, policy: TierPolicy) -> Result<Self, MemoryError> {
        let base = base.as_ref();
        Ok(Self::new(
            FileStore::open(base.join(StorageTier::Hot.as_str()))?,
            FileStore::open(base.join(StorageTier::Warm.as_str()))?,
            FileStore::open(base.join(StorageTier::Cold.as_str()))?,
            policy,
        ))
    }
}

#[async_trait]
impl<S: MemoryStore> MemoryStore for TieredStore<S> {
    async fn add(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
        let record = prepare_new(record)?;
        if self.locate(&record.meta.id).await?.is_some() {
            return Err(MemoryError::DuplicateId(record.meta.id));
        }
        let target = self.policy.tier_for(&record, Utc::now());
        self.place(&record, None, target).await
    }

    /// Fetch a record, promoting warm and cold records to hot.
    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let Some((tier, mut record)) = self.locate(id).await? else {
            return Ok(None);
        };
        if tier == StorageTier::Hot {
            return Ok(Some(decompress(&record)));
        }
        record.touch(Utc::now());
        let promoted = self.place(&record, Some(tier), StorageTier::Hot).await?;
        debug!("promoted memory record (id={id}, from={})", tier.as_str());
        Ok(Some(promoted))
    }

    async fn update(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        let Some((current, _)) = self.locate(&record.meta.id).await? else {
            return Err(MemoryError::NotFound(record.meta.id));
        };
        let target = self.policy.tier_for(&record, Utc::now());
        self.place(&record, Some(current), target).await?;
        Ok(())
    }

    async fn purge(&self, id: &str) -> Result<bool, MemoryError> {
        for tier in TIERS {
            if self.tier(tier).purge(id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut records = Vec::new();
        for tier in TIERS {
            records.extend(self.tier(tier).query(filter).await?);
        }
        sort_oldest_first(&mut records);
        Ok(records)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        for tier in TIERS {
            self.tier(tier).clear().await?;
        }
        Ok(())
    }

    /// Re-evaluate hot and warm records and migrate stale ones down.
    async fn compact(&self, now: DateTime<Utc>) -> Result<CompactionReport, MemoryError> {
        let mut report = CompactionReport::default();
        for current in [StorageTier::Hot, StorageTier::Warm] {
            for record in self.tier(current).query(&MemoryFilter::all()).await? {
                let target = self.policy.tier_for(&record, now);
                if target <= current {
                    continue;
                }
                self.place(&record, Some(current), target).await?;
                match target {
                    StorageTier::Warm => report.to_warm += 1,
                    StorageTier::Cold => report.to_cold += 1,
                    StorageTier::Hot => {}
                }
            }
        }
        info!(
            "memory tiers compacted (to_warm={}, to_cold={})",
            report.to_warm, report.to_cold
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::TieredStore;
    use crate::model::{CompressionLevel, MemoryFilter, MemoryRecord, MemoryType, Scope, StorageTier};
    use crate::policy::TierPolicy;
    use crate::store::{InMemoryStore, MemoryStore};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn aged(text: &str, days: i64) -> MemoryRecord {
        let now = Utc::now();
        let mut record =
            MemoryRecord::new(&Scope::new("generic", "default"), MemoryType::Core, text, now);
        record.meta.lifecycle.last_used_at = now - Duration::days(days);
        record
    }

    #[tokio::test]
    async fn add_files_records_by_age() {
        let store = TieredStore::in_memory(TierPolicy::default());
        let fresh = store.add(aged("fresh note", 1)).await.expect("fresh");
        let warm = store.add(aged("warm note. more detail", 10)).await.expect("warm");
        let cold = store.add(aged("cold note. more detail", 40)).await.expect("cold");

        assert_eq!(TieredStore::<InMemoryStore>::tier_of(&fresh), StorageTier::Hot);
        assert_eq!(fresh.body.compression_level, None);
        assert_eq!(warm.meta.storage_tier, Some(StorageTier::Warm));
        assert_eq!(warm.body.compression_level, Some(CompressionLevel::Medium));
        assert_eq!(cold.meta.storage_tier, Some(StorageTier::Cold));
        assert_eq!(cold.body.text, "cold note. [keywords: cold, note, more, detail]");
        assert_eq!(store.query(&MemoryFilter::all()).await.expect("query").len(), 3);
    }

    #[tokio::test]
    async fn get_promotes_cold_records_to_hot() {
        let store = TieredStore::in_memory(TierPolicy::default());
        let cold = store.add(aged("cold note. more detail", 40)).await.expect("add");
        assert_eq!(cold.meta.storage_tier, Some(StorageTier::Cold));

        let promoted = store.get(&cold.meta.id).await.expect("get").expect("record");
        assert_eq!(promoted.meta.storage_tier, Some(StorageTier::Hot));
        assert_eq!(promoted.body.text, "cold note. more detail");

        let queried = store.query(&MemoryFilter::all()).await.expect("query");
        assert_eq!(queried.len(), 1);
        assert_eq!(queried[0].meta.storage_tier, Some(StorageTier::Hot));
    }

    #[tokio::test]
    async fn compact_migrates_stale_records_down() {
        let temp = tempdir().expect("tempdir");
        let store = TieredStore::open_file(temp.path(), TierPolicy::default()).expect("store");
        let record = store.add(aged("weekly sync notes", 0)).await.expect("add");
        assert_eq!(record.meta.storage_tier, Some(StorageTier::Hot));

        let later = Utc::now() + Duration::days(10);
        let report = store.compact(later).await.expect("compact");
        assert_eq!(report.to_warm, 1);
        assert_eq!(report.to_cold, 0);
        let queried = store.query(&MemoryFilter::all()).await.expect("query");
        assert_eq!(queried[0].meta.storage_tier, Some(StorageTier::Warm));

        let report = store
            .compact(Utc::now() + Duration::days(45))
            .await
            .expect("compact again");
        assert_eq!(report.to_cold, 1);
        assert!(temp.path().join("cold").join("default").join("generic").is_dir());
    }
}
