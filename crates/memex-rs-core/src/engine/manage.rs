//! Maintenance and inspection operations.

use super::Engine;
use crate::error::EngineError;
use crate::types::{CleanupReport, EngineStats};
use chrono::{DateTime, Utc};
use log::info;
use memex_rs_memory::{
    AuditAction, AuditEntry, MemoryError, MemoryFilter, MemoryRecord, MemoryStatus,
};
use std::collections::{HashMap, HashSet};

impl Engine {
    /// Expire records whose `expiresAt` has passed, then compact the store.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport, EngineError> {
        let _guard = self.locks.acquire(&self.scope).await;
        let records = self.store.query(&MemoryFilter::in_scope(&self.scope)).await?;
        let mut expired = 0;
        for mut record in records {
            let sweepable = matches!(
                record.status(),
                MemoryStatus::Active | MemoryStatus::Superseded
            );
            if !sweepable || !record.is_expired_at(now) {
                continue;
            }
            record.set_status(MemoryStatus::Expired, now);
            let id = record.meta.id.clone();
            self.store.update(record).await?;
            self.audit(AuditEntry::new(AuditAction::Expire, "ttl elapsed").with_memory(id));
            expired += 1;
        }

        let compaction = self.store.compact(now).await?;
        if compaction.moved() > 0 {
            self.audit(AuditEntry::new(
                AuditAction::Compact,
                format!("to_warm={} to_cold={}", compaction.to_warm, compaction.to_cold),
            ));
        }
        info!(
            "cleanup finished (scope={}, expired={}, compacted={})",
            self.scope,
            expired,
            compaction.moved()
        );
        Ok(CleanupReport {
            expired,
            compaction,
        })
    }

    /// Tombstone a record. Returns false when it is not in scope.
    pub async fn forget(&self, id: &str) -> Result<bool, EngineError> {
        let _guard = self.locks.acquire(&self.scope).await;
        let Some(mut record) = self.find_in_scope(id).await? else {
            return Ok(false);
        };
        record.set_status(MemoryStatus::Deleted, Utc::now());
        self.store.update(record).await?;
        info!("memory forgotten (id={id})");
        self.audit(AuditEntry::new(AuditAction::Delete, "forgotten").with_memory(id));
        Ok(true)
    }

    /// Physically remove a record. Returns false when it is not in scope.
    pub async fn purge(&self, id: &str) -> Result<bool, EngineError> {
        let _guard = self.locks.acquire(&self.scope).await;
        if self.find_in_scope(id).await?.is_none() {
            return Ok(false);
        }
        let removed = self.store.purge(id).await?;
        if removed {
            info!("memory purged (id={id})");
            self.audit(AuditEntry::new(AuditAction::Purge, "purged").with_memory(id));
        }
        Ok(removed)
    }

    /// Version chain for `id`, newest first.
    ///
    /// Predecessors that were purged end the chain.
    pub async fn history(&self, id: &str) -> Result<Vec<MemoryRecord>, EngineError> {
        let mut by_id = self
            .store
            .query(&MemoryFilter::in_scope(&self.scope))
            .await?
            .into_iter()
            .map(|record| (record.meta.id.clone(), record))
            .collect::<HashMap<_, _>>();
        let Some(head) = by_id.remove(id) else {
            return Err(MemoryError::NotFound(id.to_string()).into());
        };

        let mut seen = HashSet::from([head.meta.id.clone()]);
        let mut cursor = head.meta.relations.supersedes.clone();
        let mut chain = vec![head];
        while let Some(next) = cursor {
            if !seen.insert(next.clone()) {
                let last = chain.last().map(|record| record.meta.id.clone());
                return Err(MemoryError::VersionCycle {
                    id: last.unwrap_or_default(),
                    supersedes: next,
                }
                .into());
            }
            let Some(record) = by_id.remove(&next) else {
                break;
            };
            cursor = record.meta.relations.supersedes.clone();
            chain.push(record);
        }
        Ok(chain)
    }

    /// Unmasked, uncompressed text of a record.
    pub async fn reveal(&self, id: &str) -> Result<String, EngineError> {
        let record = self
            .find_in_scope(id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        Ok(record.original_content().to_string())
    }

    /// Every record in scope, whatever its status, oldest first.
    pub async fn export(&self) -> Result<Vec<MemoryRecord>, EngineError> {
        Ok(self
            .store
            .query(&MemoryFilter::in_scope(&self.scope))
            .await?)
    }

    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        let records = self.export().await?;
        let mut stats = EngineStats {
            total: records.len(),
            ..EngineStats::default()
        };
        for record in &records {
            *stats.by_status.entry(record.status()).or_default() += 1;
            *stats.by_type.entry(record.memory_type()).or_default() += 1;
        }
        Ok(stats)
    }

    async fn find_in_scope(&self, id: &str) -> Result<Option<MemoryRecord>, EngineError> {
        Ok(self
            .store
            .get(id)
            .await?
            .filter(|record| record.in_scope(&self.scope)))
    }
}
