//! Mapping from configuration into runtime policies and backends.

use crate::error::EngineError;
use log::{debug, info};
use memex_rs_config::{
    AuditConfig, BudgetConfig, MemexConfig, RecallConfig, StorageBackend, StorageConfig,
};
use memex_rs_memory::audit::AUDIT_FILENAME;
use memex_rs_memory::{
    AuditSink, Budget, FileAuditLog, FileStore, InMemoryAuditLog, InMemoryStore, MemoryStore,
    NullAuditLog, RecallMode, RecallOptions, RecallWeights, Scope, ScoringParams, TierPolicy,
    TieredStore, WritePolicy,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Scope the engine reads and writes.
pub(crate) fn scope_from_config(config: &MemexConfig) -> Scope {
    Scope::new(&config.engine.platform, &config.engine.namespace)
}

/// Translate engine settings into the write gate.
pub(crate) fn write_policy_from_config(config: &MemexConfig) -> WritePolicy {
    WritePolicy {
        gamma: config.engine.gamma,
        barrier: config.engine.barrier,
        write_threshold: config.engine.write_threshold,
        platform_weight: config.engine.platform_weight,
    }
}

/// Translate engine and recall settings into retriever options.
pub(crate) fn recall_options_from_config(config: &MemexConfig) -> RecallOptions {
    let recall: &RecallConfig = &config.recall;
    RecallOptions {
        params: ScoringParams {
            gamma: config.engine.gamma,
            barrier: config.engine.barrier,
            half_life_days: recall.half_life_days,
            platform_weight: config.engine.platform_weight,
            weights: RecallWeights {
                keyword: recall.weights.keyword,
                priority: recall.weights.priority,
                recency: recall.weights.recency,
                platform: recall.weights.platform,
                type_priority: recall.weights.type_priority,
            },
        },
        recall_threshold: config.engine.recall_threshold,
        budget: budget_from_config(&config.engine.budget),
        mode: if recall.semantic {
            RecallMode::Semantic
        } else {
            RecallMode::Keyword
        },
    }
}

fn budget_from_config(budget: &BudgetConfig) -> Budget {
    Budget {
        pinned: budget.pinned,
        persona: Some(budget.persona),
        core: Some(budget.core),
        episodic: Some(budget.episodic),
    }
}

pub(crate) fn tier_policy_from_config(storage: &StorageConfig) -> TierPolicy {
    TierPolicy {
        warm_after_days: storage.warm_after_days,
        cold_after_days: storage.cold_after_days,
    }
}

/// Open the configured store backend.
pub(crate) fn build_store(storage: &StorageConfig) -> Result<Arc<dyn MemoryStore>, EngineError> {
    let policy = tier_policy_from_config(storage);
    let store: Arc<dyn MemoryStore> = match (storage.backend, storage.tiered) {
        (StorageBackend::Memory, false) => Arc::new(InMemoryStore::new()),
        (StorageBackend::Memory, true) => Arc::new(TieredStore::in_memory(policy)),
        (StorageBackend::File, tiered) => {
            let path = storage.resolved_path();
            info!(
                "opening file store (path={}, tiered={})",
                path.display(),
                tiered
            );
            if tiered {
                Arc::new(TieredStore::open_file(&path, policy)?)
            } else {
                Arc::new(FileStore::open(&path)?)
            }
        }
    };
    debug!(
        "store ready (backend={:?}, tiered={})",
        storage.backend, storage.tiered
    );
    Ok(store)
}

/// Open the configured audit sink.
///
/// Without an explicit path the log sits beside file storage, or in memory
/// for the memory backend.
pub(crate) fn build_audit(
    audit: &AuditConfig,
    storage: &StorageConfig,
) -> Result<Arc<dyn AuditSink>, EngineError> {
    if !audit.enabled {
        return Ok(Arc::new(NullAuditLog));
    }
    let path = match (&audit.path, storage.backend) {
        (Some(path), _) => PathBuf::from(path),
        (None, StorageBackend::File) => storage.resolved_path().join(AUDIT_FILENAME),
        (None, StorageBackend::Memory) => return Ok(Arc::new(InMemoryAuditLog::new())),
    };
    debug!("audit log (path={})", path.display());
    Ok(Arc::new(FileAuditLog::new(&path)?))
}

#[cfg(test)]
mod tests {
    use super::{
        build_audit, build_store, recall_options_from_config, write_policy_from_config,
    };
    use memex_rs_config::{AuditConfig, MemexConfig, StorageBackend, StorageConfig};
    use memex_rs_memory::{
        AuditAction, AuditEntry, MemoryFilter, MemoryType, RecallMode, RecallOptions, WritePolicy,
    };
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn default_config_maps_to_default_policies() {
        let config = MemexConfig::default();
        let policy = write_policy_from_config(&config);
        assert_eq!(policy, WritePolicy::default());

        let options = recall_options_from_config(&config);
        assert_eq!(options, RecallOptions::default());
        assert_eq!(options.budget.limit(MemoryType::Pinned), None);
    }

    #[test]
    fn semantic_flag_selects_semantic_mode() {
        let mut config = MemexConfig::default();
        config.recall.semantic = true;
        config.engine.budget.pinned = Some(1);
        let options = recall_options_from_config(&config);
        assert_eq!(options.mode, RecallMode::Semantic);
        assert_eq!(options.budget.limit(MemoryType::Pinned), Some(1));
    }

    #[tokio::test]
    async fn file_backend_writes_audit_beside_store() {
        let temp = tempdir().expect("tmp");
        let storage = StorageConfig {
            backend: StorageBackend::File,
            path: Some(temp.path().display().to_string()),
            tiered: true,
            ..StorageConfig::default()
        };
        let store = build_store(&storage).expect("store");
        let records = store.query(&MemoryFilter::all()).await.expect("query");
        assert!(records.is_empty());
        assert!(temp.path().join("hot").is_dir());

        let audit = build_audit(&AuditConfig::default(), &storage).expect("audit");
        audit
            .record(AuditEntry::new(AuditAction::Compact, "test"))
            .expect("record");
        assert!(temp.path().join("audit.jsonl").is_file());
    }

    #[test]
    fn disabled_audit_is_silent() {
        let audit = AuditConfig {
            enabled: false,
            path: None,
        };
        let sink = build_audit(&audit, &StorageConfig::default()).expect("audit");
        assert!(sink.entries().expect("entries").is_empty());
    }
}
