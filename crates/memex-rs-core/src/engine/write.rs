//! Write path: extraction, masking, gating, and conflict resolution.

use super::Engine;
use crate::error::EngineError;
use crate::types::WriteOutcome;
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use memex_rs_memory::extractor::{classify_type, default_dimensions};
use memex_rs_memory::{
    AuditAction, AuditEntry, Candidate, EntryOptions, MemoryError, MemoryFilter, MemoryRecord,
    MemoryStatus, MemoryType, Origin, Sensitivity, create_memory_entry,
};
use memex_rs_protocol::TurnContext;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const MANUAL_RULE: &str = "manual";

impl Engine {
    /// Parse a platform response and run the extractor over its text.
    pub fn extract(&self, response: &Value) -> Result<Vec<Candidate>, EngineError> {
        let adapter = self.adapter()?;
        let text = adapter.parse_response(response)?;
        Ok(self.extractor.extract(&text))
    }

    /// Extract candidates from a response and write each through the gate.
    pub async fn extract_and_save(
        &self,
        response: &Value,
        ctx: &TurnContext,
    ) -> Result<Vec<WriteOutcome>, EngineError> {
        let candidates = self.extract(response)?;
        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            outcomes.push(self.save_candidate(candidate, ctx).await?);
        }
        Ok(outcomes)
    }

    /// Build a record from one candidate and write it through the gate.
    pub async fn save_candidate(
        &self,
        candidate: &Candidate,
        ctx: &TurnContext,
    ) -> Result<WriteOutcome, EngineError> {
        let options = self.entry_options(Origin::Auto, ctx);
        let record = create_memory_entry(candidate, &self.scope, &options, Utc::now());
        self.write_gated(record).await
    }

    /// Manually store `text` as a pinned record.
    ///
    /// Pinned records never expire and skip the activation gate; conflict
    /// resolution still applies.
    pub async fn pin(&self, text: &str) -> Result<MemoryRecord, EngineError> {
        let record = self.manual_record(text, MemoryType::Pinned)?;
        let (record, _) = self.persist(self.mask(record)).await?;
        Ok(record)
    }

    /// Manually store `text`, typed by the keyword classifier.
    pub async fn remember(&self, text: &str) -> Result<WriteOutcome, EngineError> {
        let memory_type = classify_type(text);
        if memory_type == MemoryType::Pinned {
            let record = self.pin(text).await?;
            return Ok(WriteOutcome::Written {
                superseded: record.meta.relations.supersedes.clone(),
                record,
            });
        }
        let record = self.manual_record(text, memory_type)?;
        self.write_gated(record).await
    }

    fn manual_record(
        &self,
        text: &str,
        memory_type: MemoryType,
    ) -> Result<MemoryRecord, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidRequest(
                "memory text must not be empty".to_string(),
            ));
        }
        let candidate = Candidate {
            text: text.to_string(),
            memory_type,
            dimensions: default_dimensions(memory_type),
            rule: MANUAL_RULE.to_string(),
            quality: 1.0,
        };
        let options = self.entry_options(Origin::Manual, &TurnContext::default());
        Ok(create_memory_entry(
            &candidate,
            &self.scope,
            &options,
            Utc::now(),
        ))
    }

    fn entry_options(&self, origin: Origin, ctx: &TurnContext) -> EntryOptions {
        let ttl = self
            .config
            .engine
            .ttl_days
            .and_then(|days| i64::try_from(days).ok())
            .map(Duration::days);
        EntryOptions {
            ttl,
            origin,
            conversation_id: ctx.conversation_id.clone(),
            turn_id: ctx.turn_id.clone(),
        }
    }

    /// Mask, gate, and persist one record.
    async fn write_gated(&self, record: MemoryRecord) -> Result<WriteOutcome, EngineError> {
        let record = self.mask(record);
        let decision = self.write_policy.evaluate(&record);
        if !decision.accepted {
            info!(
                "memory filtered (type={}, write_score={}, probability={}, threshold={})",
                record.memory_type().as_str(),
                decision.write_score,
                decision.probability,
                decision.threshold
            );
            self.audit(
                AuditEntry::new(
                    AuditAction::Filtered,
                    format!(
                        "type={} write_score={} probability={} threshold={}",
                        record.memory_type().as_str(),
                        decision.write_score,
                        decision.probability,
                        decision.threshold
                    ),
                )
                .with_memory(record.meta.id.clone()),
            );
            return Ok(WriteOutcome::Filtered {
                text: record.body.text,
                memory_type: record.body.memory_type,
                decision,
            });
        }
        let (record, superseded) = self.persist(record).await?;
        Ok(WriteOutcome::Written { record, superseded })
    }

    /// Apply sensitivity detection and, when enabled, masking.
    fn mask(&self, mut record: MemoryRecord) -> MemoryRecord {
        let outcome = self.sanitizer.mask(&record.body.text);
        record.meta.security.sensitivity = outcome.sensitivity;
        if !outcome.changed() {
            return record;
        }
        if self.config.engine.auto_mask_sensitive {
            debug!(
                "masked sensitive content (id={}, hits={})",
                record.meta.id,
                outcome.hits.join(",")
            );
            record.body.raw_content = Some(std::mem::replace(&mut record.body.text, outcome.text));
            record.meta.security.masked = true;
        } else if outcome.sensitivity == Sensitivity::HighlySensitive {
            warn!(
                "storing highly sensitive content unmasked (id={}, hits={})",
                record.meta.id,
                outcome.hits.join(",")
            );
        }
        record
    }

    /// Add `record`, superseding any near-duplicate in scope.
    ///
    /// Runs under the scope lock so the similarity check and both writes are
    /// not interleaved with another writer in the same scope. If the
    /// predecessor cannot be marked superseded the new record is purged again,
    /// so a failed write never leaves two active versions.
    async fn persist(
        &self,
        mut record: MemoryRecord,
    ) -> Result<(MemoryRecord, Option<String>), EngineError> {
        let _guard = self.locks.acquire(&self.scope).await;
        let previous = self.store.find_similar(&record).await?;
        if let Some(previous) = &previous {
            self.check_chain(&record.meta.id, previous).await?;
            record.meta.relations.supersedes = Some(previous.meta.id.clone());
        }

        let stored = self.store.add(record).await?;
        let superseded = match previous {
            Some(previous) => Some(self.supersede(previous, &stored).await?),
            None => None,
        };

        let masked = stored.meta.security.masked;
        info!(
            "memory written (id={}, type={}, masked={})",
            stored.meta.id,
            stored.memory_type().as_str(),
            masked
        );
        self.audit(
            AuditEntry::new(
                AuditAction::Write,
                format!("type={}", stored.memory_type().as_str()),
            )
            .with_memory(stored.meta.id.clone()),
        );
        if masked {
            self.audit(
                AuditEntry::new(AuditAction::Mask, "sensitive content masked")
                    .with_memory(stored.meta.id.clone()),
            );
        }
        if let Some(old) = &superseded {
            info!("memory superseded (old={old}, new={})", stored.meta.id);
            self.audit(
                AuditEntry::new(
                    AuditAction::Supersede,
                    format!("superseded by {}", stored.meta.id),
                )
                .with_memory(old.clone()),
            );
        }
        Ok((stored, superseded))
    }

    /// Flip `previous` to superseded, rolling back `stored` on failure.
    async fn supersede(
        &self,
        mut previous: MemoryRecord,
        stored: &MemoryRecord,
    ) -> Result<String, EngineError> {
        previous.set_status(MemoryStatus::Superseded, Utc::now());
        let id = previous.meta.id.clone();
        let Err(err) = self.store.update(previous).await else {
            return Ok(id);
        };
        warn!(
            "supersede failed, rolling back write (old={id}, new={}): {err}",
            stored.meta.id
        );
        if let Err(rollback) = self.store.purge(&stored.meta.id).await {
            error!(
                "rollback failed, two active versions remain (old={id}, new={}): {rollback}",
                stored.meta.id
            );
        }
        Err(err.into())
    }

    /// Reject a supersede that would close a loop in the version chain.
    async fn check_chain(&self, id: &str, previous: &MemoryRecord) -> Result<(), EngineError> {
        let links = self
            .store
            .query(&MemoryFilter::in_scope(&self.scope))
            .await?
            .into_iter()
            .map(|record| (record.meta.id, record.meta.relations.supersedes))
            .collect::<HashMap<_, _>>();
        let mut seen = HashSet::new();
        let mut cursor = Some(previous.meta.id.clone());
        while let Some(current) = cursor {
            if current == id || !seen.insert(current.clone()) {
                return Err(MemoryError::VersionCycle {
                    id: id.to_string(),
                    supersedes: previous.meta.id.clone(),
                }
                .into());
            }
            cursor = links.get(&current).cloned().flatten();
        }
        Ok(())
    }
}
