//! Memory engine: recall, inject, extract, and write for each turn.

mod manage;
mod recall;
mod write;

use crate::config_map;
use crate::error::EngineError;
use crate::locks::ScopeLocks;
use crate::types::{TurnError, TurnPhase, TurnResult, WriteOutcome};
use log::{debug, info, warn};
use memex_rs_config::MemexConfig;
use memex_rs_memory::{
    AuditAction, AuditEntry, AuditSink, Embedder, Extractor, MemoryStore, Sanitizer, Scope,
    SemanticRetriever, WritePolicy,
};
use memex_rs_protocol::{PlatformAdapter, PlatformKind, TurnContext};
use serde_json::Value;
use std::sync::Arc;

/// Engine bound to one `{platform, namespace}` scope.
///
/// Configuration is fixed at construction; collaborators are shared through
/// `Arc` so the engine can be passed by reference to request handlers.
pub struct Engine {
    config: Arc<MemexConfig>,
    scope: Scope,
    store: Arc<dyn MemoryStore>,
    audit: Arc<dyn AuditSink>,
    adapter: Option<Arc<dyn PlatformAdapter>>,
    embedder: Option<Arc<dyn Embedder>>,
    extractor: Extractor,
    sanitizer: Sanitizer,
    write_policy: WritePolicy,
    retriever: SemanticRetriever,
    locks: ScopeLocks,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scope", &self.scope)
            .field("adapter", &self.adapter.as_ref().map(|adapter| adapter.name()))
            .field("embedder", &self.embedder.is_some())
            .field("write_policy", &self.write_policy)
            .finish()
    }
}

impl Engine {
    /// Build an engine over explicit store and audit collaborators.
    ///
    /// The platform adapter is resolved from `engine.platform`; unknown names
    /// leave the engine without one until `with_adapter` is called.
    pub fn new(
        config: MemexConfig,
        store: Arc<dyn MemoryStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, EngineError> {
        let sanitizer = Sanitizer::new(&config.engine.sensitivity_patterns)?;
        let scope = config_map::scope_from_config(&config);
        let adapter = PlatformKind::from_name(&config.engine.platform).map(PlatformKind::adapter);
        if adapter.is_none() {
            warn!(
                "no adapter for platform (platform={})",
                config.engine.platform
            );
        }
        let write_policy = config_map::write_policy_from_config(&config);
        let retriever = SemanticRetriever::new(config_map::recall_options_from_config(&config), None);
        info!(
            "memory engine ready (scope={}, gamma={}, write_threshold={}, recall_threshold={})",
            scope,
            config.engine.gamma,
            config.engine.write_threshold,
            config.engine.recall_threshold
        );
        Ok(Self {
            config: Arc::new(config),
            scope,
            store,
            audit,
            adapter,
            embedder: None,
            extractor: Extractor::new(),
            sanitizer,
            write_policy,
            retriever,
            locks: ScopeLocks::new(),
        })
    }

    /// Validate `config` and open the store and audit log it describes.
    pub fn from_config(config: MemexConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = config_map::build_store(&config.storage)?;
        let audit = config_map::build_audit(&config.audit, &config.storage)?;
        Self::new(config, store, audit)
    }

    /// Replace the platform adapter.
    pub fn with_adapter(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        debug!("adapter attached (platform={})", adapter.name());
        self.adapter = Some(adapter);
        self
    }

    /// Attach an embedding collaborator for semantic recall.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        let options = *self.retriever.retriever().options();
        self.retriever = SemanticRetriever::new(options, Some(embedder.clone()));
        self.embedder = Some(embedder);
        self
    }

    /// Replace the extraction rule table.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &MemexConfig {
        &self.config
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    pub fn write_policy(&self) -> &WritePolicy {
        &self.write_policy
    }

    /// Every audit entry recorded so far.
    pub fn audit_entries(&self) -> Result<Vec<AuditEntry>, EngineError> {
        self.audit
            .entries()
            .map_err(|err| EngineError::Audit(err.to_string()))
    }

    /// Run one turn: recall, inject, extract, then write.
    ///
    /// Every phase is attempted. Failures land in `TurnResult::errors` and the
    /// returned request falls back to the original when recall or injection
    /// failed.
    pub async fn process_turn(
        &self,
        request: Value,
        response: &Value,
        ctx: &TurnContext,
    ) -> TurnResult {
        let recall = self.retrieve_and_inject(request).await;
        let injected = recall.injected();
        let mut result = TurnResult {
            request: recall.request,
            recalled: recall.recalled,
            injected,
            extracted: 0,
            written: Vec::new(),
            filtered: 0,
            errors: recall.error.into_iter().collect(),
        };

        let candidates = match self.extract(response) {
            Ok(candidates) => candidates,
            Err(err) => {
                self.record_error(TurnPhase::Extract, &err);
                result
                    .errors
                    .push(TurnError::new(TurnPhase::Extract, err.to_string()));
                Vec::new()
            }
        };
        result.extracted = candidates.len();

        for candidate in &candidates {
            match self.save_candidate(candidate, ctx).await {
                Ok(WriteOutcome::Written { record, .. }) => result.written.push(record),
                Ok(WriteOutcome::Filtered { .. }) => result.filtered += 1,
                Err(err) => {
                    self.record_error(TurnPhase::Write, &err);
                    result
                        .errors
                        .push(TurnError::new(TurnPhase::Write, err.to_string()));
                }
            }
        }

        info!(
            "turn processed (scope={}, recalled={}, injected={}, extracted={}, written={}, errors={})",
            self.scope,
            result.recalled.len(),
            result.injected,
            result.extracted,
            result.written.len(),
            result.errors.len()
        );
        result
    }

    fn adapter(&self) -> Result<&Arc<dyn PlatformAdapter>, EngineError> {
        self.adapter
            .as_ref()
            .ok_or_else(|| EngineError::NotConfigured(self.config.engine.platform.clone()))
    }

    /// Append an audit entry; audit failures are logged, never raised.
    fn audit(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(err) = self.audit.record(entry.with_scope(&self.scope)) {
            warn!("audit write failed (action={action:?}): {err}");
        }
    }

    fn record_error(&self, phase: TurnPhase, err: &EngineError) {
        warn!("turn phase failed (phase={phase}, scope={}): {err}", self.scope);
        self.audit(AuditEntry::new(AuditAction::Error, format!("{phase}: {err}")));
    }
}
