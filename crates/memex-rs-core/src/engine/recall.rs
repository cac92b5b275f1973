//! Recall path: rank stored memories and inject them into a request.

use super::Engine;
use crate::error::EngineError;
use crate::types::{RecallOutcome, TurnError, TurnPhase};
use chrono::Utc;
use log::{debug, info, warn};
use memex_rs_memory::{
    AuditAction, AuditEntry, ContextBlock, MemoryFilter, ScoredMemory, render_context,
};
use serde_json::Value;

impl Engine {
    /// Rank memories for the request's input and inject the selected block.
    ///
    /// Fails open: any error is audited and the original request is returned
    /// untouched alongside the error.
    pub async fn retrieve_and_inject(&self, request: Value) -> RecallOutcome {
        let recalled = match self.recall(&request).await {
            Ok(recalled) => recalled,
            Err(err) => return self.fail_open(request, TurnPhase::Recall, err),
        };
        let context = render_context(recalled.iter().map(|item| &item.record));
        let Some(context) = context else {
            debug!("nothing to inject (scope={})", self.scope);
            return RecallOutcome {
                request,
                recalled,
                context: None,
                error: None,
            };
        };

        let injected = match self.inject(&request, &context) {
            Ok(injected) => injected,
            Err(err) => {
                let mut outcome = self.fail_open(request, TurnPhase::Inject, err);
                outcome.recalled = recalled;
                return outcome;
            }
        };
        self.audit(AuditEntry::new(
            AuditAction::Inject,
            format!(
                "records={} ids={}",
                context.len(),
                context.record_ids.join(",")
            ),
        ));
        if self.config.recall.touch_on_recall {
            self.touch_recalled(&context).await;
        }
        RecallOutcome {
            request: injected,
            recalled,
            context: Some(context),
            error: None,
        }
    }

    /// Score and budget every active record in scope against the request input.
    pub async fn recall(&self, request: &Value) -> Result<Vec<ScoredMemory>, EngineError> {
        let adapter = self.adapter()?;
        let query = adapter.parse_request(request)?;
        let pool = self.store.query(&MemoryFilter::active_in(&self.scope)).await?;
        let pool_size = pool.len();
        let recalled = self.retriever.retrieve(&query, pool, Utc::now()).await;
        info!(
            "memories recalled (scope={}, pool={}, selected={})",
            self.scope,
            pool_size,
            recalled.len()
        );
        self.audit(AuditEntry::new(
            AuditAction::Recall,
            format!("pool={pool_size} selected={}", recalled.len()),
        ));
        Ok(recalled)
    }

    fn inject(&self, request: &Value, context: &ContextBlock) -> Result<Value, EngineError> {
        let adapter = self.adapter()?;
        Ok(adapter.inject_to_request(request.clone(), &context.text)?)
    }

    /// Refresh `lastUsedAt` on injected records; failures only log.
    async fn touch_recalled(&self, context: &ContextBlock) {
        let _guard = self.locks.acquire(&self.scope).await;
        let now = Utc::now();
        for id in &context.record_ids {
            let result = match self.store.get(id).await {
                Ok(Some(mut record)) => {
                    record.touch(now);
                    self.store.update(record).await
                }
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                warn!("failed to touch recalled memory (id={id}): {err}");
            }
        }
    }

    fn fail_open(&self, request: Value, phase: TurnPhase, err: EngineError) -> RecallOutcome {
        self.record_error(phase, &err);
        RecallOutcome {
            request,
            recalled: Vec::new(),
            context: None,
            error: Some(TurnError::new(phase, err.to_string())),
        }
    }
}
