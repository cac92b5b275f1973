//! Ranking and budgeting of stored memories against a query.

use crate::embedding::{Embedder, cosine_similarity};
use crate::model::{MemoryRecord, MemoryType};
use crate::recall::{Budget, RecallMode, RecallOptions, TIE_WINDOW};
use crate::scorer::{RecallFactors, activation, keyword_similarity};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::cmp::Ordering;
use std::sync::Arc;

/// A record paired with its recall scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    /// Query similarity used for the keyword factor.
    pub similarity: f64,
    /// Weighted score before activation.
    pub raw_score: f64,
    /// Activation probability; compared against the recall threshold.
    pub score: f64,
}

/// Keyword retriever.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    options: RecallOptions,
}

impl Retriever {
    pub fn new(options: RecallOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RecallOptions {
        &self.options
    }

    /// Score a record given a precomputed similarity.
    pub fn score(&self, similarity: f64, record: MemoryRecord, now: DateTime<Utc>) -> ScoredMemory {
        let params = &self.options.params;
        let factors = RecallFactors::for_record(similarity, &record, params, now);
        let raw_score = factors.weighted(&params.weights);
        ScoredMemory {
            score: activation(raw_score, params.gamma, params.barrier),
            similarity: factors.similarity,
            raw_score,
            record,
        }
    }

    /// Score active records, drop those below the threshold, and sort.
    pub fn rank(
        &self,
        query: &str,
        pool: Vec<MemoryRecord>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let scored = pool
            .into_iter()
            .filter(MemoryRecord::is_active)
            .map(|record| {
                let similarity = keyword_similarity(query, &record);
                self.score(similarity, record, now)
            })
            .collect();
        self.finish(scored)
    }

    /// Apply the per-type budget to a ranked list.
    pub fn select(&self, ranked: Vec<ScoredMemory>) -> Vec<ScoredMemory> {
        apply_budget(ranked, &self.options.budget)
    }

    /// `rank` followed by `select`.
    pub fn retrieve(
        &self,
        query: &str,
        pool: Vec<MemoryRecord>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        self.select(self.rank(query, pool, now))
    }

    fn finish(&self, scored: Vec<ScoredMemory>) -> Vec<ScoredMemory> {
        let total = scored.len();
        let mut kept = scored
            .into_iter()
            .filter(|item| item.score >= self.options.recall_threshold)
            .collect::<Vec<_>>();
        sort_ranked(&mut kept);
        debug!(
            "ranked memories (pool={}, kept={}, threshold={})",
            total,
            kept.len(),
            self.options.recall_threshold
        );
        kept
    }
}

/// Sort by score with tie grouping.
///
/// Scores are walked in descending order; each group is anchored at its
/// highest score and admits every following score within `TIE_WINDOW` of the
/// anchor. Inside a group records order by type priority, then most recent
/// `lastUsedAt`, then score.
pub fn sort_ranked(items: &mut Vec<ScoredMemory>) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut sorted = Vec::with_capacity(items.len());
    let mut rest = std::mem::take(items).into_iter().peekable();
    while let Some(first) = rest.next() {
        let anchor = first.score;
        let mut group = vec![first];
        while let Some(next) = rest.next_if(|item| anchor - item.score <= TIE_WINDOW + 1e-9) {
            group.push(next);
        }
        group.sort_by(compare_within_group);
        sorted.extend(group);
    }
    *items = sorted;
}

fn compare_within_group(a: &ScoredMemory, b: &ScoredMemory) -> Ordering {
    b.record
        .memory_type()
        .priority()
        .cmp(&a.record.memory_type().priority())
        .then_with(|| {
            b.record
                .meta
                .lifecycle
                .last_used_at
                .cmp(&a.record.meta.lifecycle.last_used_at)
        })
        .then_with(|| b.score.total_cmp(&a.score))
}

/// Take the top-N of each type from a ranked list and concatenate the
/// buckets in type priority order.
pub fn apply_budget(ranked: Vec<ScoredMemory>, budget: &Budget) -> Vec<ScoredMemory> {
    let mut buckets: [Vec<ScoredMemory>; 4] = Default::default();
    for item in ranked {
        let slot = bucket_index(item.record.memory_type());
        let full = budget
            .limit(item.record.memory_type())
            .is_some_and(|limit| buckets[slot].len() >= limit);
        if !full {
            buckets[slot].push(item);
        }
    }
    buckets.into_iter().flatten().collect()
}

fn bucket_index(memory_type: MemoryType) -> usize {
    match memory_type {
        MemoryType::Pinned => 0,
        MemoryType::Persona => 1,
        MemoryType::Core => 2,
        MemoryType::Episodic => 3,
    }
}

/// Retriever using embedding similarity when an embedder is configured.
///
/// Missing embedders and embedding failures fall back to keyword overlap.
#[derive(Clone, Default)]
pub struct SemanticRetriever {
    retriever: Retriever,
    embedder: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for SemanticRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticRetriever")
            .field("retriever", &self.retriever)
            .field("embedder", &self.embedder.is_some())
            .finish()
    }
}

impl SemanticRetriever {
    pub fn new(options: RecallOptions, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            retriever: Retriever::new(options),
            embedder,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Rank then budget `pool` against `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        pool: Vec<MemoryRecord>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let ranked = self.rank(query, pool, now).await;
        self.retriever.select(ranked)
    }

    pub async fn rank(
        &self,
        query: &str,
        pool: Vec<MemoryRecord>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let embedder = match (&self.embedder, self.retriever.options.mode) {
            (Some(embedder), RecallMode::Semantic) => embedder,
            _ => return self.retriever.rank(query, pool, now),
        };
        let query_vector = match embedder.embed(query).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!("query embedding failed, using keyword recall: {err}");
                return self.retriever.rank(query, pool, now);
            }
        };
        let mut scored = Vec::new();
        for record in pool.into_iter().filter(MemoryRecord::is_active) {
            let similarity = match embedder.embed(record.full_text()).await {
                Ok(vector) => cosine_similarity(&query_vector, &vector),
                Err(err) => {
                    warn!(
                        "record embedding failed, using keyword overlap (id={}): {err}",
                        record.id()
                    );
                    keyword_similarity(query, &record)
                }
            };
            scored.push(self.retriever.score(similarity, record, now));
        }
        self.retriever.finish(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::{Retriever, ScoredMemory, SemanticRetriever, apply_budget, sort_ranked};
    use crate::embedding::Embedder;
    use crate::error::MemoryError;
    use crate::model::{Dimensions, MemoryRecord, MemoryStatus, MemoryType, Scope};
    use crate::recall::{Budget, RecallMode, RecallOptions};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn record(memory_type: MemoryType, text: &str, priority: f64, now: DateTime<Utc>) -> MemoryRecord {
        let mut record = MemoryRecord::new(&Scope::new("generic", "default"), memory_type, text, now);
        record.meta.dimensions = Dimensions::new(0.8, 0.7, 1.0, priority);
        record
    }

    fn scored(memory_type: MemoryType, score: f64, now: DateTime<Utc>) -> ScoredMemory {
        ScoredMemory {
            record: record(memory_type, "x", 0.5, now),
            similarity: 0.0,
            raw_score: score,
            score,
        }
    }

    #[test]
    fn persona_record_ranks_first_for_matching_query() {
        let now = Utc::now();
        let persona = record(MemoryType::Persona, "我喜欢用 Python 写后端代码", 0.8, now);
        let core = record(MemoryType::Core, "The deploy window is Friday", 0.7, now);
        let episodic = record(MemoryType::Episodic, "Lunch was ramen today", 0.4, now);
        let persona_id = persona.id().to_string();

        let ranked = Retriever::default().rank("Python 后端", vec![episodic, core, persona], now);
        let scores = ranked.iter().map(|item| item.score).collect::<Vec<_>>();
        assert_eq!(scores, vec![0.5759, 0.5106]);
        assert_eq!(ranked[0].record.id(), persona_id);
        assert_eq!(ranked[0].similarity, 0.3);
    }

    #[test]
    fn inactive_records_are_never_ranked() {
        let now = Utc::now();
        let mut stale = record(MemoryType::Core, "Python 后端", 1.0, now);
        stale.set_status(MemoryStatus::Superseded, now);
        assert!(Retriever::default().rank("Python 后端", vec![stale], now).is_empty());
    }

    #[test]
    fn ties_prefer_type_priority_then_recency() {
        let now = Utc::now();
        let mut older_core = scored(MemoryType::Core, 0.70, now);
        older_core.record.meta.lifecycle.last_used_at = now - Duration::days(2);
        let newer_core = scored(MemoryType::Core, 0.69, now);
        let persona = scored(MemoryType::Persona, 0.62, now);
        let episodic = scored(MemoryType::Episodic, 0.55, now);
        let expected = vec![
            persona.record.id().to_string(),
            newer_core.record.id().to_string(),
            older_core.record.id().to_string(),
            episodic.record.id().to_string(),
        ];

        let mut items = vec![episodic, older_core, persona, newer_core];
        sort_ranked(&mut items);
        let ids = items
            .iter()
            .map(|item| item.record.id().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, expected);
    }

    #[test]
    fn budget_caps_each_type_and_orders_buckets() {
        let now = Utc::now();
        let mut ranked = Vec::new();
        for idx in 0..8 {
            ranked.push(scored(MemoryType::Episodic, 0.9 - f64::from(idx) * 0.01, now));
        }
        for _ in 0..5 {
            ranked.push(scored(MemoryType::Persona, 0.6, now));
        }
        ranked.push(scored(MemoryType::Pinned, 0.51, now));

        let selected = apply_budget(ranked, &Budget::default());
        let types = selected
            .iter()
            .map(|item| item.record.memory_type())
            .collect::<Vec<_>>();
        let mut expected = vec![MemoryType::Pinned];
        expected.extend([MemoryType::Persona; 3]);
        expected.extend([MemoryType::Episodic; 6]);
        assert_eq!(types, expected);
        assert_eq!(selected[4].score, 0.9);
    }

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
            if text.contains("fail") {
                return Err(MemoryError::Embedding("offline".to_string()));
            }
            Ok(if text.contains("tea") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
        }
    }

    #[tokio::test]
    async fn semantic_mode_uses_embeddings() {
        let now = Utc::now();
        let options = RecallOptions {
            mode: RecallMode::Semantic,
            recall_threshold: 0.0,
            ..RecallOptions::default()
        };
        let retriever = SemanticRetriever::new(options, Some(Arc::new(AxisEmbedder)));
        let ranked = retriever
            .rank("green tea", vec![record(MemoryType::Core, "oolong tea", 0.5, now)], now)
            .await;
        assert_eq!(ranked[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn semantic_mode_falls_back_to_keywords() {
        let now = Utc::now();
        let options = RecallOptions {
            mode: RecallMode::Semantic,
            recall_threshold: 0.0,
            ..RecallOptions::default()
        };
        let pool = vec![record(MemoryType::Core, "rust async", 0.5, now)];

        let without = SemanticRetriever::new(options, None);
        let failing = SemanticRetriever::new(options, Some(Arc::new(AxisEmbedder)));
        let keyword = Retriever::new(options).rank("rust fail", pool.clone(), now);
        assert_eq!(without.rank("rust fail", pool.clone(), now).await, keyword);
        assert_eq!(failing.rank("rust fail", pool, now).await, keyword);
    }
}
