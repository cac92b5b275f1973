//! Configuration schema for memex.

use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for a memex engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MemexConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub recall: RecallConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl MemexConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MemexConfigBuilder {
        MemexConfigBuilder::new()
    }
}

/// Builder for assembling a `MemexConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MemexConfigBuilder {
    config: MemexConfig,
}

impl MemexConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MemexConfig::default(),
        }
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn recall(mut self, recall: RecallConfig) -> Self {
        self.config.recall = recall;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn audit(mut self, audit: AuditConfig) -> Self {
        self.config.audit = audit;
        self
    }

    /// Scope the engine to a platform and namespace.
    pub fn scope(mut self, platform: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.config.engine.platform = platform.into();
        self.config.engine.namespace = namespace.into();
        self
    }

    pub fn build(self) -> MemexConfig {
        self.config
    }
}

/// Scoring, gating, and scope settings consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_barrier")]
    pub barrier: f64,
    #[serde(default = "default_threshold", alias = "recallThreshold")]
    pub recall_threshold: f64,
    #[serde(default = "default_threshold", alias = "writeThreshold")]
    pub write_threshold: f64,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Record time to live in days; `null` disables expiry.
    #[serde(default = "default_ttl_days", alias = "ttl")]
    pub ttl_days: Option<u64>,
    #[serde(default = "default_true", alias = "autoMaskSensitive")]
    pub auto_mask_sensitive: bool,
    #[serde(default, alias = "sensitivityPatterns")]
    pub sensitivity_patterns: Vec<String>,
    #[serde(default = "default_platform_weight", alias = "platformWeight")]
    pub platform_weight: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            barrier: default_barrier(),
            recall_threshold: default_threshold(),
            write_threshold: default_threshold(),
            platform: default_platform(),
            namespace: default_namespace(),
            budget: BudgetConfig::default(),
            ttl_days: default_ttl_days(),
            auto_mask_sensitive: true,
            sensitivity_patterns: Vec::new(),
            platform_weight: default_platform_weight(),
        }
    }
}

fn default_gamma() -> f64 {
    0.85
}

fn default_barrier() -> f64 {
    0.5
}

fn default_threshold() -> f64 {
    0.5
}

fn default_platform() -> String {
    "generic".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_ttl_days() -> Option<u64> {
    Some(30)
}

fn default_true() -> bool {
    true
}

fn default_platform_weight() -> f64 {
    1.0
}

/// Per-type recall caps. Pinned records are uncapped unless set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetConfig {
    #[serde(default)]
    pub pinned: Option<usize>,
    #[serde(default = "default_persona_budget")]
    pub persona: usize,
    #[serde(default = "default_core_budget")]
    pub core: usize,
    #[serde(default = "default_episodic_budget")]
    pub episodic: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            pinned: None,
            persona: default_persona_budget(),
            core: default_core_budget(),
            episodic: default_episodic_budget(),
        }
    }
}

fn default_persona_budget() -> usize {
    3
}

fn default_core_budget() -> usize {
    4
}

fn default_episodic_budget() -> usize {
    6
}

/// Recall scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecallConfig {
    #[serde(default = "default_half_life_days", alias = "halfLifeDays")]
    pub half_life_days: f64,
    #[serde(default)]
    pub weights: RecallWeightsConfig,
    /// Use the embedding collaborator when one is attached.
    #[serde(default)]
    pub semantic: bool,
    /// Refresh `lastUsedAt` on records that were injected.
    #[serde(default = "default_true", alias = "touchOnRecall")]
    pub touch_on_recall: bool,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            weights: RecallWeightsConfig::default(),
            semantic: false,
            touch_on_recall: true,
        }
    }
}

fn default_half_life_days() -> f64 {
    30.0
}

/// Weights of the recall score factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RecallWeightsConfig {
    #[serde(default = "default_keyword_weight")]
    pub keyword: f64,
    #[serde(default = "default_priority_weight")]
    pub priority: f64,
    #[serde(default = "default_recency_weight")]
    pub recency: f64,
    #[serde(default = "default_minor_weight")]
    pub platform: f64,
    #[serde(default = "default_minor_weight", alias = "typePriority")]
    pub type_priority: f64,
}

impl Default for RecallWeightsConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword_weight(),
            priority: default_priority_weight(),
            recency: default_recency_weight(),
            platform: default_minor_weight(),
            type_priority: default_minor_weight(),
        }
    }
}

impl RecallWeightsConfig {
    pub fn values(&self) -> [(&'static str, f64); 5] {
        [
            ("keyword", self.keyword),
            ("priority", self.priority),
            ("recency", self.recency),
            ("platform", self.platform),
            ("type_priority", self.type_priority),
        ]
    }
}

fn default_keyword_weight() -> f64 {
    0.35
}

fn default_priority_weight() -> f64 {
    0.25
}

fn default_recency_weight() -> f64 {
    0.20
}

fn default_minor_weight() -> f64 {
    0.10
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Record storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Base directory for the file backend; defaults to `~/.memex/store`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tiered: bool,
    #[serde(default = "default_warm_after_days", alias = "warmAfterDays")]
    pub warm_after_days: f64,
    #[serde(default = "default_cold_after_days", alias = "coldAfterDays")]
    pub cold_after_days: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            tiered: false,
            warm_after_days: default_warm_after_days(),
            cold_after_days: default_cold_after_days(),
        }
    }
}

impl StorageConfig {
    /// Base directory for file storage.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => UserDirs::new()
                .map(|dirs| dirs.home_dir().join(".memex"))
                .unwrap_or_else(|| PathBuf::from(".memex"))
                .join("store"),
        }
    }
}

fn default_warm_after_days() -> f64 {
    7.0
}

fn default_cold_after_days() -> f64 {
    30.0
}

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSONL file; defaults to `audit.jsonl` beside file storage.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}
