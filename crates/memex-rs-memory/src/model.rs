//! Memory record model shared by stores, scoring, and injection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Record identifier.
pub type MemoryId = String;

/// Generate a fresh record identifier.
pub fn new_memory_id() -> MemoryId {
    format!("mem_{}", Uuid::new_v4().simple())
}

/// Memory kind; drives write thresholds and recall budgets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Pinned,
    Persona,
    Core,
    Episodic,
}

impl MemoryType {
    /// All types in recall priority order.
    pub const ALL: [MemoryType; 4] = [
        MemoryType::Pinned,
        MemoryType::Persona,
        MemoryType::Core,
        MemoryType::Episodic,
    ];

    /// Ordinal priority, higher wins ties.
    pub fn priority(self) -> u8 {
        match self {
            Self::Pinned => 4,
            Self::Persona => 3,
            Self::Core => 2,
            Self::Episodic => 1,
        }
    }

    /// Priority scaled into (0, 1].
    pub fn normalized_priority(self) -> f64 {
        f64::from(self.priority()) / 4.0
    }

    /// Minimum write-path activation needed to persist this type.
    pub fn activation_threshold(self) -> f64 {
        match self {
            Self::Pinned => 1.0,
            Self::Persona => 0.8,
            Self::Core => 0.6,
            Self::Episodic => 0.4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pinned => "pinned",
            Self::Persona => "persona",
            Self::Core => "core",
            Self::Episodic => "episodic",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Only `Active` records are recalled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    Active,
    Superseded,
    Deleted,
    Expired,
}

impl MemoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Deleted => "deleted",
            Self::Expired => "expired",
        }
    }
}

/// Sensitivity classification, ordered from least to most sensitive.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    #[default]
    Normal,
    Sensitive,
    HighlySensitive,
}

/// How a record entered the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Auto,
    Manual,
}

/// Storage tier, a function of time since last use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Hot,
    Warm,
    Cold,
}

impl StorageTier {
    /// Compression level stored in this tier.
    pub fn compression(self) -> CompressionLevel {
        match self {
            Self::Hot => CompressionLevel::None,
            Self::Warm => CompressionLevel::Medium,
            Self::Cold => CompressionLevel::Summary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

/// Body compression level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    None,
    Medium,
    Summary,
}

/// Scoring inputs, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub confidence: f64,
    pub importance: f64,
    pub time_decay: f64,
    pub recall_priority: f64,
}

impl Dimensions {
    /// Build dimensions, clamping every value into `[0, 1]`.
    pub fn new(confidence: f64, importance: f64, time_decay: f64, recall_priority: f64) -> Self {
        Self {
            confidence: unit(confidence),
            importance: unit(importance),
            time_decay: unit(time_decay),
            recall_priority: unit(recall_priority),
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(0.5, 0.5, 1.0, 0.5)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Version chain and provenance links.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Relations {
    #[serde(default)]
    pub supersedes: Option<MemoryId>,
    #[serde(default)]
    pub related_to: Vec<MemoryId>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
}

/// Timestamps and status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Time to live in seconds.
    #[serde(default)]
    pub ttl: Option<i64>,
    pub status: MemoryStatus,
}

impl Lifecycle {
    /// Fresh active lifecycle stamped at `now`.
    pub fn starting_at(now: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            last_used_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            ttl: ttl.map(|ttl| ttl.num_seconds()),
            status: MemoryStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Security {
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub masked: bool,
    #[serde(default)]
    pub origin: Origin,
}

/// Record metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryMeta {
    pub id: MemoryId,
    pub platform: String,
    pub namespace: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub relations: Relations,
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub security: Security,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_tier: Option<StorageTier>,
}

/// Record content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryBody {
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Possibly masked or compressed content.
    pub text: String,
    /// Unmasked original, present when `text` was masked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    /// Uncompressed text, present while `text` is compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<CompressionLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

/// Persisted memory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub meta: MemoryMeta,
    pub body: MemoryBody,
}

impl MemoryRecord {
    /// Build an active, auto-origin record in `scope` with default dimensions.
    pub fn new(
        scope: &Scope,
        memory_type: MemoryType,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: MemoryMeta {
                id: new_memory_id(),
                platform: scope.platform.clone(),
                namespace: scope.namespace.clone(),
                tags: BTreeSet::new(),
                dimensions: Dimensions::default(),
                relations: Relations::default(),
                lifecycle: Lifecycle::starting_at(now, None),
                security: Security::default(),
                storage_tier: None,
            },
            body: MemoryBody {
                memory_type,
                text: text.into(),
                raw_content: None,
                original_text: None,
                compression_level: None,
                keywords: Vec::new(),
                entities: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn memory_type(&self) -> MemoryType {
        self.body.memory_type
    }

    pub fn status(&self) -> MemoryStatus {
        self.meta.lifecycle.status
    }

    pub fn is_active(&self) -> bool {
        self.status() == MemoryStatus::Active
    }

    pub fn scope(&self) -> Scope {
        Scope::new(&self.meta.platform, &self.meta.namespace)
    }

    pub fn in_scope(&self, scope: &Scope) -> bool {
        self.meta.platform == scope.platform && self.meta.namespace == scope.namespace
    }

    /// True once `now` has passed `expiresAt`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.meta
            .lifecycle
            .expires_at
            .is_some_and(|expires_at| expires_at <= now)
    }

    /// Fractional days between `lastUsedAt` and `now`, never negative.
    pub fn days_since_last_use(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now - self.meta.lifecycle.last_used_at;
        (elapsed.num_milliseconds() as f64 / 86_400_000.0).max(0.0)
    }

    /// Mark the record as used at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.meta.lifecycle.last_used_at = now;
        self.meta.lifecycle.updated_at = now;
    }

    /// Transition to `status`, stamping `updatedAt`.
    pub fn set_status(&mut self, status: MemoryStatus, now: DateTime<Utc>) {
        self.meta.lifecycle.status = status;
        self.meta.lifecycle.updated_at = now;
    }

    /// Uncompressed text as stored, masking kept.
    pub fn full_text(&self) -> &str {
        self.body
            .original_text
            .as_deref()
            .unwrap_or(&self.body.text)
    }

    /// Unmasked, uncompressed text for authorized access.
    pub fn original_content(&self) -> &str {
        self.body
            .raw_content
            .as_deref()
            .or(self.body.original_text.as_deref())
            .unwrap_or(&self.body.text)
    }
}

/// Partition key for records: `{platform, namespace}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub platform: String,
    pub namespace: String,
}

impl Scope {
    pub fn new(platform: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.platform)
    }
}

/// Predicate filter used by `MemoryStore::query`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFilter {
    pub status: Option<MemoryStatus>,
    pub platform: Option<String>,
    pub namespace: Option<String>,
    pub memory_type: Option<MemoryType>,
}

impl MemoryFilter {
    /// Every record regardless of scope or status.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every record in `scope`.
    pub fn in_scope(scope: &Scope) -> Self {
        Self {
            platform: Some(scope.platform.clone()),
            namespace: Some(scope.namespace.clone()),
            ..Self::default()
        }
    }

    /// Active records in `scope`.
    pub fn active_in(scope: &Scope) -> Self {
        Self::in_scope(scope).with_status(MemoryStatus::Active)
    }

    pub fn with_status(mut self, status: MemoryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn matches(&self, record: &MemoryRecord) -> bool {
        self.status.is_none_or(|status| record.status() == status)
            && self
                .platform
                .as_ref()
                .is_none_or(|platform| &record.meta.platform == platform)
            && self
                .namespace
                .as_ref()
                .is_none_or(|namespace| &record.meta.namespace == namespace)
            && self
                .memory_type
                .is_none_or(|memory_type| record.memory_type() == memory_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Dimensions, MemoryFilter, MemoryRecord, MemoryStatus, MemoryType, Scope, StorageTier,
        CompressionLevel,
    };
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn dimensions_are_clamped() {
        let dims = Dimensions::new(1.4, -0.2, f64::NAN, 0.3);
        assert_eq!(dims, Dimensions::new(1.0, 0.0, 0.0, 0.3));
    }

    #[test]
    fn serializes_lifecycle_in_camel_case() {
        let scope = Scope::new("generic", "default");
        let record = MemoryRecord::new(&scope, MemoryType::Core, "ship it", Utc::now());
        let value = serde_json::to_value(&record).expect("serialize");
        assert!(value["meta"]["lifecycle"]["lastUsedAt"].is_string());
        assert_eq!(value["body"]["type"], "core");
        assert_eq!(value["meta"]["lifecycle"]["status"], "active");
        let back: MemoryRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn filter_matches_scope_status_and_type() {
        let scope = Scope::new("openai", "work");
        let now = Utc::now();
        let mut record = MemoryRecord::new(&scope, MemoryType::Persona, "likes tea", now);
        assert!(MemoryFilter::active_in(&scope).matches(&record));
        assert!(
            !MemoryFilter::active_in(&scope)
                .with_type(MemoryType::Core)
                .matches(&record)
        );
        assert!(!MemoryFilter::active_in(&Scope::new("openai", "home")).matches(&record));

        record.set_status(MemoryStatus::Superseded, now);
        assert!(!MemoryFilter::active_in(&scope).matches(&record));
        assert!(MemoryFilter::in_scope(&scope).matches(&record));
    }

    #[test]
    fn expiry_and_age_follow_lifecycle_timestamps() {
        let scope = Scope::new("generic", "default");
        let now = Utc::now();
        let mut record = MemoryRecord::new(&scope, MemoryType::Episodic, "lunch", now);
        record.meta.lifecycle.expires_at = Some(now - Duration::seconds(1));
        record.meta.lifecycle.last_used_at = now - Duration::days(3);
        assert!(record.is_expired_at(now));
        assert!((record.days_since_last_use(now) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn tiers_map_to_compression_levels() {
        assert_eq!(StorageTier::Hot.compression(), CompressionLevel::None);
        assert_eq!(StorageTier::Warm.compression(), CompressionLevel::Medium);
        assert_eq!(StorageTier::Cold.compression(), CompressionLevel::Summary);
        assert!(MemoryType::Pinned.priority() > MemoryType::Persona.priority());
    }
}
