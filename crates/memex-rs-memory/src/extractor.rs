//! Candidate extraction from model output text.
//!
//! Extraction is driven by a declarative rule table: each rule pairs a
//! pattern with the memory type it produces and that type's default
//! dimensions. Rules never fail at runtime; text without matches simply
//! yields no candidates.

use crate::model::{Dimensions, Lifecycle, MemoryRecord, MemoryType, Origin, Relations, Scope};
use crate::scorer::round4;
use crate::text::{is_terminator, normalize, tokens};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

/// Candidates scoring below this are discarded.
pub const MIN_EXTRACTION_SCORE: f64 = 0.4;
/// Default record time to live.
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Pattern table: (rule name, memory type, pattern).
const RULE_SPECS: &[(&str, MemoryType, &str)] = &[
    (
        "persona_preference_zh",
        MemoryType::Persona,
        r"我(?:非常|很|比较|一直|通常|总是)?(?:喜欢|偏好|习惯|倾向于|讨厌|不喜欢|擅长|熟悉)[^。！？!?\n]{1,60}",
    ),
    (
        "persona_identity_zh",
        MemoryType::Persona,
        r"我(?:是一名|是一个|叫|的名字是)[^。！？!?\n，,]{1,30}",
    ),
    (
        "persona_preference_en",
        MemoryType::Persona,
        r"(?i)\bI\s+(?:really\s+|usually\s+|always\s+)?(?:like|love|prefer|enjoy|hate|dislike)\s+[^.!?\n]{2,100}",
    ),
    (
        "persona_identity_en",
        MemoryType::Persona,
        r"(?i)\b(?:my name is|I am an?|I'm an?|I work as)\s+[^.!?\n,]{2,60}",
    ),
    (
        "core_goal_zh",
        MemoryType::Core,
        r"(?:我的目标是|我正在(?:做|开发|学习|构建)|我们的项目|项目(?:名称|目标|要求)|必须|一定要)[^。！？!?\n]{2,80}",
    ),
    (
        "core_goal_en",
        MemoryType::Core,
        r"(?i)\b(?:my goal is|I(?:'m| am) (?:working on|building|developing|learning)|our project|the project (?:is|uses|requires)|we must|always remember)\s*[^.!?\n]{2,120}",
    ),
    (
        "episodic_time_zh",
        MemoryType::Episodic,
        r"(?:今天|昨天|刚才|刚刚|最近|上周|这周|明天)[^。！？!?\n]{2,80}",
    ),
    (
        "episodic_time_en",
        MemoryType::Episodic,
        r"(?i)\b(?:today|yesterday|just now|recently|last week|this week|tomorrow)\b[^.!?\n]{2,120}",
    ),
];

const PERSONA_CUES: &[&str] = &[
    "喜欢", "偏好", "习惯", "讨厌", "擅长", "我是", "我叫", "prefer", "like", "love", "hate",
    "my name",
];
const CORE_CUES: &[&str] = &[
    "目标", "项目", "必须", "一定要", "正在", "goal", "project", "must", "working on",
    "building", "deadline",
];
const PIN_CUES: &[&str] = &["记住", "永远", "remember this", "always remember", "pin this"];

const LANGUAGE_TAGS: &[(&str, &str)] = &[
    ("python", "lang:python"),
    ("rust", "lang:rust"),
    ("javascript", "lang:javascript"),
    ("typescript", "lang:typescript"),
    ("golang", "lang:go"),
    ("java", "lang:java"),
    ("c++", "lang:cpp"),
    ("c#", "lang:csharp"),
    ("sql", "lang:sql"),
];
const DOMAIN_TAGS: &[(&str, &str)] = &[
    ("后端", "domain:backend"),
    ("backend", "domain:backend"),
    ("前端", "domain:frontend"),
    ("frontend", "domain:frontend"),
    ("数据库", "domain:database"),
    ("database", "domain:database"),
    ("运维", "domain:devops"),
    ("devops", "domain:devops"),
    ("机器学习", "domain:ml"),
    ("machine learning", "domain:ml"),
    ("设计", "domain:design"),
    ("design", "domain:design"),
];
const KNOWN_ENTITIES: &[&str] = &[
    "Python", "Rust", "JavaScript", "TypeScript", "Go", "Java", "Docker", "Kubernetes",
    "PostgreSQL", "MySQL", "Redis", "React", "Vue", "Django", "Flask", "FastAPI", "Tokio",
    "Linux", "macOS", "Windows", "AWS", "GCP", "Azure",
];

/// Compiled extraction rule.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub name: String,
    pub memory_type: MemoryType,
    pub pattern: Regex,
    pub dimensions: Dimensions,
}

/// A typed span that may become a memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub memory_type: MemoryType,
    pub dimensions: Dimensions,
    /// Name of the rule that produced the span.
    pub rule: String,
    /// Extraction quality from `score_extraction`.
    pub quality: f64,
}

/// Provenance and lifetime applied by `create_memory_entry`.
#[derive(Debug, Clone)]
pub struct EntryOptions {
    pub ttl: Option<Duration>,
    pub origin: Origin,
    pub conversation_id: Option<String>,
    pub turn_id: Option<String>,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::days(DEFAULT_TTL_DAYS)),
            origin: Origin::Auto,
            conversation_id: None,
            turn_id: None,
        }
    }
}

/// Rule-table driven extractor.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Vec<ExtractionRule>,
    min_score: f64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
            min_score: MIN_EXTRACTION_SCORE,
        }
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor over a custom rule table.
    pub fn with_rules(rules: Vec<ExtractionRule>) -> Self {
        Self {
            rules,
            min_score: MIN_EXTRACTION_SCORE,
        }
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Run every rule over `text`, score, filter, and de-duplicate.
    pub fn extract(&self, text: &str) -> Vec<Candidate> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for rule in &self.rules {
            for found in rule.pattern.find_iter(text) {
                let span = trim_span(found.as_str());
                if span.is_empty() {
                    continue;
                }
                let quality = score_extraction(span, rule.memory_type, text);
                if quality < self.min_score {
                    debug!(
                        "extraction discarded (rule={}, quality={quality})",
                        rule.name
                    );
                    continue;
                }
                if !seen.insert(normalize(span)) {
                    continue;
                }
                candidates.push(Candidate {
                    text: span.to_string(),
                    memory_type: rule.memory_type,
                    dimensions: rule.dimensions,
                    rule: rule.name.clone(),
                    quality,
                });
            }
        }
        debug!("extracted candidates (count={})", candidates.len());
        candidates
    }
}

/// Default dimensions per memory type.
pub fn default_dimensions(memory_type: MemoryType) -> Dimensions {
    match memory_type {
        MemoryType::Pinned => Dimensions::new(1.0, 1.0, 1.0, 1.0),
        MemoryType::Persona => Dimensions::new(0.85, 0.8, 1.0, 0.8),
        MemoryType::Core => Dimensions::new(0.8, 0.7, 1.0, 0.7),
        MemoryType::Episodic => Dimensions::new(0.6, 0.4, 1.0, 0.4),
    }
}

fn builtin_rules() -> Vec<ExtractionRule> {
    RULE_SPECS
        .iter()
        .filter_map(|(name, memory_type, pattern)| match Regex::new(pattern) {
            Ok(pattern) => Some(ExtractionRule {
                name: (*name).to_string(),
                memory_type: *memory_type,
                pattern,
                dimensions: default_dimensions(*memory_type),
            }),
            Err(err) => {
                warn!("skipping extraction rule (name={name}): {err}");
                None
            }
        })
        .collect()
}

fn trim_span(span: &str) -> &str {
    span.trim()
        .trim_end_matches(|ch: char| is_terminator(ch) || matches!(ch, ',' | '，' | ';' | '；'))
        .trim()
}

fn type_weight(memory_type: MemoryType) -> f64 {
    match memory_type {
        MemoryType::Pinned => 1.3,
        MemoryType::Persona => 1.2,
        MemoryType::Core => 1.1,
        MemoryType::Episodic => 1.0,
    }
}

fn has_first_person(span: &str) -> bool {
    if span.contains('我') {
        return true;
    }
    tokens(span)
        .iter()
        .any(|token| matches!(token.as_str(), "i" | "me" | "my" | "mine" | "we" | "our"))
}

/// Quality of an extracted span.
///
/// Base 0.5, +0.2 for 8..=80 characters or +0.1 for 81..=200, +0.1 for a
/// first-person pronoun, times the type weight, times 0.8 when the span
/// occurs more than once in `source`. Clamped to `[0, 1]`.
pub fn score_extraction(span: &str, memory_type: MemoryType, source: &str) -> f64 {
    let length = span.chars().count();
    let mut score = 0.5;
    score += match length {
        8..=80 => 0.2,
        81..=200 => 0.1,
        _ => 0.0,
    };
    if has_first_person(span) {
        score += 0.1;
    }
    score *= type_weight(memory_type);
    if !span.is_empty() && source.matches(span).count() > 1 {
        score *= 0.8;
    }
    round4(score.clamp(0.0, 1.0))
}

/// Keyword classifier used when no rule assigned a type.
pub fn classify_type(text: &str) -> MemoryType {
    let lowered = text.to_lowercase();
    let has = |cues: &[&str]| cues.iter().any(|cue| lowered.contains(cue));
    if has(PIN_CUES) {
        MemoryType::Pinned
    } else if has(PERSONA_CUES) {
        MemoryType::Persona
    } else if has(CORE_CUES) {
        MemoryType::Core
    } else {
        MemoryType::Episodic
    }
}

/// Language and domain tags from keyword heuristics.
pub fn infer_tags(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let words = tokens(&lowered).into_iter().collect::<HashSet<_>>();
    let mut tags = BTreeSet::new();
    for (keyword, tag) in LANGUAGE_TAGS {
        if words.contains(*keyword) {
            tags.insert((*tag).to_string());
        }
    }
    for (keyword, tag) in DOMAIN_TAGS {
        if lowered.contains(keyword) {
            tags.insert((*tag).to_string());
        }
    }
    tags
}

/// Named things mentioned in `text`: known technologies plus capitalised words.
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities = Vec::new();
    let mut push = |entity: &str| {
        if !entities.iter().any(|existing: &String| existing == entity) {
            entities.push(entity.to_string());
        }
    };
    let words = text
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '+' || ch == '#'))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>();
    for word in &words {
        if let Some(known) = KNOWN_ENTITIES
            .iter()
            .find(|known| known.eq_ignore_ascii_case(word))
        {
            push(known);
        }
    }
    for (idx, word) in words.iter().enumerate() {
        let mut chars = word.chars();
        let capitalised = chars.next().is_some_and(|ch| ch.is_ascii_uppercase())
            && word.len() > 2
            && chars.any(|ch| ch.is_ascii_lowercase());
        if capitalised && idx > 0 {
            push(word);
        }
    }
    entities
}

/// Build a canonical active record from an accepted candidate.
pub fn create_memory_entry(
    candidate: &Candidate,
    scope: &Scope,
    options: &EntryOptions,
    now: DateTime<Utc>,
) -> MemoryRecord {
    let mut record = MemoryRecord::new(scope, candidate.memory_type, candidate.text.clone(), now);
    record.meta.dimensions = candidate.dimensions;
    record.meta.tags = infer_tags(&candidate.text);
    record.meta.relations = Relations {
        supersedes: None,
        related_to: Vec::new(),
        conversation_id: options.conversation_id.clone(),
        turn_id: options.turn_id.clone(),
    };
    let ttl = if candidate.memory_type == MemoryType::Pinned {
        None
    } else {
        options.ttl
    };
    record.meta.lifecycle = Lifecycle::starting_at(now, ttl);
    record.meta.security.origin = options.origin;
    record.body.entities = extract_entities(&candidate.text);
    record
}
