//! Sensitivity detection and masking for memory text.

use crate::error::MemoryError;
use crate::model::Sensitivity;
use log::warn;
use regex::Regex;

/// Default entropy threshold for secret-like tokens.
pub const DEFAULT_SECRET_ENTROPY_THRESHOLD: f32 = 3.7;
/// Mask used for user-configured patterns.
pub const REDACTED: &str = "[REDACTED]";

const BUILTIN_RULES: &[(&str, &str, Sensitivity, &str)] = &[
    (
        "email",
        r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        Sensitivity::Sensitive,
        "[EMAIL]",
    ),
    (
        "api_key",
        r"(?:sk-[A-Za-z0-9_-]{16,}|AKIA[0-9A-Z]{16}|ghp_[A-Za-z0-9]{30,})",
        Sensitivity::HighlySensitive,
        "[API_KEY]",
    ),
    (
        "password",
        r"(?i)(?:password|passwd|pwd|密码)\s*(?:is|是|[:=：])\s*\S+",
        Sensitivity::HighlySensitive,
        "[SECRET]",
    ),
    (
        "intl_phone",
        r"\+\d{1,3}[ -]?\d{3,4}[ -]?\d{3,4}[ -]?\d{0,4}",
        Sensitivity::Sensitive,
        "[PHONE]",
    ),
];

/// Digit runs are classified in code so adjacent CJK text does not defeat
/// word boundaries.
const DIGIT_RUN_PATTERN: &str = r"[0-9]{11,19}[0-9Xx]?";
const SECRET_TOKEN_PATTERN: &str = r"[A-Za-z0-9+/=_-]{20,}";

/// One compiled detector.
#[derive(Debug, Clone)]
struct Rule {
    name: String,
    regex: Regex,
    level: Sensitivity,
    mask: String,
}

/// Outcome of masking a text.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskOutcome {
    /// Text with every detected span replaced by its mask.
    pub text: String,
    /// Highest sensitivity detected.
    pub sensitivity: Sensitivity,
    /// Names of the detectors that fired.
    pub hits: Vec<String>,
}

impl MaskOutcome {
    pub fn changed(&self) -> bool {
        !self.hits.is_empty()
    }
}

/// Sensitive-content detector and masker.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    rules: Vec<Rule>,
    digit_runs: Option<Regex>,
    secret_tokens: Option<Regex>,
    detect_secrets: bool,
    entropy_threshold: f32,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
            digit_runs: Regex::new(DIGIT_RUN_PATTERN).ok(),
            secret_tokens: Regex::new(SECRET_TOKEN_PATTERN).ok(),
            detect_secrets: true,
            entropy_threshold: DEFAULT_SECRET_ENTROPY_THRESHOLD,
        }
    }
}

impl Sanitizer {
    /// Built-in detectors plus user patterns (each `sensitive`, masked `[REDACTED]`).
    pub fn new(extra_patterns: &[String]) -> Result<Self, MemoryError> {
        let mut sanitizer = Self::default();
        for (idx, pattern) in extra_patterns.iter().enumerate() {
            let regex = Regex::new(pattern).map_err(|err| MemoryError::Regex(err.to_string()))?;
            sanitizer.rules.push(Rule {
                name: format!("custom_{idx}"),
                regex,
                level: Sensitivity::Sensitive,
                mask: REDACTED.to_string(),
            });
        }
        Ok(sanitizer)
    }

    /// Toggle high-entropy secret detection.
    pub fn with_secret_detection(mut self, enabled: bool, threshold: f32) -> Self {
        self.detect_secrets = enabled;
        self.entropy_threshold = threshold;
        self
    }

    /// Highest sensitivity present in `text`.
    pub fn detect(&self, text: &str) -> Sensitivity {
        self.mask(text).sensitivity
    }

    /// Replace every sensitive span with its mask.
    pub fn mask(&self, text: &str) -> MaskOutcome {
        let mut outcome = MaskOutcome {
            text: text.to_string(),
            sensitivity: Sensitivity::Normal,
            hits: Vec::new(),
        };
        for rule in &self.rules {
            if !rule.regex.is_match(&outcome.text) {
                continue;
            }
            outcome.text = rule
                .regex
                .replace_all(&outcome.text, rule.mask.as_str())
                .to_string();
            record_hit(&mut outcome, &rule.name, rule.level);
        }
        if let Some(regex) = &self.digit_runs {
            self.mask_digit_runs(regex, &mut outcome);
        }
        if self.detect_secrets
            && let Some(regex) = &self.secret_tokens
        {
            self.mask_secret_tokens(regex, &mut outcome);
        }
        outcome
    }

    fn mask_digit_runs(&self, regex: &Regex, outcome: &mut MaskOutcome) {
        let mut fired = Vec::new();
        let masked = regex
            .replace_all(&outcome.text, |caps: &regex::Captures<'_>| {
                let run = caps.get(0).map_or("", |m| m.as_str());
                match classify_digit_run(run) {
                    Some((name, level, mask)) => {
                        fired.push((name, level));
                        mask.to_string()
                    }
                    None => run.to_string(),
                }
            })
            .to_string();
        outcome.text = masked;
        for (name, level) in fired {
            record_hit(outcome, name, level);
        }
    }

    fn mask_secret_tokens(&self, regex: &Regex, outcome: &mut MaskOutcome) {
        let mut fired = false;
        let masked = regex
            .replace_all(&outcome.text, |caps: &regex::Captures<'_>| {
                let token = caps.get(0).map_or("", |m| m.as_str());
                if shannon_entropy(token) >= self.entropy_threshold {
                    fired = true;
                    "[SECRET]".to_string()
                } else {
                    token.to_string()
                }
            })
            .to_string();
        outcome.text = masked;
        if fired {
            record_hit(outcome, "high_entropy", Sensitivity::HighlySensitive);
        }
    }
}

fn builtin_rules() -> Vec<Rule> {
    BUILTIN_RULES
        .iter()
        .filter_map(|(name, pattern, level, mask)| match Regex::new(pattern) {
            Ok(regex) => Some(Rule {
                name: (*name).to_string(),
                regex,
                level: *level,
                mask: (*mask).to_string(),
            }),
            Err(err) => {
                warn!("skipping sensitivity rule (name={name}): {err}");
                None
            }
        })
        .collect()
}

fn record_hit(outcome: &mut MaskOutcome, name: &str, level: Sensitivity) {
    outcome.sensitivity = outcome.sensitivity.max(level);
    if !outcome.hits.iter().any(|hit| hit == name) {
        outcome.hits.push(name.to_string());
    }
}

/// Identify resident ids, mainland mobile numbers, and payment cards.
fn classify_digit_run(run: &str) -> Option<(&'static str, Sensitivity, &'static str)> {
    let len = run.len();
    let all_digits = run.bytes().all(|b| b.is_ascii_digit());
    if len == 18 && run[..17].bytes().all(|b| b.is_ascii_digit()) {
        return Some(("resident_id", Sensitivity::HighlySensitive, "[ID]"));
    }
    if !all_digits {
        return None;
    }
    let bytes = run.as_bytes();
    if len == 11 && bytes[0] == b'1' && (b'3'..=b'9').contains(&bytes[1]) {
        return Some(("phone", Sensitivity::Sensitive, "[PHONE]"));
    }
    if (13..=19).contains(&len) && luhn_valid(run) {
        return Some(("payment_card", Sensitivity::HighlySensitive, "[CARD]"));
    }
    None
}

fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (idx, byte) in digits.bytes().rev().enumerate() {
        let mut value = u32::from(byte - b'0');
        if idx % 2 == 1 {
            value *= 2;
            if value > 9 {
                value -= 9;
            }
        }
        sum += value;
    }
    sum % 10 == 0
}

/// Calculate Shannon entropy for a token string.
fn shannon_entropy(token: &str) -> f32 {
    let mut counts = [0usize; 256];
    let bytes = token.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }
    for byte in bytes {
        counts[*byte as usize] += 1;
    }
    let len = bytes.len() as f32;
    let mut entropy = 0.0;
    for count in counts.iter().copied().filter(|count| *count > 0) {
        let p = count as f32 / len;
        entropy -= p * p.log2();
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::{Sanitizer, classify_digit_run, luhn_valid};
    use crate::model::Sensitivity;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_normal() {
        let outcome = Sanitizer::default().mask("我喜欢用 Python 写后端代码");
        assert_eq!(outcome.sensitivity, Sensitivity::Normal);
        assert!(!outcome.changed());
        assert_eq!(outcome.text, "我喜欢用 Python 写后端代码");
    }

    #[test]
    fn masks_email_and_phone_next_to_cjk() {
        let outcome = Sanitizer::default().mask("邮箱 dev@example.com 电话13812345678");
        assert_eq!(outcome.text, "邮箱 [EMAIL] 电话[PHONE]");
        assert_eq!(outcome.sensitivity, Sensitivity::Sensitive);
        assert_eq!(outcome.hits, vec!["email".to_string(), "phone".to_string()]);
    }

    #[test]
    fn passwords_and_keys_are_highly_sensitive() {
        let sanitizer = Sanitizer::default();
        assert_eq!(
            sanitizer.detect("my password: hunter2"),
            Sensitivity::HighlySensitive
        );
        let outcome = sanitizer.mask("use sk-abcdefghijklmnop1234 here");
        assert_eq!(outcome.text, "use [API_KEY] here");
    }

    #[test]
    fn custom_patterns_are_masked_as_redacted() {
        let sanitizer = Sanitizer::new(&["project-[a-z]+".to_string()]).expect("sanitizer");
        let outcome = sanitizer.mask("codename project-falcon");
        assert_eq!(outcome.text, "codename [REDACTED]");
        assert_eq!(outcome.sensitivity, Sensitivity::Sensitive);
    }

    #[test]
    fn invalid_custom_pattern_is_an_error() {
        assert!(Sanitizer::new(&["(".to_string()]).is_err());
    }

    #[test]
    fn high_entropy_tokens_respect_toggle() {
        let token = "token Zx9Qw3Er7Ty1Ui5Op2As8Df4Gh6";
        let enabled = Sanitizer::default().with_secret_detection(true, 0.1);
        assert!(enabled.mask(token).text.contains("[SECRET]"));
        let disabled = Sanitizer::default().with_secret_detection(false, 0.1);
        assert_eq!(disabled.mask(token).text, token);
    }

    #[test]
    fn digit_runs_are_classified() {
        assert!(luhn_valid("4111111111111111"));
        assert_eq!(
            classify_digit_run("4111111111111111").map(|(name, _, _)| name),
            Some("payment_card")
        );
        assert_eq!(
            classify_digit_run("11010519491231002X").map(|(name, _, _)| name),
            Some("resident_id")
        );
        assert_eq!(classify_digit_run("12345678901"), None);
    }
}
