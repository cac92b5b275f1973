//! Tokenization and text similarity helpers.
//!
//! Latin text splits into lowercase alphanumeric words; CJK text has no word
//! separators, so each ideograph (or kana/hangul syllable) is its own token.

use std::collections::{HashMap, HashSet};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "i", "in", "is", "it",
    "its", "me", "my", "of", "on", "or", "so", "that", "the", "this", "to", "was", "we", "with",
    "you", "的", "了", "是", "我", "在", "和", "也", "就", "都", "用",
];

/// True for characters tokenized one at a time.
pub fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}')
}

/// Split text into tokens in order of appearance.
pub fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();
    for ch in text.chars() {
        if is_cjk(ch) {
            flush_word(&mut word, &mut out);
            out.push(ch.to_string());
        } else if ch.is_alphanumeric() || ch == '_' || ch == '+' || ch == '#' {
            word.extend(ch.to_lowercase());
        } else {
            flush_word(&mut word, &mut out);
        }
    }
    flush_word(&mut word, &mut out);
    out
}

fn flush_word(word: &mut String, out: &mut Vec<String>) {
    if !word.is_empty() {
        out.push(std::mem::take(word));
    }
}

/// Token set of a text.
pub fn token_set(text: &str) -> HashSet<String> {
    tokens(text).into_iter().collect()
}

/// Jaccard similarity of two token sets; 0 when both are empty.
pub fn jaccard(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(right).count();
    intersection as f64 / union as f64
}

/// Jaccard similarity of two texts.
pub fn text_similarity(left: &str, right: &str) -> f64 {
    jaccard(&token_set(left), &token_set(right))
}

/// Lowercase and collapse whitespace; used for duplicate detection.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most frequent non-stopword tokens, ties broken by first appearance.
pub fn top_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in tokens(text).into_iter().enumerate() {
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        let entry = counts.entry(token).or_insert((0, position));
        entry.0 += 1;
    }
    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|(_, (count_a, pos_a)), (_, (count_b, pos_b))| {
        count_b.cmp(count_a).then(pos_a.cmp(pos_b))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _)| token)
        .collect()
}

/// Truncate a string to a maximum character count.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

/// Text up to and including the first sentence terminator.
pub fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().find(|(_, ch)| is_terminator(*ch)) {
        Some((idx, ch)) => &trimmed[..idx + ch.len_utf8()],
        None => trimmed,
    }
}

pub(crate) fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？' | '\n')
}

#[cfg(test)]
mod tests {
    use super::{first_sentence, normalize, text_similarity, tokens, top_keywords, truncate_chars};
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_split_latin_words_and_cjk_characters() {
        assert_eq!(
            tokens("我喜欢用 Python 写后端"),
            vec!["我", "喜", "欢", "用", "python", "写", "后", "端"]
        );
        assert_eq!(tokens("C++ and C# rock!"), vec!["c++", "and", "c#", "rock"]);
    }

    #[test]
    fn similarity_is_jaccard_over_token_sets() {
        assert_eq!(text_similarity("Python 后端", "我喜欢用 Python 写后端代码"), 0.3);
        assert_eq!(text_similarity("", ""), 0.0);
        assert_eq!(text_similarity("Same words", "same WORDS"), 1.0);
    }

    #[test]
    fn keywords_rank_by_frequency_then_position() {
        let keywords = top_keywords("rust is fast. rust is safe. cargo builds rust", 3);
        assert_eq!(keywords, vec!["rust", "fast", "safe"]);
    }

    #[test]
    fn helpers_handle_edges() {
        assert_eq!(normalize("  Hello   WORLD "), "hello world");
        assert_eq!(truncate_chars("你好世界", 2), "你好");
        assert_eq!(truncate_chars("hello", 0), "");
        assert_eq!(first_sentence("One. Two."), "One.");
        assert_eq!(first_sentence("今天下雨。明天晴"), "今天下雨。");
        assert_eq!(first_sentence("no stop"), "no stop");
    }
}
