//! Lossy-with-recovery body compression for aged records.

use crate::model::{CompressionLevel, MemoryRecord};
use crate::text::{first_sentence, top_keywords, truncate_chars};

/// Characters kept by `medium` compression.
pub const MEDIUM_MAX_CHARS: usize = 200;
/// Characters kept from the first sentence by `summary` compression.
pub const SUMMARY_MAX_CHARS: usize = 80;
/// Keywords stored alongside a compressed body.
pub const KEYWORD_LIMIT: usize = 8;

const ELLIPSIS: char = '…';

/// Compress `record` to `level`, stashing the original in `body.original_text`.
///
/// Already compressed records are restored first, so compressing is never
/// applied twice. `CompressionLevel::None` is equivalent to `decompress`.
pub fn compress(record: &MemoryRecord, level: CompressionLevel) -> MemoryRecord {
    let mut out = decompress(record);
    let original = out.body.text.clone();
    let keywords = top_keywords(&original, KEYWORD_LIMIT);
    let text = match level {
        CompressionLevel::None => return out,
        CompressionLevel::Medium => shorten(&original, MEDIUM_MAX_CHARS),
        CompressionLevel::Summary => {
            let mut summary = shorten(first_sentence(&original), SUMMARY_MAX_CHARS);
            if !keywords.is_empty() {
                summary.push_str(&format!(" [keywords: {}]", keywords.join(", ")));
            }
            summary
        }
    };
    out.body.text = text;
    out.body.original_text = Some(original);
    out.body.keywords = keywords;
    out.body.compression_level = Some(level);
    out
}

/// Restore the uncompressed body.
pub fn decompress(record: &MemoryRecord) -> MemoryRecord {
    let mut out = record.clone();
    if let Some(original) = out.body.original_text.take() {
        out.body.text = original;
    }
    out.body.compression_level = None;
    out
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short = truncate_chars(text, max_chars);
    short.push(ELLIPSIS);
    short
}
