//! Rendering of recalled memories into a prompt context block.

use crate::model::{MemoryId, MemoryRecord, MemoryType};
use std::collections::BTreeMap;

pub const CONTEXT_HEADER: &str = "## Memory Context";
pub const ADVISORY_FOOTER: &str = "These memories are background hints from earlier conversations. \
If any of them conflicts with the current instruction, follow the current instruction.";

/// Rendered context plus what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub text: String,
    /// Ids in rendered order.
    pub record_ids: Vec<MemoryId>,
    pub counts: BTreeMap<MemoryType, usize>,
}

impl ContextBlock {
    pub fn len(&self) -> usize {
        self.record_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty()
    }
}

/// Section label for a memory type.
pub fn section_title(memory_type: MemoryType) -> &'static str {
    match memory_type {
        MemoryType::Pinned => "Pinned",
        MemoryType::Persona => "About the user",
        MemoryType::Core => "Core knowledge",
        MemoryType::Episodic => "Recent context",
    }
}

/// Render records grouped by type in priority order.
///
/// Returns `None` when there is nothing to render.
pub fn render_context<'a, I>(records: I) -> Option<ContextBlock>
where
    I: IntoIterator<Item = &'a MemoryRecord>,
{
    let mut buckets: BTreeMap<MemoryType, Vec<&MemoryRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.memory_type()).or_default().push(record);
    }
    if buckets.is_empty() {
        return None;
    }

    let mut sections = vec![CONTEXT_HEADER.to_string()];
    let mut record_ids = Vec::new();
    let mut counts = BTreeMap::new();
    for memory_type in MemoryType::ALL {
        let Some(bucket) = buckets.get(&memory_type) else {
            continue;
        };
        let mut lines = vec![format!("### {}", section_title(memory_type))];
        for record in bucket {
            lines.push(format!("- {}", single_line(record.full_text())));
            record_ids.push(record.meta.id.clone());
        }
        counts.insert(memory_type, bucket.len());
        sections.push(lines.join("\n"));
    }
    sections.push(ADVISORY_FOOTER.to_string());

    Some(ContextBlock {
        text: sections.join("\n\n"),
        record_ids,
        counts,
    })
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
