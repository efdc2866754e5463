//! Section-aware chunking of extracted paper text.
//!
//! Sections start at ALL-CAPS heading lines. Each section body is cut into
//! overlapping word windows; windows that are too short, or that carry no
//! known section, are merged into a neighbour.

use crate::types::{Chunk, UNKNOWN_SECTION};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub target_words: usize,
    pub overlap_words: usize,
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_words: 600, overlap_words: 100, min_words: 50 }
    }
}

#[derive(Default)]
pub struct SectionChunker {
    config: ChunkingConfig,
}

struct Draft {
    section: String,
    text: String,
}

impl SectionChunker {
    pub fn new(config: ChunkingConfig) -> Self { Self { config } }

    /// Chunk `text` for `document_id`; sequence indices are dense from 0.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let mut drafts = Vec::new();
        for (section, body) in split_sections(text) {
            let words: Vec<&str> = body.split_whitespace().collect();
            for window in self.windows(&words) {
                drafts.push(Draft { section: section.clone(), text: window });
            }
        }
        self.merge_small(drafts)
            .into_iter()
            .enumerate()
            .map(|(i, d)| Chunk::new(document_id, u32::try_from(i).unwrap_or(u32::MAX), Some(d.section), d.text))
            .collect()
    }

    fn windows(&self, words: &[&str]) -> Vec<String> {
        let target = self.config.target_words.max(1);
        let step = target.saturating_sub(self.config.overlap_words).max(1);
        let mut out = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + target).min(words.len());
            out.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start += step;
        }
        out
    }

    fn merge_small(&self, drafts: Vec<Draft>) -> Vec<Draft> {
        let mut merged = Vec::new();
        let mut buffer: Vec<String> = Vec::new();
        let mut buffer_section: Option<String> = None;
        for draft in drafts {
            let words = draft.text.split_whitespace().count();
            if words < self.config.min_words || draft.section.eq_ignore_ascii_case(UNKNOWN_SECTION) {
                if buffer_section.is_none() && !draft.section.eq_ignore_ascii_case(UNKNOWN_SECTION) {
                    buffer_section = Some(draft.section.clone());
                }
                buffer.push(draft.text);
                continue;
            }
            if !buffer.is_empty() {
                merged.push(Draft { section: buffer_section.take().unwrap_or_else(|| UNKNOWN_SECTION.to_string()), text: buffer.join(" ") });
                buffer.clear();
            }
            merged.push(draft);
        }
        if !buffer.is_empty() {
            merged.push(Draft { section: buffer_section.unwrap_or_else(|| UNKNOWN_SECTION.to_string()), text: buffer.join(" ") });
        }
        merged
    }
}

fn is_heading(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3
        && line.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && line.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c.is_whitespace())
}

/// Split into `(heading, body)` pairs. Text before the first heading is
/// labelled unknown; sections with an empty body are dropped.
fn split_sections(text: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut heading = UNKNOWN_SECTION.to_string();
    let mut body: Vec<&str> = Vec::new();
    for line in text.lines() {
        if is_heading(line) {
            if body.iter().any(|l| !l.trim().is_empty()) { sections.push((heading, body.join(" "))); }
            heading = line.trim().to_string();
            body.clear();
        } else {
            body.push(line);
        }
    }
    if body.iter().any(|l| !l.trim().is_empty()) { sections.push((heading, body.join(" "))); }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, tag: &str) -> String {
        (0..n).map(|i| format!("{tag}{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn headings_label_sections() {
        let text = format!("INTRODUCTION\n{}\nRELATED WORK\n{}\n", words(80, "a"), words(70, "b"));
        let chunks = SectionChunker::default().chunk("2401.1", &text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "INTRODUCTION");
        assert_eq!(chunks[1].section, "RELATED WORK");
        assert_eq!(chunks[1].sequence_index, 1);
        assert!(chunks.iter().all(|c| c.document_id == "2401.1"));
    }

    #[test]
    fn long_sections_window_with_overlap() {
        let chunker = SectionChunker::new(ChunkingConfig { target_words: 100, overlap_words: 20, min_words: 10 });
        let text = format!("METHODS\n{}", words(250, "w"));
        let chunks = chunker.chunk("d", &text);
        // windows start at 0, 80, 160
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].text.starts_with("w80 "));
        assert!(chunks[2].text.ends_with("w249"));
    }

    #[test]
    fn short_and_unlabelled_pieces_are_merged() {
        let text = format!("{}\nRESULTS\n{}\nCONCLUSION\n{}", words(5, "p"), words(60, "r"), words(4, "c"));
        let chunks = SectionChunker::default().chunk("d", &text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].section, UNKNOWN_SECTION);
        assert_eq!(chunks[1].section, "RESULTS");
        assert_eq!(chunks[2].section, "CONCLUSION");
        assert_eq!(chunks.iter().map(|c| c.sequence_index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(SectionChunker::default().chunk("d", "  \n\n").is_empty());
    }
}
