// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Fiction-editing family: context preparation, generation, validation,
//! resolution, and book generation over a manuscript.
//!
//! The contracts are strict because the stages chain: preparation slices
//! the manuscript by chapter ranges, generation proposes typed
//! [`ManuscriptEdit`]s, validation proves each edit resolves, resolution
//! turns anchors into byte positions and applies them, and book generation
//! drives the loop chapter by chapter.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::llm::{parse_json_block, LlmClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    /// Byte offset of the chapter start in the manuscript.
    pub start: usize,
    /// Byte offset one past the chapter end.
    pub end: usize,
}

/// Typed edit instruction. Anchors are literal substrings of the
/// manuscript; resolution turns them into positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ManuscriptEdit {
    InsertAfter { anchor: String, text: String },
    Replace { find: String, replace: String },
    Delete { find: String },
    AppendChapter { title: String, text: String },
}

/// An edit with its resolved byte position, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEdit {
    pub edit: ManuscriptEdit,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditVerdict {
    Valid,
    AnchorNotFound,
    AmbiguousAnchor,
}

/// The shared state bag the fiction stages pass between one another.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditingState {
    pub manuscript: String,
    pub outline: String,
    pub chapter_ranges: Vec<ChapterRange>,
    pub references: Vec<String>,
    pub operations: Vec<ManuscriptEdit>,
    pub resolved: Vec<ResolvedEdit>,
    pub validation: Vec<EditVerdict>,
}

// ============================================================================
// Context preparation
// ============================================================================

/// Slice the chapters under edit plus the outline into a working context.
pub fn prepare_context(state: &EditingState, chapters: &[usize]) -> String {
    let mut context = String::new();
    if !state.outline.is_empty() {
        context.push_str(&format!("Outline:\n{}\n\n", state.outline));
    }
    for &index in chapters {
        if let Some(range) = state.chapter_ranges.get(index) {
            let slice = state
                .manuscript
                .get(range.start..range.end.min(state.manuscript.len()))
                .unwrap_or_default();
            context.push_str(&format!("--- Chapter {} ---\n{}\n\n", index + 1, slice));
        }
    }
    if !state.references.is_empty() {
        context.push_str(&format!("References:\n{}\n", state.references.join("\n")));
    }
    context
}

// ============================================================================
// Generation
// ============================================================================

pub struct EditGenerator {
    llm: Arc<dyn LlmClient>,
}

impl EditGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Ask for typed edits against the prepared context.
    pub async fn generate(
        &self,
        context: &str,
        instruction: &str,
    ) -> anyhow::Result<Vec<ManuscriptEdit>> {
        let prompt = format!(
            "You are editing a manuscript. Apply this instruction:\n{instruction}\n\n\
             Context:\n{context}\n\n\
             Respond with JSON: {{\"edits\": [{{\"op\": \"insert_after\"|\"replace\"|\"delete\"|\
             \"append_chapter\", ...}}]}}.\n\
             insert_after takes anchor+text, replace takes find+replace, delete takes find, \
             append_chapter takes title+text. Anchors must be verbatim substrings of the context."
        );
        let response = self.llm.complete(&prompt).await?;
        let edits = parse_json_block(&response)
            .and_then(|v| v.get("edits").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Ok(edits)
    }
}

// ============================================================================
// Validation & resolution
// ============================================================================

fn anchor_of(edit: &ManuscriptEdit) -> Option<&str> {
    match edit {
        ManuscriptEdit::InsertAfter { anchor, .. } => Some(anchor),
        ManuscriptEdit::Replace { find, .. } => Some(find),
        ManuscriptEdit::Delete { find } => Some(find),
        ManuscriptEdit::AppendChapter { .. } => None,
    }
}

/// Validate each operation against the manuscript: the anchor must occur
/// exactly once.
pub fn validate_edits(manuscript: &str, edits: &[ManuscriptEdit]) -> Vec<EditVerdict> {
    edits
        .iter()
        .map(|edit| match anchor_of(edit) {
            None => EditVerdict::Valid,
            Some(anchor) if anchor.is_empty() => EditVerdict::AnchorNotFound,
            Some(anchor) => {
                let mut occurrences = manuscript.match_indices(anchor);
                match (occurrences.next(), occurrences.next()) {
                    (None, _) => EditVerdict::AnchorNotFound,
                    (Some(_), Some(_)) => EditVerdict::AmbiguousAnchor,
                    (Some(_), None) => EditVerdict::Valid,
                }
            }
        })
        .collect()
}

/// Resolve valid operations to byte positions. Invalid operations are
/// dropped; callers decide whether that fails the run.
pub fn resolve_edits(manuscript: &str, edits: &[ManuscriptEdit]) -> Vec<ResolvedEdit> {
    let verdicts = validate_edits(manuscript, edits);
    edits
        .iter()
        .zip(verdicts)
        .filter(|(_, verdict)| *verdict == EditVerdict::Valid)
        .map(|(edit, _)| {
            let position = match anchor_of(edit) {
                Some(anchor) => {
                    let at = manuscript.find(anchor).unwrap_or(manuscript.len());
                    match edit {
                        ManuscriptEdit::InsertAfter { anchor, .. } => at + anchor.len(),
                        _ => at,
                    }
                }
                None => manuscript.len(),
            };
            ResolvedEdit {
                edit: edit.clone(),
                position,
            }
        })
        .collect()
}

/// Apply resolved edits. Application order is back-to-front so earlier
/// positions stay valid while later text shifts.
pub fn apply_edits(manuscript: &str, resolved: &[ResolvedEdit]) -> String {
    let mut ordered: Vec<&ResolvedEdit> = resolved.iter().collect();
    ordered.sort_by(|a, b| b.position.cmp(&a.position));

    let mut text = manuscript.to_string();
    for item in ordered {
        match &item.edit {
            ManuscriptEdit::InsertAfter { text: insertion, .. } => {
                text.insert_str(item.position, insertion);
            }
            ManuscriptEdit::Replace { find, replace } => {
                let end = item.position + find.len();
                text.replace_range(item.position..end, replace);
            }
            ManuscriptEdit::Delete { find } => {
                let end = item.position + find.len();
                text.replace_range(item.position..end, "");
            }
            ManuscriptEdit::AppendChapter { title, text: body } => {
                text.push_str(&format!("\n\n# {title}\n\n{body}"));
            }
        }
    }
    text
}

// ============================================================================
// Book generation
// ============================================================================

pub struct BookGenerator {
    generator: EditGenerator,
}

impl BookGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            generator: EditGenerator::new(llm),
        }
    }

    /// Drive the prepare → generate → validate → resolve loop over each
    /// chapter, threading the evolving state through.
    pub async fn run(
        &self,
        mut state: EditingState,
        instruction: &str,
    ) -> anyhow::Result<EditingState> {
        let chapter_count = state.chapter_ranges.len().max(1);
        for chapter in 0..chapter_count {
            let context = prepare_context(&state, &[chapter]);
            let edits = self.generator.generate(&context, instruction).await?;

            state.validation = validate_edits(&state.manuscript, &edits);
            state.operations = edits;
            state.resolved = resolve_edits(&state.manuscript, &state.operations);
            state.manuscript = apply_edits(&state.manuscript, &state.resolved);

            // Positions are stale once applied; ranges are re-derived from
            // the chapter headings the next preparation pass.
            state.chapter_ranges = derive_chapter_ranges(&state.manuscript);
        }
        Ok(state)
    }
}

/// Chapter ranges from `# ` headings; the whole text is one chapter when
/// there are none.
pub fn derive_chapter_ranges(manuscript: &str) -> Vec<ChapterRange> {
    let mut starts: Vec<usize> = Vec::new();
    for (offset, line) in line_offsets(manuscript) {
        if line.starts_with("# ") {
            starts.push(offset);
        }
    }
    if starts.is_empty() {
        return vec![ChapterRange {
            start: 0,
            end: manuscript.len(),
        }];
    }
    let mut ranges = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(manuscript.len());
        ranges.push(ChapterRange { start, end });
    }
    ranges
}

fn line_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.lines().map(move |line| {
        let at = offset;
        offset += line.len() + 1;
        (at, line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    const MANUSCRIPT: &str = "# One\n\nThe hero woke up. The day began.\n\n# Two\n\nThe end came.";

    #[test]
    fn validation_flags_missing_and_ambiguous_anchors() {
        let edits = vec![
            ManuscriptEdit::InsertAfter {
                anchor: "The hero woke up.".to_string(),
                text: " Rain fell.".to_string(),
            },
            ManuscriptEdit::Delete {
                find: "Not in the text".to_string(),
            },
            ManuscriptEdit::Replace {
                find: "The".to_string(),
                replace: "A".to_string(),
            },
        ];
        let verdicts = validate_edits(MANUSCRIPT, &edits);
        assert_eq!(
            verdicts,
            vec![
                EditVerdict::Valid,
                EditVerdict::AnchorNotFound,
                EditVerdict::AmbiguousAnchor
            ]
        );
    }

    #[test]
    fn resolution_and_application_round_trip() {
        let edits = vec![
            ManuscriptEdit::InsertAfter {
                anchor: "The hero woke up.".to_string(),
                text: " Rain fell.".to_string(),
            },
            ManuscriptEdit::Replace {
                find: "The end came.".to_string(),
                replace: "The end never came.".to_string(),
            },
        ];
        let resolved = resolve_edits(MANUSCRIPT, &edits);
        assert_eq!(resolved.len(), 2);
        let applied = apply_edits(MANUSCRIPT, &resolved);
        assert!(applied.contains("The hero woke up. Rain fell."));
        assert!(applied.contains("The end never came."));
    }

    #[test]
    fn chapter_ranges_cover_headings() {
        let ranges = derive_chapter_ranges(MANUSCRIPT);
        assert_eq!(ranges.len(), 2);
        assert!(MANUSCRIPT[ranges[0].start..ranges[0].end].starts_with("# One"));
        assert!(MANUSCRIPT[ranges[1].start..ranges[1].end].starts_with("# Two"));

        let single = derive_chapter_ranges("no headings here");
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn context_preparation_slices_requested_chapters() {
        let state = EditingState {
            manuscript: MANUSCRIPT.to_string(),
            outline: "Hero's journey".to_string(),
            chapter_ranges: derive_chapter_ranges(MANUSCRIPT),
            ..Default::default()
        };
        let context = prepare_context(&state, &[1]);
        assert!(context.contains("Hero's journey"));
        assert!(context.contains("The end came."));
        assert!(!context.contains("The hero woke up."));
    }

    #[tokio::test]
    async fn book_generation_applies_edits_per_chapter() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"edits": [{"op": "insert_after", "anchor": "The day began.", "text": " Birds sang."}]}"#,
            r#"{"edits": [{"op": "replace", "find": "The end came.", "replace": "The end arrived quietly."}]}"#,
        ]));
        let generator = BookGenerator::new(llm);
        let state = EditingState {
            manuscript: MANUSCRIPT.to_string(),
            chapter_ranges: derive_chapter_ranges(MANUSCRIPT),
            ..Default::default()
        };
        let result = generator.run(state, "polish the prose").await.unwrap();
        assert!(result.manuscript.contains("Birds sang."));
        assert!(result.manuscript.contains("The end arrived quietly."));
    }
}
