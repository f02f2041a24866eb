// WHY: Adaptation engine turns one input string into annotated spans plus a rewritten text
// All offsets refer to the original input; the rewrite is a single left-to-right pass

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::{Catalog, ExpressionCategory};

/// 0-based byte position in source text
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct BytePos(pub usize);

/// 0-based character position in source text
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct CharPos(pub usize);

impl From<CharPos> for usize {
    fn from(pos: CharPos) -> Self {
        pos.0
    }
}

/// Forward-only byte to character offset conversion
///
/// Accepted matches are visited in ascending order, so the whole conversion
/// is one pass over the text.
struct PositionTracker<'a> {
    text_bytes: &'a [u8],
    byte_pos: usize,
    char_pos: usize,
}

impl<'a> PositionTracker<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text_bytes: text.as_bytes(),
            byte_pos: 0,
            char_pos: 0,
        }
    }

    fn advance_to_byte(&mut self, target: BytePos) -> CharPos {
        debug_assert!(target.0 >= self.byte_pos, "position tracker cannot seek backwards");
        let target = target.0.min(self.text_bytes.len());

        while self.byte_pos < target {
            // Continuation bytes (10xxxxxx) do not start a character
            if (self.text_bytes[self.byte_pos] & 0xC0) != 0x80 {
                self.char_pos += 1;
            }
            self.byte_pos += 1;
        }

        CharPos(self.char_pos)
    }
}

/// One figurative expression found in the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionMatch {
    pub id: String,
    pub category: ExpressionCategory,
    /// Character offset of the first matched character
    pub start: usize,
    /// Character offset one past the last matched character
    pub end: usize,
    pub original_text: String,
    pub explanation: String,
    pub simplified_text: String,
}

/// Output of one engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationResult {
    pub original_text: String,
    pub adapted_text: String,
    pub expressions: Vec<ExpressionMatch>,
}

/// Raw candidate before overlap resolution, in byte offsets
#[derive(Debug, Clone)]
struct Candidate {
    pattern_index: usize,
    start: BytePos,
    end: BytePos,
    simplified: String,
}

impl Candidate {
    fn len(&self) -> usize {
        self.end.0.saturating_sub(self.start.0)
    }
}

/// Stateless figurative-language detector and rewriter
pub struct AdaptationEngine {
    catalog: Catalog,
}

impl AdaptationEngine {
    /// Create engine with the bundled expression catalog
    pub fn new() -> Result<Self> {
        Ok(Self::with_catalog(Catalog::bundled()?))
    }

    /// Create engine over a custom catalog
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Detect every known expression in `text` and build the adapted text
    pub fn process(&self, text: &str) -> AdaptationResult {
        debug!("Starting adaptation on {} bytes", text.len());

        let candidates = self.collect_candidates(text);
        let candidate_count = candidates.len();
        let accepted = resolve_overlaps(candidates);
        let adapted_text = rewrite(text, &accepted);
        let expressions = self.annotate(text, &accepted);

        debug!(
            candidates = candidate_count,
            accepted = expressions.len(),
            "Adaptation complete"
        );

        AdaptationResult {
            original_text: text.to_string(),
            adapted_text,
            expressions,
        }
    }

    fn collect_candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (pattern_index, pattern) in self.catalog.all_patterns().iter().enumerate() {
            for raw in pattern.find_all(text) {
                let original = &text[raw.start..raw.end];
                let mut simplified = pattern.render_simplified(text, &raw);
                if is_sentence_start(text, raw.start) {
                    simplified = match_leading_case(original, simplified);
                }
                candidates.push(Candidate {
                    pattern_index,
                    start: BytePos(raw.start),
                    end: BytePos(raw.end),
                    simplified,
                });
            }
        }

        candidates
    }

    fn annotate(&self, text: &str, accepted: &[Candidate]) -> Vec<ExpressionMatch> {
        // Call-scoped token keeps ids unique without any process-wide counter
        let call_token = Uuid::new_v4().simple().to_string();
        let call_token = &call_token[..8];
        let patterns = self.catalog.all_patterns();
        let mut tracker = PositionTracker::new(text);

        accepted
            .iter()
            .enumerate()
            .map(|(n, candidate)| {
                let pattern = &patterns[candidate.pattern_index];
                let start = tracker.advance_to_byte(candidate.start);
                let end = tracker.advance_to_byte(candidate.end);

                ExpressionMatch {
                    id: format!("expr-{call_token}-{n}"),
                    category: pattern.category(),
                    start: start.into(),
                    end: end.into(),
                    original_text: text[candidate.start.0..candidate.end.0].to_string(),
                    explanation: pattern.explanation().to_string(),
                    simplified_text: candidate.simplified.clone(),
                }
            })
            .collect()
    }
}

/// Keep the earliest, highest-priority candidates and drop anything overlapping them
///
/// Order: start ascending, catalog index ascending, longer span first.
/// Zero-length and inverted spans are discarded.
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.retain(|candidate| {
        let valid = candidate.end > candidate.start;
        if !valid {
            debug!(
                pattern_index = candidate.pattern_index,
                start = candidate.start.0,
                end = candidate.end.0,
                "Discarding degenerate match"
            );
        }
        valid
    });

    candidates.sort_by_key(|c| (c.start, c.pattern_index, Reverse(c.len())));

    let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut last_end = BytePos(0);

    for candidate in candidates {
        if candidate.start >= last_end {
            last_end = candidate.end;
            accepted.push(candidate);
        } else {
            debug!(
                pattern_index = candidate.pattern_index,
                start = candidate.start.0,
                "Dropping overlapping match"
            );
        }
    }

    accepted
}

/// Copy unmatched stretches and substitute accepted spans in one pass
fn rewrite(text: &str, accepted: &[Candidate]) -> String {
    let replaced: usize = accepted.iter().map(Candidate::len).sum();
    let inserted: usize = accepted.iter().map(|c| c.simplified.len()).sum();
    let mut adapted = String::with_capacity(text.len() - replaced + inserted);

    let mut cursor = 0;
    for candidate in accepted {
        adapted.push_str(&text[cursor..candidate.start.0]);
        adapted.push_str(&candidate.simplified);
        cursor = candidate.end.0;
    }
    adapted.push_str(&text[cursor..]);

    adapted
}

/// True at the start of `text` or after sentence-ending punctuation and whitespace
fn is_sentence_start(text: &str, byte_start: usize) -> bool {
    let preceding = &text[..byte_start];
    let trimmed = preceding.trim_end();
    trimmed.is_empty() || (trimmed.len() < preceding.len() && trimmed.ends_with(['.', '!', '?']))
}

/// Capitalize the replacement when the matched text starts with an uppercase letter
///
/// Only applied to sentence-initial matches; elsewhere the simplified form is
/// exactly the rendered template.
fn match_leading_case(original: &str, simplified: String) -> String {
    let original_upper = original.chars().next().is_some_and(char::is_uppercase);
    let mut chars = simplified.chars();
    match chars.next() {
        Some(first) if original_upper && first.is_lowercase() => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => simplified,
    }
}
