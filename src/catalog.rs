// WHY: Fixed, ordered table of figurative expressions compiled into case-insensitive matchers
// Catalog order is the priority tie-break when two patterns start at the same offset

use anyhow::{bail, Context, Result};
use regex_automata::{meta::Regex, util::syntax};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info};

use crate::template::SimplifiedTemplate;

/// Kind of figurative expression a pattern recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionCategory {
    Idiom,
    ConceptualMetaphor,
}

impl ExpressionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionCategory::Idiom => "idiom",
            ExpressionCategory::ConceptualMetaphor => "conceptual_metaphor",
        }
    }
}

impl std::fmt::Display for ExpressionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uncompiled catalog entry
///
/// `explanation` may contain `{metaphor}`, replaced by the metaphor name.
/// `simplified` is a [`SimplifiedTemplate`] source.
#[derive(Debug, Clone, Copy)]
pub struct PatternDefinition {
    pub category: ExpressionCategory,
    pub matcher: &'static str,
    pub metaphor: Option<&'static str>,
    pub explanation: &'static str,
    pub simplified: &'static str,
}

/// Bundled expressions in priority order
pub const BUNDLED_PATTERNS: &[PatternDefinition] = &[
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\bbreak\s+the\s+ice\b",
        metaphor: None,
        explanation: "This means to start a conversation or reduce tension.",
        simplified: "start a conversation",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\b(?:a\s+)?piece\s+of\s+cake\b",
        metaphor: None,
        explanation: "This means something is very easy to do.",
        simplified: "very easy",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\bhit\s+the\s+nail\s+on\s+the\s+head\b",
        metaphor: None,
        explanation: "This means to be exactly right about something.",
        simplified: "said exactly the right thing",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\bspill\s+the\s+beans\b",
        metaphor: None,
        explanation: "This means to reveal a secret.",
        simplified: "reveal the secret",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\b(?:let\s+)?(?:the\s+)?cat\s+out\s+of\s+the\s+bag\b",
        metaphor: None,
        explanation: "This means to accidentally reveal a secret.",
        simplified: "reveal the secret by accident",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\bover\s+the\s+moon\b",
        metaphor: None,
        explanation: "This means to be extremely pleased or happy.",
        simplified: "very happy",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\bunder\s+the\s+weather\b",
        metaphor: None,
        explanation: "This means to feel slightly ill.",
        simplified: "a little sick",
    },
    PatternDefinition {
        category: ExpressionCategory::Idiom,
        matcher: r"\ban\s+arm\s+and\s+a\s+leg\b",
        metaphor: None,
        explanation: "This means a very large amount of money.",
        simplified: "a lot of money",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\btime\s+is\s+money\b",
        metaphor: Some("TIME IS MONEY"),
        explanation: "This uses the conceptual metaphor {metaphor}, understanding time as a valuable resource.",
        simplified: "time is valuable",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\blife\s+is\s+a\s+journey\b",
        metaphor: Some("LIFE IS A JOURNEY"),
        explanation: "This uses the conceptual metaphor {metaphor}, understanding life as traveling a path.",
        simplified: "life has many experiences",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\bgrasp\s+the\s+(concept|idea|point)\b",
        metaphor: Some("UNDERSTANDING IS GRASPING"),
        explanation: "This uses the conceptual metaphor {metaphor}, understanding ideas as objects we hold.",
        simplified: "understand the {1}",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\bI\s+see\s+what\s+you\s+mean\b",
        metaphor: Some("UNDERSTANDING IS SEEING"),
        explanation: "This uses the conceptual metaphor {metaphor}, understanding as a kind of vision.",
        simplified: "I understand what you mean",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\b(?:over\s+the\s+moon|on\s+cloud\s+nine|on\s+top\s+of\s+the\s+world)\b",
        metaphor: Some("HAPPY IS UP"),
        explanation: "This uses the conceptual metaphor {metaphor}, describing happiness as being high up.",
        simplified: "very happy",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\b(?:shot\s+down|attacked|demolished)\s+(my|your|his|her|our|their)\s+argument\b",
        metaphor: Some("ARGUMENT IS WAR"),
        explanation: "This uses the conceptual metaphor {metaphor}, describing a disagreement as a battle.",
        simplified: "rejected {1} argument",
    },
    PatternDefinition {
        category: ExpressionCategory::ConceptualMetaphor,
        matcher: r"\bfood\s+for\s+thought\b",
        metaphor: Some("IDEAS ARE FOOD"),
        explanation: "This uses the conceptual metaphor {metaphor}, treating ideas as something to digest.",
        simplified: "something to think about",
    },
];

/// Occurrence of a single pattern; offsets are byte offsets into the scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub start: usize,
    pub end: usize,
    /// Group 0 is the whole match; `None` for groups that did not participate
    groups: Vec<Option<Range<usize>>>,
}

impl RawMatch {
    pub fn group<'h>(&self, text: &'h str, index: usize) -> Option<&'h str> {
        self.groups
            .get(index)
            .and_then(|range| range.clone())
            .and_then(|range| text.get(range))
    }
}

/// Compiled catalog entry
#[derive(Debug)]
pub struct ExpressionPattern {
    category: ExpressionCategory,
    matcher: String,
    metaphor: Option<String>,
    regex: Regex,
    explanation: String,
    simplified: SimplifiedTemplate,
}

impl ExpressionPattern {
    /// Compile a definition, checking that every placeholder names an existing group
    pub fn compile(definition: &PatternDefinition) -> Result<Self> {
        let regex = Regex::builder()
            .syntax(syntax::Config::new().case_insensitive(true))
            .build(definition.matcher)
            .with_context(|| format!("Invalid matcher {:?}", definition.matcher))?;

        let simplified = SimplifiedTemplate::parse(definition.simplified)
            .with_context(|| format!("Invalid simplified form for matcher {:?}", definition.matcher))?;

        // captures_len counts the implicit whole-match group
        let group_len = regex.captures_len();
        if let Some(max_group) = simplified.max_group() {
            if max_group >= group_len {
                bail!(
                    "Simplified form {:?} references group {} but matcher {:?} has {} capture group(s)",
                    definition.simplified,
                    max_group,
                    definition.matcher,
                    group_len.saturating_sub(1)
                );
            }
        }

        let explanation = match definition.metaphor {
            Some(name) => definition.explanation.replace("{metaphor}", name),
            None => definition.explanation.to_string(),
        };

        Ok(Self {
            category: definition.category,
            matcher: definition.matcher.to_string(),
            metaphor: definition.metaphor.map(str::to_string),
            regex,
            explanation,
            simplified,
        })
    }

    pub fn category(&self) -> ExpressionCategory {
        self.category
    }

    pub fn matcher(&self) -> &str {
        &self.matcher
    }

    pub fn metaphor(&self) -> Option<&str> {
        self.metaphor.as_deref()
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn simplified(&self) -> &SimplifiedTemplate {
        &self.simplified
    }

    /// Leftmost, non-overlapping occurrences of this pattern alone
    ///
    /// Lazy and restartable: each call starts a fresh scan of `text`.
    pub fn find_all<'a>(&'a self, text: &'a str) -> impl Iterator<Item = RawMatch> + 'a {
        self.regex.captures_iter(text).filter_map(|caps| {
            let whole = caps.get_match()?;
            let groups = (0..caps.group_len())
                .map(|index| caps.get_group(index).map(|span| span.range()))
                .collect();
            Some(RawMatch {
                start: whole.start(),
                end: whole.end(),
                groups,
            })
        })
    }

    /// Resolve the simplified form for one occurrence found in `text`
    pub fn render_simplified(&self, text: &str, raw: &RawMatch) -> String {
        self.simplified.render(|index| raw.group(text, index))
    }
}

/// Ordered set of compiled expression patterns
#[derive(Debug)]
pub struct Catalog {
    patterns: Vec<ExpressionPattern>,
}

impl Catalog {
    /// Compile the bundled expression table
    pub fn bundled() -> Result<Self> {
        Self::from_definitions(BUNDLED_PATTERNS)
    }

    /// Compile a custom table, preserving its order
    pub fn from_definitions(definitions: &[PatternDefinition]) -> Result<Self> {
        info!("Compiling expression catalog with {} patterns", definitions.len());

        let mut patterns = Vec::with_capacity(definitions.len());
        for (index, definition) in definitions.iter().enumerate() {
            let pattern = ExpressionPattern::compile(definition)
                .with_context(|| format!("Catalog entry {index} failed to compile"))?;
            debug!(index, matcher = definition.matcher, category = %definition.category, "Compiled pattern");
            patterns.push(pattern);
        }

        Ok(Self { patterns })
    }

    /// Patterns in catalog order
    pub fn all_patterns(&self) -> &[ExpressionPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    static SHARED_CATALOG: OnceLock<Catalog> = OnceLock::new();

    fn get_catalog() -> &'static Catalog {
        SHARED_CATALOG.get_or_init(|| Catalog::bundled().expect("bundled catalog compiles"))
    }

    fn pattern_for(matcher_fragment: &str) -> &'static ExpressionPattern {
        get_catalog()
            .all_patterns()
            .iter()
            .find(|p| p.matcher().contains(matcher_fragment))
            .expect("pattern present in bundled catalog")
    }

    #[test]
    fn test_bundled_catalog_compiles_in_order() {
        let catalog = get_catalog();
        assert_eq!(catalog.len(), BUNDLED_PATTERNS.len());
        for (compiled, definition) in catalog.all_patterns().iter().zip(BUNDLED_PATTERNS) {
            assert_eq!(compiled.matcher(), definition.matcher);
            assert_eq!(compiled.category(), definition.category);
        }
    }

    #[test]
    fn test_metaphor_name_in_explanation() {
        let pattern = pattern_for("time");
        assert_eq!(pattern.metaphor(), Some("TIME IS MONEY"));
        assert!(pattern.explanation().contains("TIME IS MONEY"));
        assert!(!pattern.explanation().contains("{metaphor}"));
    }

    #[test]
    fn test_case_insensitive_matching() {
        let pattern = pattern_for("ice");
        let matches: Vec<_> = pattern.find_all("BREAK THE ICE, then Break The Ice").collect();
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].start, matches[0].end), (0, 13));
        assert_eq!((matches[1].start, matches[1].end), (20, 33));
    }

    #[test]
    fn test_word_boundaries_respected() {
        let pattern = pattern_for("ice");
        assert_eq!(pattern.find_all("break the icebox").count(), 0);
    }

    #[test]
    fn test_find_all_is_restartable() {
        let pattern = pattern_for("beans");
        let text = "spill the beans and spill the beans";
        let first: Vec<_> = pattern.find_all(text).collect();
        let second: Vec<_> = pattern.find_all(text).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_capture_group_rendering() {
        let pattern = pattern_for("grasp");
        let text = "grasp the idea";
        let raw = pattern.find_all(text).next().unwrap();
        assert_eq!(raw.group(text, 1), Some("idea"));
        assert_eq!(pattern.render_simplified(text, &raw), "understand the idea");
    }

    #[test]
    fn test_capture_keeps_original_case() {
        let pattern = pattern_for("argument");
        let text = "She demolished HIS argument.";
        let raw = pattern.find_all(text).next().unwrap();
        assert_eq!(pattern.render_simplified(text, &raw), "rejected HIS argument");
    }

    #[test]
    fn test_invalid_matcher_rejected() {
        let definitions = [PatternDefinition {
            category: ExpressionCategory::Idiom,
            matcher: r"break (the ice",
            metaphor: None,
            explanation: "broken",
            simplified: "broken",
        }];
        assert!(Catalog::from_definitions(&definitions).is_err());
    }

    #[test]
    fn test_template_group_out_of_range_rejected() {
        let definitions = [PatternDefinition {
            category: ExpressionCategory::ConceptualMetaphor,
            matcher: r"grasp the (concept)",
            metaphor: None,
            explanation: "x",
            simplified: "understand the {2}",
        }];
        let err = Catalog::from_definitions(&definitions).unwrap_err();
        assert!(format!("{err:#}").contains("references group 2"));
    }

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_string(&ExpressionCategory::ConceptualMetaphor).unwrap(),
            "\"conceptual_metaphor\""
        );
        assert_eq!(ExpressionCategory::Idiom.to_string(), "idiom");
    }
}
