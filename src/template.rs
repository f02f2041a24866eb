// WHY: Simplified forms are parsed once into literal segments and group references
// so substitution is positional and a literal "$1" in text is never special

use anyhow::{bail, Result};
use std::fmt;

/// One piece of a parsed simplified-form template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Text copied verbatim into the replacement
    Literal(String),
    /// Capture group index; 0 is the whole match
    Group(usize),
}

/// Replacement template such as `understand the {1}`
///
/// Placeholders are `{N}` with `N` a capture group index. `{{` and `}}`
/// produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifiedTemplate {
    segments: Vec<TemplateSegment>,
}

impl SimplifiedTemplate {
    /// Parse a template, rejecting unbalanced braces and non-numeric placeholders
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' => {
                    if chars.peek().map(|&(_, c)| c) == Some('{') {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut digits = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        digits.push(c);
                    }

                    if !closed {
                        bail!("Unclosed placeholder at byte {} in template {:?}", pos, source);
                    }
                    let index: usize = match digits.parse() {
                        Ok(index) => index,
                        Err(_) => bail!("Placeholder {{{}}} in template {:?} is not a group index", digits, source),
                    };

                    if !literal.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(TemplateSegment::Group(index));
                }
                '}' => {
                    if chars.peek().map(|&(_, c)| c) == Some('}') {
                        chars.next();
                        literal.push('}');
                    } else {
                        bail!("Unmatched '}}' at byte {} in template {:?}", pos, source);
                    }
                }
                _ => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// Highest group index referenced, if any placeholder exists
    pub fn max_group(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                TemplateSegment::Group(index) => Some(*index),
                TemplateSegment::Literal(_) => None,
            })
            .max()
    }

    /// Build the replacement; `group` returns the captured text or `None` for
    /// a group that did not participate, which resolves to an empty string
    pub fn render<'t, F>(&self, group: F) -> String
    where
        F: Fn(usize) -> Option<&'t str>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Group(index) => {
                    if let Some(captured) = group(*index) {
                        out.push_str(captured);
                    }
                }
            }
        }
        out
    }
}

/// Re-emits the template source form, escaping literal braces
impl fmt::Display for SimplifiedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => {
                    f.write_str(&text.replace('{', "{{").replace('}', "}}"))?
                }
                TemplateSegment::Group(index) => write!(f, "{{{index}}}")?,
            }
        }
        Ok(())
    }
}
