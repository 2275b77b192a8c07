//! Resume templates: LaTeX documents that declare named content slots.
//!
//! A slot is a region between two comment marker lines:
//!
//! ```text
//! % @slot summary
//! Placeholder text the pipeline may replace.
//! % @endslot
//! ```
//!
//! `% @slot projects optional` declares a slot whose content may come back empty.
//! Markers stay in every merged document, so a merged document is still a template.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod store;

pub const SLOT_OPEN_TAG: &str = "@slot";
pub const SLOT_CLOSE_TAG: &str = "@endslot";
const OPTIONAL_FLAG: &str = "optional";

/// Document-level commands that must only ever come from the template.
const STRUCTURAL_COMMANDS: &[&str] = &[
    "\\documentclass",
    "\\usepackage",
    "\\begin{document}",
    "\\end{document}",
    "\\section",
];

/// Structural category of a template. Decides the section emphasis of the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateCategory {
    NewGrad,
    Experienced,
    Custom,
}

impl TemplateCategory {
    /// Canonical section order for the category. `Custom` keeps whatever the template has.
    pub fn section_order(&self) -> &'static [&'static str] {
        match self {
            TemplateCategory::NewGrad => {
                &["summary", "education", "skills", "projects", "experience"]
            }
            TemplateCategory::Experienced => {
                &["summary", "skills", "experience", "education", "projects"]
            }
            TemplateCategory::Custom => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::NewGrad => "new_grad",
            TemplateCategory::Experienced => "experienced",
            TemplateCategory::Custom => "custom",
        }
    }
}

/// A named, replaceable region of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub name: String,
    pub required: bool,
    /// Byte range of the placeholder text inside `Template::text`.
    #[serde(skip)]
    pub region: Range<usize>,
}

/// A loaded, classified template. Immutable; reloading builds a new value.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub identifier: String,
    #[serde(skip)]
    pub text: String,
    pub category: TemplateCategory,
    /// Declared slots in order of appearance.
    pub slots: Vec<Slot>,
    /// Problems found while reading slot markers. Non-empty means `slots` is empty.
    pub warnings: Vec<String>,
}

impl Template {
    pub fn placeholder(&self, slot: &Slot) -> &str {
        &self.text[slot.region.clone()]
    }

    #[cfg(test)]
    pub fn slot_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Document-level commands this template uses. A model answer must never
    /// contain them; slot tags are checked separately by [`find_comment_tag`].
    pub fn structural_markers(&self) -> Vec<&'static str> {
        STRUCTURAL_COMMANDS
            .iter()
            .copied()
            .filter(|cmd| self.text.contains(cmd))
            .collect()
    }
}

/// First slot tag written as a LaTeX comment: `%`, optional blanks, then
/// `@slot` or `@endslot` as a whole word. `\%` is literal text, not a comment,
/// so `dev@slotify.io` or `50\% @slot` never match.
pub fn find_comment_tag(text: &str) -> Option<&'static str> {
    text.match_indices('%').find_map(|(i, _)| {
        let backslashes = text[..i].bytes().rev().take_while(|&b| b == b'\\').count();
        if backslashes % 2 == 1 {
            return None;
        }
        let rest = text[i + 1..].trim_start_matches(|c: char| c == ' ' || c == '\t');
        [SLOT_CLOSE_TAG, SLOT_OPEN_TAG].into_iter().find(|tag| {
            rest.strip_prefix(*tag)
                .is_some_and(|after| !after.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
        })
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MarkerLine<'a> {
    Open { name: &'a str, required: bool },
    Close,
}

/// Recognises `% @slot <name> [optional]` and `% @endslot` lines.
fn parse_marker_line(line: &str) -> Option<MarkerLine<'_>> {
    let rest = line.trim().strip_prefix('%')?.trim_start();
    if rest == SLOT_CLOSE_TAG {
        return Some(MarkerLine::Close);
    }
    let args = rest.strip_prefix(SLOT_OPEN_TAG)?;
    if !args.starts_with(char::is_whitespace) {
        return None;
    }
    let mut words = args.split_whitespace();
    let name = words.next()?;
    let required = match words.next() {
        None => true,
        Some(OPTIONAL_FLAG) => false,
        Some(_) => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(MarkerLine::Open { name, required })
}

/// Reads the slot markers of a template in order of appearance.
///
/// Returns a description of the first malformed marker (unterminated, nested,
/// stray close, duplicate name) as the error.
pub fn parse_slots(text: &str) -> Result<Vec<Slot>, String> {
    let mut slots = Vec::new();
    let mut seen = HashSet::new();
    let mut open: Option<(String, bool, usize, usize)> = None;
    let mut offset = 0;

    for (line_no, line) in text.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();

        match parse_marker_line(line) {
            Some(MarkerLine::Open { name, required }) => {
                if let Some((outer, ..)) = &open {
                    return Err(format!(
                        "line {}: slot '{name}' opened inside slot '{outer}'",
                        line_no + 1
                    ));
                }
                if !seen.insert(name.to_string()) {
                    return Err(format!("line {}: duplicate slot '{name}'", line_no + 1));
                }
                open = Some((name.to_string(), required, offset, line_no + 1));
            }
            Some(MarkerLine::Close) => {
                let Some((name, required, start, _)) = open.take() else {
                    return Err(format!("line {}: @endslot without @slot", line_no + 1));
                };
                slots.push(Slot {
                    name,
                    required,
                    region: start..line_start,
                });
            }
            None => {}
        }
    }

    if let Some((name, _, _, line)) = open {
        return Err(format!("line {line}: slot '{name}' is never closed"));
    }
    Ok(slots)
}
