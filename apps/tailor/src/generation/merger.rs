//! Response Merger: splits the model answer into slot values and substitutes
//! them into the template.
//!
//! Segments correlate to slots by position: the Nth segment fills the Nth
//! declared slot. Validation runs on every segment before any substitution, so
//! a failed merge never yields a partial document. Outside slot regions the
//! merged text is the template's bytes, copied verbatim.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::templates::{find_comment_tag, Slot, Template};

const BOLD_MARK: &str = "**";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("Slot count mismatch: template declares {expected} slots, response has {actual} segments")]
    SlotCountMismatch { expected: usize, actual: usize },

    #[error("Required slot '{slot}' came back empty")]
    MissingContent { slot: String },

    #[error("Unsafe content in slot '{slot}': contains structural marker '{marker}'")]
    UnsafeContent { slot: String, marker: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    pub slot: String,
    pub value: String,
}

/// Slot name → replacement text, in template slot order.
/// Every key is a slot declared by the source template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotMap {
    pub entries: Vec<SlotEntry>,
}

#[cfg(test)]
impl SlotMap {
    pub fn get(&self, slot: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.slot == slot)
            .map(|e| e.value.as_str())
    }
}

/// Template text with slot regions replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedDocument {
    pub text: String,
    /// Byte range of each substituted region inside `text`, in slot order.
    #[serde(skip)]
    pub regions: Vec<(String, Range<usize>)>,
}

/// Parses `raw` on `delimiter`, validates it against `template`, and merges.
pub fn merge(
    template: &Template,
    raw: &str,
    delimiter: &str,
) -> Result<(SlotMap, MergedDocument), MergeError> {
    let segments: Vec<&str> = raw.trim().split(delimiter).map(str::trim).collect();

    if segments.len() != template.slots.len() {
        return Err(MergeError::SlotCountMismatch {
            expected: template.slots.len(),
            actual: segments.len(),
        });
    }

    let markers = template.structural_markers();
    for (slot, segment) in template.slots.iter().zip(&segments) {
        if slot.required && segment.is_empty() {
            return Err(MergeError::MissingContent {
                slot: slot.name.clone(),
            });
        }
        if let Some(tag) = find_comment_tag(segment) {
            return Err(MergeError::UnsafeContent {
                slot: slot.name.clone(),
                marker: format!("% {tag}"),
            });
        }
        if let Some(marker) = markers.iter().find(|m| find_unescaped(segment, m).is_some()) {
            return Err(MergeError::UnsafeContent {
                slot: slot.name.clone(),
                marker: marker.to_string(),
            });
        }
    }

    let slot_map = SlotMap {
        entries: template
            .slots
            .iter()
            .zip(&segments)
            .map(|(slot, segment)| SlotEntry {
                slot: slot.name.clone(),
                value: segment.to_string(),
            })
            .collect(),
    };

    let rendered: Vec<String> = template
        .slots
        .iter()
        .zip(&segments)
        .map(|(slot, segment)| render_value(segment, line_ending(template, slot)))
        .collect();
    let document = substitute(template, &rendered);

    debug!(
        "Merged {} slots into '{}' ({} -> {} bytes)",
        slot_map.entries.len(),
        template.identifier,
        template.text.len(),
        document.text.len()
    );

    Ok((slot_map, document))
}

/// Replaces each slot region with the matching value, verbatim, copying every
/// other byte of the template unchanged. `values` must have one entry per slot.
pub fn substitute<S: AsRef<str>>(template: &Template, values: &[S]) -> MergedDocument {
    debug_assert_eq!(values.len(), template.slots.len());

    let mut text = String::with_capacity(template.text.len());
    let mut regions = Vec::with_capacity(values.len());
    let mut cursor = 0;

    for (slot, value) in template.slots.iter().zip(values) {
        text.push_str(&template.text[cursor..slot.region.start]);
        let start = text.len();
        text.push_str(value.as_ref());
        regions.push((slot.name.clone(), start..text.len()));
        cursor = slot.region.end;
    }
    text.push_str(&template.text[cursor..]);

    MergedDocument { text, regions }
}

/// Line ending of the slot's opening marker line.
fn line_ending(template: &Template, slot: &Slot) -> &'static str {
    if template.text[..slot.region.start].ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Slot value as it lands in the document: emphasis translated, every line
/// ended with `eol`, and a trailing `eol` so the closing marker keeps its own line.
fn render_value(segment: &str, eol: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }
    let mut value = translate_bold(segment);
    if eol != "\n" {
        value = value.replace("\r\n", "\n").replace('\n', eol);
    }
    value.push_str(eol);
    value
}

/// `**text**` → `\textbf{text}`. An unpaired `**` is left as written.
pub fn translate_bold(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(open) = rest.find(BOLD_MARK) {
        let after_open = &rest[open + BOLD_MARK.len()..];
        match after_open.find(BOLD_MARK) {
            Some(close) if close > 0 => {
                out.push_str(&rest[..open]);
                out.push_str("\\textbf{");
                out.push_str(&after_open[..close]);
                out.push('}');
                rest = &after_open[close + BOLD_MARK.len()..];
            }
            _ => {
                out.push_str(&rest[..open + BOLD_MARK.len()]);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Position of the first occurrence of `marker` not escaped by a backslash.
/// An odd run of backslashes before the match escapes it (`\%`, `\\section`).
fn find_unescaped(haystack: &str, marker: &str) -> Option<usize> {
    haystack.match_indices(marker).map(|(i, _)| i).find(|&i| {
        let backslashes = haystack[..i].bytes().rev().take_while(|&b| b == b'\\').count();
        backslashes % 2 == 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::classifier::classify;
    use crate::templates::tests::EXPERIENCED_FIXTURE;

    fn experienced() -> Template {
        classify("experienced_resume", EXPERIENCED_FIXTURE)
    }

    /// Bytes outside the merged regions must equal the template outside its slots.
    fn outside_regions(text: &str, regions: &[Range<usize>]) -> Vec<String> {
        let mut parts = Vec::new();
        let mut cursor = 0;
        for r in regions {
            parts.push(text[cursor..r.start].to_string());
            cursor = r.end;
        }
        parts.push(text[cursor..].to_string());
        parts
    }

    #[test]
    fn test_three_slot_scenario() {
        let template = experienced();
        let (map, doc) = merge(&template, "A||B||C", "||").unwrap();

        assert_eq!(map.get("summary"), Some("A"));
        assert_eq!(map.get("skills"), Some("B"));
        assert_eq!(map.get("experience"), Some("C"));

        let values: Vec<&str> = doc.regions.iter().map(|(_, r)| &doc.text[r.clone()]).collect();
        assert_eq!(values, vec!["A\n", "B\n", "C\n"]);

        let template_regions: Vec<_> = template.slots.iter().map(|s| s.region.clone()).collect();
        let merged_regions: Vec<_> = doc.regions.iter().map(|(_, r)| r.clone()).collect();
        assert_eq!(
            outside_regions(&template.text, &template_regions),
            outside_regions(&doc.text, &merged_regions)
        );
    }

    #[test]
    fn test_segment_count_must_match_exactly() {
        let template = experienced();
        assert_eq!(
            merge(&template, "A||B", "||").unwrap_err(),
            MergeError::SlotCountMismatch { expected: 3, actual: 2 }
        );
        assert_eq!(
            merge(&template, "A||B||C||D", "||").unwrap_err(),
            MergeError::SlotCountMismatch { expected: 3, actual: 4 }
        );
    }

    #[test]
    fn test_segments_are_trimmed() {
        let template = experienced();
        let (map, _) = merge(&template, "\n A \n||\tB||C \n", "||").unwrap();
        assert_eq!(map.get("summary"), Some("A"));
        assert_eq!(map.get("skills"), Some("B"));
    }

    #[test]
    fn test_empty_required_slot_rejected() {
        let template = experienced();
        assert_eq!(
            merge(&template, "A||  ||C", "||").unwrap_err(),
            MergeError::MissingContent { slot: "skills".to_string() }
        );
    }

    #[test]
    fn test_empty_optional_slot_allowed() {
        let text = "\\begin{document}\n% @slot summary\nS\n% @endslot\n% @slot projects optional\nP\n% @endslot\n\\end{document}\n";
        let template = classify("custom.tex", text);
        let (_, doc) = merge(&template, "New summary||", "||").unwrap();
        assert_eq!(
            doc.text,
            "\\begin{document}\n% @slot summary\nNew summary\n% @endslot\n% @slot projects optional\n% @endslot\n\\end{document}\n"
        );
    }

    #[test]
    fn test_structural_commands_rejected() {
        let template = experienced();
        let err = merge(&template, "A||\\section{Hacked}||C", "||").unwrap_err();
        assert_eq!(
            err,
            MergeError::UnsafeContent {
                slot: "skills".to_string(),
                marker: "\\section".to_string()
            }
        );
        assert!(matches!(
            merge(&template, "A||B||C \\end{document}", "||"),
            Err(MergeError::UnsafeContent { .. })
        ));
    }

    #[test]
    fn test_slot_markers_rejected() {
        let template = experienced();
        assert!(matches!(
            merge(&template, "A\n% @endslot\n||B||C", "||"),
            Err(MergeError::UnsafeContent { .. })
        ));
    }

    #[test]
    fn test_tag_text_outside_comments_is_content() {
        let template = experienced();
        let (map, _) = merge(&template, "Reach me at dev@slotify.io||B||Owned the @endslot rollout", "||").unwrap();
        assert_eq!(map.get("summary"), Some("Reach me at dev@slotify.io"));

        assert_eq!(
            merge(&template, "A||B||C\n%@endslot", "||").unwrap_err(),
            MergeError::UnsafeContent {
                slot: "experience".to_string(),
                marker: "% @endslot".to_string()
            }
        );
    }

    #[test]
    fn test_escaped_sequences_are_content() {
        let template = experienced();
        // `\\section` is a line break followed by the word "section".
        let (map, _) = merge(&template, "A \\\\section one||B||C", "||").unwrap();
        assert_eq!(map.get("summary"), Some("A \\\\section one"));
    }

    #[test]
    fn test_unsafe_check_follows_template_commands() {
        let text = "% @slot body\nx\n% @endslot\n";
        let template = classify("custom.tex", text);
        // This template never uses \section, so it is ordinary content here.
        assert!(merge(&template, "\\section{Fine}", "||").is_ok());
    }

    #[test]
    fn test_no_partial_merge_on_late_failure() {
        let template = experienced();
        let result = merge(&template, "A||B||\\usepackage{evil}", "||");
        assert!(result.is_err());
    }

    #[test]
    fn test_bold_directive_translated() {
        let template = experienced();
        let (map, doc) = merge(&template, "Cut latency **40%**||B||C", "||").unwrap();
        assert_eq!(map.get("summary"), Some("Cut latency **40%**"));
        assert!(doc.text.contains("Cut latency \\textbf{40%}\n% @endslot"));
    }

    #[test]
    fn test_translate_bold_edge_cases() {
        assert_eq!(translate_bold("**Rust** and **Go**"), "\\textbf{Rust} and \\textbf{Go}");
        assert_eq!(translate_bold("a ** b"), "a ** b");
        assert_eq!(translate_bold("****"), "****");
        assert_eq!(translate_bold("plain"), "plain");
    }

    #[test]
    fn test_round_trip_with_placeholders_reproduces_template() {
        let template = experienced();
        let placeholders: Vec<&str> = template.slots.iter().map(|s| template.placeholder(s)).collect();
        let doc = substitute(&template, &placeholders);
        assert_eq!(doc.text, template.text);
    }

    #[test]
    fn test_merged_document_is_itself_a_template() {
        let template = experienced();
        let (_, doc) = merge(&template, "A||B||C", "||").unwrap();
        let again = classify("experienced_resume", &doc.text);
        assert_eq!(again.slot_names(), template.slot_names());
        assert_eq!(again.placeholder(&again.slots[2]), "C\n");
    }

    #[test]
    fn test_crlf_template_keeps_crlf_in_regions() {
        let text = "\\begin{document}\r\n% @slot summary\r\nOld\r\n% @endslot\r\n% @slot skills\r\n% @endslot\r\n\\end{document}\r\n";
        let template = classify("custom.tex", text);
        let (_, doc) = merge(&template, "Line one\nLine two||Rust", "||").unwrap();

        assert_eq!(
            doc.text,
            "\\begin{document}\r\n% @slot summary\r\nLine one\r\nLine two\r\n% @endslot\r\n% @slot skills\r\nRust\r\n% @endslot\r\n\\end{document}\r\n"
        );
        for (_, region) in &doc.regions {
            let value = &doc.text[region.clone()];
            assert_eq!(value.matches('\n').count(), value.matches("\r\n").count());
        }
    }

    #[test]
    fn test_other_delimiters() {
        let template = experienced();
        let (map, _) = merge(&template, "A<<<SLOT>>>B || b2<<<SLOT>>>C", "<<<SLOT>>>").unwrap();
        assert_eq!(map.get("skills"), Some("B || b2"));
    }
}
