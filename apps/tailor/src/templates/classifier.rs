//! Template Classifier: assigns a structural category to a template.
//!
//! Order of evidence: filename convention, then section-header order, then `Custom`.
//! Never fails. Malformed slot markers leave the template with zero slots and a
//! warning; the prompt builder rejects it later.

use tracing::{debug, warn};

use crate::generation::job_context::contains_word;
use crate::templates::{parse_slots, Template, TemplateCategory};

/// Whole words of the normalized file stem; see [`classify_by_name`].
const NEW_GRAD_NAME_HINTS: &[&str] = &["new grad", "newgrad", "entry", "junior", "student", "intern", "internship"];
const EXPERIENCED_NAME_HINTS: &[&str] = &["experienced", "senior", "sde", "professional", "staff"];

const EDUCATION_HEADERS: &[&str] = &["\\section{education}"];
const EXPERIENCE_HEADERS: &[&str] = &[
    "\\section{experience}",
    "\\section{work experience}",
    "\\section{professional experience}",
];

/// Classifies a template and reads its declared slots.
pub fn classify(identifier: &str, text: &str) -> Template {
    let category = classify_by_name(identifier)
        .or_else(|| classify_by_sections(text))
        .unwrap_or_else(|| {
            warn!("Template '{identifier}' matches no known convention; treating as Custom");
            TemplateCategory::Custom
        });

    let (slots, warnings) = match parse_slots(text) {
        Ok(slots) => (slots, vec![]),
        Err(problem) => {
            warn!("Template '{identifier}' has malformed slot markers: {problem}");
            (vec![], vec![problem])
        }
    };

    debug!(
        "Classified template '{identifier}' as {:?} with {} slots",
        category,
        slots.len()
    );

    Template {
        identifier: identifier.to_string(),
        text: text.to_string(),
        category,
        slots,
        warnings,
    }
}

/// Matches naming conventions against the file stem. `_`, `-` and `.` separate
/// words, and hints only match whole words. Ambiguous names yield `None`.
fn classify_by_name(identifier: &str) -> Option<TemplateCategory> {
    let stem: String = std::path::Path::new(identifier)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .chars()
        .map(|c| if matches!(c, '_' | '-' | '.') { ' ' } else { c })
        .collect();

    let new_grad = NEW_GRAD_NAME_HINTS.iter().any(|h| contains_word(&stem, h));
    let experienced = EXPERIENCED_NAME_HINTS.iter().any(|h| contains_word(&stem, h));

    match (new_grad, experienced) {
        (true, false) => Some(TemplateCategory::NewGrad),
        (false, true) => Some(TemplateCategory::Experienced),
        _ => None,
    }
}

/// Education before Experience reads as a new-grad layout, the reverse as experienced.
fn classify_by_sections(text: &str) -> Option<TemplateCategory> {
    let lower = text.to_lowercase();
    let first_of = |headers: &[&str]| headers.iter().filter_map(|h| lower.find(h)).min();

    match (first_of(EDUCATION_HEADERS), first_of(EXPERIENCE_HEADERS)) {
        (Some(edu), Some(exp)) if edu < exp => Some(TemplateCategory::NewGrad),
        (Some(_), Some(_)) => Some(TemplateCategory::Experienced),
        _ => None,
    }
}
