//! Job context: seniority and specialization inferred from a raw job description.
//!
//! Pure keyword heuristics; no model call. Derived once per run, never persisted.

use serde::{Deserialize, Serialize};

/// Seniority level a job description is pitched at. Drives prompt tone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seniority {
    Senior,
    #[default]
    Mid,
    NewGrad,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobContext {
    pub description: String,
    pub seniority: Seniority,
    /// Free-form role tag, e.g. "Backend Engineer".
    pub specialization: String,
}

const SENIOR_HINTS: &[&str] = &["senior", "sr", "staff", "principal", "tech lead", "lead engineer"];
const NEW_GRAD_HINTS: &[&str] = &[
    "new grad",
    "new-grad",
    "entry level",
    "entry-level",
    "junior",
    "graduate",
    "intern",
    "internship",
    "0-2 years",
];
/// Minimum "N+ years" that reads as a senior role.
const SENIOR_YEARS: u32 = 5;

/// Ordered: the first hit wins, so more specific tags come first.
const SPECIALIZATIONS: &[(&str, &str)] = &[
    ("machine learning", "Machine Learning Engineer"),
    ("ml engineer", "Machine Learning Engineer"),
    ("data engineer", "Data Engineer"),
    ("full stack", "Full Stack Engineer"),
    ("full-stack", "Full Stack Engineer"),
    ("frontend", "Frontend Engineer"),
    ("front-end", "Frontend Engineer"),
    ("backend", "Backend Engineer"),
    ("back-end", "Backend Engineer"),
    ("api", "API Engineer"),
    ("devops", "Infrastructure Engineer"),
    ("site reliability", "Infrastructure Engineer"),
    ("infrastructure", "Infrastructure Engineer"),
    ("mobile", "Mobile Engineer"),
    ("ios", "Mobile Engineer"),
    ("android", "Mobile Engineer"),
    ("security", "Security Engineer"),
    ("embedded", "Embedded Engineer"),
];
const DEFAULT_SPECIALIZATION: &str = "Software Engineer";

impl JobContext {
    pub fn infer(description: &str) -> Self {
        let lower = description.to_lowercase();
        Self {
            description: description.to_string(),
            seniority: infer_seniority(&lower),
            specialization: infer_specialization(&lower).to_string(),
        }
    }
}

fn infer_seniority(lower: &str) -> Seniority {
    let senior = SENIOR_HINTS.iter().any(|h| contains_word(lower, h))
        || max_years_required(lower).is_some_and(|y| y >= SENIOR_YEARS);
    if senior {
        return Seniority::Senior;
    }
    if NEW_GRAD_HINTS.iter().any(|h| contains_word(lower, h)) {
        return Seniority::NewGrad;
    }
    Seniority::Mid
}

/// Largest N in "N+ years" / "N+ yrs" phrases.
fn max_years_required(lower: &str) -> Option<u32> {
    lower
        .match_indices('+')
        .filter(|(i, _)| {
            let tail = lower[i + 1..].trim_start();
            tail.starts_with("year") || tail.starts_with("yr")
        })
        .filter_map(|(i, _)| {
            let digits: String = lower[..i]
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            digits.parse().ok()
        })
        .max()
}

fn infer_specialization(lower: &str) -> &'static str {
    SPECIALIZATIONS
        .iter()
        .find(|(needle, _)| contains_word(lower, needle))
        .map(|(_, tag)| *tag)
        .unwrap_or(DEFAULT_SPECIALIZATION)
}

/// Substring match that refuses to start or end inside a longer word ("api" ≠ "rapid").
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, m)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + m.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}
