//! Prompt Builder: turns a classified template and job context into one
//! slot-constrained request.
//!
//! The prompt names every declared slot in template order, states the structural
//! constraints, frames tone from the job's seniority, and fixes a delimiter that
//! appears nowhere in the inputs so the answer splits unambiguously.

use thiserror::Error;
use tracing::debug;

use crate::generation::job_context::{JobContext, Seniority};
use crate::generation::prompts::{
    CUSTOM_GUIDANCE, EXPERIENCED_GUIDANCE, JOB_DESCRIPTION_HEADER, NEW_GRAD_GUIDANCE,
    TAILOR_PROMPT_TEMPLATE, TAILOR_SYSTEM, TEMPLATE_HEADER,
};
use crate::generation::tone::get_tone_framing;
use crate::llm_client::prompts::{
    AUTHENTICITY_INSTRUCTION, BOLD_INSTRUCTION, STRUCTURE_INSTRUCTION,
};
use crate::templates::{Slot, Template, TemplateCategory};

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

const DELIMITER_CANDIDATES: &[&str] = &["||", "|||", "<<<SLOT>>>"];
/// Budget floor so tiny placeholders still leave room for a real sentence.
const MIN_SLOT_BUDGET_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Configuration error: template '{identifier}' declares no usable slots{detail}")]
    Configuration { identifier: String, detail: String },
}

/// A fully built model request. The delimiter travels with it to the merger.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub delimiter: String,
    pub slot_count: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Prompt {
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// Builds the tailoring prompt for `template`.
pub fn build(
    template: &Template,
    job: &JobContext,
    company_name: &str,
) -> Result<Prompt, PromptError> {
    if template.slots.is_empty() {
        let detail = match template.warnings.first() {
            Some(w) => format!(" ({w})"),
            None => String::new(),
        };
        return Err(PromptError::Configuration {
            identifier: template.identifier.clone(),
            detail,
        });
    }

    let delimiter = choose_delimiter(&[&template.text, &job.description, company_name]);
    let tone = get_tone_framing(job.seniority);

    let slot_list = template
        .slots
        .iter()
        .enumerate()
        .map(|(i, slot)| describe_slot(i + 1, slot, template))
        .collect::<Vec<_>>()
        .join("\n");

    let guidance = match template.category {
        TemplateCategory::NewGrad => NEW_GRAD_GUIDANCE,
        TemplateCategory::Experienced => EXPERIENCED_GUIDANCE,
        TemplateCategory::Custom => CUSTOM_GUIDANCE,
    };
    let order = template.category.section_order();
    let category_guidance = if order.is_empty() {
        guidance.to_string()
    } else {
        format!("{guidance}\nSection emphasis: {}.", order.join(" -> "))
    };

    // User-supplied values go in last so their text is never re-scanned for placeholders.
    let mut user = TAILOR_PROMPT_TEMPLATE
        .replace("{structure_instruction}", STRUCTURE_INSTRUCTION)
        .replace("{bold_instruction}", BOLD_INSTRUCTION)
        .replace("{authenticity_instruction}", AUTHENTICITY_INSTRUCTION)
        .replace("{category_guidance}", &category_guidance)
        .replace("{slot_count}", &template.slots.len().to_string())
        .replace("{slot_list}", &slot_list)
        .replace("{seniority}", seniority_label(job.seniority))
        .replace("{strong_verbs}", &tone.strong_verbs.join(", "))
        .replace("{avoid_verbs}", &tone.avoid_verbs.join(", "))
        .replace("{emphasis}", tone.emphasis)
        .replace("{delimiter}", &delimiter)
        .replace("{specialization}", &job.specialization)
        .replace("{company_name}", company_name);

    user.push_str("\n\n");
    user.push_str(TEMPLATE_HEADER);
    user.push('\n');
    user.push_str(&template.text);
    user.push_str("\n\n");
    user.push_str(JOB_DESCRIPTION_HEADER);
    user.push('\n');
    user.push_str(&job.description);

    debug!(
        "Built prompt for '{}': {} slots, delimiter {:?}, {} chars",
        template.identifier,
        template.slots.len(),
        delimiter,
        user.len()
    );

    Ok(Prompt {
        system: TAILOR_SYSTEM.to_string(),
        user,
        delimiter,
        slot_count: template.slots.len(),
        max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        temperature: DEFAULT_TEMPERATURE,
    })
}

/// First candidate delimiter that occurs in none of `inputs`.
pub fn choose_delimiter(inputs: &[&str]) -> String {
    let absent = |d: &str| inputs.iter().all(|text| !text.contains(d));

    if let Some(d) = DELIMITER_CANDIDATES.iter().find(|d| absent(d)) {
        return d.to_string();
    }
    (1..)
        .map(|n| format!("<<<SLOT-{n}>>>"))
        .find(|d| absent(d))
        .unwrap_or_default()
}

fn describe_slot(position: usize, slot: &Slot, template: &Template) -> String {
    let requirement = if slot.required { "required" } else { "optional, may be left empty" };
    format!(
        "{position}. {} ({requirement}): {}. Keep it within about {} characters.",
        slot.name,
        slot_purpose(&slot.name),
        slot_budget(template.placeholder(slot)),
    )
}

/// Character budget implied by the template's own placeholder.
fn slot_budget(placeholder: &str) -> usize {
    (placeholder.trim().chars().count() * 5 / 4).max(MIN_SLOT_BUDGET_CHARS)
}

fn slot_purpose(name: &str) -> String {
    let purpose = match name.to_lowercase().as_str() {
        "summary" | "professional_summary" => {
            "professional summary, 2-3 lines of continuous text with the top 8-10 job keywords, NO bullet points"
        }
        "skills" | "technical_skills" => {
            "skills list, regrouped to mirror the job requirements; keep the template's category labels and line breaks"
        }
        "experience" | "work_experience" => {
            "work experience entries with \\item bullets rewritten around job keywords, metrics, and the STAR method"
        }
        "education" => "education details, highlighting coursework relevant to the role",
        "projects" => "projects with their technologies, highlighting the ones relevant to the role",
        "certifications" => "certifications, most relevant first",
        "coursework" => "relevant coursework as a comma-separated list",
        "awards" | "achievements" => "awards and achievements relevant to the role",
        "leadership" => "leadership and activities entries",
        _ => return format!("content for the '{name}' section, same LaTeX shape as its placeholder"),
    };
    purpose.to_string()
}

fn seniority_label(seniority: Seniority) -> &'static str {
    match seniority {
        Seniority::Senior => "senior",
        Seniority::Mid => "mid-level",
        Seniority::NewGrad => "new graduate / entry level",
    }
}
