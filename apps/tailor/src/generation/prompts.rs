// Prompt text for slot-constrained resume tailoring.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for tailoring: enforces delimiter-separated slot output.
pub const TAILOR_SYSTEM: &str = "You are an expert ATS resume optimizer editing a LaTeX resume. \
    You fill named content slots of a fixed template and nothing else. \
    Respond with the slot contents only, separated by the delimiter you are given. \
    Do NOT include slot names, explanations, apologies, or markdown code fences.";

/// Tailoring prompt template.
/// Replace: {structure_instruction}, {bold_instruction}, {authenticity_instruction},
///          {slot_count}, {slot_list}, {delimiter}, {company_name}, {seniority},
///          {specialization}, {strong_verbs}, {avoid_verbs}, {emphasis},
///          {category_guidance}
/// The template and job description are appended after the filled template,
/// never substituted, so their braces are never read as placeholders.
pub const TAILOR_PROMPT_TEMPLATE: &str = r#"Tailor this LaTeX resume for a 90%+ keyword match with the job description below.

{structure_instruction}

{bold_instruction}

{authenticity_instruction}

TARGET ROLE:
- Company: {company_name}
- Seniority: {seniority}
- Specialization: {specialization}
- Favour verbs like: {strong_verbs}
- Avoid: {avoid_verbs}
- Emphasize: {emphasis}

TEMPLATE LAYOUT:
{category_guidance}

SLOTS TO FILL ({slot_count}, in this exact order):
{slot_list}

OUTPUT FORMAT:
Return exactly {slot_count} segments, one per slot, in the order listed above,
separated by the delimiter {delimiter}
Never write the delimiter inside a segment. Do not label the segments.
Example for three slots: first segment{delimiter}second segment{delimiter}third segment"#;

pub const TEMPLATE_HEADER: &str = "CURRENT RESUME (LaTeX, slots marked with % @slot / % @endslot):";

pub const JOB_DESCRIPTION_HEADER: &str = "JOB DESCRIPTION:";

/// Emphasis guidance per template category. The builder appends the section order.
pub const NEW_GRAD_GUIDANCE: &str = "New-graduate layout. \
    Lead with education and projects; coursework and project technologies carry the keywords.";

pub const EXPERIENCED_GUIDANCE: &str = "Experienced layout. \
    Lead with skills and experience; quantified production impact carries the keywords.";

pub const CUSTOM_GUIDANCE: &str = "Custom layout. Keep the template's own section order and emphasis.";
