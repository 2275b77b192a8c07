// Shared prompt fragments. Each module that builds prompts keeps its own prompts.rs;
// this file holds the cross-cutting instructions.

/// Common instruction that keeps the model away from document structure.
pub const STRUCTURE_INSTRUCTION: &str = "\
    CRITICAL: You write CONTENT ONLY. Do NOT emit \\documentclass, \\usepackage, \
    \\begin{document}, \\end{document}, \\section commands, color or spacing commands, \
    or any line starting with '% @slot' or '% @endslot'. \
    The template's structure, packages, colors, spacing, and section order are fixed.";

/// Inline emphasis the merger understands. Everything else is copied as written.
pub const BOLD_INSTRUCTION: &str = "\
    To highlight a metric or technology, wrap it in double asterisks, e.g. **40%** or **Kubernetes**. \
    Do not use \\textbf yourself and do not use any other markdown.";

/// Instruction to keep claims truthful to the source resume.
pub const AUTHENTICITY_INSTRUCTION: &str = "\
    Maintain authenticity: every claim must be supported by the current resume content. \
    Rephrase, reorder, and surface relevant keywords, but never invent employers, \
    titles, dates, degrees, or metrics.";
