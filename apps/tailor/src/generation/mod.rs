// Tailoring core: job context inference, tone framing, prompt construction,
// and merging the model's slot output back into the template.
// All model calls go through llm_client; nothing here talks to the network.

pub mod job_context;
pub mod merger;
pub mod prompt_builder;
pub mod prompts;
pub mod tone;
