// Generation pipeline: one request in, one compiled résumé (or one tagged failure) out.
// `orchestrator` sequences the stages, `runner` keeps at most one run in flight.

pub mod handlers;
pub mod orchestrator;
pub mod progress;
pub mod runner;
