// Daily selection pipeline: shortlist → ranking oracle → ledger.
// All LLM calls go through llm_client — no direct Anthropic calls here.

pub mod handlers;
pub mod history;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod shortlist;
