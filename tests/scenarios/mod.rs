//! Scenario-based tests for the pipeline orchestrator

mod cancellation;
mod enrichment_fallback;
mod halting;
mod leader_branch;
mod sinks;
