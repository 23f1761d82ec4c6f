//! Concrete graph nodes (spec.md §4.2–§4.10).

pub mod brain_planner;
pub mod context;
pub mod evaluate_final;
pub mod evaluate_step;
pub mod executor;
pub mod export_ics;
pub mod intent;
pub mod issue_triage;
pub mod memory_writer;
pub mod orchestrator;
pub mod responder;
pub mod validator;
