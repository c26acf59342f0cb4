pub mod orchestrator;
pub mod processor;
pub mod stages;
pub mod types;
