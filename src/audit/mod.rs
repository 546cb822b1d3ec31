pub mod orchestrator;
pub mod request;
pub mod revenue;
pub mod types;
