pub mod esios;
pub mod provider;
pub mod retry;
pub mod synthetic;
pub mod types;
pub mod weather;
