pub mod api;
pub mod config;
pub mod database_ops;
pub mod extractor;
pub mod normalization;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;

pub mod util {
    pub mod env;
    pub mod tracing;
}
