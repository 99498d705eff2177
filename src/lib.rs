pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod rate_limiter;

// Layered boundaries for application ports and infrastructure adapters
pub mod app;
pub mod infra;
