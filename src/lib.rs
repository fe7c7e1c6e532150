pub mod common;
pub mod config;
pub mod logging;
pub mod server;

// Domain data shapes shared across layers
pub mod domain;
pub mod numbering;
pub mod registry;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
pub mod observability;
pub mod storage;
