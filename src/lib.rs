pub mod adapters;
pub mod browser;
pub mod config;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod mixin;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod types;
