//! CLI Integration Test Modules

pub mod argument_parsing;
pub mod runner;
pub mod toml_config;
