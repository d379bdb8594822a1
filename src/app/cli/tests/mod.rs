//! Tests for the CLI module
//!
//! Argument parsing, settings resolution and TOML configuration loading.

pub mod config_tests;
