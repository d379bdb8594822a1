//! Application module: command line, configuration and the demo runner

pub mod cli;
pub mod runner;
pub mod startup;
