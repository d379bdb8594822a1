//! Engine integration tests
//!
//! Exercise the queue through the public API only:
//! - `engine::scenarios` - producers, completion, cancellation and events
//! - `engine::async_api` - awaiting queues from async code

mod common;
mod engine;
