//! Test modules for the work queue
//!
//! Tests are organized by functional area; `support` holds the shared
//! recording callbacks.

mod support;
