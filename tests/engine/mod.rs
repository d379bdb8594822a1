pub mod async_api;
pub mod scenarios;
