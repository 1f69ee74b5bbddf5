//! finsight: local host for a financial-assistant browser extension.
//!
//! Leaf modules first: `markdown`, `detector`, `rate_limit`, `llm`, then
//! `context` and `session`, then the `router` that the HTTP `routes` expose.

pub mod config;
pub mod context;
pub mod detector;
pub mod error;
pub mod llm;
pub mod markdown;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod session;
pub mod state;
