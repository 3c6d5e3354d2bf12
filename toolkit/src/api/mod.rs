//! HTTP surface of the demo server.
//!
//! - [`handlers`]: axum handlers, each a thin wrapper over one toolkit operation
//! - [`models`]: request and response bodies for those handlers

pub mod handlers;
pub mod models;
