//! HTTP API surface.
//!
//! - [`extract`]: extractors whose rejections use the API error format
//! - [`handlers`]: request handlers for health, reconstruction and stats
//! - [`models`]: request/response types shared by handlers and OpenAPI docs

pub mod extract;
pub mod handlers;
pub mod models;
