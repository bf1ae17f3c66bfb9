//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper, typed history parsing, readiness and
//! completion polling, and output artifact location for driving a local
//! ComfyUI server one prompt at a time.

pub mod api;
pub mod history;
pub mod output;
pub mod poll;
