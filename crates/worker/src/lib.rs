//! `ltxv-worker` library crate.
//!
//! Exposes the handler, configuration and HTTP entrypoint so integration
//! tests and the binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod handler;
pub mod server;
