//! Domain logic for the LTX-2 image-to-video worker.
//!
//! Everything here is independent of the network: request parsing,
//! the defaults table, workflow graph patching, media payload IO and
//! the result payloads returned to the serverless runtime.

pub mod error;
pub mod ffprobe;
pub mod media;
pub mod params;
pub mod patch;
pub mod request;
pub mod result;
pub mod workflow;
