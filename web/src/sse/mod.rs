//! SSE HTTP stage for the web layer.
//!
//! This module contains only the pipeline stage serving the watch endpoint.
//! The subscriber set and event types live in the `sse` crate.

pub mod handler;
