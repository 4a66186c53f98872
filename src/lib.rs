//! feedsmith - a feed-generation core
//!
//! This crate turns per-source fetch adapters into valid, stable RSS 2.0
//! feed files: items are deduplicated by guid against previous runs,
//! capped, and written atomically, with per-source failures isolated so
//! one broken source never spoils a run over many.

pub mod builder;
pub mod config;
pub mod fetch;
pub mod model;
pub mod orchestrator;
pub mod store;
