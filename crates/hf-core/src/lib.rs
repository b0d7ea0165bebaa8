//! hf-core: shared types, errors, and configuration.
//!
//! This crate is the foundational dependency for all other hf-* crates,
//! providing the unified error type, the segment container enum, the
//! immutable [`StreamRequest`], and application configuration.

pub mod config;
pub mod error;
pub mod media;
pub mod stream;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
pub use stream::StreamRequest;
