//! Shared types for relscan.
//!
//! The decoder in `relscan-core` produces [`DecodedToken`]s, and a finished
//! scan produces a [`Manifest`]. Both are plain serde types so callers can
//! persist or print them without depending on the engine.

pub mod manifest;
pub mod token;

// Re-exports
pub use manifest::*;
pub use token::*;
