//! Domain layer
//!
//! Error types shared by every codec and by the streaming pipeline.

pub mod errors;

pub use errors::{MarcError, Result};
