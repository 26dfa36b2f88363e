//! Services Layer
//!
//! Streaming reader sessions built on the decoders in [`crate::modules::marc`].

pub mod pipeline;

pub use pipeline::{MarcReader, ReaderBuilder, RecordStream, StreamState};
