//! Error types for MARC decoding and encoding
//!
//! Record-level errors describe one bad record and leave the stream usable.
//! Stream-level errors (`IoFailure`, `Transform`) end the stream they occur in.

use thiserror::Error;

use crate::models::Record;

/// Result type alias for MARC operations
pub type Result<T> = std::result::Result<T, MarcError>;

#[derive(Debug, Error)]
pub enum MarcError {
    /// Leader bytes not parseable as the required fixed-width fields
    #[error("Malformed leader: {0}")]
    MalformedLeader(String),

    /// Directory entry count, width or offsets inconsistent
    #[error("Malformed directory: {0}")]
    MalformedDirectory(String),

    /// Declared record length exceeds the bytes actually available
    #[error("Truncated record: declared {declared} bytes, only {available} available")]
    TruncatedRecord { declared: usize, available: usize },

    /// Structural XML error within one record element
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// Declared character coding scheme not recognized.
    ///
    /// `partial` holds the record decoded lossily as UTF-8, with replacement
    /// markers wherever bytes could not be transcoded.
    #[error("Unsupported character encoding '{scheme}'")]
    UnsupportedEncoding {
        scheme: char,
        partial: Option<Box<Record>>,
    },

    /// Underlying input or output failed
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// Encoded record (or one of its fields) would not fit the format's
    /// decimal length fields
    #[error("Record too large: {length} bytes exceeds the {limit} byte limit")]
    RecordTooLarge { length: usize, limit: usize },

    /// XML transform stage could not produce MARCXML
    #[error("XML transform failed: {0}")]
    Transform(String),

    /// JSON value does not describe a MARC record
    #[error("Invalid MARC-in-JSON: {0}")]
    InvalidJson(String),
}

impl MarcError {
    /// Stream-level errors stop the producer; everything else only skips a record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MarcError::IoFailure(_) | MarcError::Transform(_))
    }
}

impl From<quick_xml::Error> for MarcError {
    fn from(e: quick_xml::Error) -> Self {
        match e {
            quick_xml::Error::Io(io) => {
                MarcError::IoFailure(std::io::Error::new(io.kind(), io.to_string()))
            }
            other => MarcError::MalformedXml(other.to_string()),
        }
    }
}
