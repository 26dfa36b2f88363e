//! Character Encoding Layer
//!
//! Values are Unicode inside a [`Record`](crate::models::Record). This module
//! converts between that and the two encodings a MARC leader can declare.

pub mod marc8;
pub mod tables;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use marc8::Marc8State;

/// Character coding scheme of a record (leader position 9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Marc8,
    Utf8,
}

impl Encoding {
    /// Scheme declared by a leader, `None` when the code is not recognized
    pub fn from_leader(coding: char) -> Option<Self> {
        match coding {
            ' ' => Some(Encoding::Marc8),
            'a' => Some(Encoding::Utf8),
            _ => None,
        }
    }

    pub fn leader_byte(self) -> u8 {
        match self {
            Encoding::Marc8 => b' ',
            Encoding::Utf8 => b'a',
        }
    }

    pub fn encode(self, value: &str) -> Vec<u8> {
        match self {
            Encoding::Marc8 => marc8::encode(value),
            Encoding::Utf8 => value.as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Marc8 => write!(f, "marc8"),
            Encoding::Utf8 => write!(f, "utf8"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "").as_str() {
            "marc8" => Ok(Encoding::Marc8),
            "utf8" | "unicode" => Ok(Encoding::Utf8),
            other => Err(format!("Unknown character encoding: {}", other)),
        }
    }
}

/// Decodes the values of one record, field by field.
///
/// MARC-8 escape state never leaks from one field into the next:
/// [`begin_field`](Self::begin_field) resets it.
#[derive(Debug, Clone)]
pub struct FieldTranscoder {
    encoding: Encoding,
    state: Marc8State,
}

impl FieldTranscoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            state: Marc8State::new(),
        }
    }

    pub fn begin_field(&mut self) {
        self.state.reset();
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        match self.encoding {
            Encoding::Marc8 => marc8::decode(bytes, &mut self.state),
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}
