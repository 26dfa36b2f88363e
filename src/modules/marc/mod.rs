//! MARC serializations
//!
//! - `binary`: ISO 2709 records (leader, directory, terminators)
//! - `xml`: MARCXML collections, with an optional transform stage
//! - `json`: MARC-in-JSON

pub mod binary;
pub mod json;
pub mod xml;

pub use binary::{BinaryDecoder, BinaryWriter, decode_record, encode_record};
pub use json::{JsonWriter, record_from_json, record_to_json};
pub use xml::{XmlDecoder, XmlInput, XmlTransform, XmlWriter, record_to_xml};
