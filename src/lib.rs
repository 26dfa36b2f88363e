//! Streaming reader and writer for MARC bibliographic records, in ISO 2709
//! binary, MARCXML and MARC-in-JSON form, with MARC-8 transcoding.

pub mod config;
pub mod domain;
pub mod models;
pub mod modules;
pub mod services;

pub use config::{ReaderConfig, SourceFormat};
pub use domain::{MarcError, Result};
pub use models::{ControlField, DataField, Field, Leader, Record, RecordBuilder, Subfield};
pub use modules::charset::Encoding;
pub use modules::marc::{BinaryWriter, JsonWriter, XmlTransform, XmlWriter};
pub use services::{MarcReader, ReaderBuilder, RecordStream, StreamState};
