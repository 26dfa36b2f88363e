//! MARC-in-JSON
//!
//! `{"leader": "...", "fields": [{"001": "..."}, {"245": {"ind1": "1",
//! "ind2": "0", "subfields": [{"a": "..."}]}}]}`

use std::io::Write;

use serde_json::{Map, Value, json};

use crate::domain::{MarcError, Result};
use crate::models::{DataField, Field, Leader, Record, RecordBuilder};

pub fn record_to_json(record: &Record) -> Value {
    let fields: Vec<Value> = record
        .fields()
        .iter()
        .map(|field| match field {
            Field::Control(f) => json!({ f.tag.as_str(): f.value }),
            Field::Data(f) => {
                let subfields: Vec<Value> = f
                    .subfields()
                    .iter()
                    .map(|s| json!({ s.code.to_string(): s.value }))
                    .collect();
                json!({
                    f.tag.as_str(): {
                        "ind1": f.ind1.to_string(),
                        "ind2": f.ind2.to_string(),
                        "subfields": subfields,
                    }
                })
            }
        })
        .collect();

    json!({
        "leader": record.leader().as_str(),
        "fields": fields,
    })
}

pub fn record_from_json(value: &Value) -> Result<Record> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("record is not an object"))?;

    let mut builder = RecordBuilder::new();
    if let Some(leader) = object.get("leader") {
        let leader: Leader = leader
            .as_str()
            .ok_or_else(|| invalid("leader is not a string"))?
            .parse()
            .map_err(|e: MarcError| invalid(&e.to_string()))?;
        builder.set_leader(leader);
    }

    let fields = match object.get("fields") {
        Some(fields) => fields
            .as_array()
            .ok_or_else(|| invalid("fields is not an array"))?
            .as_slice(),
        None => &[],
    };

    for entry in fields {
        let (tag, body) = single_entry(entry, "field")?;
        match body {
            Value::String(text) => builder.push_control(tag.as_str(), text.as_str()),
            Value::Object(data) => builder.push_data(data_field_from_json(tag, data)?),
            _ => return Err(invalid(&format!("field {} has an unexpected value", tag))),
        }
    }

    Ok(builder.build())
}

fn data_field_from_json(tag: &str, data: &Map<String, Value>) -> Result<DataField> {
    let indicator = |key: &str| -> Result<char> {
        match data.get(key) {
            None | Some(Value::Null) => Ok(' '),
            Some(Value::String(s)) => Ok(s.chars().next().unwrap_or(' ')),
            Some(_) => Err(invalid(&format!("{} of field {} is not a string", key, tag))),
        }
    };
    let mut field = DataField::new(tag, indicator("ind1")?, indicator("ind2")?);

    let subfields = match data.get("subfields") {
        Some(Value::Array(items)) => items.as_slice(),
        None => &[],
        Some(_) => {
            return Err(invalid(&format!("subfields of field {} is not an array", tag)));
        }
    };
    for item in subfields {
        let (code, value) = single_entry(item, "subfield")?;
        let code = code
            .chars()
            .next()
            .ok_or_else(|| invalid(&format!("empty subfield code in field {}", tag)))?;
        let value = value
            .as_str()
            .ok_or_else(|| invalid(&format!("subfield {} of field {} is not a string", code, tag)))?;
        field = field.with_subfield(code, value);
    }
    Ok(field)
}

/// Entries are objects with exactly one key
fn single_entry<'a>(value: &'a Value, what: &str) -> Result<(&'a String, &'a Value)> {
    match value.as_object() {
        Some(map) if map.len() == 1 => map
            .iter()
            .next()
            .ok_or_else(|| invalid(&format!("empty {}", what))),
        _ => Err(invalid(&format!("{} must be an object with one key", what))),
    }
}

fn invalid(message: &str) -> MarcError {
    MarcError::InvalidJson(message.to_string())
}

/// Writes records as one JSON array.
pub struct JsonWriter<W: Write> {
    inner: W,
    records_written: usize,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records_written: 0,
        }
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let separator: &[u8] = if self.records_written == 0 { b"[" } else { b"," };
        self.inner.write_all(separator)?;
        serde_json::to_writer(&mut self.inner, &record_to_json(record))
            .map_err(std::io::Error::from)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Closes the array. An empty writer produces `[]`.
    pub fn finish(&mut self) -> Result<()> {
        if self.records_written == 0 {
            self.inner.write_all(b"[")?;
        }
        self.inner.write_all(b"]")?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
