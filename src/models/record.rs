//! MARC record model
//!
//! A [`Record`] is assembled through [`RecordBuilder`] and is read-only once
//! built. Field order is kept exactly as appended, repeated tags included.

use super::leader::Leader;

/// A one-character code plus its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

impl Subfield {
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }
}

/// Field with a raw value and no indicators (tags below "010")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlField {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    pub tag: String,
    pub ind1: char,
    pub ind2: char,
    subfields: Vec<Subfield>,
}

impl DataField {
    pub fn new(tag: impl Into<String>, ind1: char, ind2: char) -> Self {
        Self {
            tag: tag.into(),
            ind1,
            ind2,
            subfields: Vec::new(),
        }
    }

    pub fn with_subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.subfields.push(Subfield::new(code, value));
        self
    }

    pub fn push_subfield(&mut self, subfield: Subfield) {
        self.subfields.push(subfield);
    }

    pub fn subfields(&self) -> &[Subfield] {
        &self.subfields
    }

    /// First subfield with the given code
    pub fn subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }

    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> + '_ {
        self.subfields
            .iter()
            .filter(move |s| s.code == code)
            .map(|s| s.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Control(ControlField),
    Data(DataField),
}

impl Field {
    pub fn tag(&self) -> &str {
        match self {
            Field::Control(f) => &f.tag,
            Field::Data(f) => &f.tag,
        }
    }

    pub fn as_control(&self) -> Option<&ControlField> {
        match self {
            Field::Control(f) => Some(f),
            Field::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataField> {
        match self {
            Field::Data(f) => Some(f),
            Field::Control(_) => None,
        }
    }
}

/// Tags "001" through "009" (anything sorting below "010") carry no subfields.
pub fn is_control_tag(tag: &str) -> bool {
    tag < "010"
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    leader: Leader,
    fields: Vec<Field>,
}

impl Record {
    pub fn builder() -> RecordBuilder {
        RecordBuilder::new()
    }

    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field at a position in record order
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields carrying `tag`, in record order
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag() == tag)
    }

    /// Value of the first control field with `tag`
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    pub fn control_fields(&self) -> impl Iterator<Item = &ControlField> + '_ {
        self.fields.iter().filter_map(Field::as_control)
    }

    pub fn data_fields(&self) -> impl Iterator<Item = &DataField> + '_ {
        self.fields.iter().filter_map(Field::as_data)
    }
}

/// Incremental construction of a [`Record`]
#[derive(Debug, Default)]
pub struct RecordBuilder {
    leader: Leader,
    fields: Vec<Field>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leader(mut self, leader: Leader) -> Self {
        self.leader = leader;
        self
    }

    pub fn set_leader(&mut self, leader: Leader) {
        self.leader = leader;
    }

    pub fn control_field(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_control(tag, value);
        self
    }

    pub fn data_field(mut self, field: DataField) -> Self {
        self.push_data(field);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn push_control(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field::Control(ControlField {
            tag: tag.into(),
            value: value.into(),
        }));
    }

    pub fn push_data(&mut self, field: DataField) {
        self.fields.push(Field::Data(field));
    }

    pub fn build(self) -> Record {
        Record {
            leader: self.leader,
            fields: self.fields,
        }
    }
}
