//! MARCXML reader and writer
//!
//! Elements are matched by local name, so `marc:`-prefixed documents and
//! MARCXchange collections decode the same way as plain MARCXML.

use std::io::{BufRead, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

use crate::domain::{MarcError, Result};
use crate::models::{DataField, Field, Leader, Record, RecordBuilder, Subfield};

pub const MARCXML_NAMESPACE: &str = "http://www.loc.gov/MARC21/slim";

/// Source handed to the XML decoder once any transform has run
pub type XmlInput = Box<dyn BufRead + Send>;

/// Rewrites another XML dialect into MARCXML before records are extracted.
///
/// Any `Fn(XmlInput) -> Result<XmlInput>` closure is a transform.
pub trait XmlTransform: Send {
    fn transform(&self, input: XmlInput) -> Result<XmlInput>;
}

impl<F> XmlTransform for F
where
    F: Fn(XmlInput) -> Result<XmlInput> + Send,
{
    fn transform(&self, input: XmlInput) -> Result<XmlInput> {
        self(input)
    }
}

/// What the decoder is collecting text for inside a record
enum Capture {
    None,
    Leader,
    Control(String),
    Subfield(char),
}

/// Streams records out of a MARCXML document.
///
/// A malformed `<record>` is yielded as a `MalformedXml` item and decoding
/// picks up again at the next record boundary.
pub struct XmlDecoder<R: BufRead> {
    reader: Reader<R>,
    records_seen: usize,
    /// A `<record>` start tag was consumed while recovering from an error
    pending_start: bool,
    last_error_at: Option<usize>,
    finished: bool,
}

impl<R: BufRead> XmlDecoder<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        // Nesting is checked here so that one bad record does not poison the rest
        reader.check_end_names(false);
        Self {
            reader,
            records_seen: 0,
            pending_start: false,
            last_error_at: None,
            finished: false,
        }
    }

    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    pub fn read_record(&mut self) -> Option<Result<Record>> {
        if self.finished {
            return None;
        }
        if !self.pending_start {
            match self.seek_record() {
                Ok(Some(true)) => {}
                Ok(Some(false)) => {
                    self.records_seen += 1;
                    return Some(Ok(Record::default()));
                }
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => return Some(Err(e)),
            }
        }
        self.pending_start = false;
        self.records_seen += 1;
        Some(self.read_record_body())
    }

    /// Advances to the next `<record>`. `Some(true)` for a start tag,
    /// `Some(false)` for an empty `<record/>`, `None` at end of document.
    fn seek_record(&mut self) -> Result<Option<bool>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"record" => {
                    return Ok(Some(true));
                }
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"record" => {
                    return Ok(Some(false));
                }
                Ok(Event::Eof) => return Ok(None),
                Ok(_) => {}
                Err(e) => return Err(self.classify(e)),
            }
        }
    }

    fn read_record_body(&mut self) -> Result<Record> {
        let ordinal = self.records_seen;
        let mut buf = Vec::new();
        let mut builder = RecordBuilder::new();
        let mut open: Vec<Vec<u8>> = Vec::new();
        let mut capture = Capture::None;
        let mut text = String::new();
        let mut datafield: Option<DataField> = None;
        let mut problem: Option<String> = None;

        loop {
            buf.clear();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    let err = self.classify(e);
                    if err.is_fatal() || self.finished {
                        return Err(err);
                    }
                    if problem.is_none() {
                        problem = Some(match err {
                            MarcError::MalformedXml(message) => message,
                            other => other.to_string(),
                        });
                    }
                    continue;
                }
            };

            // After the first problem only record boundaries matter
            if let Some(message) = &problem {
                match &event {
                    Event::Start(e) if e.local_name().as_ref() == b"record" => {
                        self.pending_start = true;
                    }
                    Event::End(e) if e.local_name().as_ref() == b"record" => {}
                    Event::Eof => self.finished = true,
                    _ => continue,
                }
                return Err(MarcError::MalformedXml(format!("record {}: {}", ordinal, message)));
            }

            let is_empty = matches!(event, Event::Empty(_));
            match &event {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"record" => {
                    self.pending_start = !is_empty;
                    return Err(MarcError::MalformedXml(format!(
                        "record {}: <record> opened before the previous record was closed",
                        ordinal
                    )));
                }
                Event::Start(e) | Event::Empty(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    let parent = open.last().map(Vec::as_slice);
                    let opened = match (name.as_slice(), parent) {
                        (b"leader", None) => Ok(Some(Capture::Leader)),
                        (b"controlfield", None) => required_attr(e, b"tag", "controlfield")
                            .map(|tag| Some(Capture::Control(tag))),
                        (b"datafield", None) => open_datafield(e).map(|field| {
                            datafield = Some(field);
                            Some(Capture::None)
                        }),
                        (b"subfield", Some(b"datafield")) => required_attr(e, b"code", "subfield")
                            .map(|code| Some(Capture::Subfield(first_char(&code, ' ')))),
                        (b"leader" | b"controlfield" | b"datafield" | b"subfield", _) => {
                            Err(format!(
                                "<{}> is not allowed inside <{}>",
                                String::from_utf8_lossy(&name),
                                String::from_utf8_lossy(parent.unwrap_or(b"record"))
                            ))
                        }
                        // Unknown elements are tolerated and ignored
                        _ => Ok(None),
                    };
                    match opened {
                        Ok(next) => {
                            if let Some(next) = next {
                                capture = next;
                                text.clear();
                            }
                            if is_empty {
                                let closed = close_element(
                                    &name,
                                    &mut capture,
                                    &mut text,
                                    &mut datafield,
                                    &mut builder,
                                );
                                if let Err(message) = closed {
                                    problem = Some(message);
                                }
                            } else {
                                open.push(name);
                            }
                        }
                        Err(message) => problem = Some(message),
                    }
                }
                Event::Text(e) => {
                    if !matches!(capture, Capture::None) {
                        match e.unescape() {
                            Ok(value) => text.push_str(&value),
                            Err(err) => problem = Some(err.to_string()),
                        }
                    }
                }
                Event::CData(e) => {
                    if !matches!(capture, Capture::None) {
                        text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Event::End(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    if name == b"record" && open.is_empty() {
                        return Ok(builder.build());
                    }
                    match open.pop() {
                        Some(top) if top == name => {
                            if let Err(message) = close_element(
                                &name,
                                &mut capture,
                                &mut text,
                                &mut datafield,
                                &mut builder,
                            ) {
                                problem = Some(message);
                            }
                        }
                        Some(top) => {
                            let message = format!(
                                "</{}> found while <{}> is open",
                                String::from_utf8_lossy(&name),
                                String::from_utf8_lossy(&top)
                            );
                            // The mismatched tag may itself be the record boundary
                            if name == b"record" {
                                return Err(MarcError::MalformedXml(format!(
                                    "record {}: {}",
                                    ordinal, message
                                )));
                            }
                            problem = Some(message);
                        }
                        None => {
                            problem = Some(format!(
                                "unexpected </{}>",
                                String::from_utf8_lossy(&name)
                            ));
                        }
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    return Err(MarcError::MalformedXml(format!(
                        "record {}: document ended inside a record",
                        ordinal
                    )));
                }
                _ => {}
            }
        }
    }

    /// Converts a reader error, ending the stream on I/O failures or when
    /// the reader stops making progress.
    fn classify(&mut self, e: quick_xml::Error) -> MarcError {
        let err = MarcError::from(e);
        let position = self.reader.buffer_position();
        if err.is_fatal() || self.last_error_at == Some(position) {
            self.finished = true;
        }
        self.last_error_at = Some(position);
        err
    }
}

impl<R: BufRead> Iterator for XmlDecoder<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record()
    }
}

fn close_element(
    name: &[u8],
    capture: &mut Capture,
    text: &mut String,
    datafield: &mut Option<DataField>,
    builder: &mut RecordBuilder,
) -> std::result::Result<(), String> {
    if !matches!(name, b"leader" | b"controlfield" | b"subfield" | b"datafield") {
        return Ok(());
    }
    let value = std::mem::take(text);
    match (name, std::mem::replace(capture, Capture::None)) {
        (b"leader", Capture::Leader) => {
            let leader: Leader = value.parse().map_err(|e: MarcError| e.to_string())?;
            builder.set_leader(leader);
        }
        (b"controlfield", Capture::Control(tag)) => builder.push_control(tag, value),
        (b"subfield", Capture::Subfield(code)) => {
            if let Some(field) = datafield.as_mut() {
                field.push_subfield(Subfield::new(code, value));
            }
        }
        (b"datafield", _) => {
            if let Some(field) = datafield.take() {
                builder.push_data(field);
            }
        }
        _ => {}
    }
    Ok(())
}

fn open_datafield(e: &BytesStart<'_>) -> std::result::Result<DataField, String> {
    let tag = required_attr(e, b"tag", "datafield")?;
    let ind1 = attr(e, b"ind1")?.map_or(' ', |v| first_char(&v, ' '));
    let ind2 = attr(e, b"ind2")?.map_or(' ', |v| first_char(&v, ' '));
    Ok(DataField::new(tag, ind1, ind2))
}

/// Looks up `key`, rejecting the element if any of its attributes is malformed.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> std::result::Result<Option<String>, String> {
    let mut found = None;
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| err.to_string())?;
        if found.is_none() && attribute.key.local_name().as_ref() == key {
            let value = attribute.unescape_value().map_err(|err| err.to_string())?;
            found = Some(value.into_owned());
        }
    }
    Ok(found)
}

fn required_attr(
    e: &BytesStart<'_>,
    key: &[u8],
    element: &str,
) -> std::result::Result<String, String> {
    attr(e, key)?.ok_or_else(|| {
        format!(
            "<{}> without {} attribute",
            element,
            String::from_utf8_lossy(key)
        )
    })
}

fn first_char(value: &str, fallback: char) -> char {
    value.chars().next().unwrap_or(fallback)
}

/// Writes records as a MARCXML `<collection>`.
pub struct XmlWriter<W: Write> {
    writer: Writer<W>,
    started: bool,
    records_written: usize,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
            started: false,
            records_written: 0,
        }
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if !self.started {
            self.start()?;
        }
        write_record_element(&mut self.writer, record, false)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Closes the collection. Call once after the last record.
    pub fn finish(&mut self) -> Result<()> {
        if !self.started {
            self.start()?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new("collection")))?;
        self.writer.get_mut().flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn start(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.writer.write_event(Event::Start(
            BytesStart::new("collection").with_attributes([("xmlns", MARCXML_NAMESPACE)]),
        ))?;
        self.started = true;
        Ok(())
    }
}

/// One record as a standalone `<record>` document.
pub fn record_to_xml(record: &Record) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_record_element(&mut writer, record, true)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_record_element<W: Write>(
    writer: &mut Writer<W>,
    record: &Record,
    with_namespace: bool,
) -> Result<()> {
    let mut start = BytesStart::new("record");
    if with_namespace {
        start.push_attribute(("xmlns", MARCXML_NAMESPACE));
    }
    writer.write_event(Event::Start(start))?;

    writer.write_event(Event::Start(BytesStart::new("leader")))?;
    writer.write_event(Event::Text(BytesText::new(record.leader().as_str())))?;
    writer.write_event(Event::End(BytesEnd::new("leader")))?;

    for field in record.fields() {
        match field {
            Field::Control(f) => {
                writer.write_event(Event::Start(
                    BytesStart::new("controlfield").with_attributes([("tag", f.tag.as_str())]),
                ))?;
                writer.write_event(Event::Text(BytesText::new(&f.value)))?;
                writer.write_event(Event::End(BytesEnd::new("controlfield")))?;
            }
            Field::Data(f) => {
                let ind1 = f.ind1.to_string();
                let ind2 = f.ind2.to_string();
                writer.write_event(Event::Start(BytesStart::new("datafield").with_attributes([
                    ("tag", f.tag.as_str()),
                    ("ind1", ind1.as_str()),
                    ("ind2", ind2.as_str()),
                ])))?;
                for subfield in f.subfields() {
                    let code = subfield.code.to_string();
                    writer.write_event(Event::Start(
                        BytesStart::new("subfield").with_attributes([("code", code.as_str())]),
                    ))?;
                    writer.write_event(Event::Text(BytesText::new(&subfield.value)))?;
                    writer.write_event(Event::End(BytesEnd::new("subfield")))?;
                }
                writer.write_event(Event::End(BytesEnd::new("datafield")))?;
            }
        }
    }

    writer.write_event(Event::End(BytesEnd::new("record")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn decode_str(xml: &str) -> Vec<Result<Record>> {
        XmlDecoder::new(xml.as_bytes()).collect()
    }

    const TWO_RECORDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
  <marc:record>
    <marc:leader>00000cam a2200000 a 4500</marc:leader>
    <marc:controlfield tag="001">  12345 </marc:controlfield>
    <marc:datafield tag="245" ind1="1" ind2="0">
      <marc:subfield code="a">Notre-Dame de Paris &amp; autres /</marc:subfield>
      <marc:subfield code="c"><![CDATA[Victor Hugo.]]></marc:subfield>
    </marc:datafield>
  </marc:record>
  <marc:record>
    <marc:leader>00000nam a2200000 a 4500</marc:leader>
    <marc:datafield tag="650" ind1=" " ind2="0">
      <marc:subfield code="a">Paris</marc:subfield>
      <marc:subfield code="z"/>
    </marc:datafield>
  </marc:record>
</marc:collection>"#;

    #[test]
    fn test_decode_prefixed_collection() {
        let records = decode_str(TWO_RECORDS);
        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        assert_eq!(first.leader().status(), 'c');
        // Whitespace inside values is significant
        assert_eq!(first.control_field("001"), Some("  12345 "));
        let title = first.data_fields().next().unwrap();
        assert_eq!((title.ind1, title.ind2), ('1', '0'));
        assert_eq!(title.subfield('a'), Some("Notre-Dame de Paris & autres /"));
        assert_eq!(title.subfield('c'), Some("Victor Hugo."));

        let second = records[1].as_ref().unwrap();
        let subject = second.data_fields().next().unwrap();
        assert_eq!(subject.ind1, ' ');
        assert_eq!(subject.subfield('z'), Some(""));
    }

    #[test]
    fn test_unclosed_element_resynchronizes_at_next_record() {
        let xml = r#"<collection>
  <record><leader>00000nam a2200000 a 4500</leader>
    <datafield tag="245" ind1="0" ind2="0"><subfield code="a">Broken</datafield>
  </record>
  <record><leader>00000nam a2200000 a 4500</leader>
    <controlfield tag="001">ok</controlfield>
  </record>
</collection>"#;
        let records = decode_str(xml);
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Err(MarcError::MalformedXml(_))));
        assert_eq!(records[1].as_ref().unwrap().control_field("001"), Some("ok"));
    }

    #[test]
    fn test_record_opened_inside_record() {
        let xml = r#"<collection>
  <record><leader>00000nam a2200000 a 4500</leader>
    <controlfield tag="001">first</controlfield>
  <record><controlfield tag="001">second</controlfield></record>
</collection>"#;
        let records = decode_str(xml);
        assert_eq!(records.len(), 2);
        assert!(records[0].is_err());
        assert_eq!(records[1].as_ref().unwrap().control_field("001"), Some("second"));
    }

    #[test]
    fn test_wrong_nesting_is_reported() {
        let xml = r#"<collection>
  <record><subfield code="a">orphan</subfield></record>
  <record><controlfield tag="001">fine</controlfield></record>
</collection>"#;
        let records = decode_str(xml);
        assert_eq!(records.len(), 2);
        match &records[0] {
            Err(MarcError::MalformedXml(message)) => assert!(message.contains("subfield")),
            other => panic!("expected malformed xml, got {:?}", other),
        }
        assert!(records[1].is_ok());
    }

    #[test]
    fn test_malformed_attribute_after_known_one() {
        let xml = r#"<collection>
  <record><controlfield tag="001">a</controlfield></record>
  <record><controlfield tag="001" bad>b</controlfield></record>
  <record><datafield tag="245" ind1="0" ind2="0" ind2="1"><subfield code="a">c</subfield></datafield></record>
  <record><controlfield tag="001">d</controlfield></record>
</collection>"#;
        let records = decode_str(xml);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].as_ref().unwrap().control_field("001"), Some("a"));
        assert!(matches!(records[1], Err(MarcError::MalformedXml(_))));
        assert!(matches!(records[2], Err(MarcError::MalformedXml(_))));
        assert_eq!(records[3].as_ref().unwrap().control_field("001"), Some("d"));
    }

    #[test]
    fn test_bad_leader_is_record_error() {
        let xml = r#"<collection>
  <record><leader>short</leader></record>
  <record><leader>00000nam a2200000 a 4500</leader></record>
</collection>"#;
        let records = decode_str(xml);
        assert!(matches!(records[0], Err(MarcError::MalformedXml(_))));
        assert!(records[1].is_ok());
    }

    #[test]
    fn test_document_ending_inside_record() {
        let records = decode_str("<collection><record><controlfield tag=\"001\">x");
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], Err(MarcError::MalformedXml(_))));
    }

    #[test]
    fn test_single_record_document() {
        let record = Record::builder()
            .control_field("001", "42")
            .data_field(DataField::new("245", '0', '0').with_subfield('a', "A <tagged> title"))
            .build();
        let xml = record_to_xml(&record).unwrap();
        assert!(xml.contains(MARCXML_NAMESPACE));
        assert!(xml.contains("A &lt;tagged&gt; title"));
        let decoded = decode_str(&xml);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap(), &record);
    }

    #[test]
    fn test_writer_produces_collection() {
        let mut writer = XmlWriter::new(Vec::new());
        for id in ["a1", "a2"] {
            let record = Record::builder().control_field("001", id).build();
            writer.write_record(&record).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.records_written(), 2);
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.trim_end().ends_with("</collection>"));
        let ids: Vec<String> = decode_str(&xml)
            .into_iter()
            .map(|r| r.unwrap().control_field("001").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_closure_is_a_transform() {
        let rename = |input: XmlInput| -> Result<XmlInput> {
            let mut source = String::new();
            let mut input = input;
            input.read_to_string(&mut source)?;
            let marcxml = source.replace("notice", "record");
            Ok(Box::new(std::io::Cursor::new(marcxml.into_bytes())))
        };
        let input: XmlInput = Box::new("<notice><controlfield tag=\"001\">7</controlfield></notice>".as_bytes());
        let transformed = rename.transform(input).unwrap();
        let records: Vec<_> = XmlDecoder::new(transformed).collect();
        assert_eq!(records[0].as_ref().unwrap().control_field("001"), Some("7"));
    }
}
