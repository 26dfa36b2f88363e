//! ISO 2709 (MARC binary) reader and writer
//!
//! Each record announces its own length in the first five bytes of its
//! leader. The directory that follows the leader lists, for every field, its
//! tag, byte length and starting offset within the field data area.

use std::io::{BufRead, BufReader, Read, Write};

use crate::domain::{MarcError, Result};
use crate::models::{DataField, Field, LEADER_LEN, Leader, Record, RecordBuilder, Subfield};
use crate::models::{is_control_tag, leader::parse_digits};
use crate::modules::charset::{Encoding, FieldTranscoder};

pub const RECORD_TERMINATOR: u8 = 0x1D;
pub const FIELD_TERMINATOR: u8 = 0x1E;
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

/// Largest value the five-digit record length can hold
pub const MAX_RECORD_LEN: usize = 99_999;
/// Largest value the four-digit field length can hold
const MAX_FIELD_LEN: usize = 9_999;
/// Leader, directory terminator and record terminator
const MIN_RECORD_LEN: usize = LEADER_LEN + 2;
const LENGTH_PREFIX: usize = 5;

/// Streams records out of MARC binary input.
///
/// Per-record problems are yielded as `Err` items and the decoder moves on to
/// the next record. An I/O failure is yielded once and ends the iteration.
pub struct BinaryDecoder<R> {
    reader: BufReader<R>,
    encoding_override: Option<Encoding>,
    /// Bytes already consumed that belong to the next record
    carry: Vec<u8>,
    records_seen: usize,
    finished: bool,
}

impl<R: Read> BinaryDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            encoding_override: None,
            carry: Vec::new(),
            records_seen: 0,
            finished: false,
        }
    }

    /// Decode every record with `encoding`, whatever its leader declares.
    pub fn with_encoding_override(mut self, encoding: Option<Encoding>) -> Self {
        self.encoding_override = encoding;
        self
    }

    /// Number of records (good or bad) consumed so far
    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    pub fn read_record(&mut self) -> Option<Result<Record>> {
        if self.finished {
            return None;
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        let n = match self.fill(&mut prefix) {
            Ok(n) => n,
            Err(e) => return Some(Err(self.fail(e))),
        };
        if n == 0 || (n < LENGTH_PREFIX && prefix[..n].iter().all(u8::is_ascii_whitespace)) {
            self.finished = true;
            return None;
        }
        self.records_seen += 1;
        let ordinal = self.records_seen;

        if n < LENGTH_PREFIX {
            self.finished = true;
            return Some(Err(MarcError::TruncatedRecord {
                declared: MIN_RECORD_LEN,
                available: n,
            }));
        }

        let declared = match parse_digits(&prefix) {
            Some(len) if len >= MIN_RECORD_LEN => len,
            _ => {
                let message = format!(
                    "record {}: record length {:?} is not a valid length",
                    ordinal,
                    String::from_utf8_lossy(&prefix)
                );
                if let Err(e) = self.resync(&prefix) {
                    return Some(Err(self.fail(e)));
                }
                return Some(Err(MarcError::MalformedLeader(message)));
            }
        };

        let mut buf = vec![0u8; declared];
        buf[..LENGTH_PREFIX].copy_from_slice(&prefix);
        let n = match self.fill(&mut buf[LENGTH_PREFIX..]) {
            Ok(n) => n,
            Err(e) => return Some(Err(self.fail(e))),
        };
        let available = LENGTH_PREFIX + n;
        let terminator = buf[..available]
            .iter()
            .position(|b| *b == RECORD_TERMINATOR);

        // A well-framed record holds exactly one terminator, as its last byte
        if terminator == Some(declared - 1) {
            return Some(decode_record(&buf, self.encoding_override, ordinal));
        }
        if terminator.is_none() && available < declared {
            self.finished = true;
            return Some(Err(MarcError::TruncatedRecord {
                declared,
                available,
            }));
        }
        Some(Err(self.misframed(&buf[..available], declared, terminator, ordinal)))
    }

    /// The declared length disagrees with where the record terminator is.
    /// Bytes past the record's own terminator go back to the input.
    fn misframed(
        &mut self,
        consumed: &[u8],
        declared: usize,
        terminator: Option<usize>,
        ordinal: usize,
    ) -> MarcError {
        let message = match terminator {
            Some(pos) => format!(
                "record {}: declared length {} but record terminator found at byte {}",
                ordinal,
                declared,
                pos + 1
            ),
            None => format!(
                "record {}: declared length {} but no record terminator at its end",
                ordinal, declared
            ),
        };
        tracing::debug!("{}", message);
        if let Err(e) = self.resync(consumed) {
            return self.fail(e);
        }
        MarcError::MalformedLeader(message)
    }

    /// Reads until `buf` is full or input ends, draining `carry` first.
    fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        if !self.carry.is_empty() {
            let take = self.carry.len().min(buf.len());
            buf[..take].copy_from_slice(&self.carry[..take]);
            self.carry.drain(..take);
            filled = take;
        }
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Skips to just past the next record terminator.
    fn resync(&mut self, consumed: &[u8]) -> std::io::Result<()> {
        if let Some(pos) = consumed.iter().position(|b| *b == RECORD_TERMINATOR) {
            let mut rest = consumed[pos + 1..].to_vec();
            rest.extend_from_slice(&self.carry);
            self.carry = rest;
            return Ok(());
        }
        if let Some(pos) = self.carry.iter().position(|b| *b == RECORD_TERMINATOR) {
            self.carry.drain(..=pos);
            return Ok(());
        }
        self.carry.clear();
        let mut skipped = Vec::new();
        self.reader.read_until(RECORD_TERMINATOR, &mut skipped)?;
        tracing::debug!("Skipped {} bytes to resynchronize", skipped.len());
        Ok(())
    }

    fn fail(&mut self, e: std::io::Error) -> MarcError {
        self.finished = true;
        MarcError::IoFailure(e)
    }
}

impl<R: Read> Iterator for BinaryDecoder<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record()
    }
}

/// Decodes one complete record buffer (leader through record terminator).
pub fn decode_record(
    buf: &[u8],
    encoding_override: Option<Encoding>,
    ordinal: usize,
) -> Result<Record> {
    if buf.len() < MIN_RECORD_LEN {
        return Err(MarcError::MalformedLeader(format!(
            "record {}: {} bytes is shorter than a leader",
            ordinal,
            buf.len()
        )));
    }
    let leader = Leader::parse(&buf[..LEADER_LEN])
        .map_err(|e| MarcError::MalformedLeader(format!("record {}: {}", ordinal, e)))?;
    let base = leader.base_address().ok_or_else(|| {
        MarcError::MalformedLeader(format!(
            "record {}: base address {:?} is not numeric",
            ordinal,
            &leader.as_str()[12..17]
        ))
    })?;
    if base <= LEADER_LEN || base > buf.len() {
        return Err(MarcError::MalformedDirectory(format!(
            "record {}: base address {} outside record of {} bytes",
            ordinal,
            base,
            buf.len()
        )));
    }
    if buf.last() != Some(&RECORD_TERMINATOR) {
        tracing::warn!("Record {} does not end with a record terminator", ordinal);
    }

    match encoding_override.or_else(|| Encoding::from_leader(leader.char_coding())) {
        Some(encoding) => decode_fields(buf, leader, base, encoding, ordinal),
        None => {
            let partial = decode_fields(buf, leader, base, Encoding::Utf8, ordinal).ok();
            Err(MarcError::UnsupportedEncoding {
                scheme: leader.char_coding(),
                partial: partial.map(Box::new),
            })
        }
    }
}

fn decode_fields(
    buf: &[u8],
    leader: Leader,
    base: usize,
    encoding: Encoding,
    ordinal: usize,
) -> Result<Record> {
    let directory = &buf[LEADER_LEN..base - 1];
    if buf[base - 1] != FIELD_TERMINATOR {
        return Err(MarcError::MalformedDirectory(format!(
            "record {}: directory is not terminated at offset {}",
            ordinal,
            base - 1
        )));
    }

    let length_width = leader.length_of_field_length();
    let start_width = leader.length_of_starting_position();
    let entry_width = 3 + length_width + start_width;
    if directory.len() % entry_width != 0 {
        return Err(MarcError::MalformedDirectory(format!(
            "record {}: directory length {} is not a multiple of {}",
            ordinal,
            directory.len(),
            entry_width
        )));
    }

    let data = &buf[base..];
    let mut transcoder = FieldTranscoder::new(encoding);
    let mut builder = RecordBuilder::new().leader(leader);

    for entry in directory.chunks(entry_width) {
        let tag = String::from_utf8_lossy(&entry[..3]).into_owned();
        let length = parse_digits(&entry[3..3 + length_width]);
        let start = parse_digits(&entry[3 + length_width..]);
        let (Some(length), Some(start)) = (length, start) else {
            return Err(MarcError::MalformedDirectory(format!(
                "record {}: entry for tag {} has non-numeric length or offset",
                ordinal, tag
            )));
        };
        if start + length > data.len() {
            return Err(MarcError::MalformedDirectory(format!(
                "record {}: field {} at {}+{} runs past field data of {} bytes",
                ordinal,
                tag,
                start,
                length,
                data.len()
            )));
        }

        let mut raw = &data[start..start + length];
        if let Some((&FIELD_TERMINATOR, rest)) = raw.split_last() {
            raw = rest;
        }

        transcoder.begin_field();
        if is_control_tag(&tag) {
            let value = transcoder.decode(raw);
            builder.push_control(tag, value);
        } else {
            builder.push_data(decode_data_field(tag, raw, &leader, &mut transcoder));
        }
    }

    Ok(builder.build())
}

fn decode_data_field(
    tag: String,
    raw: &[u8],
    leader: &Leader,
    transcoder: &mut FieldTranscoder,
) -> DataField {
    // Some systems omit indicators entirely and start with a delimiter
    let indicator_len = if raw.first() == Some(&SUBFIELD_DELIMITER) {
        0
    } else {
        leader.indicator_count().min(raw.len())
    };
    let indicator = |i: usize| {
        if i < indicator_len {
            char::from(raw[i])
        } else {
            ' '
        }
    };
    let mut field = DataField::new(tag, indicator(0), indicator(1));

    // Anything between the indicators and the first delimiter is not a subfield
    for chunk in raw[indicator_len..].split(|b| *b == SUBFIELD_DELIMITER).skip(1) {
        let Some((&code, value)) = chunk.split_first() else {
            continue;
        };
        field.push_subfield(Subfield::new(char::from(code), transcoder.decode(value)));
    }
    field
}

/// Serializes one record as MARC binary.
///
/// `encoding` picks the output character set; `None` keeps whatever the
/// record's leader declares (UTF-8 when that is unrecognized). Nothing is
/// returned on error, so a rejected record never produces partial output.
pub fn encode_record(record: &Record, encoding: Option<Encoding>) -> Result<Vec<u8>> {
    let encoding = encoding
        .or_else(|| Encoding::from_leader(record.leader().char_coding()))
        .unwrap_or(Encoding::Utf8);

    let mut directory = Vec::with_capacity(record.len() * 12 + 1);
    let mut data = Vec::new();

    for field in record.fields() {
        let tag = field.tag();
        if tag.len() != 3 {
            return Err(MarcError::MalformedDirectory(format!(
                "tag {:?} is not three bytes long",
                tag
            )));
        }
        let start = data.len();
        match field {
            Field::Control(f) => data.extend_from_slice(&encoding.encode(&f.value)),
            Field::Data(f) => {
                data.push(single_byte(f.ind1));
                data.push(single_byte(f.ind2));
                for subfield in f.subfields() {
                    data.push(SUBFIELD_DELIMITER);
                    data.push(single_byte(subfield.code));
                    data.extend_from_slice(&encoding.encode(&subfield.value));
                }
            }
        }
        data.push(FIELD_TERMINATOR);

        let length = data.len() - start;
        if length > MAX_FIELD_LEN {
            return Err(MarcError::RecordTooLarge {
                length,
                limit: MAX_FIELD_LEN,
            });
        }
        directory.extend_from_slice(tag.as_bytes());
        directory.extend_from_slice(format!("{:04}{:05}", length, start % 100_000).as_bytes());
    }
    directory.push(FIELD_TERMINATOR);

    let base = LEADER_LEN + directory.len();
    let total = base + data.len() + 1;
    if total > MAX_RECORD_LEN {
        return Err(MarcError::RecordTooLarge {
            length: total,
            limit: MAX_RECORD_LEN,
        });
    }

    let leader = output_leader(record.leader(), total, base, encoding);
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(leader.as_bytes());
    out.extend_from_slice(&directory);
    out.extend_from_slice(&data);
    out.push(RECORD_TERMINATOR);
    debug_assert_eq!(out.len(), total);
    Ok(out)
}

/// Leader as written: computed lengths, the output encoding and the standard
/// indicator, subfield code and entry map widths this writer produces.
fn output_leader(leader: &Leader, total: usize, base: usize, encoding: Encoding) -> Leader {
    let mut raw = *leader
        .with_lengths(total, base)
        .with_char_coding(encoding.leader_byte())
        .as_bytes();
    raw[10] = b'2';
    raw[11] = b'2';
    raw[20..24].copy_from_slice(b"4500");
    // Always ASCII, so parsing cannot fail
    Leader::parse(&raw).unwrap_or(*leader)
}

fn single_byte(c: char) -> u8 {
    u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(b' ')
}

/// Writes records as MARC binary to any byte sink.
pub struct BinaryWriter<W: Write> {
    writer: W,
    encoding: Option<Encoding>,
    records_written: usize,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            encoding: None,
            records_written: 0,
        }
    }

    pub fn with_encoding(mut self, encoding: Option<Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    /// Encodes and writes one record. A `RecordTooLarge` error leaves the
    /// sink untouched and the writer usable for the next record.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let bytes = encode_record(record, self.encoding)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str) -> Record {
        Record::builder()
            .control_field("001", "bib-0001")
            .data_field(
                DataField::new("245", '1', '0')
                    .with_subfield('a', title)
                    .with_subfield('c', "Victor Hugo."),
            )
            .data_field(DataField::new("650", ' ', '0').with_subfield('a', "Paris"))
            .build()
    }

    fn decode_all(bytes: Vec<u8>) -> Vec<Result<Record>> {
        BinaryDecoder::new(std::io::Cursor::new(bytes)).collect()
    }

    #[test]
    fn test_decode_encoded_record() {
        let record = sample("Les misérables /");
        let bytes = encode_record(&record, None).unwrap();
        let decoded = decode_record(&bytes, None, 1).unwrap();
        assert_eq!(decoded.fields(), record.fields());
        assert_eq!(decoded.leader().record_length(), Some(bytes.len()));
    }

    #[test]
    fn test_directory_layout() {
        let bytes = encode_record(&sample("Title"), None).unwrap();
        let leader = Leader::parse(&bytes[..24]).unwrap();
        let base = leader.base_address().unwrap();
        // Three entries of 12 bytes plus the terminator
        assert_eq!(base, 24 + 3 * 12 + 1);
        assert_eq!(&bytes[24..36], b"001000900000");
        assert_eq!(bytes[base - 1], FIELD_TERMINATOR);
        assert_eq!(*bytes.last().unwrap(), RECORD_TERMINATOR);
        assert_eq!(&bytes[base..base + 8], b"bib-0001");
    }

    #[test]
    fn test_directory_not_multiple_of_entry_width() {
        let mut bytes = encode_record(&sample("Title"), None).unwrap();
        // Claim the base address is one byte later than it is
        let base = Leader::parse(&bytes[..24]).unwrap().base_address().unwrap();
        let shifted = format!("{:05}", base + 1);
        bytes[12..17].copy_from_slice(shifted.as_bytes());
        bytes[base] = FIELD_TERMINATOR;
        let err = decode_record(&bytes, None, 1).unwrap_err();
        assert!(matches!(err, MarcError::MalformedDirectory(_)), "{err}");
    }

    #[test]
    fn test_directory_entry_out_of_bounds() {
        let mut bytes = encode_record(&sample("Title"), None).unwrap();
        // First entry's offset points far beyond the field data
        bytes[31..36].copy_from_slice(b"90000");
        let err = decode_record(&bytes, None, 1).unwrap_err();
        assert!(matches!(err, MarcError::MalformedDirectory(_)));
    }

    #[test]
    fn test_missing_directory_terminator() {
        let mut bytes = encode_record(&sample("Title"), None).unwrap();
        let base = Leader::parse(&bytes[..24]).unwrap().base_address().unwrap();
        bytes[base - 1] = b'0';
        let err = decode_record(&bytes, None, 1).unwrap_err();
        assert!(matches!(err, MarcError::MalformedDirectory(_)));
    }

    #[test]
    fn test_truncated_record_at_end_of_input() {
        let mut bytes = encode_record(&sample("First"), None).unwrap();
        let second = encode_record(&sample("Second"), None).unwrap();
        bytes.extend_from_slice(&second[..second.len() - 10]);
        let results = decode_all(bytes);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(MarcError::TruncatedRecord {
                declared,
                available,
            }) => {
                assert_eq!(*declared, second.len());
                assert_eq!(*available, second.len() - 10);
            }
            other => panic!("expected truncated record, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_length_resynchronizes() {
        let mut bytes = encode_record(&sample("First"), None).unwrap();
        bytes.extend_from_slice(b"garbage that is not a record\x1D");
        bytes.extend_from_slice(&encode_record(&sample("Third"), None).unwrap());
        let results = decode_all(bytes);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(MarcError::MalformedLeader(_))));
        let third = results[2].as_ref().unwrap();
        assert_eq!(third.data_fields().next().unwrap().subfield('a'), Some("Third"));
    }

    #[test]
    fn test_terminator_inside_bad_prefix_is_honoured() {
        let mut bytes = b"x\x1D".to_vec();
        bytes.extend_from_slice(&encode_record(&sample("Next"), None).unwrap());
        let results = decode_all(bytes);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    fn with_declared_length(mut bytes: Vec<u8>, length: usize) -> Vec<u8> {
        bytes[..LENGTH_PREFIX].copy_from_slice(format!("{:05}", length).as_bytes());
        bytes
    }

    fn titles(results: &[Result<Record>]) -> Vec<String> {
        results
            .iter()
            .map(|r| match r {
                Ok(record) => record
                    .data_fields()
                    .next()
                    .and_then(|f| f.subfield('a'))
                    .unwrap_or_default()
                    .to_string(),
                Err(_) => "error".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_declared_length_too_long_between_valid_records() {
        let bad = encode_record(&sample("Bad"), None).unwrap();
        let bad_len = bad.len();
        let mut bytes = encode_record(&sample("First"), None).unwrap();
        bytes.extend(with_declared_length(bad, bad_len + 30));
        bytes.extend(encode_record(&sample("Second"), None).unwrap());

        let results = decode_all(bytes);
        assert_eq!(titles(&results), vec!["First", "error", "Second"]);
        assert!(matches!(results[1], Err(MarcError::MalformedLeader(_))));
    }

    #[test]
    fn test_declared_length_too_short_between_valid_records() {
        let bad = encode_record(&sample("Bad"), None).unwrap();
        let bad_len = bad.len();
        let mut bytes = encode_record(&sample("First"), None).unwrap();
        bytes.extend(with_declared_length(bad, bad_len - 30));
        bytes.extend(encode_record(&sample("Second"), None).unwrap());

        let results = decode_all(bytes);
        assert_eq!(titles(&results), vec!["First", "error", "Second"]);
        assert!(matches!(results[1], Err(MarcError::MalformedLeader(_))));
    }

    #[test]
    fn test_declared_length_covering_next_record() {
        let bad = encode_record(&sample("Bad"), None).unwrap();
        let second = encode_record(&sample("Second"), None).unwrap();
        let swallowing = bad.len() + second.len();
        let mut bytes = with_declared_length(bad, swallowing);
        bytes.extend(second);
        bytes.extend(encode_record(&sample("Third"), None).unwrap());

        let results = decode_all(bytes);
        assert_eq!(titles(&results), vec!["error", "Second", "Third"]);
    }

    #[test]
    fn test_declared_length_past_end_of_input_on_complete_record() {
        let bad = encode_record(&sample("Bad"), None).unwrap();
        let bad_len = bad.len();
        let mut bytes = encode_record(&sample("First"), None).unwrap();
        bytes.extend(with_declared_length(bad, bad_len + 500));

        let results = decode_all(bytes);
        assert_eq!(titles(&results), vec!["First", "error"]);
        assert!(matches!(results[1], Err(MarcError::MalformedLeader(_))));
    }

    #[test]
    fn test_trailing_newline_is_not_a_record() {
        let mut bytes = encode_record(&sample("Only"), None).unwrap();
        bytes.push(b'\n');
        let results = decode_all(bytes);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn test_marc8_record_is_transcoded() {
        let record = Record::builder()
            .leader("00000nam  2200000 a 4500".parse().unwrap())
            .data_field(DataField::new("245", '0', '0').with_subfield('a', "Война и мир"))
            .build();
        let bytes = encode_record(&record, None).unwrap();
        assert!(bytes.windows(3).any(|w| w == b"\x1B(N"));
        let decoded = decode_record(&bytes, None, 1).unwrap();
        assert_eq!(decoded.leader().char_coding(), ' ');
        assert_eq!(
            decoded.data_fields().next().unwrap().subfield('a'),
            Some("Война и мир")
        );
    }

    #[test]
    fn test_encoding_override_beats_leader() {
        let record = sample("Café");
        let bytes = encode_record(&record, Some(Encoding::Utf8)).unwrap();
        // Leader claims MARC-8 although the bytes are UTF-8
        let mut mislabeled = bytes.clone();
        mislabeled[9] = b' ';
        let decoded = decode_record(&mislabeled, Some(Encoding::Utf8), 1).unwrap();
        assert_eq!(decoded.data_fields().next().unwrap().subfield('a'), Some("Café"));
    }

    #[test]
    fn test_unsupported_encoding_carries_partial_record() {
        let mut bytes = encode_record(&sample("Title"), None).unwrap();
        bytes[9] = b'z';
        match decode_record(&bytes, None, 1) {
            Err(MarcError::UnsupportedEncoding { scheme, partial }) => {
                assert_eq!(scheme, 'z');
                let partial = partial.expect("partial record");
                assert_eq!(partial.control_field("001"), Some("bib-0001"));
            }
            other => panic!("expected unsupported encoding, got {:?}", other),
        }
    }

    #[test]
    fn test_record_too_large_writes_nothing() {
        let mut builder = Record::builder();
        for _ in 0..12 {
            builder = builder.data_field(
                DataField::new("500", ' ', ' ').with_subfield('a', "x".repeat(9_000)),
            );
        }
        let record = builder.build();
        let mut writer = BinaryWriter::new(Vec::new());
        let err = writer.write_record(&record).unwrap_err();
        assert!(matches!(err, MarcError::RecordTooLarge { limit: 99_999, .. }));
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_writer_continues_after_rejected_record() {
        let oversized = Record::builder()
            .data_field(DataField::new("520", ' ', ' ').with_subfield('a', "y".repeat(10_000)))
            .build();
        let mut writer = BinaryWriter::new(Vec::new());
        writer.write_record(&sample("One")).unwrap();
        assert!(matches!(
            writer.write_record(&oversized),
            Err(MarcError::RecordTooLarge { limit: 9_999, .. })
        ));
        writer.write_record(&sample("Two")).unwrap();
        assert_eq!(writer.records_written(), 2);
        let results = decode_all(writer.into_inner());
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn test_field_without_indicators() {
        let leader = Leader::default();
        let mut transcoder = FieldTranscoder::new(Encoding::Utf8);
        let field = decode_data_field("650".into(), b"\x1FaParis", &leader, &mut transcoder);
        assert_eq!((field.ind1, field.ind2), (' ', ' '));
        assert_eq!(field.subfield('a'), Some("Paris"));
    }

    #[test]
    fn test_junk_before_first_delimiter_is_dropped() {
        let leader = Leader::default();
        let mut transcoder = FieldTranscoder::new(Encoding::Utf8);
        let field = decode_data_field("245".into(), b"10junk\x1FaTitle\x1F", &leader, &mut transcoder);
        assert_eq!((field.ind1, field.ind2), ('1', '0'));
        assert_eq!(field.subfields().len(), 1);
        assert_eq!(field.subfield('a'), Some("Title"));
    }
}
