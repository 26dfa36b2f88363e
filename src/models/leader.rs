use std::fmt;

use crate::domain::{MarcError, Result};

/// Number of fixed positions in a MARC leader
pub const LEADER_LEN: usize = 24;

/// Leader used when a record is built from scratch
const DEFAULT_LEADER: &[u8; LEADER_LEN] = b"00000nam a2200000 a 4500";

/// The 24-position record header.
///
/// Stored as raw ASCII. Numeric positions are only interpreted on access, so
/// a leader with placeholder lengths (common in MARCXML) is still accepted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Leader([u8; LEADER_LEN]);

impl Leader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != LEADER_LEN {
            return Err(MarcError::MalformedLeader(format!(
                "expected {} bytes, found {}",
                LEADER_LEN,
                bytes.len()
            )));
        }
        if let Some(pos) = bytes.iter().position(|b| !b.is_ascii() || b.is_ascii_control()) {
            return Err(MarcError::MalformedLeader(format!(
                "non-ASCII byte 0x{:02X} at position {}",
                bytes[pos], pos
            )));
        }
        let mut raw = [0u8; LEADER_LEN];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; LEADER_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Positions 0-4
    pub fn record_length(&self) -> Option<usize> {
        parse_digits(&self.0[0..5])
    }

    /// Position 5
    pub fn status(&self) -> char {
        self.0[5] as char
    }

    /// Position 6
    pub fn record_type(&self) -> char {
        self.0[6] as char
    }

    /// Position 7
    pub fn bibliographic_level(&self) -> char {
        self.0[7] as char
    }

    /// Position 9: ' ' for MARC-8, 'a' for UCS/Unicode
    pub fn char_coding(&self) -> char {
        self.0[9] as char
    }

    /// Position 10, defaulting to 2 when not a digit
    pub fn indicator_count(&self) -> usize {
        digit_or(self.0[10], 2)
    }

    /// Position 11, defaulting to 2 when not a digit
    pub fn subfield_code_count(&self) -> usize {
        digit_or(self.0[11], 2)
    }

    /// Positions 12-16
    pub fn base_address(&self) -> Option<usize> {
        parse_digits(&self.0[12..17])
    }

    /// Positions 20-23
    pub fn entry_map(&self) -> &str {
        std::str::from_utf8(&self.0[20..24]).unwrap_or_default()
    }

    /// Width of the length-of-field part of a directory entry (position 20)
    pub fn length_of_field_length(&self) -> usize {
        match digit_or(self.0[20], 4) {
            0 => 4,
            n => n,
        }
    }

    /// Width of the starting-position part of a directory entry (position 21)
    pub fn length_of_starting_position(&self) -> usize {
        match digit_or(self.0[21], 5) {
            0 => 5,
            n => n,
        }
    }

    /// Copy of this leader with the computed lengths written in.
    pub fn with_lengths(&self, record_length: usize, base_address: usize) -> Self {
        let mut raw = self.0;
        raw[0..5].copy_from_slice(format!("{:05}", record_length % 100_000).as_bytes());
        raw[12..17].copy_from_slice(format!("{:05}", base_address % 100_000).as_bytes());
        Self(raw)
    }

    /// Copy of this leader with a different character coding scheme.
    pub fn with_char_coding(&self, coding: u8) -> Self {
        let mut raw = self.0;
        raw[9] = coding;
        Self(raw)
    }
}

impl Default for Leader {
    fn default() -> Self {
        Self(*DEFAULT_LEADER)
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Leader({:?})", self.as_str())
    }
}

impl std::str::FromStr for Leader {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}

pub(crate) fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        bytes
            .iter()
            .fold(0usize, |acc, b| acc * 10 + usize::from(b - b'0')),
    )
}

fn digit_or(b: u8, fallback: usize) -> usize {
    if b.is_ascii_digit() {
        usize::from(b - b'0')
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_leader_fields() {
        let leader = Leader::default();
        assert_eq!(leader.as_str(), "00000nam a2200000 a 4500");
        assert_eq!(leader.record_length(), Some(0));
        assert_eq!(leader.status(), 'n');
        assert_eq!(leader.record_type(), 'a');
        assert_eq!(leader.bibliographic_level(), 'm');
        assert_eq!(leader.char_coding(), 'a');
        assert_eq!(leader.indicator_count(), 2);
        assert_eq!(leader.subfield_code_count(), 2);
        assert_eq!(leader.base_address(), Some(0));
        assert_eq!(leader.entry_map(), "4500");
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = Leader::parse(b"00042nam").unwrap_err();
        assert!(matches!(err, MarcError::MalformedLeader(_)));
    }

    #[test]
    fn test_placeholder_lengths_are_accepted() {
        let leader: Leader = "     nam a22     7a 4500".parse().unwrap();
        assert_eq!(leader.record_length(), None);
        assert_eq!(leader.base_address(), None);
        assert_eq!(leader.char_coding(), 'a');
    }

    #[test]
    fn test_with_lengths_does_not_touch_original() {
        let leader = Leader::default();
        let stamped = leader.with_lengths(1234, 61);
        assert_eq!(stamped.as_str(), "01234nam a2200061 a 4500");
        assert_eq!(leader.record_length(), Some(0));
    }

    #[test]
    fn test_with_char_coding() {
        let marc8 = Leader::default().with_char_coding(b' ');
        assert_eq!(marc8.char_coding(), ' ');
        assert_eq!(marc8.as_str(), "00000nam  2200000 a 4500");
        assert_eq!(Leader::default().char_coding(), 'a');
    }

    #[test]
    fn test_directory_widths_fall_back_when_zero() {
        let leader: Leader = "00000nam a2200000 a 0000".parse().unwrap();
        assert_eq!(leader.length_of_field_length(), 4);
        assert_eq!(leader.length_of_starting_position(), 5);
    }
}
