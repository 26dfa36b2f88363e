//! MARC-8 to Unicode transcoding and back
//!
//! MARC-8 switches graphic sets mid-string with escape sequences, so decoding
//! carries a [`Marc8State`]. The state belongs to one field: callers reset it
//! at every field boundary and pass it explicitly to each subfield value.

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

use super::tables::{Charset, ansel_combining, encode_char};

const ESC: u8 = 0x1B;
const REPLACEMENT: char = '\u{FFFD}';

/// Designated G0/G1 sets while walking a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marc8State {
    g0: Charset,
    g1: Charset,
}

impl Default for Marc8State {
    fn default() -> Self {
        Self {
            g0: Charset::BasicLatin,
            g1: Charset::Ansel,
        }
    }
}

impl Marc8State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to Basic Latin / ANSEL, as at the start of every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn g0(&self) -> Charset {
        self.g0
    }

    pub fn g1(&self) -> Charset {
        self.g1
    }

    /// Interprets the escape sequence starting at `bytes[at]` and returns the
    /// index of the first byte after it.
    fn apply_escape(&mut self, bytes: &[u8], at: usize) -> usize {
        let byte = |i: usize| bytes.get(at + i).copied();
        match byte(1) {
            // Technique 1: single-byte locking shifts of G0
            Some(f @ (b'g' | b'b' | b'p' | b's')) => {
                self.designate_g0(Charset::from_final(f, false));
                at + 2
            }
            Some(b'(' | b',') => {
                let (final_byte, len) = skip_intermediate(byte(2), byte(3));
                if let Some(f) = final_byte {
                    self.designate_g0(Charset::from_final(f, false));
                }
                at + 2 + len
            }
            Some(b')' | b'-') => {
                let (final_byte, len) = skip_intermediate(byte(2), byte(3));
                if let Some(f) = final_byte {
                    self.designate_g1(Charset::from_final(f, false));
                }
                at + 2 + len
            }
            Some(b'$') => match byte(2) {
                Some(b'(' | b',') => {
                    if let Some(f) = byte(3) {
                        self.designate_g0(Charset::from_final(f, true));
                    }
                    at + 4
                }
                Some(b')' | b'-') => {
                    if let Some(f) = byte(3) {
                        self.designate_g1(Charset::from_final(f, true));
                    }
                    at + 4
                }
                Some(f) => {
                    self.designate_g0(Charset::from_final(f, true));
                    at + 3
                }
                None => bytes.len(),
            },
            Some(other) => {
                tracing::debug!("Ignoring unknown MARC-8 escape 0x{:02X}", other);
                at + 1
            }
            None => bytes.len(),
        }
    }

    fn designate_g0(&mut self, set: Charset) {
        warn_if_unsupported(set);
        self.g0 = set;
    }

    fn designate_g1(&mut self, set: Charset) {
        warn_if_unsupported(set);
        self.g1 = set;
    }
}

fn skip_intermediate(first: Option<u8>, second: Option<u8>) -> (Option<u8>, usize) {
    match first {
        // ESC ) ! E is an alternate designation of ANSEL
        Some(b'!') => (second, 2),
        other => (other, 1),
    }
}

fn warn_if_unsupported(set: Charset) {
    if let Charset::Unsupported { final_byte, .. } = set {
        tracing::warn!(
            "MARC-8 character set '{}' is not supported, characters will be replaced",
            final_byte as char
        );
    }
}

/// Decodes one MARC-8 value, continuing from `state`.
pub fn decode(bytes: &[u8], state: &mut Marc8State) -> String {
    let mut out = String::with_capacity(bytes.len());
    // Combining marks seen before their base character
    let mut pending: Vec<char> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == ESC {
            i = state.apply_escape(bytes, i);
            continue;
        }

        let decoded = match b {
            0x00..=0x20 | 0x7F => Some(b as char),
            0x80..=0xA0 => c1_control(b),
            _ => {
                let set = if b < 0x80 { state.g0 } else { state.g1 };
                let width = set.width();
                if width > 1 {
                    i += width;
                    out.push(REPLACEMENT);
                    out.extend(pending.drain(..));
                    continue;
                }
                let code = b & 0x7F;
                match set.decode(code) {
                    Some(c) if set.is_combining(code) => {
                        pending.push(c);
                        i += 1;
                        continue;
                    }
                    other => other,
                }
            }
        };

        out.push(decoded.unwrap_or(REPLACEMENT));
        out.extend(pending.drain(..));
        i += 1;
    }
    out.extend(pending);

    expand_ncr(&out).nfc().collect()
}

fn c1_control(b: u8) -> Option<char> {
    match b {
        0x88 => Some('\u{0098}'),
        0x89 => Some('\u{009C}'),
        0x8D => Some('\u{200D}'),
        0x8E => Some('\u{200C}'),
        _ => None,
    }
}

/// Expands `&#xHHHH;` references written for characters MARC-8 cannot hold.
pub fn expand_ncr(s: &str) -> Cow<'_, str> {
    if !s.contains("&#x") {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("&#x") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 3..];
        let parsed = tail.find(';').and_then(|end| {
            let hex = &tail[..end];
            if hex.is_empty() || hex.len() > 6 {
                return None;
            }
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| (c, end))
        });
        match parsed {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str("&#x");
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Encodes a Unicode value as MARC-8, leaving G0 on Basic Latin at the end.
pub fn encode(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut g0 = Charset::BasicLatin;
    let mut chars = value.nfc().peekable();

    while let Some(c) = chars.next() {
        let mut marks: Vec<u8> = Vec::new();
        let base = match encode_base(c) {
            Some(resolved) => resolved,
            None => match decompose(c) {
                Some((resolved, decomposed_marks)) => {
                    marks = decomposed_marks;
                    resolved
                }
                None => {
                    switch_g0(&mut out, &mut g0, Charset::BasicLatin);
                    out.extend_from_slice(format!("&#x{:04X};", c as u32).as_bytes());
                    continue;
                }
            },
        };
        while let Some(mark) = chars.peek().and_then(|m| ansel_combining(*m)) {
            marks.push(mark);
            chars.next();
        }

        match base {
            (Charset::Ansel, code) => {
                out.extend_from_slice(&marks);
                out.push(code | 0x80);
            }
            (set, code) => {
                if code > 0x20 {
                    switch_g0(&mut out, &mut g0, set);
                }
                out.extend_from_slice(&marks);
                out.push(code);
            }
        }
    }
    switch_g0(&mut out, &mut g0, Charset::BasicLatin);
    out
}

/// Set and code for a character MARC-8 holds directly. Space and control
/// characters are the same in every G0 set.
fn encode_base(c: char) -> Option<(Charset, u8)> {
    if c == '\u{1B}' {
        return None;
    }
    if (c as u32) <= 0x20 {
        return Some((Charset::BasicLatin, c as u8));
    }
    encode_char(c)
}

/// A precomposed character written as ANSEL marks plus a mapped base.
fn decompose(c: char) -> Option<((Charset, u8), Vec<u8>)> {
    let mut parts = std::iter::once(c).nfd();
    let base = encode_base(parts.next()?)?;
    let marks = parts.map(ansel_combining).collect::<Option<Vec<u8>>>()?;
    if marks.is_empty() {
        return None;
    }
    Some((base, marks))
}

fn switch_g0(out: &mut Vec<u8>, g0: &mut Charset, target: Charset) {
    if *g0 == target {
        return;
    }
    match target {
        Charset::GreekSymbols | Charset::Subscripts | Charset::Superscripts => {
            out.extend_from_slice(&[ESC, target.final_byte()]);
        }
        _ => out.extend_from_slice(&[ESC, b'(', target.final_byte()]),
    }
    *g0 = target;
}
