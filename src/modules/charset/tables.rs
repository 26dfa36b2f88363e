//! MARC-8 graphic character sets
//!
//! Codes are the 7-bit values 0x21..=0x7E. A set designated as G1 is reached
//! through the same codes with the high bit set.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// ANSEL Extended Latin, keyed by its customary G1 byte
const ANSEL: &[(u8, char)] = &[
    (0xA1, '\u{0141}'),
    (0xA2, '\u{00D8}'),
    (0xA3, '\u{0110}'),
    (0xA4, '\u{00DE}'),
    (0xA5, '\u{00C6}'),
    (0xA6, '\u{0152}'),
    (0xA7, '\u{02B9}'),
    (0xA8, '\u{00B7}'),
    (0xA9, '\u{266D}'),
    (0xAA, '\u{00AE}'),
    (0xAB, '\u{00B1}'),
    (0xAC, '\u{01A0}'),
    (0xAD, '\u{01AF}'),
    (0xAE, '\u{02BC}'),
    (0xB0, '\u{02BB}'),
    (0xB1, '\u{0142}'),
    (0xB2, '\u{00F8}'),
    (0xB3, '\u{0111}'),
    (0xB4, '\u{00FE}'),
    (0xB5, '\u{00E6}'),
    (0xB6, '\u{0153}'),
    (0xB7, '\u{02BA}'),
    (0xB8, '\u{0131}'),
    (0xB9, '\u{00A3}'),
    (0xBA, '\u{00F0}'),
    (0xBC, '\u{01A1}'),
    (0xBD, '\u{01B0}'),
    (0xC0, '\u{00B0}'),
    (0xC1, '\u{2113}'),
    (0xC2, '\u{2117}'),
    (0xC3, '\u{00A9}'),
    (0xC4, '\u{266F}'),
    (0xC5, '\u{00BF}'),
    (0xC6, '\u{00A1}'),
    (0xC7, '\u{00DF}'),
    (0xC8, '\u{20AC}'),
    // Combining marks, written before the base character
    (0xE0, '\u{0309}'),
    (0xE1, '\u{0300}'),
    (0xE2, '\u{0301}'),
    (0xE3, '\u{0302}'),
    (0xE4, '\u{0303}'),
    (0xE5, '\u{0304}'),
    (0xE6, '\u{0306}'),
    (0xE7, '\u{0307}'),
    (0xE8, '\u{0308}'),
    (0xE9, '\u{030C}'),
    (0xEA, '\u{030A}'),
    (0xEB, '\u{FE20}'),
    (0xEC, '\u{FE21}'),
    (0xED, '\u{0315}'),
    (0xEE, '\u{030B}'),
    (0xEF, '\u{0310}'),
    (0xF0, '\u{0327}'),
    (0xF1, '\u{0328}'),
    (0xF2, '\u{0323}'),
    (0xF3, '\u{0324}'),
    (0xF4, '\u{0325}'),
    (0xF5, '\u{0333}'),
    (0xF6, '\u{0332}'),
    (0xF7, '\u{0326}'),
    (0xF8, '\u{031C}'),
    (0xF9, '\u{032E}'),
    (0xFA, '\u{FE22}'),
    (0xFB, '\u{FE23}'),
    (0xFE, '\u{0313}'),
];

const ANSEL_FIRST_COMBINING: u8 = 0xE0;

const SUBSCRIPTS: &[(u8, char)] = &[
    (0x28, '\u{208D}'),
    (0x29, '\u{208E}'),
    (0x2B, '\u{208A}'),
    (0x2D, '\u{208B}'),
];

const SUPERSCRIPTS: &[(u8, char)] = &[
    (0x28, '\u{207D}'),
    (0x29, '\u{207E}'),
    (0x2B, '\u{207A}'),
    (0x2D, '\u{207B}'),
    (0x30, '\u{2070}'),
    (0x31, '\u{00B9}'),
    (0x32, '\u{00B2}'),
    (0x33, '\u{00B3}'),
];

const GREEK_SYMBOLS: &[(u8, char)] = &[(0x61, '\u{03B1}'), (0x62, '\u{03B2}'), (0x63, '\u{03B3}')];

/// Basic Cyrillic lowercase letters in code order starting at 0x40; the
/// uppercase forms follow at 0x60 in the same order.
const CYRILLIC_LOWER: [u32; 32] = [
    0x44E, 0x430, 0x431, 0x446, 0x434, 0x435, 0x444, 0x433, 0x445, 0x438, 0x439, 0x43A, 0x43B,
    0x43C, 0x43D, 0x43E, 0x43F, 0x44F, 0x440, 0x441, 0x442, 0x443, 0x436, 0x432, 0x44C, 0x44B,
    0x437, 0x448, 0x44D, 0x449, 0x447, 0x44A,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    BasicLatin,
    Ansel,
    GreekSymbols,
    Subscripts,
    Superscripts,
    BasicHebrew,
    BasicCyrillic,
    /// Designated but not mapped (EACC, Arabic, Greek, ...). `width` is the
    /// number of bytes per character.
    Unsupported { final_byte: u8, width: usize },
}

impl Charset {
    /// Set named by the final byte of an escape sequence
    pub fn from_final(final_byte: u8, multibyte: bool) -> Self {
        if multibyte {
            return Charset::Unsupported {
                final_byte,
                width: 3,
            };
        }
        match final_byte {
            b'B' | b's' => Charset::BasicLatin,
            b'E' => Charset::Ansel,
            b'g' => Charset::GreekSymbols,
            b'b' => Charset::Subscripts,
            b'p' => Charset::Superscripts,
            b'2' => Charset::BasicHebrew,
            b'N' => Charset::BasicCyrillic,
            other => Charset::Unsupported {
                final_byte: other,
                width: 1,
            },
        }
    }

    /// Final byte used when designating this set
    pub fn final_byte(self) -> u8 {
        match self {
            Charset::BasicLatin => b'B',
            Charset::Ansel => b'E',
            Charset::GreekSymbols => b'g',
            Charset::Subscripts => b'b',
            Charset::Superscripts => b'p',
            Charset::BasicHebrew => b'2',
            Charset::BasicCyrillic => b'N',
            Charset::Unsupported { final_byte, .. } => final_byte,
        }
    }

    pub fn width(self) -> usize {
        match self {
            Charset::Unsupported { width, .. } => width,
            _ => 1,
        }
    }

    /// Unicode character for a 7-bit code in this set
    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            Charset::BasicLatin => Some(code as char),
            Charset::Ansel => lookup(ANSEL, code | 0x80),
            Charset::GreekSymbols => lookup(GREEK_SYMBOLS, code),
            Charset::Subscripts => match code {
                0x30..=0x39 => char::from_u32(0x2080 + u32::from(code - 0x30)),
                _ => lookup(SUBSCRIPTS, code),
            },
            Charset::Superscripts => match code {
                0x34..=0x39 => char::from_u32(0x2074 + u32::from(code - 0x34)),
                _ => lookup(SUPERSCRIPTS, code),
            },
            Charset::BasicHebrew => match code {
                0x21..=0x40 => Some(code as char),
                0x60..=0x7A => char::from_u32(0x05D0 + u32::from(code - 0x60)),
                _ => None,
            },
            Charset::BasicCyrillic => match code {
                0x21..=0x3F => Some(code as char),
                0x40..=0x5F => char::from_u32(CYRILLIC_LOWER[usize::from(code - 0x40)]),
                0x60..=0x7E => char::from_u32(CYRILLIC_LOWER[usize::from(code - 0x60)] - 0x20),
                _ => None,
            },
            Charset::Unsupported { .. } => None,
        }
    }

    /// Whether the code is a combining mark that precedes its base character
    pub fn is_combining(self, code: u8) -> bool {
        self == Charset::Ansel && (code | 0x80) >= ANSEL_FIRST_COMBINING
    }

    fn mapped_sets() -> [Charset; 7] {
        [
            Charset::BasicLatin,
            Charset::Ansel,
            Charset::GreekSymbols,
            Charset::Subscripts,
            Charset::Superscripts,
            Charset::BasicHebrew,
            Charset::BasicCyrillic,
        ]
    }
}

fn lookup(table: &[(u8, char)], code: u8) -> Option<char> {
    table.iter().find(|(b, _)| *b == code).map(|(_, c)| *c)
}

/// Reverse mapping used by the encoder. Earlier sets win, so ASCII
/// punctuation shared by several sets always encodes as Basic Latin.
static REVERSE: Lazy<HashMap<char, (Charset, u8)>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for set in Charset::mapped_sets() {
        for code in 0x21u8..=0x7E {
            if let Some(c) = set.decode(code) {
                map.entry(c).or_insert((set, code));
            }
        }
    }
    map
});

/// Set and 7-bit code able to represent `c`
pub fn encode_char(c: char) -> Option<(Charset, u8)> {
    REVERSE.get(&c).copied()
}

/// ANSEL combining byte (with high bit) for a Unicode combining mark
pub fn ansel_combining(c: char) -> Option<u8> {
    match encode_char(c) {
        Some((Charset::Ansel, code)) if Charset::Ansel.is_combining(code) => Some(code | 0x80),
        _ => None,
    }
}
