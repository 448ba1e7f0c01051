//! DVB text strings (EN 300 468 annex A).
//!
//! A leading byte below 0x20 selects the character table. Control codes
//! 0x80..=0x9F are stripped; 0x86/0x87 bracket the "emphasised" part of the
//! string, which broadcasters use to mark a short name.

use encoding_rs::Encoding;

/// A decoded DVB string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DvbText {
    /// Full text with control codes removed.
    pub text: String,
    /// Emphasised characters only, if the string had any.
    pub short: Option<String>,
}

enum Charset {
    /// ISO 6937 default table, decoded as Latin-1.
    Latin1,
    Single(&'static Encoding),
    Utf16,
    Utf8,
}

const EMPHASIS_ON: u8 = 0x86;
const EMPHASIS_OFF: u8 = 0x87;

fn iso_8859(part: u8) -> Option<&'static Encoding> {
    Some(match part {
        2 => encoding_rs::ISO_8859_2,
        3 => encoding_rs::ISO_8859_3,
        4 => encoding_rs::ISO_8859_4,
        5 => encoding_rs::ISO_8859_5,
        6 => encoding_rs::ISO_8859_6,
        7 => encoding_rs::ISO_8859_7,
        8 => encoding_rs::ISO_8859_8,
        9 => encoding_rs::WINDOWS_1254,
        10 => encoding_rs::ISO_8859_10,
        11 => encoding_rs::WINDOWS_874,
        13 => encoding_rs::ISO_8859_13,
        14 => encoding_rs::ISO_8859_14,
        15 => encoding_rs::ISO_8859_15,
        16 => encoding_rs::ISO_8859_16,
        _ => return None,
    })
}

/// Splits off the character table selector.
fn select_charset(raw: &[u8]) -> (Charset, &[u8]) {
    match raw.first().copied() {
        None => (Charset::Latin1, raw),
        Some(b) if b >= 0x20 => (Charset::Latin1, raw),
        Some(b @ 0x01..=0x0B) => match iso_8859(b + 4) {
            Some(enc) => (Charset::Single(enc), &raw[1..]),
            None => (Charset::Latin1, &raw[1..]),
        },
        Some(0x10) if raw.len() >= 3 => match iso_8859(raw[2]) {
            Some(enc) => (Charset::Single(enc), &raw[3..]),
            None => (Charset::Latin1, &raw[3..]),
        },
        Some(0x11) => (Charset::Utf16, &raw[1..]),
        Some(0x15) => (Charset::Utf8, &raw[1..]),
        Some(_) => (Charset::Latin1, &raw[1..]),
    }
}

fn decode_single(bytes: &[u8], charset: &Charset) -> String {
    match charset {
        Charset::Single(enc) => enc.decode_without_bom_handling(bytes).0.into_owned(),
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Decode a DVB string, stripping control codes and collecting emphasis.
pub fn decode_dvb_text(raw: &[u8]) -> DvbText {
    let (charset, body) = select_charset(raw);

    match charset {
        Charset::Latin1 | Charset::Single(_) => {
            let mut full = Vec::with_capacity(body.len());
            let mut short = Vec::new();
            let mut emphasis = false;
            for &b in body {
                match b {
                    EMPHASIS_ON => emphasis = true,
                    EMPHASIS_OFF => emphasis = false,
                    0x80..=0x9F => {}
                    _ => {
                        full.push(b);
                        if emphasis {
                            short.push(b);
                        }
                    }
                }
            }
            DvbText {
                text: decode_single(&full, &charset),
                short: (!short.is_empty()).then(|| decode_single(&short, &charset)),
            }
        }
        Charset::Utf8 | Charset::Utf16 => {
            let decoded = match charset {
                Charset::Utf16 => encoding_rs::UTF_16BE.decode_without_bom_handling(body).0,
                _ => String::from_utf8_lossy(body),
            };
            let mut text = String::with_capacity(decoded.len());
            let mut short = String::new();
            let mut emphasis = false;
            for c in decoded.chars() {
                match c as u32 {
                    0x86 | 0xE086 => emphasis = true,
                    0x87 | 0xE087 => emphasis = false,
                    0x80..=0x9F | 0xE080..=0xE09F => {}
                    _ => {
                        text.push(c);
                        if emphasis {
                            short.push(c);
                        }
                    }
                }
            }
            DvbText {
                text,
                short: (!short.is_empty()).then_some(short),
            }
        }
    }
}
