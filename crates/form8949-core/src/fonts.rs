//! Standard 14 fonts used by the overlay and their glyph metrics
//!
//! Only the three fonts the form needs are modelled. Widths come from the
//! Adobe AFM files (units of 1/1000 em) for the printable ASCII range;
//! anything else is drawn as `?` and measured as such.

use lopdf::{dictionary, Dictionary, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    /// Used only for the check mark.
    ZapfDingbats,
}

/// Character code of the check mark glyph (`a20`) in ZapfDingbats.
pub const CHECK_MARK: &str = "4";

impl StandardFont {
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Name under which the font is registered in page resources. Prefixed
    /// so it cannot collide with fonts already used by a base document.
    pub fn resource_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "F8949Reg",
            StandardFont::HelveticaBold => "F8949Bold",
            StandardFont::ZapfDingbats => "F8949Zapf",
        }
    }

    /// Font dictionary for the page resources.
    pub fn dictionary(self) -> Dictionary {
        let mut dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => self.base_font(),
        };
        if self != StandardFont::ZapfDingbats {
            dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        }
        dict
    }

    fn glyph_width(self, byte: u8) -> u16 {
        match self {
            StandardFont::ZapfDingbats => 846,
            StandardFont::Helvetica => ascii_width(&HELVETICA_WIDTHS, byte),
            StandardFont::HelveticaBold => ascii_width(&HELVETICA_BOLD_WIDTHS, byte),
        }
    }

    /// Rendered width of `text` in points at `size`.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = encode_text(text)
            .iter()
            .map(|b| u32::from(self.glyph_width(*b)))
            .sum();
        units as f32 * size / 1000.0
    }
}

fn ascii_width(table: &[u16; 95], byte: u8) -> u16 {
    match byte {
        32..=126 => table[usize::from(byte - 32)],
        _ => table[usize::from(b'?' - 32)],
    }
}

/// Bytes for a PDF string in a WinAnsi-encoded standard font. Non-ASCII
/// characters become `?`.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Helvetica widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    // space ! " # $ % & ' ( ) * + , - . /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // : ; < = > ? @
    278, 278, 584, 584, 584, 556, 1015,
    // A-Z
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [ \ ] ^ _ `
    278, 278, 278, 469, 556, 333,
    // a-z
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // { | } ~
    334, 260, 334, 584,
];

/// Helvetica-Bold widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];
