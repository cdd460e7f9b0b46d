//! Decoding of legacy 8-bit field values.
//!
//! Classifier extracts are encoded in CP866 (DOS Cyrillic). Bytes below
//! `0x80` are ASCII; the upper half is looked up in a fixed table.

use std::sync::LazyLock;

use serde::Deserialize;

const CP866_HIGH: &str = concat!(
    "АБВГДЕЖЗИЙКЛМНОП",
    "РСТУФХЦЧШЩЪЫЬЭЮЯ",
    "абвгдежзийклмноп",
    "░▒▓│┤╡╢╖╕╣║╗╝╜╛┐",
    "└┴┬├─┼╞╟╚╔╩╦╠═╬╧",
    "╨╤╥╙╘╒╓╫╪┘┌█▄▌▐▀",
    "рстуфхцчшщъыьэюя",
    "ЁёЄєЇїЎў°∙·√№¤■\u{a0}",
);

static CP866_TABLE: LazyLock<Vec<char>> = LazyLock::new(|| CP866_HIGH.chars().collect());

/// Source text encoding of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codepage {
    #[default]
    Cp866,
    /// Already-transcoded sources; invalid sequences are replaced.
    Utf8,
}

impl Codepage {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Codepage::Cp866 => decode_cp866(bytes),
            Codepage::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl std::str::FromStr for Codepage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cp866" | "ibm866" => Ok(Codepage::Cp866),
            "utf8" | "utf-8" => Ok(Codepage::Utf8),
            other => anyhow::bail!("Unknown encoding: '{}'. Must be cp866 or utf8.", other),
        }
    }
}

fn decode_cp866(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                CP866_TABLE[(b - 0x80) as usize]
            }
        })
        .collect()
}
