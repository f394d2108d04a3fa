//! Text encodings tried, in order, when reading a source file.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    Windows1252,
}

pub const DEFAULT_ENCODINGS: [Encoding; 3] = [Encoding::Utf8, Encoding::Latin1, Encoding::Windows1252];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl Encoding {
    pub fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin1",
            Encoding::Windows1252 => "cp1252",
        }
    }

    /// Strict decode: `None` when the bytes are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            Encoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
            }
            Encoding::Latin1 => Some(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
            Encoding::Windows1252 => {
                encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            "cp1252" | "windows-1252" => Ok(Encoding::Windows1252),
            other => Err(format!("unsupported encoding '{other}'")),
        }
    }
}
