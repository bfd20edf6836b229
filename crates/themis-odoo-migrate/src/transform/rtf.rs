//! RTF to plain text.
//!
//! Themis stores case notes as Windows-1252 RTF produced by a Windows editor.
//! The blob is decoded with `encoding_rs` and the visible text is taken from
//! the document body parsed by `rtf-parser`.

use encoding_rs::WINDOWS_1252;
use rtf_parser::document::RtfDocument;
use tracing::warn;

/// Decode a Windows-1252 blob.
pub fn decode_cp1252(bytes: &[u8]) -> String {
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Extract the visible text of an RTF document.
///
/// Input that is not RTF is returned unchanged, and so is RTF the parser
/// rejects.
pub fn rtf_to_text(input: &str) -> String {
    if !input.trim_start().starts_with("{\\rtf") {
        return input.to_string();
    }

    match RtfDocument::try_from(input) {
        Ok(document) => document.get_text(),
        Err(e) => {
            warn!("Unreadable RTF note kept as is: {:?}", e);
            input.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(rtf_to_text("gewoon tekst\nmet regels"), "gewoon tekst\nmet regels");
    }

    #[test]
    fn test_font_and_color_tables_dropped() {
        let rtf = r"{\rtf1\ansi\deff0{\fonttbl{\f0\fnil Arial;}}{\colortbl ;\red0\green0\blue0;}
\viewkind4\uc1\pard\f0\fs20 Eerste regel\par
Tweede regel\par
}";
        let text = rtf_to_text(rtf);
        assert!(text.contains("Eerste regel"), "{:?}", text);
        assert!(text.contains("Tweede regel"), "{:?}", text);
        assert!(!text.contains("Arial"));
        assert!(!text.contains("fonttbl"));
        assert!(!text.contains('\\'));
    }

    #[test]
    fn test_formatting_groups_keep_their_text() {
        let rtf = r"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}\f0\pard Dagvaarding {\b betekend}.\par}";
        let text = rtf_to_text(rtf);
        assert!(text.contains("Dagvaarding"), "{:?}", text);
        assert!(text.contains("betekend"), "{:?}", text);
        assert!(!text.contains("Helvetica"));
    }

    #[test]
    fn test_decoded_blob_keeps_accents() {
        let raw = decode_cp1252(b"{\\rtf1\\ansi\\pard Caf\xe9 \x80 5\\par}");
        let text = rtf_to_text(&raw);
        assert!(text.contains("Café € 5"), "{:?}", text);
    }

    #[test]
    fn test_decode_cp1252() {
        assert_eq!(decode_cp1252(&[0x43, 0x61, 0x66, 0xE9]), "Café");
        assert_eq!(decode_cp1252(&[0x80]), "€");
    }
}
