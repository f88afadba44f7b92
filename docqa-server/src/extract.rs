//! Text extraction from uploaded or downloaded files.

use std::path::Path;

/// Turns file bytes into plain text.
///
/// Extraction never fails: an unsupported or unreadable file yields an empty
/// string, which callers treat as "no text".
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> String;
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "html", "htm"];

/// Decodes text formats as lossy UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> String {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension {
            Some(ext) if TEXT_EXTENSIONS.contains(&ext.as_str()) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_files_are_decoded() {
        let text = PlainTextExtractor.extract("notes.TXT", b"Alpha causes Beta.");
        assert_eq!(text, "Alpha causes Beta.");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let text = PlainTextExtractor.extract("data.csv", &[b'a', 0xff, b'b']);
        assert_eq!(text, "a\u{fffd}b");
    }

    #[test]
    fn unsupported_formats_yield_nothing() {
        assert_eq!(PlainTextExtractor.extract("policy.pdf", b"%PDF-1.7"), "");
        assert_eq!(PlainTextExtractor.extract("no_extension", b"text"), "");
    }
}
