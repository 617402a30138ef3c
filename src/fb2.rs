//! FB2 (FictionBook) text and metadata extraction.
//!
//! FB2 is an XML format: book text lives in paragraph (`p`) elements under
//! the document `body`, and metadata under `description/title-info`.

use crate::error::{AppError, Result};
use encoding_rs::{Encoding, UTF_8};
use roxmltree::Document;
use std::path::Path;

/// Metadata extracted from an FB2 description block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookInfo {
    /// Book title from `book-title`.
    pub title: Option<String>,
    /// First listed author, name parts joined with spaces.
    pub author: Option<String>,
}

/// Extract the full plain text of the FB2 file at `path`.
///
/// Returns the direct text of every `p` element under the first `body`,
/// joined with blank lines. A document without a `body` or without any
/// text-bearing paragraph yields an empty string; callers treat that as a
/// reading error.
pub fn extract_text(path: &Path) -> Result<String> {
    let raw = std::fs::read(path)?;
    text_from_bytes(&raw)
}

/// Extract the full plain text from in-memory FB2 bytes.
pub fn text_from_bytes(raw: &[u8]) -> Result<String> {
    let xml = decode(raw)?;
    let doc = Document::parse(&xml)?;
    Ok(body_text(&doc))
}

/// Extract title and author from in-memory FB2 bytes.
pub fn extract_metadata(raw: &[u8]) -> Result<BookInfo> {
    let xml = decode(raw)?;
    let doc = Document::parse(&xml)?;

    let mut info = BookInfo::default();

    let Some(title_info) = doc.descendants().find(|n| n.has_tag_name("title-info")) else {
        return Ok(info);
    };

    info.title = title_info
        .descendants()
        .find(|n| n.has_tag_name("book-title"))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if let Some(author) = title_info.descendants().find(|n| n.has_tag_name("author")) {
        let parts: Vec<&str> = ["first-name", "middle-name", "last-name"]
            .iter()
            .filter_map(|tag| author.children().find(|c| c.has_tag_name(*tag)))
            .filter_map(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        if !parts.is_empty() {
            info.author = Some(parts.join(" "));
        }
    }

    Ok(info)
}

/// Collect paragraph text from the first `body` element.
///
/// Only the direct text of each `p` is taken (text before its first child
/// node), so paragraphs holding nothing but nested markup are skipped.
fn body_text(doc: &Document<'_>) -> String {
    let Some(body) = doc.descendants().find(|n| n.has_tag_name("body")) else {
        return String::new();
    };

    let paragraphs: Vec<&str> = body
        .descendants()
        .filter(|n| n.has_tag_name("p"))
        .filter_map(|n| n.text())
        .filter(|t| !t.is_empty())
        .collect();

    paragraphs.join("\n\n")
}

/// Decode raw FB2 bytes to a UTF-8 string.
///
/// FB2 sources are frequently windows-1251; the encoding is taken from the
/// BOM or the XML declaration, defaulting to UTF-8.
fn decode(raw: &[u8]) -> Result<String> {
    let encoding = declared_encoding(raw).unwrap_or(UTF_8);

    // decode() sniffs the BOM itself and may override the declared encoding.
    let (text, actual, had_errors) = encoding.decode(raw);
    if had_errors {
        return Err(AppError::InvalidFormat(format!(
            "File is not valid {}",
            actual.name()
        )));
    }

    if actual == UTF_8 {
        Ok(text.into_owned())
    } else {
        // The XML parser only accepts UTF-8; the original declaration no
        // longer matches after transcoding, so drop it.
        Ok(strip_xml_declaration(&text).to_string())
    }
}

/// Sniff the encoding label from the XML declaration.
fn declared_encoding(raw: &[u8]) -> Option<&'static Encoding> {
    let prolog_len = raw.len().min(256);
    let prolog = String::from_utf8_lossy(&raw[..prolog_len]);

    let rest = prolog.split_once("encoding")?.1.trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();

    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }

    let label = rest[1..].split(quote).next()?;
    Encoding::for_label(label.as_bytes())
}

fn strip_xml_declaration(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("<?xml")
        && let Some(end) = rest.find("?>")
    {
        return &rest[end + 2..];
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
  <description>
    <title-info>
      <author>
        <first-name>Лев</first-name>
        <last-name>Толстой</last-name>
      </author>
      <book-title>Война и мир</book-title>
    </title-info>
  </description>
  <body>
    <section>
      <p>Первый абзац.</p>
      <p>Второй абзац.</p>
      <p><emphasis>только разметка</emphasis></p>
      <p>Третий абзац.</p>
    </section>
  </body>
</FictionBook>"#;

    #[test]
    fn text_joins_paragraphs_in_order() {
        let text = text_from_bytes(SIMPLE.as_bytes()).unwrap();
        assert_eq!(text, "Первый абзац.\n\nВторой абзац.\n\nТретий абзац.");
    }

    #[test]
    fn paragraph_without_direct_text_is_skipped() {
        let text = text_from_bytes(SIMPLE.as_bytes()).unwrap();
        assert!(!text.contains("только разметка"));
    }

    #[test]
    fn missing_body_yields_empty_text() {
        let xml = r#"<FictionBook><description/></FictionBook>"#;
        let text = text_from_bytes(xml.as_bytes()).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn body_without_paragraphs_yields_empty_text() {
        let xml = r#"<FictionBook><body><section/></body></FictionBook>"#;
        let text = text_from_bytes(xml.as_bytes()).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let result = text_from_bytes(b"<FictionBook><body><p>oops");
        assert!(result.is_err());
    }

    #[test]
    fn nested_paragraphs_are_found_anywhere_under_body() {
        let xml = r#"<b><body><section><section><p>deep</p></section></section></body></b>"#;
        let text = text_from_bytes(xml.as_bytes()).unwrap();
        assert_eq!(text, "deep");
    }

    #[test]
    fn windows_1251_source_is_decoded() {
        let xml = "<?xml version=\"1.0\" encoding=\"windows-1251\"?>\n\
                   <FictionBook><body><p>Привет, мир</p></body></FictionBook>";
        let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode(xml);

        let text = text_from_bytes(&encoded).unwrap();
        assert_eq!(text, "Привет, мир");
    }

    #[test]
    fn metadata_title_and_author() {
        let info = extract_metadata(SIMPLE.as_bytes()).unwrap();
        assert_eq!(info.title.as_deref(), Some("Война и мир"));
        assert_eq!(info.author.as_deref(), Some("Лев Толстой"));
    }

    #[test]
    fn metadata_absent_description_is_empty() {
        let xml = r#"<FictionBook><body><p>text</p></body></FictionBook>"#;
        let info = extract_metadata(xml.as_bytes()).unwrap();
        assert_eq!(info, BookInfo::default());
    }

    #[test]
    fn extract_text_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.fb2");
        std::fs::write(&path, SIMPLE).unwrap();

        let text = extract_text(&path).unwrap();
        assert!(text.starts_with("Первый абзац."));
    }
}
