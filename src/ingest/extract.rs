//! Per-format text extraction.
//!
//! The factory picks an extractor by file extension. Text-like formats try
//! a prioritized encoding chain (utf-8, gbk, gb2312, latin-1); markdown is
//! flattened to plain text through `pulldown-cmark` events; PDF goes
//! through `pdf-extract`; DOCX concatenates paragraph text plus table cells
//! joined by `" | "` per row.

use super::error::DocumentError;
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::path::Path;
use tracing::{debug, warn};

/// Extensions with a registered extractor.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".txt", ".md", ".markdown", ".pdf", ".docx"];

/// Extracts plain text from a file, dispatching on its extension.
pub fn extract_text(path: &Path) -> Result<String, DocumentError> {
    if !path.is_file() {
        return Err(DocumentError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    let bytes = std::fs::read(path).map_err(|e| DocumentError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if bytes.is_empty() {
        return Err(DocumentError::EmptyDocument);
    }

    let text = match extension.as_str() {
        ".txt" => extract_plain(&bytes, path)?,
        ".md" | ".markdown" => {
            let raw = extract_plain(&bytes, path)?;
            flatten_markdown(&raw)
        }
        ".pdf" => extract_pdf(&bytes)?,
        ".docx" => extract_docx(&bytes)?,
        _ => {
            return Err(DocumentError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    extension
                },
                supported: SUPPORTED_EXTENSIONS.join(", "),
            })
        }
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(DocumentError::EmptyDocument);
    }
    Ok(text)
}

/// Decodes bytes with the prioritized encoding chain.
fn extract_plain(bytes: &[u8], path: &Path) -> Result<String, DocumentError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        debug!(path = %path.display(), encoding = "utf-8", "decoded text file");
        return Ok(text.to_string());
    }

    // GBK is a superset of GB2312; trying both mirrors the configured
    // priority list even though the second rarely fires.
    for encoding in [encoding_rs::GBK, encoding_rs::GB18030] {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            debug!(path = %path.display(), encoding = encoding.name(), "decoded text file");
            return Ok(decoded.into_owned());
        }
    }

    // latin-1 maps every byte, so this is the terminal fallback.
    let decoded = encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned();
    if decoded.is_empty() {
        return Err(DocumentError::DecodeFailed {
            path: path.display().to_string(),
        });
    }
    debug!(path = %path.display(), encoding = "latin-1", "decoded text file");
    Ok(decoded)
}

/// Strips markdown syntax, keeping readable text.
///
/// Headers, emphasis, blockquote and list markers vanish with their tags;
/// link text survives its URL; fenced code blocks are dropped entirely
/// while inline code keeps its content.
fn flatten_markdown(content: &str) -> String {
    let mut text = String::with_capacity(content.len());
    let mut in_code_block = false;

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(t) if !in_code_block => text.push_str(&t),
            Event::Code(code) => text.push_str(&code),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => {
                text.push_str("\n\n");
            }
            _ => {}
        }
    }

    collapse_blank_lines(&text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, DocumentError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        DocumentError::ExtractionFailed {
            format: "PDF",
            message: e.to_string(),
        }
    })?;

    if text.trim().is_empty() {
        return Err(DocumentError::ExtractionFailed {
            format: "PDF",
            message: "no extractable text in any page".to_string(),
        });
    }
    Ok(text)
}

fn extract_docx(bytes: &[u8]) -> Result<String, DocumentError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocumentError::ExtractionFailed {
        format: "DOCX",
        message: format!("{e:?}"),
    })?;

    let mut blocks: Vec<String> = Vec::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                let text = paragraph_text(paragraph);
                if !text.trim().is_empty() {
                    blocks.push(text.trim().to_string());
                }
            }
            DocumentChild::Table(table) => {
                for row in &table.rows {
                    let TableChild::TableRow(row) = row;
                    let mut cells: Vec<String> = Vec::new();
                    for cell in &row.cells {
                        let TableRowChild::TableCell(cell) = cell;
                        let mut cell_text = String::new();
                        for content in &cell.children {
                            if let TableCellContent::Paragraph(paragraph) = content {
                                cell_text.push_str(&paragraph_text(paragraph));
                            }
                        }
                        let cell_text = cell_text.trim().to_string();
                        if !cell_text.is_empty() {
                            cells.push(cell_text);
                        }
                    }
                    if !cells.is_empty() {
                        blocks.push(cells.join(" | "));
                    }
                }
            }
            _ => {}
        }
    }

    if blocks.is_empty() {
        warn!("DOCX contained no paragraph or table text");
        return Err(DocumentError::ExtractionFailed {
            format: "DOCX",
            message: "no extractable text content".to_string(),
        });
    }

    Ok(blocks.join("\n\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

/// Collapses runs of three or more newlines down to a paragraph break.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newline_run = 0usize;

    for ch in text.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push('\n');
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn txt_utf8_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "a.txt", "hello 世界\n".as_bytes());
        assert_eq!(extract_text(&path).unwrap(), "hello 世界");
    }

    #[test]
    fn txt_gbk_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let (gbk, _, _) = encoding_rs::GBK.encode("中文编码测试");
        let path = write_temp(&dir, "gbk.txt", &gbk);
        assert_eq!(extract_text(&path).unwrap(), "中文编码测试");
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "empty.txt", b"");
        assert!(matches!(
            extract_text(&path).unwrap_err(),
            DocumentError::EmptyDocument
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "data.csv", b"a,b,c");
        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat { extension, .. } if extension == ".csv"));
    }

    #[test]
    fn missing_file_is_rejected() {
        assert!(matches!(
            extract_text(Path::new("/definitely/not/here.txt")).unwrap_err(),
            DocumentError::FileNotFound { .. }
        ));
    }

    #[test]
    fn markdown_syntax_is_stripped() {
        let markdown = "# Title\n\nSome **bold** and *italic* text with \
                        [a link](https://example.com).\n\n\
                        ```rust\nfn hidden() {}\n```\n\n\
                        > quoted line\n\n- item one\n- item two\n";
        let text = flatten_markdown(markdown);

        assert!(text.contains("Title"));
        assert!(text.contains("bold"));
        assert!(text.contains("a link"));
        assert!(!text.contains("https://example.com"));
        assert!(!text.contains('#'));
        assert!(!text.contains("**"));
        assert!(!text.contains("fn hidden"));
        assert!(text.contains("quoted line"));
        assert!(text.contains("item one"));
    }

    #[test]
    fn markdown_keeps_inline_code_content() {
        let text = flatten_markdown("Use `cargo build` to compile.");
        assert!(text.contains("cargo build"));
        assert!(!text.contains('`'));
    }
}
