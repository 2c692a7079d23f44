//! PDF text extraction
//!
//! Primary extraction goes through `pdf-extract`, guarded by a watchdog thread
//! because some PDFs with unusual font tables hang the parser. A raw `lopdf`
//! content-stream scan is kept as a fallback for files `pdf-extract` rejects.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// How long to wait for `pdf-extract` before falling back
const EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Extract the cleaned plain text from PDF bytes
pub fn extract_pdf_text(data: &[u8]) -> Result<String> {
    let raw = extract_with_timeout(data)?;

    let content = cleanup_text(&raw);
    if content.trim().is_empty() {
        return Err(Error::processing("PDF appears to be empty or unreadable"));
    }

    Ok(content)
}

/// Run `pdf-extract` in a watchdog thread so a hung parse cannot stall the
/// request forever
fn extract_with_timeout(data: &[u8]) -> Result<String> {
    let data_vec = data.to_vec();
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let result = pdf_extract::extract_text_from_mem(&data_vec);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_secs(EXTRACT_TIMEOUT_SECS)) {
        Ok(Ok(text)) => {
            let _ = handle.join();
            Ok(text)
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            tracing::warn!("pdf-extract failed: {}, trying fallback", e);
            extract_text_fallback(data)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            // The worker thread cannot be killed; leave it and fall back
            tracing::error!(
                "PDF extraction timeout after {}s, trying fallback",
                EXTRACT_TIMEOUT_SECS
            );
            extract_text_fallback(data)
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("PDF extraction thread crashed, trying fallback");
            extract_text_fallback(data)
        }
    }
}

/// Fallback extraction: scan content streams for text-show operators
fn extract_text_fallback(data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::processing(format!("Failed to load PDF: {}", e)))?;

    let mut all_text = String::new();

    for (page_num, page_id) in doc.get_pages() {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                let text = extract_text_from_content(&content);
                if !text.is_empty() {
                    all_text.push_str(&format!("\n--- Page {} ---\n", page_num));
                    all_text.push_str(&text);
                }
            }
            Err(e) => {
                tracing::debug!("Could not get content for page {}: {}", page_num, e);
            }
        }
    }

    if all_text.trim().is_empty() {
        return Err(Error::processing(
            "PDF appears to be image-based or has no extractable text",
        ));
    }

    Ok(all_text)
}

/// Pull text out of a PDF content stream between BT/ET operators
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let line = line.trim();

        if line == "BT" {
            in_text_block = true;
            continue;
        }

        if line == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let Some(start) = line.find('(') {
                if let Some(end) = line.rfind(')') {
                    if start < end {
                        let extracted = &line[start + 1..end];
                        let decoded = extracted
                            .replace("\\n", "\n")
                            .replace("\\r", "\r")
                            .replace("\\t", "\t")
                            .replace("\\(", "(")
                            .replace("\\)", ")")
                            .replace("\\\\", "\\");
                        current_text.push_str(&decoded);
                    }
                }
            }
        }
    }

    text
}

/// Normalize extracted text: ASCII-fold typographic glyphs, drop null bytes
/// and blank lines
fn cleanup_text(text: &str) -> String {
    let folded = text
        .replace('\u{2010}', "-")
        .replace('\u{2011}', "-")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "--")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    folded
        .replace('\0', "")
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_folds_glyphs() {
        let input = "Coverage\u{2014}limits\u{2019} \u{201C}terms\u{201D}\n\n  deductible\u{00A0}\u{2022}$500\n";
        let cleaned = cleanup_text(input);
        assert_eq!(cleaned, "Coverage--limits' \"terms\"\ndeductible * $500");
    }

    #[test]
    fn test_cleanup_strips_nulls_and_blank_lines() {
        let cleaned = cleanup_text("a\0b\n\n\n  \nc");
        assert_eq!(cleaned, "ab\nc");
    }

    #[test]
    fn test_content_stream_scan() {
        let stream = b"BT\n(Hello) Tj\n(World\\)) Tj\nET\nBT\n(Page 2) Tj\nET\n";
        let text = extract_text_from_content(stream);
        assert_eq!(text, "HelloWorld) Page 2 ");
    }

    #[test]
    fn test_not_a_pdf_is_an_error() {
        let result = extract_pdf_text(b"definitely not a pdf");
        assert!(result.is_err());
    }
}
