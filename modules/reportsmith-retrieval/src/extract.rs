//! Attachment text extraction for ingestion.
//!
//! Dispatches on the attachment's MIME type. A file that fails to extract is
//! skipped with a warning; the rest of the batch still contributes text.

use std::io::Read;

use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use reportsmith_common::{AttachedFile, DOCX_CONTENT_TYPE, PDF_CONTENT_TYPE};

/// Extract text from a single attachment.
pub fn extract_text(file: &AttachedFile) -> Result<String> {
    match file.content_type.as_str() {
        PDF_CONTENT_TYPE => extract_pdf(&file.bytes),
        DOCX_CONTENT_TYPE => extract_docx(&file.bytes),
        other => Err(anyhow!("Unsupported attachment type: {other}")),
    }
}

/// Extract and concatenate text from all attachments. A failing attachment
/// drops only that file.
pub fn extract_attachments(files: &[AttachedFile]) -> String {
    let mut parts = Vec::new();

    for file in files {
        match extract_text(file) {
            Ok(text) if !text.trim().is_empty() => parts.push(text),
            Ok(_) => {}
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "Attachment extraction failed, skipping");
            }
        }
    }

    parts.join("\n")
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| anyhow!("PDF extraction failed: {e}"))
}

/// Pull the text runs out of `word/document.xml`, one line per paragraph.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => out.push_str(&t.unescape()?),
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => out.push('\n'),
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("DOCX parse error: {e}")),
            _ => {}
        }
    }

    Ok(out)
}
