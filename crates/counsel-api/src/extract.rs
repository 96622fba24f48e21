//! Best-effort text extraction from message attachments.
//!
//! Extraction never fails a send: each attachment yields
//! `Result<String, ExtractionError>` and failures contribute nothing to the
//! message body. Plain-text types are decoded directly; PDF and image types
//! would need a document-extraction / OCR backend that is not wired up, so
//! they currently report `Unsupported` and are skipped.

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no extractor for content type {0}")]
    Unsupported(String),
    #[error("could not determine content type")]
    UnknownType,
    #[error("attachment is not valid UTF-8")]
    InvalidEncoding,
}

pub fn extract_text(att: &Attachment) -> Result<String, ExtractionError> {
    let content_type = att
        .content_type
        .as_deref()
        .or_else(|| guess_content_type(&att.name));

    match content_type {
        Some(ct) if ct.starts_with("text/") || ct == "application/json" => {
            match std::str::from_utf8(&att.data) {
                Ok(text) => Ok(text.trim().to_string()),
                Err(_) => Err(ExtractionError::InvalidEncoding),
            }
        }
        Some(ct) => Err(ExtractionError::Unsupported(ct.to_string())),
        None => Err(ExtractionError::UnknownType),
    }
}

/// Fallback content-type guess from the filename, for multipart fields that
/// arrive without one.
fn guess_content_type(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "text" | "log" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Appends extracted attachment text to the message body under a labeled
/// `[Attachments]` section, one block per attachment. Failed or empty
/// extractions are silently skipped.
pub fn augment_message(message: &str, attachments: &[Attachment]) -> String {
    let blocks: Vec<String> = attachments
        .iter()
        .filter_map(|att| match extract_text(att) {
            Ok(text) if !text.is_empty() => {
                Some(format!("\n\n[Extracted from {}]\n{}", att.name, text))
            }
            _ => None,
        })
        .collect();

    if blocks.is_empty() {
        return message.to_string();
    }

    let blob = blocks.join("\n");
    let message = message.trim();
    if message.is_empty() {
        format!("[Attachments]\n{blob}")
    } else {
        format!("{message}\n\n[Attachments]\n{blob}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_attachment(name: &str, body: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            content_type: None,
            data: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn plain_text_is_extracted_and_trimmed() {
        let att = text_attachment("notes.txt", "  some clause text \n");
        assert_eq!(extract_text(&att).unwrap(), "some clause text");
    }

    #[test]
    fn explicit_content_type_wins_over_extension() {
        let att = Attachment {
            name: "scan.pdf".into(),
            content_type: Some("text/plain".into()),
            data: b"readable".to_vec(),
        };
        assert_eq!(extract_text(&att).unwrap(), "readable");
    }

    #[test]
    fn pdf_and_images_are_unsupported() {
        let pdf = Attachment {
            name: "contract.pdf".into(),
            content_type: None,
            data: vec![0x25, 0x50, 0x44, 0x46],
        };
        assert!(matches!(
            extract_text(&pdf),
            Err(ExtractionError::Unsupported(_))
        ));

        let img = Attachment {
            name: "photo.png".into(),
            content_type: Some("image/png".into()),
            data: vec![0x89],
        };
        assert!(matches!(
            extract_text(&img),
            Err(ExtractionError::Unsupported(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_an_extraction_error() {
        let att = Attachment {
            name: "garbled.txt".into(),
            content_type: None,
            data: vec![0xff, 0xfe, 0xfd],
        };
        assert!(matches!(
            extract_text(&att),
            Err(ExtractionError::InvalidEncoding)
        ));
    }

    #[test]
    fn augment_appends_labeled_blocks() {
        let atts = vec![
            text_attachment("a.txt", "first"),
            text_attachment("b.txt", "second"),
        ];
        let out = augment_message("question", &atts);
        assert_eq!(
            out,
            "question\n\n[Attachments]\n\n\n[Extracted from a.txt]\nfirst\n\n\n[Extracted from b.txt]\nsecond"
        );
    }

    #[test]
    fn failures_never_change_the_message() {
        let atts = vec![
            Attachment {
                name: "photo.png".into(),
                content_type: None,
                data: vec![1, 2, 3],
            },
            text_attachment("empty.txt", "   "),
        ];
        assert_eq!(augment_message("question", &atts), "question");
    }

    #[test]
    fn attachment_only_message_gets_a_body() {
        let atts = vec![text_attachment("a.txt", "clause")];
        let out = augment_message("", &atts);
        assert_eq!(out, "[Attachments]\n\n\n[Extracted from a.txt]\nclause");
    }
}
