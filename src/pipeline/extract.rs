//! PDF text extraction: uploaded bytes → one text blob.
//!
//! ## Why spawn_blocking?
//!
//! Parsing the object tree and decoding content streams is CPU-bound and can
//! take a noticeable time on large scans. [`extract_text`] moves the work
//! onto tokio's blocking pool so request handlers never stall a worker
//! thread.
//!
//! Extraction is best-effort per page: a page whose content stream cannot be
//! decoded contributes nothing, and the rest of the document still counts.

use crate::error::AnalyzerError;
use lopdf::Document;
use tracing::{debug, info, warn};

/// The first four bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check the `%PDF` header without parsing anything.
pub fn check_magic(bytes: &[u8]) -> Result<(), AnalyzerError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(AnalyzerError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

/// Extract the text of every page, in page order, concatenated.
///
/// Runs inside `spawn_blocking`.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, AnalyzerError> {
    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes))
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Extraction task panicked: {e}")))?
}

/// Blocking implementation of [`extract_text`].
pub fn extract_text_blocking(bytes: &[u8]) -> Result<String, AnalyzerError> {
    check_magic(bytes)?;

    let document = Document::load_mem(bytes).map_err(|e| AnalyzerError::DocumentRead {
        detail: e.to_string(),
    })?;

    // BTreeMap keyed by 1-based page number, so iteration is page order.
    let pages = document.get_pages();
    info!(pages = pages.len(), bytes = bytes.len(), "PDF loaded");

    let mut text = String::new();
    for &page_num in pages.keys() {
        match document.extract_text(&[page_num]) {
            Ok(page_text) => {
                debug!(page = page_num, chars = page_text.len(), "Extracted page text");
                text.push_str(&page_text);
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Page text extraction failed; skipping page");
            }
        }
    }

    info!(chars = text.len(), "Text extraction complete");
    Ok(text)
}

#[cfg(test)]
pub(crate) mod test_pdf {
    //! In-memory PDF fixtures built with lopdf.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A PDF with one page per entry of `pages`, each showing its string.
    pub fn with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save pdf");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_not_a_pdf() {
        let err = extract_text_blocking(b"this is not a pdf").unwrap_err();
        match err {
            AnalyzerError::NotAPdf { magic } => assert_eq!(magic, b"this".to_vec()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn empty_upload_is_not_a_pdf() {
        assert!(matches!(
            extract_text_blocking(b""),
            Err(AnalyzerError::NotAPdf { .. })
        ));
    }

    #[test]
    fn corrupt_body_is_document_read_error() {
        let err = extract_text_blocking(b"%PDF-1.7\ngarbage without xref").unwrap_err();
        assert!(matches!(err, AnalyzerError::DocumentRead { .. }), "got {err:?}");
    }

    #[test]
    fn single_page_text() {
        let pdf = test_pdf::with_pages(&["Factura 2024-001"]);
        let text = extract_text_blocking(&pdf).unwrap();
        assert!(text.contains("Factura 2024-001"), "got: {text:?}");
    }

    #[test]
    fn pages_concatenate_in_order() {
        let pdf = test_pdf::with_pages(&["PRIMERA", "SEGUNDA", "TERCERA"]);
        let text = extract_text_blocking(&pdf).unwrap();
        let first = text.find("PRIMERA").expect("page 1");
        let second = text.find("SEGUNDA").expect("page 2");
        let third = text.find("TERCERA").expect("page 3");
        assert!(first < second && second < third, "got: {text:?}");
    }

    #[test]
    fn zero_pages_yield_empty_text() {
        let pdf = test_pdf::with_pages(&[]);
        assert_eq!(extract_text_blocking(&pdf).unwrap(), "");
    }

    #[tokio::test]
    async fn async_wrapper_matches_blocking() {
        let pdf = test_pdf::with_pages(&["Hola"]);
        let text = extract_text(pdf).await.unwrap();
        assert!(text.contains("Hola"));
    }
}
