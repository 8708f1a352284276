//! Document conversion: raw fetched bytes to plain text.
//!
//! HTML is converted through htmd after stripping non-content tags; the page
//! title comes from the `<title>` element. PDF bytes go through pdf-extract.
//! Anything else is not this module's business and is filtered out before
//! conversion is attempted.

use scraper::{Html, Selector};
use thiserror::Error;

/// Document kinds this module can convert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Pdf,
}

/// Conversion failure. Callers decide whether to fall back or skip.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("html conversion failed: {0}")]
    Html(String),

    #[error("pdf extraction failed: {0}")]
    Pdf(String),
}

/// Converted document: plain text plus the title when one was found.
#[derive(Clone, Debug, Default)]
pub struct ConvertedDocument {
    pub text: String,
    pub title: String,
}

/// Convert raw document bytes of the given kind to plain text.
pub fn convert(kind: DocumentKind, bytes: &[u8]) -> Result<ConvertedDocument, ConvertError> {
    match kind {
        DocumentKind::Html => convert_html(bytes),
        DocumentKind::Pdf => convert_pdf(bytes),
    }
}

fn convert_html(bytes: &[u8]) -> Result<ConvertedDocument, ConvertError> {
    let html = String::from_utf8_lossy(bytes);
    let title = extract_title(&html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();
    let text = converter
        .convert(&html)
        .map_err(|e| ConvertError::Html(e.to_string()))?;

    Ok(ConvertedDocument { text, title })
}

fn convert_pdf(bytes: &[u8]) -> Result<ConvertedDocument, ConvertError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ConvertError::Pdf(e.to_string()))?;
    Ok(ConvertedDocument {
        text,
        title: String::new(),
    })
}

/// Best-effort fallback for HTML content whose conversion failed: lossy
/// UTF-8 decoding of the raw bytes.
#[must_use]
pub fn lossy_text(bytes: &[u8]) -> ConvertedDocument {
    let html = String::from_utf8_lossy(bytes);
    ConvertedDocument {
        title: extract_title(&html),
        text: html.into_owned(),
    }
}

fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
