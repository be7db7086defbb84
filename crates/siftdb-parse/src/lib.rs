#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Document extraction: bytes + filename in, structured sections out.
//!
//! Every format has an ordered chain of [`ExtractStrategy`] implementations.
//! The first strategy that returns at least one section wins; a strategy
//! that errors or produces zero sections falls through to the next. When the
//! whole chain is exhausted the parser returns `Error::Extraction` naming the
//! format and the last underlying cause, never a partially-populated document.

pub mod artifacts;
mod html;
mod ooxml;
mod pdf;
mod text;

use std::path::Path;

use tracing::{debug, warn};

use siftdb_core::types::{DocumentFormat, ParsedDocument, Section};
use siftdb_core::{Error, Result};

use artifacts::ArtifactStore;

/// One way of turning raw bytes into sections. Strategies are tried in
/// order; returning an empty section list counts as failure.
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Vec<Section>>;
}

pub struct DocumentParser {
    artifacts: Option<ArtifactStore>,
}

impl DocumentParser {
    pub fn new(artifacts_dir: Option<&Path>) -> Self {
        Self { artifacts: artifacts_dir.map(ArtifactStore::new) }
    }

    /// Extract a structured document from `bytes`, inferring the format from
    /// `filename`.
    pub fn extract(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
        let format = DocumentFormat::from_filename(filename);
        let strategies = strategies_for(format);
        let mut last_error: Option<anyhow::Error> = None;

        for (i, strategy) in strategies.iter().enumerate() {
            match strategy.extract(bytes) {
                Ok(sections) if !sections.is_empty() => {
                    if i > 0 {
                        warn!(
                            format = %format,
                            strategy = strategy.name(),
                            "primary extraction failed, fallback strategy succeeded"
                        );
                    } else {
                        debug!(format = %format, strategy = strategy.name(), "extraction ok");
                    }
                    let doc = ParsedDocument {
                        doc_id: doc_id_from_filename(filename),
                        filename: filename.to_string(),
                        format,
                        sections,
                    };
                    self.persist_artifacts(bytes, &doc);
                    return Ok(doc);
                }
                Ok(_) => {
                    debug!(strategy = strategy.name(), "strategy produced zero sections");
                    last_error = Some(anyhow::anyhow!("{} produced zero sections", strategy.name()));
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "strategy failed");
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no extraction strategy registered".to_string());
        Err(Error::extraction(format.to_string(), reason))
    }

    /// Best-effort side effect: extraction output is written to a
    /// content-addressed location for auditability. Downstream stages only
    /// ever read the in-memory document, so failures here are logged and
    /// swallowed.
    fn persist_artifacts(&self, bytes: &[u8], doc: &ParsedDocument) {
        if let Some(store) = &self.artifacts {
            if let Err(e) = store.store(bytes, doc) {
                warn!(doc = %doc.filename, error = %e, "failed to persist extraction artifacts");
            }
        }
    }
}

fn strategies_for(format: DocumentFormat) -> Vec<Box<dyn ExtractStrategy>> {
    match format {
        DocumentFormat::Pdf => vec![
            Box::new(pdf::PdfPageStrategy),
            Box::new(pdf::PdfFlatTextStrategy),
        ],
        DocumentFormat::Docx => vec![
            Box::new(ooxml::DocxHeadingStrategy),
            Box::new(ooxml::DocxFlatTextStrategy),
        ],
        DocumentFormat::Pptx => vec![
            Box::new(ooxml::PptxSlideStrategy),
            Box::new(ooxml::PptxFlatTextStrategy),
        ],
        DocumentFormat::Html => vec![
            Box::new(html::HtmlHeadingStrategy),
            Box::new(html::HtmlFlatTextStrategy),
        ],
        DocumentFormat::Text => vec![
            Box::new(text::MarkdownHeadingStrategy),
            Box::new(text::PlainTextStrategy),
        ],
    }
}

fn doc_id_from_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}
