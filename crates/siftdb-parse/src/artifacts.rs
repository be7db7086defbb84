//! Content-addressed persistence of extraction output.
//!
//! Each ingested file gets a directory named after the blake3 hash of its
//! raw bytes, holding the extracted text and a small metadata record. This
//! exists for auditability only; correctness of downstream stages never
//! depends on it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use siftdb_core::types::ParsedDocument;

pub struct ArtifactStore {
    root: PathBuf,
}

#[derive(Serialize)]
struct ArtifactMeta<'a> {
    filename: &'a str,
    format: String,
    sections: usize,
    content_address: &'a str,
}

impl ArtifactStore {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    /// Write `extracted.txt` and `meta.json` under the content address of
    /// `bytes`. Re-ingesting identical bytes overwrites the same location.
    pub fn store(&self, bytes: &[u8], doc: &ParsedDocument) -> anyhow::Result<PathBuf> {
        let address = blake3::hash(bytes).to_hex().to_string();
        let dir = self.root.join(&address[..16]);
        fs::create_dir_all(&dir)?;

        let mut text = String::new();
        for section in &doc.sections {
            if !section.title.is_empty() {
                text.push_str(&section.title);
                text.push('\n');
            }
            text.push_str(&section.body);
            text.push_str("\n\n");
        }
        fs::write(dir.join("extracted.txt"), text)?;

        let meta = ArtifactMeta {
            filename: &doc.filename,
            format: doc.format.to_string(),
            sections: doc.sections.len(),
            content_address: &address,
        };
        fs::write(dir.join("meta.json"), serde_json::to_vec_pretty(&meta)?)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siftdb_core::types::{DocumentFormat, Section};
    use tempfile::TempDir;

    #[test]
    fn store_is_content_addressed() {
        let tmp = TempDir::new().expect("tmp");
        let store = ArtifactStore::new(tmp.path());
        let doc = ParsedDocument {
            doc_id: "d".into(),
            filename: "d.txt".into(),
            format: DocumentFormat::Text,
            sections: vec![Section::new("T", "body", None)],
        };
        let a = store.store(b"same bytes", &doc).expect("store");
        let b = store.store(b"same bytes", &doc).expect("store again");
        assert_eq!(a, b, "identical bytes map to the same directory");
        assert!(a.join("extracted.txt").exists());
        assert!(a.join("meta.json").exists());
    }
}
