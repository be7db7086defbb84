use siftdb_core::chunker::SemanticChunker;
use siftdb_core::collection::validate_collection_name;
use siftdb_core::config::{expand_path, ChunkingConfig, SearchConfig, StorageConfig};
use siftdb_core::types::{DocumentFormat, ParsedDocument, Section};
use std::path::PathBuf;

#[test]
fn default_config_is_valid() {
    let cfg = SearchConfig::default();
    assert_eq!(cfg.chunking.target_tokens, 1000);
    assert_eq!(cfg.chunking.overlap_tokens, 150);
    assert_eq!(cfg.embedding.batch_size, 128);
    assert!((cfg.fusion.semantic_weight - 0.7).abs() < f32::EPSILON);
    assert!((cfg.fusion.lexical_weight - 0.3).abs() < f32::EPSILON);
    assert!((cfg.fusion.cross_bonus - 1.15).abs() < f32::EPSILON);
}

#[test]
fn chunking_config_is_clamped_to_supported_ranges() {
    let cfg = ChunkingConfig { target_tokens: 10_000, overlap_tokens: 5 }.clamped();
    assert_eq!(cfg.target_tokens, 2000);
    assert_eq!(cfg.overlap_tokens, 50);
}

#[test]
fn storage_paths_expand_env_vars() {
    std::env::set_var("SIFTDB_TEST_ROOT", "/tmp/siftdb-root");
    assert_eq!(expand_path("$SIFTDB_TEST_ROOT/data"), PathBuf::from("/tmp/siftdb-root/data"));

    let cfg = SearchConfig {
        storage: StorageConfig {
            data_dir: "${SIFTDB_TEST_ROOT}/data".to_string(),
            artifacts_dir: Some("${SIFTDB_TEST_ROOT}/artifacts".to_string()),
        },
        ..SearchConfig::default()
    };
    assert_eq!(cfg.data_dir(), PathBuf::from("/tmp/siftdb-root/data"));
    assert_eq!(cfg.artifacts_dir(), Some(PathBuf::from("/tmp/siftdb-root/artifacts")));
}

#[test]
fn three_section_document_produces_at_least_three_chunks() {
    let doc = ParsedDocument {
        doc_id: "lab".to_string(),
        filename: "lab.txt".to_string(),
        format: DocumentFormat::Text,
        sections: vec![
            Section::new("Intro", "This study explores hybrid retrieval.", Some(1)),
            Section::new("Methods", "We combined dense vectors with BM25 ranking.", Some(2)),
            Section::new("Results", "The fusion outperformed either signal alone.", Some(3)),
        ],
    };
    let chunks = SemanticChunker::default().chunk(&doc);
    assert!(chunks.len() >= 3);
    let sections: Vec<&str> = chunks.iter().map(|c| c.section.as_str()).collect();
    assert!(sections.contains(&"Intro"));
    assert!(sections.contains(&"Methods"));
    assert!(sections.contains(&"Results"));
}

#[test]
fn naming_rules_from_the_api_contract() {
    assert!(validate_collection_name("abc").is_ok());
    assert!(validate_collection_name("tg").is_err());
    assert!(validate_collection_name("-bad-").is_err());
    assert!(validate_collection_name("lab-notes").is_ok());
}
