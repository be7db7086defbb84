//! Score fusion for hybrid retrieval.
//!
//! Both engines score on incompatible scales, so each candidate list is
//! min-max normalized to [0, 1] before a weighted sum combines them. A
//! chunk found by both engines gets a cross-encounter bonus on top.

use std::collections::HashMap;

use siftdb_core::config::FusionConfig;

/// A candidate id with its engine-native score, in rank order.
#[derive(Debug, Clone)]
pub struct RankedId {
    pub id: String,
    pub score: f32,
}

/// Min-max normalize into [0, 1]. A single candidate, or a list where every
/// score is equal, maps to 1.0 so that lone results are not zeroed out.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Fuse two ranked candidate lists into one, ordered by fused score.
///
/// `fused = semantic_weight * s + lexical_weight * l`, with missing sides
/// contributing zero and `cross_bonus` multiplied in when a chunk appears
/// in both lists. Ties break deterministically: better semantic rank first,
/// then better lexical rank, then lexicographic id.
pub fn fuse(semantic: &[RankedId], lexical: &[RankedId], config: &FusionConfig) -> Vec<RankedId> {
    struct Entry {
        semantic: Option<(f32, usize)>,
        lexical: Option<(f32, usize)>,
    }

    let semantic_norm = normalize(&semantic.iter().map(|h| h.score).collect::<Vec<_>>());
    let lexical_norm = normalize(&lexical.iter().map(|h| h.score).collect::<Vec<_>>());

    let mut entries: HashMap<&str, Entry> = HashMap::new();
    for (rank, hit) in semantic.iter().enumerate() {
        entries
            .entry(hit.id.as_str())
            .or_insert(Entry { semantic: None, lexical: None })
            .semantic
            .get_or_insert((semantic_norm[rank], rank));
    }
    for (rank, hit) in lexical.iter().enumerate() {
        entries
            .entry(hit.id.as_str())
            .or_insert(Entry { semantic: None, lexical: None })
            .lexical
            .get_or_insert((lexical_norm[rank], rank));
    }

    let mut fused: Vec<(RankedId, usize, usize)> = entries
        .into_iter()
        .map(|(id, entry)| {
            let s = entry.semantic.map(|(score, _)| score).unwrap_or(0.0);
            let l = entry.lexical.map(|(score, _)| score).unwrap_or(0.0);
            let mut score = config.semantic_weight * s + config.lexical_weight * l;
            if entry.semantic.is_some() && entry.lexical.is_some() {
                score *= config.cross_bonus;
            }
            let semantic_rank = entry.semantic.map(|(_, r)| r).unwrap_or(usize::MAX);
            let lexical_rank = entry.lexical.map(|(_, r)| r).unwrap_or(usize::MAX);
            (RankedId { id: id.to_string(), score }, semantic_rank, lexical_rank)
        })
        .collect();

    fused.sort_by(|a, b| {
        b.0.score
            .total_cmp(&a.0.score)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    fused.into_iter().map(|(hit, _, _)| hit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(pairs: &[(&str, f32)]) -> Vec<RankedId> {
        pairs.iter().map(|(id, score)| RankedId { id: id.to_string(), score: *score }).collect()
    }

    #[test]
    fn normalize_maps_to_unit_interval() {
        let normed = normalize(&[2.0, 6.0, 4.0]);
        assert_eq!(normed, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn normalize_degenerate_lists_map_to_one() {
        assert_eq!(normalize(&[0.42]), vec![1.0]);
        assert_eq!(normalize(&[3.0, 3.0, 3.0]), vec![1.0, 1.0, 1.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn chunk_in_both_lists_outranks_single_engine_chunks() {
        let config = FusionConfig::default();
        let semantic = ranked(&[("both", 0.9), ("sem-only", 1.0), ("sem-low", 0.1)]);
        let lexical = ranked(&[("both", 5.0), ("lex-only", 6.0), ("lex-low", 1.0)]);

        let fused = fuse(&semantic, &lexical, &config);
        assert_eq!(fused[0].id, "both");
        // Cross bonus pushes the shared chunk past either exclusive top hit.
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn dual_engine_score_exceeds_either_single_engine_score() {
        let config = FusionConfig::default();
        let semantic = ranked(&[("shared", 0.9), ("s-top", 1.0), ("s-floor", 0.1)]);
        let lexical = ranked(&[("shared", 5.0), ("l-top", 6.0), ("l-floor", 1.0)]);

        let score_of = |fused: &[RankedId], id: &str| {
            fused.iter().find(|h| h.id == id).map(|h| h.score).unwrap()
        };
        let hybrid = score_of(&fuse(&semantic, &lexical, &config), "shared");
        let semantic_only = score_of(&fuse(&semantic, &[], &config), "shared");
        let lexical_only = score_of(&fuse(&[], &lexical, &config), "shared");

        // The same chunk scores strictly higher when both engines find it
        // than from either engine alone.
        assert!(hybrid > semantic_only, "{hybrid} vs {semantic_only}");
        assert!(hybrid > lexical_only, "{hybrid} vs {lexical_only}");
    }

    #[test]
    fn fused_score_monotone_in_both_inputs() {
        let config = FusionConfig::default();
        let semantic = ranked(&[("a", 1.0), ("b", 0.8), ("c", 0.0)]);
        let lexical = ranked(&[("a", 10.0), ("b", 9.0), ("c", 0.0)]);

        let fused = fuse(&semantic, &lexical, &config);
        let score = |id: &str| fused.iter().find(|h| h.id == id).map(|h| h.score).unwrap();
        assert!(score("a") > score("b"));
        assert!(score("b") > score("c"));
    }

    #[test]
    fn one_sided_candidates_keep_weighted_contribution() {
        let config = FusionConfig {
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            cross_bonus: 1.0,
            query_timeout_ms: 5_000,
        };
        let semantic = ranked(&[("s", 1.0), ("floor", 0.0)]);
        let lexical = ranked(&[("l", 4.0), ("floor2", 0.0)]);

        let fused = fuse(&semantic, &lexical, &config);
        let score = |id: &str| fused.iter().find(|h| h.id == id).map(|h| h.score).unwrap();
        assert!((score("s") - 0.7).abs() < 1e-6);
        assert!((score("l") - 0.3).abs() < 1e-6);
        // Semantic-only beats lexical-only at equal normalized score.
        assert_eq!(fused[0].id, "s");
    }

    #[test]
    fn ties_break_by_semantic_rank_then_id() {
        let config = FusionConfig {
            semantic_weight: 1.0,
            lexical_weight: 0.0,
            cross_bonus: 1.0,
            query_timeout_ms: 5_000,
        };
        // Equal scores normalize to 1.0 each; ranks decide.
        let semantic = ranked(&[("zz", 0.5), ("aa", 0.5)]);
        let fused = fuse(&semantic, &[], &config);
        assert_eq!(fused[0].id, "zz");
        assert_eq!(fused[1].id, "aa");
    }

    #[test]
    fn empty_inputs_produce_empty_output() {
        let fused = fuse(&[], &[], &FusionConfig::default());
        assert!(fused.is_empty());
    }

    #[test]
    fn result_is_deduplicated() {
        let config = FusionConfig::default();
        let semantic = ranked(&[("a", 1.0), ("b", 0.5)]);
        let lexical = ranked(&[("b", 2.0), ("a", 1.0)]);
        let fused = fuse(&semantic, &lexical, &config);
        assert_eq!(fused.len(), 2);
    }
}
