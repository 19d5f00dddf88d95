//! Evidence ranking and the final result bundle

use crate::aggregate::Aggregation;
use crate::model::GoTermAnnotation;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Ranked annotation result for one query protein
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Score descending, ties by GO id ascending
    pub ranked_terms: Vec<GoTermAnnotation>,
    /// Every identifier that entered aggregation → GO terms it supports
    pub similar_proteins: BTreeMap<String, BTreeSet<String>>,
}

fn ranking_order(a: &GoTermAnnotation, b: &GoTermAnnotation) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.go_id.cmp(&b.go_id))
}

/// Sort annotations into ranking order
pub fn rank_terms(mut terms: Vec<GoTermAnnotation>) -> Vec<GoTermAnnotation> {
    terms.sort_by(ranking_order);
    terms
}

/// Consume the accumulator and produce the bundle
pub fn rank(aggregation: Aggregation) -> ResultBundle {
    let (annotations, contributions) = aggregation.into_parts();
    let ranked_terms = rank_terms(annotations.into_values().collect());
    tracing::info!(terms = ranked_terms.len(), "Ranked GO terms");

    ResultBundle {
        ranked_terms,
        similar_proteins: contributions,
    }
}

impl ResultBundle {
    pub fn is_empty(&self) -> bool {
        self.ranked_terms.is_empty()
    }

    /// Best-scoring term, if any
    pub fn top(&self) -> Option<&GoTermAnnotation> {
        self.ranked_terms.first()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{Aspect, SourceKind};
    use proptest::prelude::*;

    fn ann(go_id: &str, score: f64) -> GoTermAnnotation {
        let mut a = GoTermAnnotation::new(go_id, Aspect::BP);
        a.source_identity.insert(SourceKind::SeqRemote, score * 100.0);
        a.score = score;
        a
    }

    #[test]
    fn test_score_desc_then_go_id_asc() {
        let ranked = rank_terms(vec![
            ann("GO:0000003", 0.5),
            ann("GO:0000002", 0.9),
            ann("GO:0000001", 0.5),
        ]);
        let ids: Vec<_> = ranked.iter().map(|a| a.go_id.as_str()).collect();
        assert_eq!(ids, vec!["GO:0000002", "GO:0000001", "GO:0000003"]);
    }

    #[test]
    fn test_rank_empty_aggregation() {
        let bundle = rank(Aggregation::new());
        assert!(bundle.is_empty());
        assert!(bundle.top().is_none());
    }

    proptest! {
        #[test]
        fn prop_ranking_sorted_and_idempotent(
            entries in proptest::collection::vec((0u32..50, 0u8..5), 0..30)
        ) {
            let terms: Vec<_> = entries
                .iter()
                .enumerate()
                .map(|(i, (n, s))| ann(&format!("GO:{:07}", n * 100 + i as u32), *s as f64 / 4.0))
                .collect();

            let once = rank_terms(terms);
            for pair in once.windows(2) {
                prop_assert!(
                    pair[0].score > pair[1].score
                        || (pair[0].score == pair[1].score && pair[0].go_id < pair[1].go_id)
                );
            }
            let twice = rank_terms(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
