//! Hit filtering and redundancy clustering for sequence search output

use super::SeqSearchParams;
use crate::model::{EvidenceList, SourceKind};
use std::cmp::Ordering;
use std::collections::HashSet;

/// One alignment as reported by a search tool, before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    /// Aligned subject sequence
    pub subject_seq: String,
    pub identity_pct: f64,
    pub e_value: f64,
}

/// Sort by e-value and keep hits with rank < k_max, e ≤ max_eval and
/// identity ≥ min_identity. Ranks are 1-based and counted before filtering.
pub fn filter_hits(mut hits: Vec<RawHit>, params: &SeqSearchParams) -> Vec<RawHit> {
    hits.sort_by(|a, b| a.e_value.total_cmp(&b.e_value));

    hits.into_iter()
        .enumerate()
        .filter(|(i, hit)| {
            i + 1 < params.k_max
                && hit.e_value <= params.max_eval
                && hit.identity_pct >= params.min_identity
        })
        .map(|(_, hit)| hit)
        .collect()
}

/// Representative preference: highest identity, then lowest e-value,
/// then shortest subject sequence
fn representative_order(a: &RawHit, b: &RawHit) -> Ordering {
    b.identity_pct
        .total_cmp(&a.identity_pct)
        .then(a.e_value.total_cmp(&b.e_value))
        .then(a.subject_seq.len().cmp(&b.subject_seq.len()))
}

/// Greedy single-pass clustering at `threshold` normalized similarity.
///
/// Each hit joins the first cluster whose seed is at least `threshold`
/// similar, else it seeds a new one. One representative per cluster is
/// returned, in e-value order.
pub fn cluster_hits(hits: Vec<RawHit>, threshold: f64) -> Vec<RawHit> {
    if hits.len() < 2 {
        return hits;
    }

    let mut clusters: Vec<Vec<RawHit>> = Vec::new();
    for hit in hits {
        let home = clusters.iter_mut().find(|members| {
            strsim::normalized_levenshtein(&members[0].subject_seq, &hit.subject_seq) >= threshold
        });
        match home {
            Some(members) => members.push(hit),
            None => clusters.push(vec![hit]),
        }
    }

    let mut reps: Vec<RawHit> = clusters
        .into_iter()
        .filter_map(|members| members.into_iter().min_by(representative_order))
        .collect();
    reps.sort_by(|a, b| a.e_value.total_cmp(&b.e_value));
    reps
}

/// Filter, cluster and rank raw hits into an evidence list.
/// Repeated ids (several HSPs of one subject) keep their first position.
pub fn to_evidence(source: SourceKind, hits: Vec<RawHit>, params: &SeqSearchParams) -> EvidenceList {
    let total = hits.len();
    let kept = filter_hits(hits, params);
    let passed = kept.len();
    let reps = cluster_hits(kept, params.cluster_threshold);

    tracing::debug!(
        total,
        passed,
        representatives = reps.len(),
        "Filtered and clustered hits"
    );

    let mut seen = HashSet::new();
    EvidenceList::from_ranked(
        source,
        reps.into_iter()
            .filter(|h| seen.insert(h.id.clone()))
            .map(|h| (h.id, h.identity_pct, h.e_value)),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::BlastProgram;

    fn hit(id: &str, seq: &str, identity_pct: f64, e_value: f64) -> RawHit {
        RawHit {
            id: id.to_string(),
            subject_seq: seq.to_string(),
            identity_pct,
            e_value,
        }
    }

    fn params(k_max: usize) -> SeqSearchParams {
        SeqSearchParams {
            program: BlastProgram::Blastp,
            k_max,
            max_eval: 1e-5,
            min_identity: 40.0,
            cluster_threshold: 0.9,
        }
    }

    #[test]
    fn test_filter_applies_all_thresholds() {
        let hits = vec![
            hit("LOW_ID", "AAAA", 30.0, 1e-50),
            hit("BEST", "CCCC", 95.0, 1e-40),
            hit("WEAK_E", "DDDD", 90.0, 1e-2),
            hit("OK", "EEEE", 60.0, 1e-10),
        ];

        let kept = filter_hits(hits, &params(10));
        let ids: Vec<_> = kept.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["BEST", "OK"]);
    }

    #[test]
    fn test_filter_rank_is_strictly_below_k_max() {
        let hits = (0..5)
            .map(|i| hit(&format!("P{}", i), "MKT", 90.0, 1e-30 * (i + 1) as f64))
            .collect();

        // ranks 1 and 2 survive k_max = 3
        assert_eq!(filter_hits(hits, &params(3)).len(), 2);
    }

    #[test]
    fn test_cluster_picks_representative() {
        let hits = vec![
            hit("A", "MKTAYIAKQRQISFVKSHFSRQ", 80.0, 1e-30),
            hit("B", "MKTAYIAKQRQISFVKSHFSRQ", 95.0, 1e-25),
            hit("C", "GGGGGGGGGGGGGGGGGGGGGG", 70.0, 1e-20),
        ];

        let reps = cluster_hits(hits, 0.9);
        let ids: Vec<_> = reps.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn test_cluster_tie_prefers_lower_evalue_then_shorter() {
        let hits = vec![
            hit("LONG", "MKTAYIAKQRQISFVKSHFSRQA", 90.0, 1e-30),
            hit("SHORT", "MKTAYIAKQRQISFVKSHFSRQ", 90.0, 1e-30),
        ];
        let reps = cluster_hits(hits, 0.9);
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].id, "SHORT");
    }

    #[test]
    fn test_to_evidence_dedups_and_ranks() {
        let hits = vec![
            hit("P1", "AAAAAAAAAA", 90.0, 1e-40),
            hit("P2", "CCCCCCCCCC", 85.0, 1e-35),
            hit("P1", "WWWWWWWWWW", 60.0, 1e-20),
        ];

        let list = to_evidence(SourceKind::SeqLocal, hits, &params(10));
        assert_eq!(list.ids().collect::<Vec<_>>(), vec!["P1", "P2"]);
        assert_eq!(list.hits()[1].rank, 2);
        assert_eq!(list.hits()[0].source, SourceKind::SeqLocal);
    }
}
