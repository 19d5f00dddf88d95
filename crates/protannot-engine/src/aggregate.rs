//! GO term aggregation
//!
//! Maps evidence identifiers to GO terms and accumulates per-term
//! provenance. Resolution (lookup + ontology clean-up) is separated from
//! folding so the pipeline can inspect what a source would contribute before
//! committing it to the accumulator.

use crate::error::LookupError;
use crate::lookup::IdToGoLookup;
use crate::model::{Aspect, EvidenceHit, GoTermAnnotation, GoTermRef, SourceKind};
use crate::ontology::Ontology;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// One evidence hit with the cleaned GO terms it maps to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHit {
    pub hit: EvidenceHit,
    pub terms: Vec<(String, Aspect)>,
}

/// Owned accumulator moved from aggregation into ranking
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation {
    annotations: BTreeMap<String, GoTermAnnotation>,
    /// Every identifier that entered aggregation, with the terms it supports
    contributions: BTreeMap<String, BTreeSet<String>>,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold resolved hits in. Existing annotations are only extended.
    pub fn fold(mut self, resolved: &[ResolvedHit]) -> Self {
        for entry in resolved {
            let supported = self.contributions.entry(entry.hit.id.clone()).or_default();
            for (go_id, aspect) in &entry.terms {
                supported.insert(go_id.clone());
                self.annotations
                    .entry(go_id.clone())
                    .or_insert_with(|| GoTermAnnotation::new(go_id.clone(), *aspect))
                    .contribute(&entry.hit);
            }
        }
        self
    }

    pub fn annotations(&self) -> &BTreeMap<String, GoTermAnnotation> {
        &self.annotations
    }

    pub fn contributions(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.contributions
    }

    /// True when no GO term has been annotated
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Number of terms `source` contributed to
    pub fn terms_from(&self, source: SourceKind) -> usize {
        self.annotations
            .values()
            .filter(|a| a.contributing_sources.contains(&source))
            .count()
    }

    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<String, GoTermAnnotation>,
        BTreeMap<String, BTreeSet<String>>,
    ) {
        (self.annotations, self.contributions)
    }
}

/// Canonicalize one returned term; `None` when it must be dropped
fn clean_term(go_ref: &GoTermRef, ontology: &Ontology, id: &str) -> Option<(String, Aspect)> {
    if !GoTermRef::is_valid_go_id(&go_ref.go_id) {
        warn!(id, go_id = %go_ref.go_id, "Dropping malformed GO id");
        return None;
    }

    let canonical = ontology.canonical(&go_ref.go_id);
    if ontology.is_obsolete(canonical) {
        debug!(id, go_id = canonical, "Dropping obsolete GO term");
        return None;
    }

    match ontology.aspect(canonical).or(go_ref.aspect) {
        Some(aspect) => Some((canonical.to_string(), aspect)),
        None => {
            warn!(id, go_id = canonical, "Dropping GO term with unknown aspect");
            None
        },
    }
}

/// Look up every hit's identifier and clean the returned terms.
/// Output keeps hit order; identifiers without terms are kept with none.
pub async fn resolve<'a>(
    hits: impl IntoIterator<Item = &'a EvidenceHit>,
    lookup: &dyn IdToGoLookup,
    ontology: &Ontology,
) -> Result<Vec<ResolvedHit>, LookupError> {
    let hits: Vec<&EvidenceHit> = hits.into_iter().collect();
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
    let found = lookup.lookup(&ids).await?;

    let resolved: Vec<ResolvedHit> = hits
        .into_iter()
        .map(|hit| {
            let mut terms: Vec<(String, Aspect)> = Vec::new();
            for go_ref in found.get(&hit.id).map(Vec::as_slice).unwrap_or_default() {
                if let Some(term) = clean_term(go_ref, ontology, &hit.id) {
                    if !terms.iter().any(|(g, _)| *g == term.0) {
                        terms.push(term);
                    }
                }
            }
            ResolvedHit {
                hit: hit.clone(),
                terms,
            }
        })
        .collect();

    info!(
        lookup = lookup.name(),
        ids = resolved.len(),
        annotated = resolved.iter().filter(|r| !r.terms.is_empty()).count(),
        "Resolved GO terms"
    );
    Ok(resolved)
}

/// Resolve `hits` and fold them into `acc`
pub async fn aggregate<'a>(
    hits: impl IntoIterator<Item = &'a EvidenceHit>,
    lookup: &dyn IdToGoLookup,
    ontology: &Ontology,
    acc: Aggregation,
) -> Result<Aggregation, LookupError> {
    let resolved = resolve(hits, lookup, ontology).await?;
    Ok(acc.fold(&resolved))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::lookup::TermMappingLookup;
    use crate::model::EvidenceList;

    fn lookup(json: &str) -> TermMappingLookup {
        TermMappingLookup::parse(json).unwrap()
    }

    const OBO: &str = "[Term]\nid: GO:0005179\nname: hormone activity\nnamespace: molecular_function\nalt_id: GO:0000001\n\n\
[Term]\nid: GO:0006006\nname: glucose metabolic process\nnamespace: biological_process\n\n\
[Term]\nid: GO:0000005\nname: obsolete thing\nnamespace: molecular_function\nis_obsolete: true\n";

    #[tokio::test]
    async fn test_aggregate_accumulates_provenance() {
        let ontology = Ontology::parse(OBO);
        let terms = lookup(r#"{"P1": ["GO:0005179", "GO:0006006"], "P2": ["GO:0005179"]}"#);
        let hits = EvidenceList::from_ranked(
            SourceKind::SeqRemote,
            vec![("P1".to_string(), 90.0, 1e-50), ("P2".to_string(), 60.0, 1e-20)],
        );

        let agg = aggregate(&hits, &terms, &ontology, Aggregation::new()).await.unwrap();

        assert_eq!(agg.len(), 2);
        let hormone = &agg.annotations()["GO:0005179"];
        assert_eq!(hormone.aspect, Aspect::MF);
        assert_eq!(hormone.supporting_ids.len(), 2);
        assert!((hormone.score - 0.9).abs() < 1e-9);
        assert_eq!(agg.contributions()["P2"].len(), 1);
    }

    #[tokio::test]
    async fn test_alt_ids_canonicalized_and_obsolete_dropped() {
        let ontology = Ontology::parse(OBO);
        let terms = lookup(r#"{"P1": ["GO:0000001", "GO:0000005", "GO:7777777", "bogus"]}"#);
        let hits = EvidenceList::from_ids(SourceKind::Structure, vec!["P1".to_string()], 70.0, 1e-3);

        let agg = aggregate(&hits, &terms, &ontology, Aggregation::new()).await.unwrap();

        // GO:7777777 is unknown to the ontology and has no aspect hint
        assert_eq!(agg.annotations().keys().collect::<Vec<_>>(), vec!["GO:0005179"]);
    }

    #[tokio::test]
    async fn test_ids_without_terms_are_recorded() {
        let terms = lookup(r#"{}"#);
        let hits = EvidenceList::from_ids(SourceKind::SeqLocal, vec!["P9".to_string()], 50.0, 1e-6);

        let agg = aggregate(&hits, &terms, &Ontology::empty(), Aggregation::new()).await.unwrap();

        assert!(agg.is_empty());
        assert!(agg.contributions()["P9"].is_empty());
    }

    #[tokio::test]
    async fn test_motif_contributions_join_existing_terms() {
        let ontology = Ontology::parse(OBO);
        let proteins = lookup(r#"{"P1": ["GO:0005179"]}"#);
        let motifs = lookup(r#"{"LIG_X": ["GO:0005179"]}"#);

        let structure = EvidenceList::from_ids(SourceKind::Structure, vec!["P1".to_string()], 65.0, 1e-3);
        let motif = EvidenceList::from_ids(SourceKind::Motif, vec!["LIG_X".to_string()], 100.0, 0.0);

        let agg = aggregate(&structure, &proteins, &ontology, Aggregation::new()).await.unwrap();
        let agg = aggregate(&motif, &motifs, &ontology, agg).await.unwrap();

        let ann = &agg.annotations()["GO:0005179"];
        assert_eq!(ann.contributing_sources.len(), 2);
        assert!((ann.score - 0.65).abs() < 1e-9);
        assert_eq!(agg.terms_from(SourceKind::Motif), 1);
    }
}
