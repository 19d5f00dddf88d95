// Evidence and annotation data model

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Evidence Source
// ============================================================================

/// Which evidence source produced a hit
///
/// Declaration order is the reporting order used by set-valued fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    SeqLocal,
    SeqRemote,
    Structure,
    Motif,
}

impl SourceKind {
    /// Fixed priority weight used by the combined score.
    ///
    /// Sequence and structure homology are top tier; motif matches are a
    /// last resort and scored lower.
    pub fn weight(&self) -> f64 {
        match self {
            SourceKind::SeqLocal | SourceKind::SeqRemote | SourceKind::Structure => 1.0,
            SourceKind::Motif => 0.3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SeqLocal => "SeqLocal",
            SourceKind::SeqRemote => "SeqRemote",
            SourceKind::Structure => "Structure",
            SourceKind::Motif => "Motif",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Evidence Hit / List
// ============================================================================

/// One identifier reported by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceHit {
    pub id: String,
    pub source: SourceKind,
    /// Percent identity, 0–100
    pub identity_pct: f64,
    pub e_value: f64,
    /// 1-based position in the adapter's native order
    pub rank: u32,
}

/// Ordered hits from one adapter invocation, best first
///
/// Built once and never mutated; ranks are assigned from position.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EvidenceList {
    hits: Vec<EvidenceHit>,
}

impl EvidenceList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(id, identity_pct, e_value)` triples already in best-first
    /// order. Ranks are re-assigned 1..=n.
    pub fn from_ranked(
        source: SourceKind,
        entries: impl IntoIterator<Item = (String, f64, f64)>,
    ) -> Self {
        let hits = entries
            .into_iter()
            .enumerate()
            .map(|(i, (id, identity_pct, e_value))| EvidenceHit {
                id,
                source,
                identity_pct,
                e_value,
                rank: (i + 1) as u32,
            })
            .collect();
        Self { hits }
    }

    /// Build from bare ids (precomputed lists) that carry no alignment
    /// metrics. Every id gets the same placeholder metrics.
    pub fn from_ids(
        source: SourceKind,
        ids: impl IntoIterator<Item = String>,
        identity_pct: f64,
        e_value: f64,
    ) -> Self {
        Self::from_ranked(source, ids.into_iter().map(|id| (id, identity_pct, e_value)))
    }

    pub fn hits(&self) -> &[EvidenceHit] {
        &self.hits
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl<'a> IntoIterator for &'a EvidenceList {
    type Item = &'a EvidenceHit;
    type IntoIter = std::slice::Iter<'a, EvidenceHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

// ============================================================================
// GO Aspect
// ============================================================================

/// GO aspect (ontology namespace)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Aspect {
    MF,
    BP,
    CC,
}

impl Aspect {
    /// Parse an OBO namespace (`molecular_function`, ...)
    pub fn from_namespace(s: &str) -> Option<Self> {
        match s {
            "molecular_function" => Some(Aspect::MF),
            "biological_process" => Some(Aspect::BP),
            "cellular_component" => Some(Aspect::CC),
            _ => None,
        }
    }

    /// Parse a GAF column 9 / UniProt term prefix letter (`F`, `P`, `C`)
    pub fn from_letter(s: &str) -> Option<Self> {
        match s {
            "F" => Some(Aspect::MF),
            "P" => Some(Aspect::BP),
            "C" => Some(Aspect::CC),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::MF => "MF",
            Aspect::BP => "BP",
            Aspect::CC => "CC",
        }
    }

    /// Root term of the aspect's sub-ontology
    pub fn root_go_id(&self) -> &'static str {
        match self {
            Aspect::MF => "GO:0003674",
            Aspect::BP => "GO:0008150",
            Aspect::CC => "GO:0005575",
        }
    }
}

impl std::fmt::Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One GO term a lookup returned for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoTermRef {
    pub go_id: String,
    /// Aspect as reported by the lookup, if it knows it
    pub aspect: Option<Aspect>,
    /// GO evidence code (IDA, IEA, ...), if reported
    pub evidence_code: Option<String>,
}

impl GoTermRef {
    pub fn bare(go_id: impl Into<String>) -> Self {
        Self {
            go_id: go_id.into(),
            aspect: None,
            evidence_code: None,
        }
    }

    /// `GO:` followed by exactly seven digits
    pub fn is_valid_go_id(go_id: &str) -> bool {
        go_id.len() == 10
            && go_id.starts_with("GO:")
            && go_id[3..].chars().all(|c| c.is_ascii_digit())
    }
}

// ============================================================================
// GO Term Annotation
// ============================================================================

/// Accumulated evidence for one GO term
///
/// Contributions only accumulate: sources and ids are added, per-source
/// best identities only rise, so `score` never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoTermAnnotation {
    pub go_id: String,
    pub aspect: Aspect,
    pub contributing_sources: BTreeSet<SourceKind>,
    pub supporting_ids: BTreeSet<String>,
    /// Best identity percent seen per contributing source
    pub source_identity: BTreeMap<SourceKind, f64>,
    pub score: f64,
}

impl GoTermAnnotation {
    pub fn new(go_id: impl Into<String>, aspect: Aspect) -> Self {
        Self {
            go_id: go_id.into(),
            aspect,
            contributing_sources: BTreeSet::new(),
            supporting_ids: BTreeSet::new(),
            source_identity: BTreeMap::new(),
            score: 0.0,
        }
    }

    /// Fold in one supporting hit
    pub fn contribute(&mut self, hit: &EvidenceHit) {
        self.contributing_sources.insert(hit.source);
        self.supporting_ids.insert(hit.id.clone());

        let identity = if hit.identity_pct.is_finite() {
            hit.identity_pct
        } else {
            0.0
        };
        let best = self.source_identity.entry(hit.source).or_insert(identity);
        if identity > *best {
            *best = identity;
        }

        self.score = combined_score(&self.source_identity);
    }
}

/// `max over sources (weight × best identity fraction)`
pub fn combined_score(source_identity: &BTreeMap<SourceKind, f64>) -> f64 {
    source_identity
        .iter()
        .map(|(source, identity)| source.weight() * (identity / 100.0).clamp(0.0, 1.0))
        .fold(0.0, f64::max)
}
