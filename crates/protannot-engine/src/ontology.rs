//! Gene Ontology term index
//!
//! Reads the `[Term]` stanzas of an OBO file (e.g. `go-basic.obo`) and keeps
//! what annotation needs: namespace, name, obsolete flag, alt ids and the
//! parent edges used for rendering the term graph.

use crate::model::Aspect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use tracing::{info, warn};

/// Relationship between a term and one of its parents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    IsA,
    PartOf,
    Regulates,
    PositivelyRegulates,
    NegativelyRegulates,
}

impl RelationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "is_a" => Some(RelationKind::IsA),
            "part_of" => Some(RelationKind::PartOf),
            "regulates" => Some(RelationKind::Regulates),
            "positively_regulates" => Some(RelationKind::PositivelyRegulates),
            "negatively_regulates" => Some(RelationKind::NegativelyRegulates),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::IsA => "is_a",
            RelationKind::PartOf => "part_of",
            RelationKind::Regulates => "regulates",
            RelationKind::PositivelyRegulates => "positively_regulates",
            RelationKind::NegativelyRegulates => "negatively_regulates",
        }
    }
}

/// One ontology term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub go_id: String,
    pub name: String,
    pub aspect: Option<Aspect>,
    pub is_obsolete: bool,
    pub alt_ids: Vec<String>,
    pub parents: Vec<(String, RelationKind)>,
}

/// Term index; an empty ontology knows nothing and passes ids through
#[derive(Debug, Clone, Default)]
pub struct Ontology {
    terms: HashMap<String, OntologyTerm>,
    alt_index: HashMap<String, String>,
}

impl Ontology {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let ontology = Self::parse(&content);
        info!(path = %path.display(), terms = ontology.len(), "Loaded ontology");
        Ok(ontology)
    }

    /// Parse OBO text. Malformed stanzas are skipped with a warning.
    pub fn parse(content: &str) -> Self {
        let lines: Vec<&str> = content.lines().collect();
        let mut ontology = Ontology::empty();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].trim() == "[Term]" {
                match Self::parse_term_stanza(&lines, &mut i) {
                    Ok(term) => ontology.insert(term),
                    Err(e) => warn!("Failed to parse term stanza: {}", e),
                }
            } else {
                i += 1;
            }
        }

        ontology
    }

    fn insert(&mut self, term: OntologyTerm) {
        for alt in &term.alt_ids {
            self.alt_index.insert(alt.clone(), term.go_id.clone());
        }
        self.terms.insert(term.go_id.clone(), term);
    }

    /// Parse a single [Term] stanza, leaving `i` on the line that ended it
    fn parse_term_stanza(lines: &[&str], i: &mut usize) -> Result<OntologyTerm, String> {
        *i += 1; // Skip [Term] line

        let mut go_id: Option<String> = None;
        let mut name = String::new();
        let mut aspect = None;
        let mut is_obsolete = false;
        let mut alt_ids = Vec::new();
        let mut parents = Vec::new();

        while *i < lines.len() {
            let line = lines[*i].trim();
            if line.is_empty() || line.starts_with('[') {
                break;
            }

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "id" => go_id = Some(value.to_string()),
                    "name" => name = value.to_string(),
                    "namespace" => {
                        aspect = Some(
                            Aspect::from_namespace(value)
                                .ok_or_else(|| format!("unknown namespace '{}'", value))?,
                        )
                    },
                    "is_obsolete" => is_obsolete = value == "true",
                    "alt_id" => alt_ids.push(value.to_string()),
                    "is_a" => {
                        // "GO:0008150 ! biological_process"
                        if let Some(parent) = value.split_whitespace().next() {
                            parents.push((parent.to_string(), RelationKind::IsA));
                        }
                    },
                    "relationship" => {
                        // "part_of GO:0008150 ! biological_process"
                        let mut parts = value.split_whitespace();
                        if let (Some(kind), Some(parent)) = (parts.next(), parts.next()) {
                            if let Some(kind) = RelationKind::parse(kind) {
                                parents.push((parent.to_string(), kind));
                            }
                        }
                    },
                    _ => {},
                }
            }

            *i += 1;
        }

        let go_id = go_id.ok_or_else(|| "missing id".to_string())?;
        Ok(OntologyTerm {
            go_id,
            name,
            aspect,
            is_obsolete,
            alt_ids,
            parents,
        })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term(&self, go_id: &str) -> Option<&OntologyTerm> {
        self.terms.get(go_id)
    }

    /// Primary id for `go_id`: itself if known, its owner if it is an alt id.
    /// Unknown ids pass through unchanged.
    pub fn canonical<'a>(&'a self, go_id: &'a str) -> &'a str {
        if self.terms.contains_key(go_id) {
            go_id
        } else {
            self.alt_index.get(go_id).map(String::as_str).unwrap_or(go_id)
        }
    }

    pub fn is_obsolete(&self, go_id: &str) -> bool {
        self.terms.get(go_id).map(|t| t.is_obsolete).unwrap_or(false)
    }

    pub fn aspect(&self, go_id: &str) -> Option<Aspect> {
        self.terms.get(go_id).and_then(|t| t.aspect)
    }

    pub fn name(&self, go_id: &str) -> Option<&str> {
        self.terms
            .get(go_id)
            .map(|t| t.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Every term reachable from `go_ids` over parent edges, inputs included
    pub fn closure<'a>(&self, go_ids: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = go_ids.into_iter().map(str::to_string).collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(term) = self.terms.get(&id) {
                for (parent, _) in &term.parents {
                    if !seen.contains(parent) {
                        queue.push_back(parent.clone());
                    }
                }
            }
        }

        seen
    }
}
