//! GO terms from a local GAF 2.x annotation file
//!
//! GAF format: tab-delimited, 15-17 columns, `!` comment lines.
//! Column 2: DB Object ID (e.g. "P01308")
//! Column 4: Qualifier (`NOT|...` rows are negative annotations)
//! Column 5: GO ID
//! Column 7: Evidence Code
//! Column 9: Aspect (P/F/C)

use super::{lookup_in_index, IdToGoLookup, TermMap};
use crate::error::LookupError;
use crate::model::{Aspect, GoTermRef};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// In-memory index of a GAF file keyed by DB Object ID
#[derive(Debug, Clone, Default)]
pub struct GafLookup {
    index: TermMap,
}

impl GafLookup {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let lookup = Self::parse(&content)?;
        info!(path = %path.display(), proteins = lookup.index.len(), "Loaded GAF annotations");
        Ok(lookup)
    }

    pub fn parse(content: &str) -> Result<Self, LookupError> {
        let mut index = TermMap::new();
        let mut annotations = 0usize;
        let mut skipped = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            if line.starts_with('!') || line.trim().is_empty() {
                continue;
            }

            match Self::parse_gaf_line(line) {
                Ok(Some((object_id, term))) => {
                    let terms = index.entry(object_id).or_default();
                    if !terms.iter().any(|t| t.go_id == term.go_id) {
                        terms.push(term);
                        annotations += 1;
                    }
                },
                Ok(None) => skipped += 1,
                Err(reason) => {
                    return Err(LookupError::malformed(
                        "GAF file",
                        format!("line {}: {}", line_no + 1, reason),
                    ))
                },
            }
        }

        debug!(annotations, skipped, "Parsed GAF file");
        Ok(Self { index })
    }

    /// Parse a single GAF line; `None` for negated annotations
    fn parse_gaf_line(line: &str) -> Result<Option<(String, GoTermRef)>, String> {
        let columns: Vec<&str> = line.split('\t').collect();

        if columns.len() < 15 {
            return Err(format!("expected 15+ columns, got {}", columns.len()));
        }

        let db_object_id = columns[1].trim();
        let qualifier = columns[3].trim();
        let go_id = columns[4].trim();
        let evidence_code = columns[6].trim();
        let aspect = columns[8].trim();

        if qualifier.split('|').any(|q| q.eq_ignore_ascii_case("NOT")) {
            return Ok(None);
        }
        if !GoTermRef::is_valid_go_id(go_id) {
            return Err(format!("invalid GO id '{}'", go_id));
        }

        Ok(Some((
            db_object_id.to_string(),
            GoTermRef {
                go_id: go_id.to_string(),
                aspect: Aspect::from_letter(aspect),
                evidence_code: if evidence_code.is_empty() {
                    None
                } else {
                    Some(evidence_code.to_string())
                },
            },
        )))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl IdToGoLookup for GafLookup {
    fn name(&self) -> &str {
        "gaf"
    }

    async fn lookup(&self, ids: &[String]) -> Result<TermMap, LookupError> {
        Ok(lookup_in_index(&self.index, ids))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const GAF: &str = "!gaf-version: 2.2\n\
!generated-by: GOC\n\
UniProtKB\tP01308\tINS\t\tGO:0005179\tPMID:123\tIDA\t\tF\tInsulin\t\tprotein\ttaxon:9606\t20200101\tUniProt\t\t\n\
UniProtKB\tP01308\tINS\tinvolved_in\tGO:0006006\tPMID:123\tIEA\t\tP\tInsulin\t\tprotein\ttaxon:9606\t20200101\tUniProt\t\t\n\
UniProtKB\tP01308\tINS\tNOT|enables\tGO:0003677\tPMID:9\tIDA\t\tF\tInsulin\t\tprotein\ttaxon:9606\t20200101\tUniProt\t\t\n\
UniProtKB\tP01315\tINS\t\tGO:0005576\tPMID:5\tTAS\t\tC\tInsulin\t\tprotein\ttaxon:9823\t20200101\tUniProt\t\t\n";

    #[test]
    fn test_parse_gaf() {
        let gaf = GafLookup::parse(GAF).unwrap();
        assert_eq!(gaf.len(), 2);

        let terms = &gaf.index["P01308"];
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].go_id, "GO:0005179");
        assert_eq!(terms[0].aspect, Some(Aspect::MF));
        assert_eq!(terms[1].evidence_code.as_deref(), Some("IEA"));
    }

    #[test]
    fn test_short_line_is_malformed() {
        let err = GafLookup::parse("UniProtKB\tP01308\tINS\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn test_lookup_normalizes_ids() {
        let gaf = GafLookup::parse(GAF).unwrap();
        let ids = vec!["sp|P01308|INS_HUMAN".to_string(), "Q99999".to_string()];

        let found = gaf.lookup(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["sp|P01308|INS_HUMAN"].len(), 2);
    }
}
