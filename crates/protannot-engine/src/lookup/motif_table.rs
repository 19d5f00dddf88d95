//! Motif class → GO mapping table
//!
//! Tab-separated with a header row naming at least an `ELM` and a `GOTerm`
//! column; one row per (motif, term) pair.

use super::{IdToGoLookup, TermMap};
use crate::error::LookupError;
use crate::model::GoTermRef;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct MotifGoTable {
    index: TermMap,
}

impl MotifGoTable {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let table = Self::parse(&content)?;
        info!(path = %path.display(), motifs = table.index.len(), "Loaded motif GO table");
        Ok(table)
    }

    pub fn parse(content: &str) -> Result<Self, LookupError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| LookupError::malformed("motif GO table", format!("missing '{}' column", name)))
        };
        let elm_col = find("ELM")?;
        let go_col = find("GOTerm")?;

        let mut index = TermMap::new();
        for record in reader.records() {
            let record = record?;
            let (Some(elm), Some(go_id)) = (record.get(elm_col), record.get(go_col)) else {
                continue;
            };
            let (elm, go_id) = (elm.trim(), go_id.trim());
            if elm.is_empty() || go_id.is_empty() {
                continue;
            }
            if !GoTermRef::is_valid_go_id(go_id) {
                return Err(LookupError::malformed(
                    "motif GO table",
                    format!("invalid GO id '{}' for {}", go_id, elm),
                ));
            }

            let terms = index.entry(elm.to_string()).or_default();
            if !terms.iter().any(|t: &GoTermRef| t.go_id == go_id) {
                terms.push(GoTermRef::bare(go_id));
            }
        }

        Ok(Self { index })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl IdToGoLookup for MotifGoTable {
    fn name(&self) -> &str {
        "motif-table"
    }

    /// Motif ids are matched verbatim
    async fn lookup(&self, ids: &[String]) -> Result<TermMap, LookupError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.index.get(id).map(|t| (id.clone(), t.clone())))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_and_lookup() {
        let table = MotifGoTable::parse(
            "Accession\tELM\tGOTerm\tGOName\n\
             ELME000003\tLIG_SH3_3\tGO:0017124\tSH3 domain binding\n\
             ELME000003\tLIG_SH3_3\tGO:0005515\tprotein binding\n\
             ELME000120\tTRG_ER_KDEL_1\tGO:0005789\tER membrane\n\
             ELME000120\tTRG_ER_KDEL_1\tGO:0005789\tER membrane\n",
        )
        .unwrap();
        assert_eq!(table.len(), 2);

        let found = table
            .lookup(&["LIG_SH3_3".to_string(), "MOD_CK2_1".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["LIG_SH3_3"].len(), 2);
        assert_eq!(table.index["TRG_ER_KDEL_1"].len(), 1);
    }

    #[test]
    fn test_missing_column() {
        let err = MotifGoTable::parse("ELM\tName\nLIG_SH3_3\tx\n").unwrap_err();
        assert!(err.to_string().contains("GOTerm"));
    }
}
