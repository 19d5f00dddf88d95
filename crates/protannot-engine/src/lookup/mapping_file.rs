//! Persisted term-mapping documents (`{"P01308": ["GO:0005179", ...]}`)

use super::{lookup_in_index, IdToGoLookup, TermMap};
use crate::error::LookupError;
use crate::model::GoTermRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

/// Identifier → GO ids read from a JSON term-mapping document.
/// The document carries no aspects; they come from the ontology.
#[derive(Debug, Clone, Default)]
pub struct TermMappingLookup {
    index: TermMap,
}

impl TermMappingLookup {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, LookupError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(content)?;
        Ok(Self::from_map(raw))
    }

    pub fn from_map(raw: BTreeMap<String, Vec<String>>) -> Self {
        let index = raw
            .into_iter()
            .map(|(id, go_ids)| (id, go_ids.into_iter().map(GoTermRef::bare).collect()))
            .collect();
        Self { index }
    }
}

/// Render a term map in the persisted document shape
pub fn to_document(terms: &TermMap) -> BTreeMap<String, Vec<String>> {
    terms
        .iter()
        .map(|(id, refs)| (id.clone(), refs.iter().map(|r| r.go_id.clone()).collect()))
        .collect()
}

#[async_trait]
impl IdToGoLookup for TermMappingLookup {
    fn name(&self) -> &str {
        "term-mapping"
    }

    async fn lookup(&self, ids: &[String]) -> Result<TermMap, LookupError> {
        Ok(lookup_in_index(&self.index, ids))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_and_lookup() {
        let lookup = TermMappingLookup::parse(
            r#"{"P01308": ["GO:0005179", "GO:0006006"], "LIG_SH3_3": ["GO:0017124"]}"#,
        )
        .unwrap();

        let found = lookup
            .lookup(&["P01308".to_string(), "LIG_SH3_3".to_string(), "X".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["P01308"][1].go_id, "GO:0006006");
        assert_eq!(found["LIG_SH3_3"][0].aspect, None);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(TermMappingLookup::parse(r#"["P01308"]"#).is_err());
    }

    #[test]
    fn test_document_shape() {
        let lookup = TermMappingLookup::parse(r#"{"P1": ["GO:0000001"]}"#).unwrap();
        let doc = to_document(&lookup.index);
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"P1":["GO:0000001"]}"#);
    }
}
