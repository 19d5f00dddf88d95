//! Identifier → GO term lookups
//!
//! A lookup answers, for a batch of protein (or motif) identifiers, which GO
//! terms are annotated to each. Identifiers without annotations are simply
//! absent from the returned map.

pub mod gaf;
pub mod idmapping;
pub mod mapping_file;
pub mod motif_table;
pub mod uniprot;

pub use gaf::GafLookup;
pub use idmapping::UniProtIdMapper;
pub use mapping_file::TermMappingLookup;
pub use motif_table::MotifGoTable;
pub use uniprot::UniProtLookup;

use crate::error::LookupError;
use crate::model::GoTermRef;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// GO terms per identifier
pub type TermMap = BTreeMap<String, Vec<GoTermRef>>;

#[async_trait]
pub trait IdToGoLookup: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    async fn lookup(&self, ids: &[String]) -> Result<TermMap, LookupError>;
}

/// Maps RefSeq and PDB accessions onto UniProtKB entries
#[async_trait]
pub trait IdMapper: Send + Sync {
    /// Original id → UniProtKB accession; unmapped ids are absent
    async fn map_to_uniprot(&self, ids: &[String]) -> Result<BTreeMap<String, String>, LookupError>;
}

/// Answer a batch from an in-memory index
pub(crate) fn lookup_in_index(index: &TermMap, ids: &[String]) -> TermMap {
    ids.iter()
        .filter_map(|id| {
            let key = crate::accession::normalize(id).unwrap_or_else(|| id.clone());
            index
                .get(&key)
                .or_else(|| index.get(id))
                .map(|terms| (id.clone(), terms.clone()))
        })
        .collect()
}
