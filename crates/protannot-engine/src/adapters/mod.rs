//! Evidence source adapters
//!
//! Each adapter drives one external tool and normalizes its output into an
//! [`EvidenceList`]. Adapters never decide policy: an adapter that ran and
//! found nothing returns an empty list, and any failure is reported as an
//! [`AdapterError`] for the pipeline to degrade or abort on.

pub mod blast_local;
pub mod blast_remote;
pub mod blast_xml;
pub mod elm;
pub mod filter;
pub mod foldseek;

pub use blast_local::LocalBlast;
pub use blast_remote::RemoteBlast;
pub use elm::ElmClient;
pub use foldseek::FoldseekClient;

use crate::config::{BlastProgram, SeqHomologyConfig, StructHomologyConfig};
use crate::error::AdapterError;
use crate::merge::MergedIdSet;
use crate::model::{EvidenceList, SourceKind};
use crate::query::QuerySequence;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Search parameters shared by the sequence-homology adapters
#[derive(Debug, Clone, PartialEq)]
pub struct SeqSearchParams {
    pub program: BlastProgram,
    pub k_max: usize,
    pub max_eval: f64,
    pub min_identity: f64,
    pub cluster_threshold: f64,
}

impl From<&SeqHomologyConfig> for SeqSearchParams {
    fn from(config: &SeqHomologyConfig) -> Self {
        Self {
            program: config.program,
            k_max: config.k_max,
            max_eval: config.max_eval,
            min_identity: config.min_identity,
            cluster_threshold: config.cluster_threshold,
        }
    }
}

/// Search parameters for the structure-homology adapter
#[derive(Debug, Clone, PartialEq)]
pub struct StructSearchParams {
    pub max_eval: f64,
    pub min_identity: f64,
    pub k_max: usize,
}

impl From<&StructHomologyConfig> for StructSearchParams {
    fn from(config: &StructHomologyConfig) -> Self {
        Self {
            max_eval: config.max_eval,
            min_identity: config.min_identity,
            k_max: config.k_max,
        }
    }
}

/// Sequence homology search (BLAST)
#[async_trait]
pub trait SeqHomologyAdapter: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &QuerySequence,
        dbs: &[String],
        params: &SeqSearchParams,
    ) -> Result<EvidenceList, AdapterError>;
}

/// Structure homology search (predicted structure against structure databases)
#[async_trait]
pub trait StructHomologyAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &QuerySequence,
        dbs: &[String],
        params: &StructSearchParams,
    ) -> Result<EvidenceList, AdapterError>;
}

/// Short linear motif scan; returns motif class identifiers
#[async_trait]
pub trait MotifAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn scan(&self, query: &QuerySequence) -> Result<EvidenceList, AdapterError>;
}

/// Run an adapter future under a timeout, racing the cancellation token
pub async fn guarded<T, F>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AdapterError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(AdapterError::Timeout(timeout)),
        },
    }
}

/// Fold per-database results into one list, earlier databases first.
///
/// A database that failed is skipped with a warning as long as another one
/// answered; when every database failed the first error is returned.
pub(crate) fn combine_per_db(
    adapter: &str,
    source: SourceKind,
    results: Vec<(String, Result<EvidenceList, AdapterError>)>,
) -> Result<EvidenceList, AdapterError> {
    let mut merged = MergedIdSet::new();
    let mut answered = 0usize;
    let mut first_error = None;

    for (db, result) in results {
        match result {
            Ok(list) => {
                answered += 1;
                merged.extend_with(&list);
            },
            Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
            Err(e) => {
                warn!(adapter, db = %db, error = %e, "Database search failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            },
        }
    }

    match first_error {
        Some(e) if answered == 0 => Err(e),
        _ => Ok(EvidenceList::from_ranked(
            source,
            merged
                .entries()
                .iter()
                .map(|h| (h.id.clone(), h.identity_pct, h.e_value)),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> EvidenceList {
        EvidenceList::from_ids(SourceKind::SeqRemote, ids.iter().map(|s| s.to_string()), 80.0, 1e-20)
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_times_out() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = guarded(Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(AdapterError::Timeout(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_guarded_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<u32, _> = guarded(Duration::from_secs(5), &cancel, async { Ok(1) }).await;

        assert!(matches!(result, Err(AdapterError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guarded_passes_through() {
        let cancel = CancellationToken::new();
        let result = guarded(Duration::from_secs(5), &cancel, async { Ok::<_, AdapterError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_combine_per_db_skips_failed_database() {
        let results = vec![
            ("swissprot".to_string(), Ok(list(&["P1", "P2"]))),
            ("pdb".to_string(), Err(AdapterError::Malformed("bad xml".to_string()))),
            ("refseq_protein".to_string(), Ok(list(&["P2", "P3"]))),
        ];

        let combined = combine_per_db("remote-blast", SourceKind::SeqRemote, results).unwrap();

        assert_eq!(combined.ids().collect::<Vec<_>>(), vec!["P1", "P2", "P3"]);
        assert_eq!(combined.hits()[2].rank, 3);
    }

    #[test]
    fn test_combine_per_db_all_failed() {
        let results = vec![(
            "swissprot".to_string(),
            Err(AdapterError::Unavailable("down".to_string())),
        )];
        assert!(combine_per_db("remote-blast", SourceKind::SeqRemote, results).is_err());
    }
}
