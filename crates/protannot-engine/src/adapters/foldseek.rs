//! Structure homology via ESMFold and the Foldseek web API
//!
//! The query is folded once by ESMFold; the predicted PDB is then searched
//! against each AlphaFold database with Foldseek (`mode=3diaa`). Results
//! arrive as a `tar.gz` of tab-separated alignment files.

use super::{combine_per_db, StructHomologyAdapter, StructSearchParams};
use crate::accession;
use crate::config::{EndpointConfig, DEFAULT_FOLDSEEK_DB, FOLDSEEK_DBS};
use crate::error::AdapterError;
use crate::model::{EvidenceList, SourceKind};
use crate::query::QuerySequence;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Foldseek alignment row (target, identity, e-value)
#[derive(Debug, Clone, PartialEq)]
pub struct StructureHit {
    pub target: String,
    pub identity_pct: f64,
    pub e_value: f64,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    id: String,
    #[serde(default)]
    status: String,
}

/// ESMFold + Foldseek adapter
#[derive(Debug, Clone)]
pub struct FoldseekClient {
    client: Client,
    esmfold_url: String,
    foldseek_url: String,
    poll_interval: Duration,
    max_polls: u32,
    ratelimit_wait: Duration,
}

impl FoldseekClient {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, AdapterError> {
        let client = Client::builder().timeout(endpoints.http_timeout()).build()?;
        Ok(Self {
            client,
            esmfold_url: endpoints.esmfold_url.clone(),
            foldseek_url: endpoints.foldseek_url.trim_end_matches('/').to_string(),
            poll_interval: endpoints.poll_interval(),
            max_polls: endpoints.max_polls,
            ratelimit_wait: Duration::from_secs(10),
        })
    }

    /// Wait applied when Foldseek answers `RATELIMIT`
    pub fn with_ratelimit_wait(mut self, wait: Duration) -> Self {
        self.ratelimit_wait = wait;
        self
    }

    fn check_status(response: &reqwest::Response) -> Result<(), AdapterError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AdapterError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }

    /// Predict the query structure; returns PDB text
    async fn fold(&self, query: &QuerySequence) -> Result<Vec<u8>, AdapterError> {
        info!(length = query.len(), "Predicting structure with ESMFold");
        let response = self
            .client
            .post(&self.esmfold_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(query.residues.clone())
            .send()
            .await?;
        Self::check_status(&response)?;

        let pdb = response.bytes().await?.to_vec();
        if pdb.is_empty() {
            return Err(AdapterError::Malformed("ESMFold returned an empty structure".to_string()));
        }
        Ok(pdb)
    }

    async fn submit(&self, pdb: &[u8], db: &str) -> Result<String, AdapterError> {
        let part = Part::bytes(pdb.to_vec())
            .file_name("query.pdb")
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("q", part)
            .text("mode", "3diaa")
            .text("database[]", db.to_string());

        let response = self
            .client
            .post(format!("{}/ticket", self.foldseek_url))
            .multipart(form)
            .send()
            .await?;
        Self::check_status(&response)?;

        let ticket: Ticket = response.json().await?;
        debug!(ticket = %ticket.id, status = %ticket.status, "Foldseek ticket issued");
        Ok(ticket.id)
    }

    async fn wait_complete(&self, ticket: &str) -> Result<(), AdapterError> {
        let url = format!("{}/ticket/{}", self.foldseek_url, ticket);
        for attempt in 1..=self.max_polls {
            let response = self.client.get(&url).send().await?;
            Self::check_status(&response)?;
            let status: Ticket = response.json().await?;

            match status.status.as_str() {
                "COMPLETE" => return Ok(()),
                "ERROR" => {
                    return Err(AdapterError::Process(format!("Foldseek job {} failed", ticket)))
                },
                "RATELIMIT" => {
                    warn!(ticket, "Foldseek rate limit, waiting");
                    tokio::time::sleep(self.ratelimit_wait).await;
                },
                other => {
                    debug!(ticket, attempt, status = other, "Foldseek job pending");
                    tokio::time::sleep(self.poll_interval).await;
                },
            }
        }

        Err(AdapterError::Unavailable(format!(
            "Foldseek job {} not complete after {} polls",
            ticket, self.max_polls
        )))
    }

    async fn download(&self, ticket: &str) -> Result<Vec<u8>, AdapterError> {
        let url = format!("{}/result/download/{}", self.foldseek_url, ticket);
        let response = self.client.get(&url).send().await?;
        Self::check_status(&response)?;
        Ok(response.bytes().await?.to_vec())
    }

    #[instrument(skip(self, pdb, params))]
    async fn search_db(
        &self,
        pdb: &[u8],
        db: &str,
        params: &StructSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        let ticket = self.submit(pdb, db).await?;
        self.wait_complete(&ticket).await?;
        let archive = self.download(&ticket).await?;
        let rows = parse_result_archive(&archive)?;
        debug!(rows = rows.len(), "Parsed Foldseek results");

        Ok(select_hits(rows, params))
    }
}

/// Keep only known databases; fall back to the default when none remain
pub fn valid_databases(requested: &[String]) -> Vec<String> {
    let valid: Vec<String> = requested
        .iter()
        .filter(|db| FOLDSEEK_DBS.contains(&db.as_str()))
        .cloned()
        .collect();

    if valid.is_empty() {
        if !requested.is_empty() {
            warn!(
                requested = ?requested,
                available = ?FOLDSEEK_DBS,
                "No valid Foldseek database, using {}",
                DEFAULT_FOLDSEEK_DB
            );
        }
        vec![DEFAULT_FOLDSEEK_DB.to_string()]
    } else {
        valid
    }
}

/// Read every regular file in a Foldseek result `tar.gz` as headerless TSV
/// (target in column 1, identity in column 2, e-value in column 10)
pub fn parse_result_archive(archive: &[u8]) -> Result<Vec<StructureHit>, AdapterError> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let mut rows = Vec::new();

    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        rows.extend(parse_alignment_tsv(&content)?);
    }

    Ok(rows)
}

fn parse_alignment_tsv(content: &str) -> Result<Vec<StructureHit>, AdapterError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() < 11 {
            return Err(AdapterError::Malformed(format!(
                "Foldseek row has {} columns, expected at least 11",
                record.len()
            )));
        }
        let number = |i: usize| {
            record[i].trim().parse::<f64>().map_err(|_| {
                AdapterError::Malformed(format!("Foldseek column {} is not a number: '{}'", i, &record[i]))
            })
        };
        rows.push(StructureHit {
            target: record[1].to_string(),
            identity_pct: number(2)?,
            e_value: number(10)?,
        });
    }
    Ok(rows)
}

/// Filter by thresholds, order by (e-value asc, identity desc), keep `k_max`,
/// and map AlphaFold model names to UniProt accessions
pub fn select_hits(mut rows: Vec<StructureHit>, params: &StructSearchParams) -> EvidenceList {
    rows.retain(|r| r.e_value <= params.max_eval && r.identity_pct >= params.min_identity);
    rows.sort_by(|a, b| {
        a.e_value
            .total_cmp(&b.e_value)
            .then(b.identity_pct.total_cmp(&a.identity_pct))
    });
    rows.truncate(params.k_max);

    let mut seen = std::collections::HashSet::new();
    EvidenceList::from_ranked(
        SourceKind::Structure,
        rows.into_iter()
            .filter(|r| r.target.contains("AF-"))
            .filter_map(|r| accession::normalize(&r.target).map(|id| (id, r.identity_pct, r.e_value)))
            .filter(|(id, _, _)| seen.insert(id.clone())),
    )
}

#[async_trait]
impl StructHomologyAdapter for FoldseekClient {
    fn name(&self) -> &str {
        "foldseek"
    }

    async fn search(
        &self,
        query: &QuerySequence,
        dbs: &[String],
        params: &StructSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        let dbs = valid_databases(dbs);
        let pdb = self.fold(query).await?;
        info!(databases = ?dbs, "Running Foldseek");

        let mut results = Vec::with_capacity(dbs.len());
        for db in &dbs {
            let result = self.search_db(&pdb, db, params).await;
            results.push((db.clone(), result));
        }

        combine_per_db(self.name(), SourceKind::Structure, results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn row(target: &str, identity: f64, evalue: f64) -> String {
        format!(
            "query\t{}\t{}\t100\t0\t0\t1\t100\t1\t100\t{}\t200\n",
            target, identity, evalue
        )
    }

    fn archive(files: &[(&str, String)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn params() -> StructSearchParams {
        StructSearchParams {
            max_eval: 10.0,
            min_identity: 60.0,
            k_max: 10,
        }
    }

    #[test]
    fn test_parse_archive_reads_all_files() {
        let data = archive(&[
            ("alis_afdb50.m8", row("AF-P01308-F1-model_v4", 88.0, 1e-12)),
            ("alis_afdb50_2.m8", row("AF-P01315-F1-model_v4", 75.0, 1e-8)),
        ]);

        let rows = parse_result_archive(&data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].target, "AF-P01308-F1-model_v4");
        assert_eq!(rows[1].e_value, 1e-8);
    }

    #[test]
    fn test_select_hits_filters_sorts_and_maps() {
        let rows = vec![
            StructureHit { target: "AF-Q9Y263-F1-model_v4".into(), identity_pct: 70.0, e_value: 1e-5 },
            StructureHit { target: "AF-P01308-F1-model_v4".into(), identity_pct: 90.0, e_value: 1e-5 },
            StructureHit { target: "AF-P01315-F1-model_v4".into(), identity_pct: 50.0, e_value: 1e-20 },
            StructureHit { target: "1abc_A".into(), identity_pct: 99.0, e_value: 1e-30 },
            StructureHit { target: "AF-P12345-F1-model_v4".into(), identity_pct: 99.0, e_value: 50.0 },
        ];

        let list = select_hits(rows, &params());
        assert_eq!(list.ids().collect::<Vec<_>>(), vec!["P01308", "Q9Y263"]);
        assert!(list.hits().iter().all(|h| h.source == SourceKind::Structure));
    }

    #[test]
    fn test_valid_databases() {
        assert_eq!(valid_databases(&["afdb-swissprot".into(), "pdb100".into()]), vec!["afdb-swissprot"]);
        assert_eq!(valid_databases(&["pdb100".into()]), vec!["afdb50"]);
        assert_eq!(valid_databases(&[]), vec!["afdb50"]);
    }

    #[test]
    fn test_short_row_is_malformed() {
        let data = archive(&[("bad.m8", "query\tAF-P01308-F1\t90\n".to_string())]);
        assert!(matches!(parse_result_archive(&data), Err(AdapterError::Malformed(_))));
    }
}
