//! RefSeq and PDB accessions → UniProtKB via the UniProt ID mapping service
//!
//! One job per source database: `POST {base}/idmapping/run`, poll
//! `{base}/idmapping/status/{job}` until results appear (or the job reports
//! `FINISHED`, then `{base}/idmapping/results/{job}`).

use super::IdMapper;
use crate::accession::{self, AccessionKind};
use crate::config::EndpointConfig;
use crate::error::LookupError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct SubmittedJob {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MappedTo {
    Accession(String),
    Entry {
        #[serde(rename = "primaryAccession")]
        primary_accession: String,
    },
}

impl MappedTo {
    fn accession(&self) -> &str {
        match self {
            MappedTo::Accession(acc) => acc,
            MappedTo::Entry { primary_accession } => primary_accession,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappedPair {
    from: String,
    to: MappedTo,
}

/// Status and results share one shape; `results` is present once done
#[derive(Debug, Deserialize)]
struct MappingReport {
    #[serde(rename = "jobStatus")]
    job_status: Option<String>,
    results: Option<Vec<MappedPair>>,
    #[serde(default, rename = "failedIds")]
    failed_ids: Vec<String>,
}

/// Source database name the mapping service expects
fn from_database(kind: AccessionKind) -> Option<&'static str> {
    match kind {
        AccessionKind::RefSeqProtein => Some("RefSeq_Protein"),
        AccessionKind::Pdb => Some("PDB"),
        AccessionKind::UniProtKb => None,
    }
}

fn checked(response: Response, what: &str) -> Result<Response, LookupError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LookupError::Status {
            status: status.as_u16(),
            id: what.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UniProtIdMapper {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl UniProtIdMapper {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, LookupError> {
        let client = Client::builder().timeout(endpoints.http_timeout()).build()?;
        Ok(Self {
            client,
            base_url: endpoints.uniprot_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(endpoints.poll_interval_secs),
            max_polls: endpoints.max_polls,
        })
    }

    async fn run_job(&self, from: &str, accessions: &[&str]) -> Result<MappingReport, LookupError> {
        let ids = accessions.join(",");
        let response = self
            .client
            .post(format!("{}/idmapping/run", self.base_url))
            .form(&[("from", from), ("to", "UniProtKB"), ("ids", ids.as_str())])
            .send()
            .await?;
        let job: SubmittedJob = checked(response, from)?.json().await?;
        debug!(job = %job.job_id, from, ids = accessions.len(), "Submitted UniProt id mapping");

        let status_url = format!("{}/idmapping/status/{}", self.base_url, job.job_id);
        for attempt in 1..=self.max_polls {
            let response = self.client.get(&status_url).send().await?;
            let report: MappingReport = checked(response, &job.job_id)?.json().await?;
            if report.results.is_some() {
                return Ok(report);
            }

            match report.job_status.as_deref() {
                Some("FINISHED") => return self.results(&job.job_id).await,
                Some("ERROR") | Some("FAILURE") => {
                    return Err(LookupError::malformed(
                        "id mapping job",
                        format!("job {} failed", job.job_id),
                    ))
                },
                status => {
                    debug!(job = %job.job_id, attempt, status, "Id mapping pending");
                    tokio::time::sleep(self.poll_interval).await;
                },
            }
        }

        Err(LookupError::malformed(
            "id mapping job",
            format!("job {} not finished after {} polls", job.job_id, self.max_polls),
        ))
    }

    async fn results(&self, job_id: &str) -> Result<MappingReport, LookupError> {
        let url = format!("{}/idmapping/results/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;
        Ok(checked(response, job_id)?.json().await?)
    }
}

#[async_trait]
impl IdMapper for UniProtIdMapper {
    async fn map_to_uniprot(&self, ids: &[String]) -> Result<BTreeMap<String, String>, LookupError> {
        // source db → normalized accession → original spellings
        let mut groups: BTreeMap<&'static str, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for id in ids {
            let Some(acc) = accession::normalize(id) else {
                continue;
            };
            let Some(from) = accession::classify(&acc).and_then(from_database) else {
                continue;
            };
            groups.entry(from).or_default().entry(acc).or_default().push(id.clone());
        }

        let mut mapped = BTreeMap::new();
        for (from, originals) in groups {
            let accessions: Vec<&str> = originals.keys().map(String::as_str).collect();
            let report = self.run_job(from, &accessions).await?;

            for pair in report.results.unwrap_or_default() {
                let Some(sources) = originals.get(&pair.from) else {
                    continue;
                };
                for id in sources {
                    // first mapping wins when one accession maps to several entries
                    mapped
                        .entry(id.clone())
                        .or_insert_with(|| pair.to.accession().to_string());
                }
            }
            if !report.failed_ids.is_empty() {
                warn!(from, failed = report.failed_ids.len(), "Identifiers without a UniProtKB mapping");
            }
            info!(from, submitted = accessions.len(), "Mapped identifiers to UniProtKB");
        }

        Ok(mapped)
    }
}
