//! Short linear motif scan against the ELM resource

use super::MotifAdapter;
use crate::config::{EndpointConfig, MotifConfig};
use crate::error::AdapterError;
use crate::model::{EvidenceList, SourceKind};
use crate::query::QuerySequence;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Longest sequence the ELM search endpoint accepts
pub const ELM_MAX_SEQUENCE_LEN: usize = 2000;

/// Motif classes kept: ligand binding, docking, modification, targeting
pub const ELM_CLASSES: [&str; 4] = ["LIG", "DOC", "MOD", "TRG"];

/// ELM REST client
#[derive(Debug, Clone)]
pub struct ElmClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ElmClient {
    pub fn new(endpoints: &EndpointConfig, motif: &MotifConfig) -> Result<Self, AdapterError> {
        let client = Client::builder().timeout(endpoints.http_timeout()).build()?;
        Ok(Self {
            client,
            base_url: endpoints.elm_url.trim_end_matches('/').to_string(),
            max_attempts: motif.max_attempts.max(1),
            retry_delay: Duration::from_secs(motif.retry_delay_secs),
        })
    }

    /// GET the search, retrying on HTTP 429 and connection errors
    async fn fetch(&self, residues: &str) -> Result<String, AdapterError> {
        let url = format!("{}/start_search/{}", self.base_url, residues);

        for attempt in 1..=self.max_attempts {
            info!(attempt, max_attempts = self.max_attempts, "Submitting ELM search");

            let response = match self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, "text/tab-separated-values")
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "ELM connection error, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                },
                Err(e) => return Err(e.into()),
            };

            match response.status() {
                StatusCode::OK => return Ok(response.text().await?),
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!(attempt, delay_secs = self.retry_delay.as_secs(), "ELM rate limit hit");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                },
                status => {
                    return Err(AdapterError::Status {
                        status: status.as_u16(),
                        url: format!("{}/start_search/", self.base_url),
                    })
                },
            }
        }

        Err(AdapterError::Unavailable(format!(
            "ELM still rate limited after {} attempts",
            self.max_attempts
        )))
    }
}

/// Parse the ELM search TSV into motif class identifiers, first-seen order.
///
/// Rows flagged `is_filtered` are skipped, as are classes outside
/// [`ELM_CLASSES`].
pub fn parse_elm_tsv(tsv: &str) -> Result<Vec<String>, AdapterError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .from_reader(tsv.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str, fallback: usize| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .unwrap_or(fallback)
    };
    let id_col = column("elm_identifier", 0);
    let filtered_col = column("is_filtered", 5);

    let mut seen = HashSet::new();
    let mut motifs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(elm_id) = record.get(id_col).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let filtered = record
            .get(filtered_col)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if filtered {
            continue;
        }

        let class = elm_id.split('_').next().unwrap_or("");
        if ELM_CLASSES.contains(&class) && seen.insert(elm_id.to_string()) {
            motifs.push(elm_id.to_string());
        }
    }

    Ok(motifs)
}

#[async_trait]
impl MotifAdapter for ElmClient {
    fn name(&self) -> &str {
        "elm"
    }

    async fn scan(&self, query: &QuerySequence) -> Result<EvidenceList, AdapterError> {
        if query.len() > ELM_MAX_SEQUENCE_LEN {
            return Err(AdapterError::Rejected(format!(
                "sequence of {} residues exceeds the ELM limit of {}",
                query.len(),
                ELM_MAX_SEQUENCE_LEN
            )));
        }

        let tsv = self.fetch(&query.residues).await?;
        let motifs = parse_elm_tsv(&tsv)?;
        info!(motifs = motifs.len(), "ELM motif scan complete");

        // Motif matches carry no alignment metrics; they score at full identity
        Ok(EvidenceList::from_ids(SourceKind::Motif, motifs, 100.0, 0.0))
    }
}
