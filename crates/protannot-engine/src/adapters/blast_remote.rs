//! NCBI BLAST URL API client
//!
//! Three calls per database: `CMD=Put` submits the query and returns a
//! request id (RID), `FORMAT_OBJECT=SearchInfo` is polled until the search
//! is ready, then `FORMAT_TYPE=XML` fetches the report.

use super::blast_xml::parse_blast_xml;
use super::filter::to_evidence;
use super::{combine_per_db, SeqHomologyAdapter, SeqSearchParams};
use crate::config::EndpointConfig;
use crate::error::AdapterError;
use crate::model::{EvidenceList, SourceKind};
use crate::query::QuerySequence;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Status reported by `FORMAT_OBJECT=SearchInfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Waiting,
    /// Ready; `false` when the search produced no hits
    Ready { has_hits: bool },
    Failed,
    Unknown,
}

fn info_patterns() -> &'static (Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            compile(r"RID = (\S+)"),
            compile(r"Status=(\w+)"),
            compile(r"ThereAreHits=(\w+)"),
        )
    })
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static BLAST info pattern")
}

/// Extract the request id from a `CMD=Put` response page
pub fn parse_rid(page: &str) -> Option<String> {
    info_patterns()
        .0
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse a `SearchInfo` page
pub fn parse_search_status(page: &str) -> Option<SearchStatus> {
    let (_, status, hits) = info_patterns();
    let status = status.captures(page)?.get(1)?.as_str();
    Some(match status {
        "WAITING" => SearchStatus::Waiting,
        "READY" => SearchStatus::Ready {
            has_hits: hits
                .captures(page)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str() == "yes")
                .unwrap_or(true),
        },
        "FAILED" => SearchStatus::Failed,
        _ => SearchStatus::Unknown,
    })
}

/// Remote BLAST adapter
#[derive(Debug, Clone)]
pub struct RemoteBlast {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl RemoteBlast {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, AdapterError> {
        let client = Client::builder().timeout(endpoints.http_timeout()).build()?;
        Ok(Self {
            client,
            base_url: endpoints.blast_url.clone(),
            poll_interval: endpoints.poll_interval(),
            max_polls: endpoints.max_polls,
        })
    }

    async fn get_text(&self, query: &[(&str, &str)]) -> Result<String, AdapterError> {
        let response = self.client.get(&self.base_url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                url: self.base_url.clone(),
            });
        }
        Ok(response.text().await?)
    }

    async fn submit(
        &self,
        query: &QuerySequence,
        db: &str,
        params: &SeqSearchParams,
    ) -> Result<String, AdapterError> {
        let fasta = query.to_fasta();
        let response = self
            .client
            .post(&self.base_url)
            .form(&[
                ("CMD", "Put"),
                ("PROGRAM", params.program.as_str()),
                ("DATABASE", db),
                ("QUERY", fasta.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                url: self.base_url.clone(),
            });
        }

        let page = response.text().await?;
        parse_rid(&page).ok_or_else(|| AdapterError::Malformed("no RID in submission response".to_string()))
    }

    /// Poll until ready; returns whether the search has hits
    async fn wait_ready(&self, rid: &str) -> Result<bool, AdapterError> {
        for attempt in 1..=self.max_polls {
            let page = self
                .get_text(&[("CMD", "Get"), ("FORMAT_OBJECT", "SearchInfo"), ("RID", rid)])
                .await?;

            match parse_search_status(&page) {
                Some(SearchStatus::Ready { has_hits }) => return Ok(has_hits),
                Some(SearchStatus::Waiting) => {
                    debug!(rid, attempt, "BLAST search still running");
                    tokio::time::sleep(self.poll_interval).await;
                },
                Some(SearchStatus::Failed) => {
                    return Err(AdapterError::Process(format!("BLAST search {} failed", rid)))
                },
                Some(SearchStatus::Unknown) => {
                    return Err(AdapterError::Process(format!("BLAST search {} expired or unknown", rid)))
                },
                None => {
                    return Err(AdapterError::Malformed("SearchInfo page without Status".to_string()))
                },
            }
        }

        Err(AdapterError::Unavailable(format!(
            "BLAST search {} not ready after {} polls",
            rid, self.max_polls
        )))
    }

    #[instrument(skip(self, query, params))]
    async fn search_db(
        &self,
        query: &QuerySequence,
        db: &str,
        params: &SeqSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        let rid = self.submit(query, db, params).await?;
        info!(rid = %rid, "Submitted remote BLAST search");

        if !self.wait_ready(&rid).await? {
            info!(rid = %rid, "Remote BLAST search returned no hits");
            return Ok(EvidenceList::empty());
        }

        let xml = self
            .get_text(&[("CMD", "Get"), ("FORMAT_TYPE", "XML"), ("RID", rid.as_str())])
            .await?;
        let raw = parse_blast_xml(&xml)?;
        debug!(rid = %rid, hits = raw.len(), "Parsed remote BLAST report");

        Ok(to_evidence(SourceKind::SeqRemote, raw, params))
    }
}

#[async_trait]
impl SeqHomologyAdapter for RemoteBlast {
    fn name(&self) -> &str {
        "remote-blast"
    }

    async fn search(
        &self,
        query: &QuerySequence,
        dbs: &[String],
        params: &SeqSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        info!(databases = ?dbs, program = %params.program, "Running remote BLAST");

        let mut results = Vec::with_capacity(dbs.len());
        for db in dbs {
            let result = self.search_db(query, db, params).await;
            results.push((db.clone(), result));
        }

        combine_per_db(self.name(), SourceKind::SeqRemote, results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rid() {
        let page = "<!--QBlastInfoBegin\n    RID = 8XK2ABCD016\n    RTOE = 24\nQBlastInfoEnd\n-->";
        assert_eq!(parse_rid(page).as_deref(), Some("8XK2ABCD016"));
        assert_eq!(parse_rid("<html></html>"), None);
    }

    #[test]
    fn test_parse_search_status() {
        assert_eq!(
            parse_search_status("QBlastInfoBegin\n\tStatus=WAITING\nQBlastInfoEnd"),
            Some(SearchStatus::Waiting)
        );
        assert_eq!(
            parse_search_status("Status=READY\nQBlastInfoEnd\nThereAreHits=yes"),
            Some(SearchStatus::Ready { has_hits: true })
        );
        assert_eq!(
            parse_search_status("Status=READY\nThereAreHits=no"),
            Some(SearchStatus::Ready { has_hits: false })
        );
        assert_eq!(parse_search_status("Status=FAILED"), Some(SearchStatus::Failed));
        assert_eq!(parse_search_status("Status=UNKNOWN"), Some(SearchStatus::Unknown));
        assert_eq!(parse_search_status("nothing here"), None);
    }
}
