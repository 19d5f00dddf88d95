//! GO terms from UniProtKB entries
//!
//! Fetches `{base}/uniprotkb/{accession}.xml` and collects the
//! `dbReference type="GO"` cross-references. The `term` property carries the
//! aspect as a `F:`/`P:`/`C:` prefix; the `evidence` property the ECO code.
//! RefSeq and PDB identifiers are first mapped onto UniProtKB through an
//! [`IdMapper`]; results stay keyed by the identifier as given.

use super::{IdMapper, IdToGoLookup, TermMap, UniProtIdMapper};
use crate::accession::{self, AccessionKind};
use crate::config::EndpointConfig;
use crate::error::LookupError;
use crate::model::{Aspect, GoTermRef};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

/// Concurrent entry requests
const MAX_CONCURRENT_REQUESTS: usize = 4;

#[derive(Clone)]
pub struct UniProtLookup {
    client: Client,
    base_url: String,
    mapper: Arc<dyn IdMapper>,
}

impl UniProtLookup {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, LookupError> {
        let client = Client::builder().timeout(endpoints.http_timeout()).build()?;
        Ok(Self {
            client,
            base_url: endpoints.uniprot_url.trim_end_matches('/').to_string(),
            mapper: Arc::new(UniProtIdMapper::new(endpoints)?),
        })
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn IdMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Pair each identifier with the UniProtKB accession to fetch.
    /// Unrecognized or unmappable identifiers are left out.
    async fn accessions(&self, ids: &[String]) -> Vec<(String, String)> {
        let mut direct = Vec::new();
        let mut foreign = Vec::new();

        for id in ids {
            match accession::normalize(id) {
                Some(acc) if accession::classify(&acc) == Some(AccessionKind::UniProtKb) => {
                    direct.push((id.clone(), acc));
                },
                Some(_) => foreign.push(id.clone()),
                None => debug!(id, "Unrecognized identifier, no GO lookup"),
            }
        }

        if foreign.is_empty() {
            return direct;
        }
        match self.mapper.map_to_uniprot(&foreign).await {
            Ok(mapped) => {
                for id in foreign {
                    match mapped.get(&id) {
                        Some(acc) => direct.push((id, acc.clone())),
                        None => debug!(id, "No UniProtKB mapping, no GO lookup"),
                    }
                }
            },
            Err(e) => warn!(ids = foreign.len(), error = %e, "UniProt id mapping failed, skipping those identifiers"),
        }
        direct
    }

    /// Terms of one entry; `None` when the entry does not exist
    async fn fetch(&self, id: &str, acc: &str) -> Result<Option<Vec<GoTermRef>>, LookupError> {
        let url = format!("{}/uniprotkb/{}.xml", self.base_url, acc);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::OK => {},
            StatusCode::NOT_FOUND => {
                warn!(id, accession = acc, "UniProtKB entry not found");
                return Ok(None);
            },
            status => {
                return Err(LookupError::Status {
                    status: status.as_u16(),
                    id: id.to_string(),
                })
            },
        }

        let xml = response.text().await?;
        let terms = parse_entry_go_terms(&xml)?;
        debug!(id, accession = acc, terms = terms.len(), "Fetched UniProtKB GO terms");
        Ok(Some(terms))
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, LookupError> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| LookupError::malformed("UniProt XML", e.to_string()))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|e| LookupError::malformed("UniProt XML", e.to_string()))
    })
    .transpose()
}

fn go_reference(element: &BytesStart<'_>) -> Result<Option<GoTermRef>, LookupError> {
    if attribute(element, "type")?.as_deref() != Some("GO") {
        return Ok(None);
    }
    Ok(attribute(element, "id")?.map(GoTermRef::bare))
}

/// Extract GO cross-references from a UniProtKB entry document
pub fn parse_entry_go_terms(xml: &str) -> Result<Vec<GoTermRef>, LookupError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut terms = Vec::new();
    let mut current: Option<GoTermRef> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| LookupError::malformed("UniProt XML", e.to_string()))?;

        match event {
            Event::Start(e) if e.name().as_ref() == b"dbReference" => {
                current = go_reference(&e)?;
            },
            // self-closing <dbReference/> has no End event
            Event::Empty(e) if e.name().as_ref() == b"dbReference" => {
                if let Some(go_ref) = go_reference(&e)? {
                    terms.push(go_ref);
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"property" => {
                let Some(go_ref) = current.as_mut() else {
                    continue;
                };
                let kind = attribute(&e, "type")?;
                let value = attribute(&e, "value")?;
                match (kind.as_deref(), value) {
                    (Some("term"), Some(v)) => {
                        go_ref.aspect = v.split_once(':').and_then(|(letter, _)| Aspect::from_letter(letter));
                    },
                    (Some("evidence"), Some(v)) => go_ref.evidence_code = Some(v),
                    _ => {},
                }
            },
            Event::End(e) if e.name().as_ref() == b"dbReference" => {
                if let Some(go_ref) = current.take() {
                    terms.push(go_ref);
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(terms)
}

#[async_trait]
impl IdToGoLookup for UniProtLookup {
    fn name(&self) -> &str {
        "uniprot"
    }

    async fn lookup(&self, ids: &[String]) -> Result<TermMap, LookupError> {
        let accessions = self.accessions(ids).await;
        stream::iter(accessions)
            .map(|(id, acc)| async move {
                let terms = self.fetch(&id, &acc).await?;
                Ok::<_, LookupError>((id, terms))
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .try_filter_map(|(id, terms)| async move { Ok::<_, LookupError>(terms.map(|t| (id, t))) })
            .try_collect()
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ENTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<uniprot xmlns="http://uniprot.org/uniprot">
<entry dataset="Swiss-Prot">
  <accession>P01308</accession>
  <name>INS_HUMAN</name>
  <dbReference type="PDB" id="1A7F">
    <property type="method" value="X-ray"/>
  </dbReference>
  <dbReference type="GO" id="GO:0005576">
    <property type="term" value="C:extracellular region"/>
    <property type="evidence" value="ECO:0000304"/>
    <property type="project" value="Reactome"/>
  </dbReference>
  <dbReference type="GO" id="GO:0005179">
    <property type="term" value="F:hormone activity"/>
    <property type="evidence" value="ECO:0000269"/>
  </dbReference>
  <dbReference type="GO" id="GO:0006006"/>
  <evidence type="ECO:0000269" key="1">
    <source>
      <dbReference type="PubMed" id="123456"/>
    </source>
  </evidence>
</entry>
</uniprot>"#;

    #[test]
    fn test_parse_entry_go_terms() {
        let terms = parse_entry_go_terms(ENTRY).unwrap();
        let ids: Vec<_> = terms.iter().map(|t| t.go_id.as_str()).collect();
        assert_eq!(ids, vec!["GO:0005576", "GO:0005179", "GO:0006006"]);

        assert_eq!(terms[0].aspect, Some(Aspect::CC));
        assert_eq!(terms[1].aspect, Some(Aspect::MF));
        assert_eq!(terms[1].evidence_code.as_deref(), Some("ECO:0000269"));
        assert_eq!(terms[2].aspect, None);
    }

    #[test]
    fn test_entry_without_go() {
        let xml = r#"<uniprot><entry><dbReference type="PDB" id="1A7F"/></entry></uniprot>"#;
        assert!(parse_entry_go_terms(xml).unwrap().is_empty());
    }
}
