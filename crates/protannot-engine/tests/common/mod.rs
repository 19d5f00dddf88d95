//! Shared fixtures for pipeline integration tests
//!
//! Scripted collaborators stand in for BLAST, Foldseek and ELM so that every
//! branch of the fallback logic can be driven without network or binaries.
//! Each fake records how it was called.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use protannot_engine::adapters::{
    MotifAdapter, SeqHomologyAdapter, SeqSearchParams, StructHomologyAdapter, StructSearchParams,
};
use protannot_engine::config::{PipelineConfig, PipelineConfigBuilder};
use protannot_engine::lookup::{IdToGoLookup, TermMap, TermMappingLookup};
use protannot_engine::ontology::Ontology;
use protannot_engine::query::QuerySequence;
use protannot_engine::render::DotRenderer;
use protannot_engine::{
    AdapterError, Collaborators, EvidenceList, LookupError, Pipeline, RunContext, RunOutcome,
    SourceKind,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const QUERY_FASTA: &str = ">sp|P01308|INS_HUMAN Insulin\n\
MALWMRLLPLLALLALWGPDPAAAFVNQHLCGSHLVEALYLVCGERGFFYTPKTRRGREDLQVGQVELGGGPGAGSLQPLALEGSLQKRGIVEQCCTSICSLYQLENYCN\n";

pub const ONTOLOGY: &str = "format-version: 1.2\n\n\
[Term]\nid: GO:0003674\nname: molecular_function\nnamespace: molecular_function\n\n\
[Term]\nid: GO:0008150\nname: biological_process\nnamespace: biological_process\n\n\
[Term]\nid: GO:0005575\nname: cellular_component\nnamespace: cellular_component\n\n\
[Term]\nid: GO:0005179\nname: hormone activity\nnamespace: molecular_function\nis_a: GO:0003674 ! molecular_function\n\n\
[Term]\nid: GO:0005515\nname: protein binding\nnamespace: molecular_function\nis_a: GO:0003674 ! molecular_function\n\n\
[Term]\nid: GO:0006006\nname: glucose metabolic process\nnamespace: biological_process\nis_a: GO:0008150 ! biological_process\n\n\
[Term]\nid: GO:0042593\nname: glucose homeostasis\nnamespace: biological_process\nis_a: GO:0008150 ! biological_process\n\n\
[Term]\nid: GO:0005576\nname: extracellular region\nnamespace: cellular_component\nis_a: GO:0005575 ! cellular_component\n";

/// P01308, P01315, P01317 are sequence hits; P01325 is a structure hit
pub fn protein_terms() -> TermMappingLookup {
    TermMappingLookup::from_map(BTreeMap::from([
        ("P01308".to_string(), vec!["GO:0005179".to_string()]),
        ("P01315".to_string(), vec!["GO:0006006".to_string()]),
        ("P01317".to_string(), vec!["GO:0005576".to_string()]),
        ("P01325".to_string(), vec!["GO:0042593".to_string()]),
    ]))
}

pub const MOTIF: &str = "LIG_SH3_3";

pub fn motif_terms() -> TermMappingLookup {
    TermMappingLookup::from_map(BTreeMap::from([(
        MOTIF.to_string(),
        vec!["GO:0005515".to_string()],
    )]))
}

/// What a scripted adapter does when called
#[derive(Debug, Clone)]
pub enum Behavior {
    Hits(Vec<(String, f64)>),
    Fail(String),
    /// Never answers within any test timeout
    Hang,
}

impl Behavior {
    pub fn hits(hits: &[(&str, f64)]) -> Self {
        Behavior::Hits(hits.iter().map(|(id, pct)| (id.to_string(), *pct)).collect())
    }

    pub fn empty() -> Self {
        Behavior::Hits(Vec::new())
    }

    pub fn fail() -> Self {
        Behavior::Fail("service unavailable".to_string())
    }

    async fn produce(&self, source: SourceKind) -> Result<EvidenceList, AdapterError> {
        match self {
            Behavior::Hits(hits) => Ok(EvidenceList::from_ranked(
                source,
                hits.iter().map(|(id, pct)| (id.clone(), *pct, 1e-20)),
            )),
            Behavior::Fail(reason) => Err(AdapterError::Unavailable(reason.clone())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(EvidenceList::empty())
            },
        }
    }
}

pub struct FakeSeqAdapter {
    name: &'static str,
    source: SourceKind,
    behavior: Behavior,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeSeqAdapter {
    pub fn new(name: &'static str, source: SourceKind, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            source,
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Databases passed on each call
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeqHomologyAdapter for FakeSeqAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(
        &self,
        _query: &QuerySequence,
        dbs: &[String],
        _params: &SeqSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        self.calls.lock().unwrap().push(dbs.to_vec());
        self.behavior.produce(self.source).await
    }
}

pub struct FakeStructAdapter {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeStructAdapter {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructHomologyAdapter for FakeStructAdapter {
    fn name(&self) -> &str {
        "fake-foldseek"
    }

    async fn search(
        &self,
        _query: &QuerySequence,
        _dbs: &[String],
        _params: &StructSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behavior.produce(SourceKind::Structure).await
    }
}

pub struct FakeMotifAdapter {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeMotifAdapter {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MotifAdapter for FakeMotifAdapter {
    fn name(&self) -> &str {
        "fake-elm"
    }

    async fn scan(&self, _query: &QuerySequence) -> Result<EvidenceList, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behavior.produce(SourceKind::Motif).await
    }
}

/// Lookup that always fails
pub struct BrokenLookup;

#[async_trait]
impl IdToGoLookup for BrokenLookup {
    fn name(&self) -> &str {
        "broken"
    }

    async fn lookup(&self, _ids: &[String]) -> Result<TermMap, LookupError> {
        Err(LookupError::malformed("lookup response", "connection reset"))
    }
}

/// One temporary run: query file, fakes, run directory
pub struct Harness {
    pub dir: TempDir,
    pub local: Arc<FakeSeqAdapter>,
    pub remote: Arc<FakeSeqAdapter>,
    pub structure: Arc<FakeStructAdapter>,
    pub motif: Arc<FakeMotifAdapter>,
    pub protein_lookup: Arc<dyn IdToGoLookup>,
    pub motif_lookup: Option<Arc<dyn IdToGoLookup>>,
}

impl Harness {
    pub fn new(local: Behavior, remote: Behavior, structure: Behavior, motif: Behavior) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("query.fasta"), QUERY_FASTA).unwrap();

        Self {
            dir,
            local: FakeSeqAdapter::new("fake-local-blast", SourceKind::SeqLocal, local),
            remote: FakeSeqAdapter::new("fake-remote-blast", SourceKind::SeqRemote, remote),
            structure: FakeStructAdapter::new(structure),
            motif: FakeMotifAdapter::new(motif),
            protein_lookup: Arc::new(protein_terms()),
            motif_lookup: Some(Arc::new(motif_terms())),
        }
    }

    pub fn without_motif_table(mut self) -> Self {
        self.motif_lookup = None;
        self
    }

    pub fn with_protein_lookup(mut self, lookup: Arc<dyn IdToGoLookup>) -> Self {
        self.protein_lookup = lookup;
        self
    }

    pub fn run_dir(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write an input file next to the query
    pub fn input_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn artifact(&self, name: &str) -> String {
        std::fs::read_to_string(self.run_dir().join(name)).unwrap()
    }

    pub fn has_artifact(&self, name: &str) -> bool {
        self.run_dir().join(name).exists()
    }

    pub fn config(&self) -> PipelineConfigBuilder {
        PipelineConfig::builder()
            .fasta(self.path("query.fasta"))
            .output_dir(self.run_dir())
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            local_blast: self.local.clone(),
            remote_blast: self.remote.clone(),
            structure: self.structure.clone(),
            motif: self.motif.clone(),
            protein_lookup: self.protein_lookup.clone(),
            motif_lookup: self.motif_lookup.clone(),
            ontology: Arc::new(Ontology::parse(ONTOLOGY)),
            renderer: Arc::new(DotRenderer::new()),
        }
    }

    pub async fn run(&self, config: PipelineConfig) -> protannot_engine::Result<RunOutcome> {
        self.run_with_cancel(config, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> protannot_engine::Result<RunOutcome> {
        let ctx = RunContext::prepare(config, cancel).await?;
        Pipeline::new(self.collaborators()).run(&ctx).await
    }
}
