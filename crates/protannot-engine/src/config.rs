// Pipeline configuration
//
// One immutable `PipelineConfig` describes a run: where the query and the
// run directory live, which precomputed result files replace which stages,
// per-source thresholds, and the endpoints of the remote collaborators.

use crate::query::DEFAULT_MAX_LEN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Database used when no sequence-homology database was supplied
pub const DEFAULT_REMOTE_DB: &str = "swissprot";

/// Foldseek databases the structure adapter accepts
pub const FOLDSEEK_DBS: [&str; 3] = ["afdb50", "afdb-swissprot", "afdb-proteome"];

/// Default Foldseek database
pub const DEFAULT_FOLDSEEK_DB: &str = "afdb50";

// ============================================================================
// BLAST program
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlastProgram {
    #[default]
    Blastp,
    Tblastn,
}

impl BlastProgram {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlastProgram::Blastp => "blastp",
            BlastProgram::Tblastn => "tblastn",
        }
    }

    /// Parse a program name, falling back to `blastp` for anything unknown
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "blastp" => BlastProgram::Blastp,
            "tblastn" => BlastProgram::Tblastn,
            other => {
                tracing::warn!(program = other, "Invalid BLAST program, using blastp");
                BlastProgram::Blastp
            },
        }
    }
}

impl std::fmt::Display for BlastProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Per-source configuration
// ============================================================================

/// Sequence-homology search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeqHomologyConfig {
    /// Local BLAST database paths (without extension)
    pub local_dbs: BTreeSet<PathBuf>,
    /// Remote (NCBI) database names
    pub remote_dbs: BTreeSet<String>,
    pub program: BlastProgram,
    /// Hits at rank >= k_max are dropped
    pub k_max: usize,
    pub max_eval: f64,
    /// Minimum percent identity
    pub min_identity: f64,
    /// Clustering similarity threshold in (0, 1]
    pub cluster_threshold: f64,
    pub timeout_secs: u64,
}

impl Default for SeqHomologyConfig {
    fn default() -> Self {
        Self {
            local_dbs: BTreeSet::new(),
            remote_dbs: BTreeSet::new(),
            program: BlastProgram::Blastp,
            k_max: 10,
            max_eval: 1e-5,
            min_identity: 40.0,
            cluster_threshold: 0.9,
            timeout_secs: 900,
        }
    }
}

/// Structure-homology search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructHomologyConfig {
    pub dbs: BTreeSet<String>,
    pub max_eval: f64,
    pub min_identity: f64,
    pub k_max: usize,
    pub timeout_secs: u64,
}

impl Default for StructHomologyConfig {
    fn default() -> Self {
        Self {
            dbs: BTreeSet::from([DEFAULT_FOLDSEEK_DB.to_string()]),
            max_eval: 10.0,
            min_identity: 60.0,
            k_max: 10,
            timeout_secs: 900,
        }
    }
}

/// Motif fallback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotifConfig {
    /// Motif → GO mapping table (TSV with `ELM` and `GOTerm` columns)
    pub go_table: Option<PathBuf>,
    /// Attempts on HTTP 429 before giving up
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for MotifConfig {
    fn default() -> Self {
        Self {
            go_table: None,
            max_attempts: 5,
            retry_delay_secs: 60,
            timeout_secs: 600,
        }
    }
}

/// Precomputed result files that replace stages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Precomputed {
    /// Replaces the sequence-homology stage
    pub sequence_ids: Option<PathBuf>,
    /// Replaces the structure-homology stage
    pub structure_ids: Option<PathBuf>,
    /// Replaces both homology stages
    pub combined_ids: Option<PathBuf>,
}

/// Where identifier → GO terms come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum LookupSource {
    /// UniProtKB REST entries
    #[default]
    UniProt,
    /// Local GAF annotation file
    Gaf(PathBuf),
    /// Persisted term-mapping JSON (`id -> [GO id]`)
    TermMapping(PathBuf),
}

// ============================================================================
// Remote endpoints
// ============================================================================

/// Base URLs and polling budget for the remote collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub blast_url: String,
    pub esmfold_url: String,
    pub foldseek_url: String,
    pub elm_url: String,
    pub uniprot_url: String,
    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,
    /// Delay between job status polls
    pub poll_interval_secs: u64,
    /// Status polls before a remote job counts as failed
    pub max_polls: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            blast_url: "https://blast.ncbi.nlm.nih.gov/Blast.cgi".to_string(),
            esmfold_url: "https://api.esmatlas.com/foldSequence/v1/pdb/".to_string(),
            foldseek_url: "https://search.foldseek.com/api".to_string(),
            elm_url: "http://elm.eu.org".to_string(),
            uniprot_url: "https://rest.uniprot.org".to_string(),
            http_timeout_secs: 120,
            poll_interval_secs: 5,
            max_polls: 100,
        }
    }
}

impl EndpointConfig {
    /// Load endpoints from environment variables, defaults otherwise
    pub fn from_env() -> Self {
        let default = Self::default();
        EndpointConfig {
            blast_url: std::env::var("PROTANNOT_BLAST_URL").unwrap_or(default.blast_url),
            esmfold_url: std::env::var("PROTANNOT_ESMFOLD_URL").unwrap_or(default.esmfold_url),
            foldseek_url: std::env::var("PROTANNOT_FOLDSEEK_URL").unwrap_or(default.foldseek_url),
            elm_url: std::env::var("PROTANNOT_ELM_URL").unwrap_or(default.elm_url),
            uniprot_url: std::env::var("PROTANNOT_UNIPROT_URL").unwrap_or(default.uniprot_url),
            http_timeout_secs: std::env::var("PROTANNOT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.http_timeout_secs),
            poll_interval_secs: std::env::var("PROTANNOT_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.poll_interval_secs),
            max_polls: std::env::var("PROTANNOT_MAX_POLLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_polls),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// ============================================================================
// Pipeline configuration
// ============================================================================

/// Complete description of one annotation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub fasta: PathBuf,
    pub output_dir: PathBuf,
    pub max_query_len: usize,
    pub sequence: SeqHomologyConfig,
    pub structure: StructHomologyConfig,
    pub motif: MotifConfig,
    pub precomputed: Precomputed,
    pub lookup: LookupSource,
    /// go-basic.obo; used for aspects, alt ids, obsolete terms and rendering
    pub ontology_file: Option<PathBuf>,
    pub endpoints: EndpointConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fasta: PathBuf::from("query.fasta"),
            output_dir: PathBuf::from("results"),
            max_query_len: DEFAULT_MAX_LEN,
            sequence: SeqHomologyConfig::default(),
            structure: StructHomologyConfig::default(),
            motif: MotifConfig::default(),
            precomputed: Precomputed::default(),
            lookup: LookupSource::default(),
            ontology_file: None,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate thresholds and budgets
    pub fn validate(&self) -> Result<(), String> {
        if self.max_query_len == 0 {
            return Err("max_query_len must be greater than 0".to_string());
        }

        let seq = &self.sequence;
        if seq.k_max == 0 {
            return Err("sequence k_max must be greater than 0".to_string());
        }
        if !(seq.max_eval > 0.0) {
            return Err(format!("sequence max_eval must be positive, got {}", seq.max_eval));
        }
        if !(0.0..=100.0).contains(&seq.min_identity) {
            return Err(format!("sequence min_identity must be within 0-100, got {}", seq.min_identity));
        }
        if !(seq.cluster_threshold > 0.0 && seq.cluster_threshold <= 1.0) {
            return Err(format!(
                "cluster threshold must be within (0, 1], got {}",
                seq.cluster_threshold
            ));
        }

        let st = &self.structure;
        if st.k_max == 0 {
            return Err("structure k_max must be greater than 0".to_string());
        }
        if !(st.max_eval > 0.0) {
            return Err(format!("structure max_eval must be positive, got {}", st.max_eval));
        }
        if !(0.0..=100.0).contains(&st.min_identity) {
            return Err(format!("structure min_identity must be within 0-100, got {}", st.min_identity));
        }

        if seq.timeout_secs == 0 || st.timeout_secs == 0 || self.motif.timeout_secs == 0 {
            return Err("adapter timeouts must be greater than 0".to_string());
        }
        if self.motif.max_attempts == 0 {
            return Err("motif max_attempts must be greater than 0".to_string());
        }
        if self.endpoints.max_polls == 0 {
            return Err("max_polls must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn fasta(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.fasta = path.into();
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    pub fn max_query_len(mut self, max_len: usize) -> Self {
        self.config.max_query_len = max_len;
        self
    }

    pub fn local_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sequence.local_dbs.insert(path.into());
        self
    }

    pub fn remote_db(mut self, name: impl Into<String>) -> Self {
        self.config.sequence.remote_dbs.insert(name.into());
        self
    }

    pub fn sequence(mut self, sequence: SeqHomologyConfig) -> Self {
        self.config.sequence = sequence;
        self
    }

    pub fn structure(mut self, structure: StructHomologyConfig) -> Self {
        self.config.structure = structure;
        self
    }

    pub fn motif(mut self, motif: MotifConfig) -> Self {
        self.config.motif = motif;
        self
    }

    pub fn motif_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.motif.go_table = Some(path.into());
        self
    }

    pub fn precomputed(mut self, precomputed: Precomputed) -> Self {
        self.config.precomputed = precomputed;
        self
    }

    pub fn lookup(mut self, lookup: LookupSource) -> Self {
        self.config.lookup = lookup;
        self
    }

    pub fn ontology_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ontology_file = Some(path.into());
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
