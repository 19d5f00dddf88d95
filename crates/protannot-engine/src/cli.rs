//! Command-line surface of the `protannot` binary

use crate::artifacts::{format_id_list, parse_id_list};
use crate::config::{
    BlastProgram, EndpointConfig, LookupSource, PipelineConfig, Precomputed,
};
use crate::error::{AnnotError, Result, Stage};
use crate::merge::merge;
use crate::model::{EvidenceList, SourceKind};
use crate::query::DEFAULT_MAX_LEN;
use clap::{Args, Parser, Subcommand};
use protannot_common::fsutil;
use std::path::{Path, PathBuf};

/// protannot - GO annotation of an unknown protein
#[derive(Parser, Debug)]
#[command(name = "protannot")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate the query protein with ranked GO terms
    Annotate(AnnotateArgs),

    /// Merge two identifier lists; ids of the first list come first
    MergeIds {
        first: PathBuf,
        second: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AnnotateArgs {
    /// Query protein (FASTA)
    #[arg(long)]
    pub fasta: PathBuf,

    /// Run directory
    #[arg(long)]
    pub out: PathBuf,

    /// Local BLAST database path (repeatable)
    #[arg(long)]
    pub local_db: Vec<PathBuf>,

    /// Remote BLAST database name (repeatable)
    #[arg(long)]
    pub remote_db: Vec<String>,

    /// Precomputed sequence homology ids, skips BLAST
    #[arg(long)]
    pub blast_ids: Option<PathBuf>,

    /// Precomputed structure homology ids, skips Foldseek
    #[arg(long)]
    pub structure_ids: Option<PathBuf>,

    /// Precomputed combined ids, skips both homology stages
    #[arg(long)]
    pub combined_ids: Option<PathBuf>,

    /// Foldseek database (repeatable)
    #[arg(long)]
    pub structure_db: Vec<String>,

    #[arg(long)]
    pub seq_kmax: Option<usize>,

    #[arg(long)]
    pub seq_max_eval: Option<f64>,

    #[arg(long)]
    pub seq_min_identity: Option<f64>,

    /// Clustering similarity threshold for BLAST hits
    #[arg(long)]
    pub cluster: Option<f64>,

    /// blastp or tblastn
    #[arg(long)]
    pub program: Option<String>,

    #[arg(long)]
    pub struct_kmax: Option<usize>,

    #[arg(long)]
    pub struct_max_eval: Option<f64>,

    #[arg(long)]
    pub struct_min_identity: Option<f64>,

    /// Motif → GO table (TSV with ELM and GOTerm columns)
    #[arg(long)]
    pub motif_table: Option<PathBuf>,

    /// GO ontology in OBO format
    #[arg(long)]
    pub ontology: Option<PathBuf>,

    /// Local GAF file instead of UniProt
    #[arg(long, conflicts_with = "term_mapping")]
    pub gaf: Option<PathBuf>,

    /// Term-mapping JSON instead of UniProt
    #[arg(long)]
    pub term_mapping: Option<PathBuf>,

    /// Per-adapter timeout
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
    pub max_len: usize,
}

impl AnnotateArgs {
    /// Pipeline configuration; unset flags keep their defaults
    pub fn to_config(&self, endpoints: EndpointConfig) -> PipelineConfig {
        let mut config = PipelineConfig::builder()
            .fasta(&self.fasta)
            .output_dir(&self.out)
            .max_query_len(self.max_len)
            .endpoints(endpoints)
            .precomputed(Precomputed {
                sequence_ids: self.blast_ids.clone(),
                structure_ids: self.structure_ids.clone(),
                combined_ids: self.combined_ids.clone(),
            })
            .build();

        let seq = &mut config.sequence;
        seq.local_dbs.extend(self.local_db.iter().cloned());
        seq.remote_dbs.extend(self.remote_db.iter().cloned());
        if let Some(program) = &self.program {
            seq.program = BlastProgram::parse_or_default(program);
        }
        if let Some(k) = self.seq_kmax {
            seq.k_max = k;
        }
        if let Some(e) = self.seq_max_eval {
            seq.max_eval = e;
        }
        if let Some(identity) = self.seq_min_identity {
            seq.min_identity = identity;
        }
        if let Some(threshold) = self.cluster {
            seq.cluster_threshold = threshold;
        }

        let st = &mut config.structure;
        if !self.structure_db.is_empty() {
            st.dbs = self.structure_db.iter().cloned().collect();
        }
        if let Some(k) = self.struct_kmax {
            st.k_max = k;
        }
        if let Some(e) = self.struct_max_eval {
            st.max_eval = e;
        }
        if let Some(identity) = self.struct_min_identity {
            st.min_identity = identity;
        }

        if let Some(secs) = self.timeout_secs {
            config.sequence.timeout_secs = secs;
            config.structure.timeout_secs = secs;
            config.motif.timeout_secs = secs;
        }

        config.motif.go_table = self.motif_table.clone();
        config.ontology_file = self.ontology.clone();
        config.lookup = match (&self.gaf, &self.term_mapping) {
            (Some(gaf), _) => LookupSource::Gaf(gaf.clone()),
            (None, Some(mapping)) => LookupSource::TermMapping(mapping.clone()),
            (None, None) => LookupSource::UniProt,
        };

        config
    }
}

async fn read_list(path: &Path) -> Result<EvidenceList> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AnnotError::input(Stage::Input, path.display().to_string(), e.to_string()))?;
    // Persisted lists carry ids only
    Ok(EvidenceList::from_ids(SourceKind::SeqLocal, parse_id_list(&content), 0.0, 0.0))
}

/// Merge two persisted id lists into `output`; returns the merged length
pub async fn merge_id_files(first: &Path, second: &Path, output: &Path) -> Result<usize> {
    let merged = merge(&read_list(first).await?, &read_list(second).await?);
    fsutil::write_atomic(output, format_id_list(merged.ids()).as_bytes())
        .await
        .map_err(|e| AnnotError::artifact(output, e))?;
    Ok(merged.len())
}
