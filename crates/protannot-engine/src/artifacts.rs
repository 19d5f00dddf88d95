//! Run directory artifacts
//!
//! Every stage output is written once, atomically, into the run directory.
//! Identifier lists are one id per line; set-valued TSV columns are joined
//! with `;`.

use crate::decision::SeqMode;
use crate::error::{AnnotError, Result, Stage};
use crate::rank::ResultBundle;
use chrono::{DateTime, Utc};
use protannot_common::fsutil;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SEQ_LOCAL_IDS: &str = "seq_local_ids.txt";
pub const SEQ_REMOTE_IDS: &str = "seq_remote_ids.txt";
pub const SEQ_IDS: &str = "seq_ids.txt";
pub const STRUCTURE_IDS: &str = "structure_ids.txt";
pub const MOTIF_IDS: &str = "motif_ids.txt";
pub const COMBINED_IDS: &str = "combined_ids.txt";
pub const GO_TERMS_JSON: &str = "go_terms.json";
pub const GO_TERMS_TSV: &str = "go_terms.tsv";
pub const RESULT_BUNDLE: &str = "result_bundle.json";
pub const GO_GRAPH_DOT: &str = "go_graph.dot";
pub const RUN_MANIFEST: &str = "run_manifest.json";

/// Header of the tabular rendition
pub const TSV_HEADER: &str = "go_id\taspect\tscore\tsources\tsupporting_ids";

/// Writes artifacts into one run directory and remembers what it wrote
#[derive(Debug)]
pub struct ArtifactWriter {
    dir: PathBuf,
    written: Vec<String>,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names written so far, in order
    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub async fn write_bytes(&mut self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fsutil::write_atomic(&path, data)
            .await
            .map_err(|e| AnnotError::artifact(&path, e))?;
        self.written.push(name.to_string());
        Ok(path)
    }

    pub async fn write_ids<'a>(
        &mut self,
        name: &str,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<PathBuf> {
        let text = format_id_list(ids);
        self.write_bytes(name, text.as_bytes()).await
    }

    pub async fn write_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fsutil::write_json_atomic(&path, value)
            .await
            .map_err(|e| AnnotError::artifact(&path, e))?;
        self.written.push(name.to_string());
        Ok(path)
    }

    /// Record a file written by a collaborator (e.g. a renderer)
    pub fn record(&mut self, path: &Path) {
        let name = path
            .strip_prefix(&self.dir)
            .unwrap_or(path)
            .display()
            .to_string();
        self.written.push(name);
    }
}

/// One id per line, trailing newline
pub fn format_id_list<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(id);
        out.push('\n');
    }
    out
}

/// Parse an identifier list: trimmed lines, blanks ignored, order kept
pub fn parse_id_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a precomputed identifier list. Missing or empty files are input errors.
pub async fn read_id_list(path: &Path, stage: Stage) -> Result<Vec<String>> {
    let input = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AnnotError::input(stage, &input, e.to_string()))?;

    let ids = parse_id_list(&content);
    if ids.is_empty() {
        return Err(AnnotError::input(stage, input, "identifier list is empty"));
    }
    Ok(ids)
}

/// Tabular rendition of a bundle, one row per ranked term
pub fn bundle_to_tsv(bundle: &ResultBundle) -> String {
    let mut out = String::from(TSV_HEADER);
    out.push('\n');
    for term in &bundle.ranked_terms {
        let sources: Vec<&str> = term.contributing_sources.iter().map(|s| s.as_str()).collect();
        let ids: Vec<&str> = term.supporting_ids.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "{}\t{}\t{:.4}\t{}\t{}",
            term.go_id,
            term.aspect,
            term.score,
            sources.join(";"),
            ids.join(";")
        );
    }
    out
}

/// Provenance of one run, written last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// SHA-256 of the query residues
    pub query_sha256: String,
    pub query_header: String,
    pub mode: SeqMode,
    pub fallback_used: bool,
    /// Degraded-run warnings
    pub degraded: Vec<String>,
    pub artifacts: Vec<String>,
    pub term_count: usize,
}

impl RunManifest {
    pub fn new(query_header: impl Into<String>, query_sha256: impl Into<String>, mode: SeqMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            query_sha256: query_sha256.into(),
            query_header: query_header.into(),
            mode,
            fallback_used: false,
            degraded: Vec::new(),
            artifacts: Vec::new(),
            term_count: 0,
        }
    }
}
