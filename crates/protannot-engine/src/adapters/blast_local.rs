//! Local BLAST+ searches
//!
//! Runs `blastp`/`tblastn` as a subprocess per database, feeding the query on
//! stdin and reading XML from stdout. The child is killed if the search
//! future is dropped (timeout or cancellation).

use super::blast_xml::parse_blast_xml;
use super::filter::to_evidence;
use super::{combine_per_db, SeqHomologyAdapter, SeqSearchParams};
use crate::error::AdapterError;
use crate::model::{EvidenceList, SourceKind};
use crate::query::QuerySequence;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Local BLAST+ adapter
#[derive(Debug, Clone, Default)]
pub struct LocalBlast {
    /// Directory holding the BLAST+ executables; `PATH` lookup when unset
    bin_dir: Option<PathBuf>,
}

impl LocalBlast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bin_dir(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: Some(bin_dir.into()),
        }
    }

    fn executable(&self, program: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(program),
            None => PathBuf::from(program),
        }
    }

    /// Build the command line for one database
    pub(crate) fn command(&self, db: &Path, params: &SeqSearchParams) -> Command {
        let mut cmd = Command::new(self.executable(params.program.as_str()));
        cmd.arg("-query")
            .arg("-")
            .arg("-db")
            .arg(db)
            .arg("-evalue")
            .arg(format!("{}", params.max_eval * 100.0))
            .arg("-outfmt")
            .arg("5")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    #[instrument(skip(self, query, params), fields(program = %params.program))]
    async fn search_db(
        &self,
        query: &QuerySequence,
        db: &Path,
        params: &SeqSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        let db_dir = db.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        if !db_dir.is_dir() {
            return Err(AdapterError::Unavailable(format!(
                "database directory '{}' does not exist",
                db_dir.display()
            )));
        }

        let mut child = self.command(db, params).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AdapterError::Unavailable(format!("{} not found on PATH", params.program))
            } else {
                AdapterError::Io(e)
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(query.to_fasta().as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdapterError::Process(format!(
                "{} exited with {}: {}",
                params.program,
                output.status,
                stderr.lines().next().unwrap_or("").trim()
            )));
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let raw = parse_blast_xml(&xml)?;
        debug!(db = %db.display(), hits = raw.len(), "Parsed local BLAST output");

        Ok(to_evidence(SourceKind::SeqLocal, raw, params))
    }
}

#[async_trait]
impl SeqHomologyAdapter for LocalBlast {
    fn name(&self) -> &str {
        "local-blast"
    }

    async fn search(
        &self,
        query: &QuerySequence,
        dbs: &[String],
        params: &SeqSearchParams,
    ) -> Result<EvidenceList, AdapterError> {
        info!(databases = dbs.len(), program = %params.program, "Running local BLAST");

        let mut results = Vec::with_capacity(dbs.len());
        for db in dbs {
            let result = self.search_db(query, Path::new(db), params).await;
            results.push((db.clone(), result));
        }

        combine_per_db(self.name(), SourceKind::SeqLocal, results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::BlastProgram;

    fn params(program: BlastProgram) -> SeqSearchParams {
        SeqSearchParams {
            program,
            k_max: 10,
            max_eval: 1e-5,
            min_identity: 40.0,
            cluster_threshold: 0.9,
        }
    }

    #[test]
    fn test_command_line() {
        let blast = LocalBlast::with_bin_dir("/opt/blast/bin");
        let cmd = blast.command(Path::new("/db/swissprot"), &params(BlastProgram::Tblastn));
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "/opt/blast/bin/tblastn");
        let args: Vec<_> = std_cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..4], &["-query", "-", "-db", "/db/swissprot"]);
        assert_eq!(args[4], "-evalue");
        assert!((args[5].parse::<f64>().unwrap() - 1e-3).abs() < 1e-12);
        assert_eq!(&args[6..], &["-outfmt", "5"]);
    }

    #[tokio::test]
    async fn test_missing_database_directory_is_unavailable() {
        let query = QuerySequence {
            header: "q".to_string(),
            residues: "MKT".to_string(),
        };
        let err = LocalBlast::new()
            .search(&query, &["/nonexistent/dir/swissprot".to_string()], &params(BlastProgram::Blastp))
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Unavailable(_)));
    }
}
