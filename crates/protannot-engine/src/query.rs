//! Query protein input
//!
//! The engine annotates one protein: the first FASTA record whose residues
//! are all standard amino acids and whose length fits the configured
//! maximum. Structure prediction upstream caps useful lengths, hence the
//! default of 400 residues.

use crate::error::{AnnotError, Result, Stage};
use std::path::Path;

/// Standard single-letter amino acid codes
pub const AMINO_ACIDS: &str = "ACDEFGHIKLMNPQRSTVWY";

/// Default maximum query length
pub const DEFAULT_MAX_LEN: usize = 400;

/// Validated query protein
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySequence {
    pub header: String,
    pub residues: String,
}

impl QuerySequence {
    /// Read and validate the query from a FASTA file
    pub async fn load(path: impl AsRef<Path>, max_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let input = path.display().to_string();

        if !path.is_file() {
            return Err(AnnotError::input(Stage::Input, input, "file does not exist"));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AnnotError::input(Stage::Input, &input, e.to_string()))?;

        Self::parse(&content, max_len).map_err(|reason| AnnotError::input(Stage::Input, input, reason))
    }

    /// First valid record of `content`
    pub fn parse(content: &str, max_len: usize) -> std::result::Result<Self, String> {
        if max_len == 0 {
            return Err("max_len must be greater than 0".to_string());
        }

        let mut records = Vec::new();
        let mut header: Option<String> = None;
        let mut residues = String::new();

        for line in content.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix('>') {
                if let Some(h) = header.take() {
                    records.push((h, std::mem::take(&mut residues)));
                }
                header = Some(rest.trim().to_string());
            } else if !line.is_empty() && header.is_some() {
                residues.push_str(line);
            }
        }
        if let Some(h) = header {
            records.push((h, residues));
        }

        if records.is_empty() {
            return Err("no FASTA records found".to_string());
        }

        records
            .into_iter()
            .map(|(header, residues)| (header, residues.to_ascii_uppercase()))
            .find(|(_, residues)| Self::is_valid(residues, max_len))
            .map(|(header, residues)| QuerySequence { header, residues })
            .ok_or_else(|| format!("no valid protein sequence found (max_len={})", max_len))
    }

    fn is_valid(residues: &str, max_len: usize) -> bool {
        !residues.is_empty()
            && residues.len() <= max_len
            && residues.chars().all(|c| AMINO_ACIDS.contains(c))
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Single-record FASTA text, 60 residues per line
    pub fn to_fasta(&self) -> String {
        let mut out = format!(">{}\n", self.header);
        for chunk in self.residues.as_bytes().chunks(60) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_valid_record() {
        let fasta = ">bad\nMKTXXB\n>ins\nMALWMRLLPL\nLALLALWGPD\n";
        let q = QuerySequence::parse(fasta, 400).unwrap();
        assert_eq!(q.header, "ins");
        assert_eq!(q.residues, "MALWMRLLPLLALLALWGPD");
    }

    #[test]
    fn test_parse_lowercase_is_accepted() {
        let q = QuerySequence::parse(">q\nmktayiakqr\n", 400).unwrap();
        assert_eq!(q.residues, "MKTAYIAKQR");
    }

    #[test]
    fn test_parse_rejects_oversized() {
        let fasta = format!(">long\n{}\n", "A".repeat(401));
        assert!(QuerySequence::parse(&fasta, 400).is_err());
        assert!(QuerySequence::parse(&fasta, 500).is_ok());
    }

    #[test]
    fn test_parse_rejects_empty_and_zero_max_len() {
        assert!(QuerySequence::parse("", 400).is_err());
        assert!(QuerySequence::parse(">q\n", 400).is_err());
        assert!(QuerySequence::parse(">q\nMKT\n", 0).is_err());
    }

    #[test]
    fn test_to_fasta_wraps() {
        let q = QuerySequence {
            header: "q".to_string(),
            residues: "A".repeat(61),
        };
        assert_eq!(q.to_fasta(), format!(">q\n{}\nA\n", "A".repeat(60)));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_input_error() {
        let err = QuerySequence::load("/nonexistent/query.fasta", 400).await.unwrap_err();
        assert!(matches!(err, AnnotError::Input { stage: Stage::Input, .. }));
    }
}
