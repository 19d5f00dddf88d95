//! Protein accession classification and normalization
//!
//! Adapters report identifiers in whatever form the upstream tool emits:
//! bare UniProt accessions, `sp|P01308|INS_HUMAN` FASTA headers, AlphaFold
//! model names (`AF-P01308-F1-model_v4`), RefSeq proteins, PDB chains.
//! [`normalize`] maps them onto one canonical spelling so the merge step
//! deduplicates across sources.

use regex::Regex;
use std::sync::OnceLock;

/// Database an accession belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessionKind {
    UniProtKb,
    RefSeqProtein,
    Pdb,
}

struct Patterns {
    uniprot: Regex,
    refseq: Regex,
    pdb: Regex,
    alphafold: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        uniprot: compile(
            r"^([A-NR-Z][0-9][A-Z0-9]{3}[0-9]|[OPQ][0-9][A-Z0-9]{3}[0-9]|A0A[A-Z0-9]{7})$",
        ),
        refseq: compile(r"^(XP|WP|YP|NP|ZP)_[0-9]+(\.[0-9]+)?$"),
        pdb: compile(r"^[0-9][A-Za-z0-9]{3}(_[A-Za-z0-9]+)?$"),
        alphafold: compile(r"^AF-([A-Z0-9]+)-F[0-9]+"),
    })
}

// Patterns are literals; a failure here is a bug caught by the unit tests.
#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static accession pattern")
}

/// Classify a bare accession
pub fn classify(id: &str) -> Option<AccessionKind> {
    let p = patterns();
    if p.uniprot.is_match(id) {
        Some(AccessionKind::UniProtKb)
    } else if p.refseq.is_match(id) {
        Some(AccessionKind::RefSeqProtein)
    } else if p.pdb.is_match(id) {
        Some(AccessionKind::Pdb)
    } else {
        None
    }
}

/// Canonical form of a raw identifier, or `None` when it is unrecognizable
pub fn normalize(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(caps) = patterns().alphafold.captures(raw) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    // sp|P01308|INS_HUMAN, tr|A0A0...|..., ref|NP_000198.1|
    let candidate = match raw.split('|').collect::<Vec<_>>().as_slice() {
        [db, acc, ..] if matches!(*db, "sp" | "tr" | "ref" | "pdb") && !acc.is_empty() => *acc,
        _ => raw,
    };

    // UniProt isoforms (P01308-2) collapse onto the canonical entry
    let candidate = match candidate.split_once('-') {
        Some((base, iso)) if iso.chars().all(|c| c.is_ascii_digit()) => base,
        _ => candidate,
    };

    match classify(candidate)? {
        AccessionKind::Pdb => {
            let code = candidate.split('_').next().unwrap_or(candidate);
            Some(code.to_ascii_uppercase())
        },
        _ => Some(candidate.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("P01308"), Some(AccessionKind::UniProtKb));
        assert_eq!(classify("A0A024RBG1"), Some(AccessionKind::UniProtKb));
        assert_eq!(classify("NP_000198.1"), Some(AccessionKind::RefSeqProtein));
        assert_eq!(classify("4INS_A"), Some(AccessionKind::Pdb));
        assert_eq!(classify("not-an-id"), None);
    }

    #[test]
    fn test_normalize_wrappers() {
        assert_eq!(normalize("sp|P01308|INS_HUMAN").as_deref(), Some("P01308"));
        assert_eq!(normalize("AF-P01308-F1-model_v4").as_deref(), Some("P01308"));
        assert_eq!(normalize("P01308-2").as_deref(), Some("P01308"));
        assert_eq!(normalize("4ins_b").as_deref(), Some("4INS"));
        assert_eq!(normalize(" Q9Y263 ").as_deref(), Some("Q9Y263"));
        assert_eq!(normalize("ref|NP_000198.1|").as_deref(), Some("NP_000198.1"));
    }

    #[test]
    fn test_normalize_rejects_unknown() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("hello world"), None);
    }
}
