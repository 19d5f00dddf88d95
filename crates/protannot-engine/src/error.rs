//! Error types for the annotation engine
//!
//! [`AnnotError`] is what a run returns to its caller. Its `Display` output is
//! the single-line diagnosis shown to users: it names the failing stage and
//! the offending input. Adapter and lookup collaborators report their own
//! narrower errors ([`AdapterError`], [`LookupError`]), which the engine wraps
//! with stage context.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AnnotError>;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Input,
    SequenceHomology,
    StructureHomology,
    MotifFallback,
    Combine,
    GoLookup,
    Ranking,
    Render,
    Artifacts,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::SequenceHomology => "sequence-homology",
            Stage::StructureHomology => "structure-homology",
            Stage::MotifFallback => "motif-fallback",
            Stage::Combine => "combine",
            Stage::GoLookup => "go-lookup",
            Stage::Ranking => "ranking",
            Stage::Render => "render",
            Stage::Artifacts => "artifacts",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one evidence source adapter invocation
///
/// Emptiness is not an error: an adapter that ran and found nothing returns
/// an empty list.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("process failed: {0}")]
    Process(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("rejected input: {0}")]
    Rejected(String),
}

impl From<csv::Error> for AdapterError {
    fn from(err: csv::Error) -> Self {
        AdapterError::Malformed(err.to_string())
    }
}

impl From<quick_xml::Error> for AdapterError {
    fn from(err: quick_xml::Error) -> Self {
        AdapterError::Malformed(err.to_string())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Malformed(err.to_string())
    }
}

/// Failure of an identifier → GO lookup
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for '{id}'")]
    Status { status: u16, id: String },

    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LookupError {
    pub fn malformed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        LookupError::Malformed {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

/// Fatal engine error
#[derive(Error, Debug)]
pub enum AnnotError {
    #[error("[{stage}] invalid input '{input}': {reason}")]
    Input {
        stage: Stage,
        input: String,
        reason: String,
    },

    #[error("[{stage}] {adapter} failed: {source}")]
    AdapterFailure {
        stage: Stage,
        adapter: String,
        #[source]
        source: AdapterError,
    },

    #[error("[{stage}] no evidence for the query protein: {detail}")]
    NoEvidence { stage: Stage, detail: String },

    #[error("[{stage}] GO lookup failed for '{input}': {reason}")]
    OntologyLookup {
        stage: Stage,
        input: String,
        reason: String,
    },

    #[error("[{stage}] run cancelled")]
    Cancelled { stage: Stage },

    #[error("[{stage}] could not write '{path}': {reason}")]
    Artifact {
        stage: Stage,
        path: String,
        reason: String,
    },

    #[error("[{stage}] illegal engine transition: {detail}")]
    Transition { stage: Stage, detail: String },
}

impl AnnotError {
    pub fn input(stage: Stage, input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Input {
            stage,
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn adapter(stage: Stage, adapter: impl Into<String>, source: AdapterError) -> Self {
        match source {
            AdapterError::Cancelled => Self::Cancelled { stage },
            source => Self::AdapterFailure {
                stage,
                adapter: adapter.into(),
                source,
            },
        }
    }

    pub fn no_evidence(stage: Stage, detail: impl Into<String>) -> Self {
        Self::NoEvidence {
            stage,
            detail: detail.into(),
        }
    }

    pub fn lookup(stage: Stage, input: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::OntologyLookup {
            stage,
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    pub fn artifact(path: impl AsRef<std::path::Path>, reason: impl std::fmt::Display) -> Self {
        Self::Artifact {
            stage: Stage::Artifacts,
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stage the error is attributed to
    pub fn stage(&self) -> Stage {
        match self {
            Self::Input { stage, .. }
            | Self::AdapterFailure { stage, .. }
            | Self::NoEvidence { stage, .. }
            | Self::OntologyLookup { stage, .. }
            | Self::Cancelled { stage }
            | Self::Artifact { stage, .. }
            | Self::Transition { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_is_single_line_with_stage() {
        let err = AnnotError::adapter(
            Stage::SequenceHomology,
            "remote-blast[swissprot]",
            AdapterError::Timeout(Duration::from_secs(30)),
        );
        let line = err.to_string();
        assert!(line.starts_with("[sequence-homology]"));
        assert!(line.contains("remote-blast[swissprot]"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_cancelled_adapter_maps_to_cancelled() {
        let err = AnnotError::adapter(Stage::StructureHomology, "foldseek", AdapterError::Cancelled);
        assert!(matches!(err, AnnotError::Cancelled { stage: Stage::StructureHomology }));
    }
}
