//! Fallback decision engine
//!
//! Pure pieces of the orchestration: which sequence-homology adapters run
//! for a given database configuration, the stage state machine, and the
//! rule for when motif fallback fires.

use crate::error::{AnnotError, Stage};
use serde::{Deserialize, Serialize};

/// Which sequence-homology adapters run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeqMode {
    /// Local and remote, local first in priority
    Both,
    LocalOnly,
    RemoteOnly,
    /// No database given: remote search of the default database
    DefaultRemote,
}

impl SeqMode {
    /// Select the mode from the configured database sets
    pub fn select<L, R>(local_dbs: &[L], remote_dbs: &[R]) -> Self {
        match (local_dbs.is_empty(), remote_dbs.is_empty()) {
            (true, true) => SeqMode::DefaultRemote,
            (true, false) => SeqMode::RemoteOnly,
            (false, true) => SeqMode::LocalOnly,
            (false, false) => SeqMode::Both,
        }
    }

    pub fn runs_local(&self) -> bool {
        matches!(self, SeqMode::Both | SeqMode::LocalOnly)
    }

    pub fn runs_remote(&self) -> bool {
        !matches!(self, SeqMode::LocalOnly)
    }
}

impl std::fmt::Display for SeqMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SeqMode::Both => "both",
            SeqMode::LocalOnly => "local_only",
            SeqMode::RemoteOnly => "remote_only",
            SeqMode::DefaultRemote => "default_remote",
        };
        f.write_str(s)
    }
}

/// Motif fallback fires on an empty sequence result, never on failure alone
pub fn needs_motif_fallback(sequence_hits: usize) -> bool {
    sequence_hits == 0
}

/// Engine progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Init,
    HomologyResolved,
    StructureResolved,
    EvidenceCombined,
    Annotated,
    Done,
    Failed,
}

impl EngineState {
    fn successor(&self) -> Option<EngineState> {
        match self {
            EngineState::Init => Some(EngineState::HomologyResolved),
            EngineState::HomologyResolved => Some(EngineState::StructureResolved),
            EngineState::StructureResolved => Some(EngineState::EvidenceCombined),
            EngineState::EvidenceCombined => Some(EngineState::Annotated),
            EngineState::Annotated => Some(EngineState::Done),
            EngineState::Done | EngineState::Failed => None,
        }
    }

    /// Move to `next`; only the single forward step is legal
    pub fn advance(&mut self, next: EngineState, stage: Stage) -> Result<(), AnnotError> {
        if self.successor() == Some(next) {
            tracing::debug!(from = ?self, to = ?next, "Engine transition");
            *self = next;
            Ok(())
        } else {
            Err(AnnotError::Transition {
                stage,
                detail: format!("{:?} -> {:?}", self, next),
            })
        }
    }

    /// Absorbing failure, reachable from any state
    pub fn fail(&mut self) {
        *self = EngineState::Failed;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Done | EngineState::Failed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selection_table() {
        let none: [&str; 0] = [];
        assert_eq!(SeqMode::select(&none, &none), SeqMode::DefaultRemote);
        assert_eq!(SeqMode::select(&none, &["pdb"]), SeqMode::RemoteOnly);
        assert_eq!(SeqMode::select(&["/db/sp"], &none), SeqMode::LocalOnly);
        assert_eq!(SeqMode::select(&["/db/sp"], &["pdb"]), SeqMode::Both);
    }

    #[test]
    fn test_mode_adapter_usage() {
        assert!(SeqMode::Both.runs_local() && SeqMode::Both.runs_remote());
        assert!(SeqMode::LocalOnly.runs_local() && !SeqMode::LocalOnly.runs_remote());
        assert!(!SeqMode::RemoteOnly.runs_local() && SeqMode::RemoteOnly.runs_remote());
        assert!(!SeqMode::DefaultRemote.runs_local() && SeqMode::DefaultRemote.runs_remote());
    }

    #[test]
    fn test_fallback_only_on_empty() {
        assert!(needs_motif_fallback(0));
        assert!(!needs_motif_fallback(1));
    }

    #[test]
    fn test_state_machine_forward_only() {
        let mut state = EngineState::Init;
        for next in [
            EngineState::HomologyResolved,
            EngineState::StructureResolved,
            EngineState::EvidenceCombined,
            EngineState::Annotated,
            EngineState::Done,
        ] {
            state.advance(next, Stage::Combine).unwrap();
        }
        assert!(state.is_terminal());

        let mut skipping = EngineState::Init;
        let err = skipping.advance(EngineState::Annotated, Stage::GoLookup).unwrap_err();
        assert!(matches!(err, AnnotError::Transition { .. }));
        assert_eq!(skipping, EngineState::Init);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut state = EngineState::EvidenceCombined;
        state.fail();
        assert_eq!(state, EngineState::Failed);
        assert!(state.advance(EngineState::Annotated, Stage::GoLookup).is_err());
    }
}
