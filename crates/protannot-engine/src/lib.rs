//! protannot engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Assigns Gene Ontology terms to an unknown protein by combining sequence
//! homology, structure homology and short linear motif evidence into one
//! ranked, provenance-tagged result.
//!
//! # Overview
//!
//! - **Adapters** ([`adapters`]): BLAST (local and remote), ESMFold +
//!   Foldseek, ELM. Each normalizes tool output into an
//!   [`EvidenceList`](model::EvidenceList).
//! - **Merge** ([`merge`]): priority-preserving union of identifier lists
//! - **Decision engine** ([`decision`]): sequence-mode selection, motif
//!   fallback rule, stage state machine
//! - **Aggregation** ([`aggregate`]): identifier → GO term mapping through an
//!   [`IdToGoLookup`](lookup::IdToGoLookup), cleaned against the [`ontology`]
//! - **Ranking** ([`rank`]): weighted score and the final
//!   [`ResultBundle`](rank::ResultBundle)
//! - **Pipeline** ([`pipeline`]): one run end to end, with artifacts written
//!   into the run directory
//!
//! # Example
//!
//! ```no_run
//! use protannot_engine::config::PipelineConfig;
//! use protannot_engine::pipeline::{Collaborators, Pipeline, RunContext};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> protannot_engine::Result<()> {
//! let config = PipelineConfig::builder()
//!     .fasta("query.fasta")
//!     .output_dir("results")
//!     .remote_db("swissprot")
//!     .build();
//!
//! let ctx = RunContext::prepare(config, CancellationToken::new()).await?;
//! let collaborators = Collaborators::from_config(&ctx.config).await?;
//! let outcome = Pipeline::new(collaborators).run(&ctx).await?;
//! println!("{} GO terms", outcome.bundle.ranked_terms.len());
//! # Ok(())
//! # }
//! ```

pub mod accession;
pub mod adapters;
pub mod aggregate;
pub mod artifacts;
pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod lookup;
pub mod merge;
pub mod model;
pub mod ontology;
pub mod pipeline;
pub mod query;
pub mod rank;
pub mod render;

pub use error::{AdapterError, AnnotError, LookupError, Result, Stage};
pub use model::{Aspect, EvidenceHit, EvidenceList, GoTermAnnotation, SourceKind};
pub use pipeline::{Collaborators, Pipeline, RunContext, RunOutcome};
pub use rank::ResultBundle;
