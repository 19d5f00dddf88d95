//! Annotation pipeline
//!
//! Drives one run over an immutable [`RunContext`]: sequence and structure
//! homology run concurrently, motif scanning is the fallback when sequence
//! homology finds nothing, and the surviving evidence is combined, mapped to
//! GO terms, ranked and written to the run directory. Collaborators are
//! injected as trait objects through [`Collaborators`].

use crate::adapters::{
    guarded, ElmClient, FoldseekClient, LocalBlast, MotifAdapter, RemoteBlast, SeqHomologyAdapter,
    SeqSearchParams, StructHomologyAdapter, StructSearchParams,
};
use crate::aggregate::{aggregate, resolve, Aggregation};
use crate::artifacts::{self, ArtifactWriter, RunManifest};
use crate::config::{LookupSource, PipelineConfig, DEFAULT_REMOTE_DB};
use crate::decision::{needs_motif_fallback, EngineState, SeqMode};
use crate::error::{AdapterError, AnnotError, LookupError, Result, Stage};
use crate::lookup::{GafLookup, IdToGoLookup, MotifGoTable, TermMappingLookup, UniProtLookup};
use crate::merge::{merge, merge_all, MergedIdSet};
use crate::model::{EvidenceList, SourceKind};
use crate::ontology::Ontology;
use crate::query::QuerySequence;
use crate::rank::{rank, ResultBundle};
use crate::render::{DotRenderer, OntologyRenderer};
use chrono::Utc;
use protannot_common::checksum::sha256_hex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

type AdapterResult<T> = std::result::Result<T, AdapterError>;

// ============================================================================
// Run context
// ============================================================================

/// Immutable inputs of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Arc<PipelineConfig>,
    pub query: QuerySequence,
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Validate the configuration and load the query protein
    pub async fn prepare(config: PipelineConfig, cancel: CancellationToken) -> Result<Self> {
        config
            .validate()
            .map_err(|reason| AnnotError::input(Stage::Input, "configuration", reason))?;

        let query = QuerySequence::load(&config.fasta, config.max_query_len).await?;
        info!(header = %query.header, length = query.len(), "Loaded query protein");

        Ok(Self {
            config: Arc::new(config),
            query,
            cancel,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn check_cancelled(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(AnnotError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// External collaborators of the engine
#[derive(Clone)]
pub struct Collaborators {
    pub local_blast: Arc<dyn SeqHomologyAdapter>,
    pub remote_blast: Arc<dyn SeqHomologyAdapter>,
    pub structure: Arc<dyn StructHomologyAdapter>,
    pub motif: Arc<dyn MotifAdapter>,
    pub protein_lookup: Arc<dyn IdToGoLookup>,
    /// Motif → GO table; motif fallback is unavailable without it
    pub motif_lookup: Option<Arc<dyn IdToGoLookup>>,
    pub ontology: Arc<Ontology>,
    pub renderer: Arc<dyn OntologyRenderer>,
}

fn unreadable(path: &Path, reason: impl std::fmt::Display) -> AnnotError {
    AnnotError::input(Stage::Input, path.display().to_string(), reason.to_string())
}

impl Collaborators {
    /// Production collaborators for `config`
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        let endpoints = &config.endpoints;

        let remote_blast = RemoteBlast::new(endpoints)
            .map_err(|e| AnnotError::adapter(Stage::SequenceHomology, "remote-blast", e))?;
        let structure = FoldseekClient::new(endpoints)
            .map_err(|e| AnnotError::adapter(Stage::StructureHomology, "foldseek", e))?;
        let motif = ElmClient::new(endpoints, &config.motif)
            .map_err(|e| AnnotError::adapter(Stage::MotifFallback, "elm", e))?;

        let protein_lookup: Arc<dyn IdToGoLookup> = match &config.lookup {
            LookupSource::UniProt => Arc::new(
                UniProtLookup::new(endpoints)
                    .map_err(|e| AnnotError::lookup(Stage::GoLookup, "uniprot", e))?,
            ),
            LookupSource::Gaf(path) => {
                Arc::new(GafLookup::load(path).await.map_err(|e| unreadable(path, e))?)
            },
            LookupSource::TermMapping(path) => {
                Arc::new(TermMappingLookup::load(path).await.map_err(|e| unreadable(path, e))?)
            },
        };

        let motif_lookup: Option<Arc<dyn IdToGoLookup>> = match &config.motif.go_table {
            Some(path) => {
                let table = MotifGoTable::load(path).await.map_err(|e| unreadable(path, e))?;
                Some(Arc::new(table) as Arc<dyn IdToGoLookup>)
            },
            None => None,
        };

        let ontology = match &config.ontology_file {
            Some(path) => Ontology::load(path).await.map_err(|e| unreadable(path, e))?,
            None => {
                warn!("No ontology file given, GO ids are used as returned by the lookup");
                Ontology::empty()
            },
        };

        Ok(Self {
            local_blast: Arc::new(LocalBlast::new()),
            remote_blast: Arc::new(remote_blast),
            structure: Arc::new(structure),
            motif: Arc::new(motif),
            protein_lookup,
            motif_lookup,
            ontology: Arc::new(ontology),
            renderer: Arc::new(DotRenderer::new()),
        })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub bundle: ResultBundle,
    pub manifest: RunManifest,
}

/// Sequence stage output before artifacts are written
struct SeqEvidence {
    local: Option<EvidenceList>,
    remote: Option<EvidenceList>,
    merged: MergedIdSet,
    warnings: Vec<String>,
}

impl SeqEvidence {
    fn from_list(list: &EvidenceList) -> Self {
        Self {
            local: None,
            remote: None,
            merged: MergedIdSet::from(list),
            warnings: Vec::new(),
        }
    }
}

fn degraded(stage: Stage, adapter: &str, err: &AdapterError) -> String {
    warn!(stage = %stage, adapter, error = %err, "Adapter failed, continuing with remaining evidence");
    format!("[{}] {} failed: {}", stage, adapter, err)
}

fn settle<'a>(
    adapter: &'a str,
    outcome: Option<AdapterResult<EvidenceList>>,
    failures: &mut Vec<(&'a str, AdapterError)>,
) -> Option<EvidenceList> {
    match outcome {
        Some(Ok(list)) => Some(list),
        Some(Err(e)) => {
            failures.push((adapter, e));
            None
        },
        None => None,
    }
}

fn lookup_failed(lookup: &dyn IdToGoLookup, err: LookupError) -> AnnotError {
    AnnotError::lookup(Stage::GoLookup, lookup.name(), err)
}

pub struct Pipeline {
    collaborators: Collaborators,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Run the whole annotation. The state machine ends in `Failed` on any error.
    #[instrument(skip_all, fields(query = %ctx.query.header))]
    pub async fn run(&self, ctx: &RunContext) -> Result<RunOutcome> {
        let mut state = EngineState::Init;
        let result = self.execute(ctx, &mut state).await;
        if let Err(e) = &result {
            state.fail();
            error!(stage = %e.stage(), error = %e, "Annotation run failed");
        }
        debug!(state = ?state, "Run finished");
        result
    }

    async fn execute(&self, ctx: &RunContext, state: &mut EngineState) -> Result<RunOutcome> {
        let config = &ctx.config;
        tokio::fs::create_dir_all(ctx.output_dir())
            .await
            .map_err(|e| AnnotError::artifact(ctx.output_dir(), e))?;
        let mut writer = ArtifactWriter::new(ctx.output_dir());

        let local_dbs: Vec<_> = config.sequence.local_dbs.iter().collect();
        let remote_dbs: Vec<_> = config.sequence.remote_dbs.iter().collect();
        let mode = SeqMode::select(&local_dbs, &remote_dbs);
        info!(mode = %mode, "Selected sequence homology mode");

        let mut manifest = RunManifest::new(
            ctx.query.header.clone(),
            sha256_hex(ctx.query.residues.as_bytes()),
            mode,
        );

        ctx.check_cancelled(Stage::SequenceHomology)?;

        // Sequence and structure homology. A structure failure next to empty
        // sequence evidence is held until the motif fallback has run.
        let (seq, structure, mut structure_failure) = match &config.precomputed.combined_ids {
            Some(path) => {
                let ids = artifacts::read_id_list(path, Stage::Combine).await?;
                info!(path = %path.display(), ids = ids.len(), "Using precomputed combined ids");
                let list = EvidenceList::from_ids(
                    SourceKind::SeqLocal,
                    ids,
                    config.sequence.min_identity,
                    config.sequence.max_eval,
                );
                (SeqEvidence::from_list(&list), None, None)
            },
            None => {
                let (seq, structure) =
                    tokio::join!(self.sequence_stage(ctx, mode), self.structure_stage(ctx));
                let seq = seq?;
                manifest.degraded.extend(seq.warnings.iter().cloned());
                let (structure, failure) = match structure? {
                    Ok(list) => (list, None),
                    Err(AdapterError::Cancelled) => {
                        return Err(AnnotError::Cancelled {
                            stage: Stage::StructureHomology,
                        })
                    },
                    Err(e) if !seq.merged.is_empty() => {
                        let name = self.collaborators.structure.name();
                        manifest.degraded.push(degraded(Stage::StructureHomology, name, &e));
                        (EvidenceList::empty(), None)
                    },
                    Err(e) => {
                        warn!(error = %e, "Structure homology failed, motif fallback decides the run");
                        (EvidenceList::empty(), Some(e))
                    },
                };
                (seq, Some(structure), failure)
            },
        };
        state.advance(EngineState::HomologyResolved, Stage::SequenceHomology)?;

        if let Some(local) = &seq.local {
            writer.write_ids(artifacts::SEQ_LOCAL_IDS, local.ids()).await?;
        }
        if let Some(remote) = &seq.remote {
            writer.write_ids(artifacts::SEQ_REMOTE_IDS, remote.ids()).await?;
        }
        // Both stages are skipped on a precomputed combined list
        if let Some(list) = &structure {
            writer.write_ids(artifacts::SEQ_IDS, seq.merged.ids()).await?;
            writer.write_ids(artifacts::STRUCTURE_IDS, list.ids()).await?;
        }
        let structure = structure.unwrap_or_default();
        state.advance(EngineState::StructureResolved, Stage::StructureHomology)?;

        // Motif fallback
        let mut motif = EvidenceList::empty();
        if needs_motif_fallback(seq.merged.len()) {
            ctx.check_cancelled(Stage::MotifFallback)?;
            info!("Sequence homology found nothing, falling back to motif scan");
            manifest.fallback_used = true;

            let name = self.collaborators.motif.name();
            match self.motif_stage(ctx).await {
                Ok(list) => {
                    writer.write_ids(artifacts::MOTIF_IDS, list.ids()).await?;
                    motif = list;
                },
                Err(AdapterError::Cancelled) => {
                    return Err(AnnotError::Cancelled {
                        stage: Stage::MotifFallback,
                    })
                },
                Err(e) if !structure.is_empty() => {
                    manifest.degraded.push(degraded(Stage::MotifFallback, name, &e));
                },
                Err(e) => {
                    if let Some(structure_err) = structure_failure.take() {
                        warn!(adapter = name, error = %e, "Motif fallback failed as well");
                        return Err(self.structure_failed(structure_err));
                    }
                    return Err(AnnotError::adapter(Stage::MotifFallback, name, e));
                },
            }
        }

        // Combination and GO aggregation
        ctx.check_cancelled(Stage::Combine)?;
        let combined = self.combine(seq.merged, &structure, &motif, &mut writer).await;
        let aggregation = match (combined, structure_failure) {
            (Ok(aggregation), None) => aggregation,
            (Ok(aggregation), Some(e)) => {
                let name = self.collaborators.structure.name();
                manifest.degraded.push(degraded(Stage::StructureHomology, name, &e));
                aggregation
            },
            // Motifs rescued nothing; the structure failure is the cause
            (Err(AnnotError::NoEvidence { .. }), Some(e)) => return Err(self.structure_failed(e)),
            (Err(e), _) => return Err(e),
        };
        state.advance(EngineState::EvidenceCombined, Stage::Combine)?;

        if aggregation.is_empty() {
            return Err(AnnotError::no_evidence(
                Stage::GoLookup,
                format!(
                    "no GO terms annotated to any of {} identifiers",
                    aggregation.contributions().len()
                ),
            ));
        }
        state.advance(EngineState::Annotated, Stage::GoLookup)?;

        // Ranking and artifacts
        let bundle = rank(aggregation);
        writer
            .write_json(artifacts::GO_TERMS_JSON, &bundle.similar_proteins)
            .await?;
        writer
            .write_bytes(artifacts::GO_TERMS_TSV, artifacts::bundle_to_tsv(&bundle).as_bytes())
            .await?;

        ctx.check_cancelled(Stage::Render)?;
        let rendered = self
            .collaborators
            .renderer
            .render(&bundle.ranked_terms, &self.collaborators.ontology, writer.dir())
            .await?;
        for path in &rendered {
            writer.record(path);
        }

        writer.write_json(artifacts::RESULT_BUNDLE, &bundle).await?;

        manifest.term_count = bundle.ranked_terms.len();
        manifest.finished_at = Some(Utc::now());
        manifest.artifacts = writer.written().to_vec();
        manifest.artifacts.push(artifacts::RUN_MANIFEST.to_string());
        writer.write_json(artifacts::RUN_MANIFEST, &manifest).await?;
        state.advance(EngineState::Done, Stage::Artifacts)?;

        info!(
            terms = bundle.ranked_terms.len(),
            proteins = bundle.similar_proteins.len(),
            degraded = manifest.degraded.len(),
            "Annotation complete"
        );
        Ok(RunOutcome { bundle, manifest })
    }

    fn structure_failed(&self, err: AdapterError) -> AnnotError {
        AnnotError::adapter(Stage::StructureHomology, self.collaborators.structure.name(), err)
    }

    #[instrument(skip_all, fields(mode = %mode))]
    async fn sequence_stage(&self, ctx: &RunContext, mode: SeqMode) -> Result<SeqEvidence> {
        let config = &ctx.config.sequence;

        if let Some(path) = &ctx.config.precomputed.sequence_ids {
            let ids = artifacts::read_id_list(path, Stage::SequenceHomology).await?;
            info!(path = %path.display(), ids = ids.len(), "Using precomputed sequence homology ids");
            let list = EvidenceList::from_ids(SourceKind::SeqLocal, ids, config.min_identity, config.max_eval);
            return Ok(SeqEvidence::from_list(&list));
        }

        let params = SeqSearchParams::from(config);
        let timeout = Duration::from_secs(config.timeout_secs);
        let local_dbs: Vec<String> = config
            .local_dbs
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let remote_dbs: Vec<String> = match mode {
            SeqMode::DefaultRemote => vec![DEFAULT_REMOTE_DB.to_string()],
            _ => config.remote_dbs.iter().cloned().collect(),
        };

        let local_blast = self.collaborators.local_blast.as_ref();
        let remote_blast = self.collaborators.remote_blast.as_ref();

        let local = async {
            if mode.runs_local() {
                let search = local_blast.search(&ctx.query, &local_dbs, &params);
                Some(guarded(timeout, &ctx.cancel, search).await)
            } else {
                None
            }
        };
        let remote = async {
            if mode.runs_remote() {
                let search = remote_blast.search(&ctx.query, &remote_dbs, &params);
                Some(guarded(timeout, &ctx.cancel, search).await)
            } else {
                None
            }
        };
        let (local, remote) = tokio::join!(local, remote);

        let mut failures: Vec<(&str, AdapterError)> = Vec::new();
        let local = settle(local_blast.name(), local, &mut failures);
        let remote = settle(remote_blast.name(), remote, &mut failures);

        // Local results take priority over remote ones
        let merged = merge_all(local.iter().chain(remote.iter()));

        if failures.iter().any(|(_, e)| matches!(e, AdapterError::Cancelled)) {
            return Err(AnnotError::Cancelled {
                stage: Stage::SequenceHomology,
            });
        }

        let mut warnings = Vec::new();
        if merged.is_empty() {
            if let Some((adapter, e)) = failures.into_iter().next() {
                return Err(AnnotError::adapter(Stage::SequenceHomology, adapter, e));
            }
        } else {
            for (adapter, e) in &failures {
                warnings.push(degraded(Stage::SequenceHomology, adapter, e));
            }
        }

        info!(
            local = local.as_ref().map(EvidenceList::len),
            remote = remote.as_ref().map(EvidenceList::len),
            merged = merged.len(),
            "Sequence homology resolved"
        );
        Ok(SeqEvidence {
            local,
            remote,
            merged,
            warnings,
        })
    }

    /// Outer error is fatal; the inner result is judged against the sequence outcome
    #[instrument(skip_all)]
    async fn structure_stage(&self, ctx: &RunContext) -> Result<AdapterResult<EvidenceList>> {
        let config = &ctx.config.structure;

        if let Some(path) = &ctx.config.precomputed.structure_ids {
            let ids = artifacts::read_id_list(path, Stage::StructureHomology).await?;
            info!(path = %path.display(), ids = ids.len(), "Using precomputed structure ids");
            return Ok(Ok(EvidenceList::from_ids(
                SourceKind::Structure,
                ids,
                config.min_identity,
                config.max_eval,
            )));
        }

        let params = StructSearchParams::from(config);
        let dbs: Vec<String> = config.dbs.iter().cloned().collect();
        let timeout = Duration::from_secs(config.timeout_secs);
        let search = self.collaborators.structure.search(&ctx.query, &dbs, &params);
        let result = guarded(timeout, &ctx.cancel, search).await;

        if let Ok(list) = &result {
            info!(hits = list.len(), "Structure homology resolved");
        }
        Ok(result)
    }

    #[instrument(skip_all)]
    async fn motif_stage(&self, ctx: &RunContext) -> AdapterResult<EvidenceList> {
        if self.collaborators.motif_lookup.is_none() {
            return Err(AdapterError::Unavailable(
                "no motif to GO table configured".to_string(),
            ));
        }

        let timeout = Duration::from_secs(ctx.config.motif.timeout_secs);
        let list = guarded(timeout, &ctx.cancel, self.collaborators.motif.scan(&ctx.query)).await?;
        info!(motifs = list.len(), "Motif scan resolved");
        Ok(list)
    }

    /// Pick the evidence pool by priority and fold it into a fresh accumulator
    #[instrument(skip_all, fields(seq = seq.len(), structure = structure.len(), motif = motif.len()))]
    async fn combine(
        &self,
        seq: MergedIdSet,
        structure: &EvidenceList,
        motif: &EvidenceList,
        writer: &mut ArtifactWriter,
    ) -> Result<Aggregation> {
        let lookup = self.collaborators.protein_lookup.as_ref();
        let ontology = self.collaborators.ontology.as_ref();

        if !seq.is_empty() {
            let mut pool = seq;
            pool.extend_with(structure);
            writer.write_ids(artifacts::COMBINED_IDS, pool.ids()).await?;
            return aggregate(&pool, lookup, ontology, Aggregation::new())
                .await
                .map_err(|e| lookup_failed(lookup, e));
        }

        let motif_resolved = match &self.collaborators.motif_lookup {
            Some(table) if !motif.is_empty() => resolve(motif, table.as_ref(), ontology)
                .await
                .map_err(|e| lookup_failed(table.as_ref(), e))?,
            _ => Vec::new(),
        };

        if motif_resolved.iter().any(|r| !r.terms.is_empty()) {
            let pool = merge(structure, motif);
            writer.write_ids(artifacts::COMBINED_IDS, pool.ids()).await?;
            let acc = aggregate(structure, lookup, ontology, Aggregation::new())
                .await
                .map_err(|e| lookup_failed(lookup, e))?;
            return Ok(acc.fold(&motif_resolved));
        }

        if !structure.is_empty() {
            writer.write_ids(artifacts::COMBINED_IDS, structure.ids()).await?;
            return aggregate(structure, lookup, ontology, Aggregation::new())
                .await
                .map_err(|e| lookup_failed(lookup, e));
        }

        Err(AnnotError::no_evidence(
            Stage::Combine,
            "no sequence or structure hits and no motif with GO terms",
        ))
    }
}
