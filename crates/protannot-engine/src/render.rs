//! Ontology graph rendering
//!
//! [`DotRenderer`] writes a Graphviz graph of the annotated terms and their
//! ancestors. Nodes are colored by aspect; edges by relationship kind.
//! Annotated terms list their supporting identifiers.

use crate::artifacts::GO_GRAPH_DOT;
use crate::error::{AnnotError, Result, Stage};
use crate::model::{Aspect, GoTermAnnotation};
use crate::ontology::{Ontology, RelationKind};
use async_trait::async_trait;
use protannot_common::fsutil;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Supporting ids listed on a node before collapsing to a count
pub const MAX_LISTED_IDS: usize = 6;

/// Renders ranked annotations against the ontology into `out_dir`
#[async_trait]
pub trait OntologyRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the paths of the files written
    async fn render(
        &self,
        annotations: &[GoTermAnnotation],
        ontology: &Ontology,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Default)]
pub struct DotRenderer;

fn aspect_color(aspect: Option<Aspect>) -> &'static str {
    match aspect {
        Some(Aspect::MF) => "#1f77b4",
        Some(Aspect::BP) => "#2ca02c",
        Some(Aspect::CC) => "#ff7f0e",
        None => "black",
    }
}

fn edge_color(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::IsA => "#000000",
        RelationKind::PartOf => "#000080",
        RelationKind::Regulates => "#FFD700",
        RelationKind::PositivelyRegulates => "#00FF00",
        RelationKind::NegativelyRegulates => "#FF0000",
    }
}

/// Wrap a term name at word boundaries, about `width` characters per line
fn wrap_label(name: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in name.replace('_', " ").split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl DotRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Build the DOT document
    pub fn to_dot(&self, annotations: &[GoTermAnnotation], ontology: &Ontology) -> String {
        let annotated: BTreeMap<&str, &GoTermAnnotation> =
            annotations.iter().map(|a| (a.go_id.as_str(), a)).collect();
        let nodes = ontology.closure(annotated.keys().copied());

        let mut dot = String::from("digraph go {\n");
        dot.push_str("  rankdir=BT;\n");
        dot.push_str("  node [shape=box, style=filled, fontcolor=white];\n");

        for go_id in &nodes {
            let mut label = vec![go_id.clone()];
            if let Some(name) = ontology.name(go_id) {
                label.extend(wrap_label(name, 20));
            }

            let aspect = match annotated.get(go_id.as_str()) {
                Some(ann) => {
                    label.push(format!("score {:.2}", ann.score));
                    if ann.supporting_ids.len() <= MAX_LISTED_IDS {
                        label.extend(ann.supporting_ids.iter().cloned());
                    } else {
                        label.push(format!("{} supporting ids", ann.supporting_ids.len()));
                    }
                    Some(ann.aspect)
                },
                None => ontology.aspect(go_id),
            };

            let color = aspect_color(aspect);
            let penwidth = if annotated.contains_key(go_id.as_str()) { 3 } else { 1 };
            let _ = writeln!(
                dot,
                "  \"{}\" [label=\"{}\", color=\"{}\", fillcolor=\"{}\", penwidth={}];",
                escape(go_id),
                label.iter().map(|l| escape(l)).collect::<Vec<_>>().join("\\n"),
                color,
                color,
                penwidth
            );
        }

        for go_id in &nodes {
            let Some(term) = ontology.term(go_id) else {
                continue;
            };
            for (parent, kind) in &term.parents {
                if nodes.contains(parent) {
                    let _ = writeln!(
                        dot,
                        "  \"{}\" -> \"{}\" [color=\"{}\", label=\"{}\"];",
                        escape(go_id),
                        escape(parent),
                        edge_color(*kind),
                        kind.as_str()
                    );
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}

#[async_trait]
impl OntologyRenderer for DotRenderer {
    fn name(&self) -> &str {
        "dot"
    }

    async fn render(
        &self,
        annotations: &[GoTermAnnotation],
        ontology: &Ontology,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let path = out_dir.join(GO_GRAPH_DOT);
        let dot = self.to_dot(annotations, ontology);
        fsutil::write_atomic(&path, dot.as_bytes())
            .await
            .map_err(|e| AnnotError::Artifact {
                stage: Stage::Render,
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!(path = %path.display(), "Rendered GO graph");
        Ok(vec![path])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{EvidenceHit, SourceKind};

    const OBO: &str = "[Term]\nid: GO:0008150\nname: biological_process\nnamespace: biological_process\n\n\
[Term]\nid: GO:0042593\nname: glucose homeostasis\nnamespace: biological_process\nis_a: GO:0008150 ! biological_process\n";

    fn annotation(go_id: &str, ids: usize) -> GoTermAnnotation {
        let mut ann = GoTermAnnotation::new(go_id, Aspect::BP);
        for i in 0..ids {
            ann.contribute(&EvidenceHit {
                id: format!("P{:05}", i),
                source: SourceKind::SeqRemote,
                identity_pct: 80.0,
                e_value: 1e-10,
                rank: 1,
            });
        }
        ann
    }

    #[test]
    fn test_dot_contains_ancestors_and_edges() {
        let ontology = Ontology::parse(OBO);
        let dot = DotRenderer::new().to_dot(&[annotation("GO:0042593", 2)], &ontology);

        assert!(dot.starts_with("digraph go {"));
        assert!(dot.contains("\"GO:0008150\" [label=\"GO:0008150\\nbiological process\""));
        assert!(dot.contains("\"GO:0042593\" -> \"GO:0008150\" [color=\"#000000\", label=\"is_a\"]"));
        assert!(dot.contains("P00000\\nP00001"));
        assert!(dot.contains("#2ca02c"));
    }

    #[test]
    fn test_many_supporting_ids_collapse_to_count() {
        let dot = DotRenderer::new().to_dot(&[annotation("GO:0042593", 9)], &Ontology::empty());
        assert!(dot.contains("9 supporting ids"));
        assert!(!dot.contains("P00008"));
    }

    #[test]
    fn test_wrap_label() {
        assert_eq!(
            wrap_label("regulation of glucose metabolic process", 20),
            vec!["regulation of", "glucose metabolic", "process"]
        );
    }

    #[tokio::test]
    async fn test_render_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let written = DotRenderer::new()
            .render(&[annotation("GO:0042593", 1)], &Ontology::empty(), dir.path())
            .await
            .unwrap();

        assert_eq!(written, vec![dir.path().join(GO_GRAPH_DOT)]);
        assert!(std::fs::read_to_string(&written[0]).unwrap().contains("GO:0042593"));
    }
}
