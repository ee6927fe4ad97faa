//! Funnel health diagnostics.
//!
//! Diagnostics are derived from the current nodes and edges on demand and are
//! never persisted.

use crate::graph::{FunnelEdge, FunnelNode, NodeKind};
use std::collections::HashMap;
use std::fmt;

/// Severity of a diagnostic. Ordered so that `Warning > Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// A single finding about the funnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable key, e.g. `orphan-<node id>`.
    pub id: String,
    pub node_id: Option<String>,
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    fn for_node(prefix: &str, node: &FunnelNode, level: DiagnosticLevel, message: String) -> Self {
        Self {
            id: format!("{}-{}", prefix, node.id),
            node_id: Some(node.id.clone()),
            level,
            message,
        }
    }
}

/// Check a funnel and report what is wrong with it.
///
/// Findings follow node order. Per node:
/// - a thank-you page with outgoing edges is a warning,
/// - a sales page without exactly one outgoing edge, or whose edges reach no
///   order page, is a warning,
/// - any other page without incoming edges gets an info note.
pub fn validate(nodes: &[FunnelNode], edges: &[FunnelEdge]) -> Vec<Diagnostic> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        outgoing.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        *incoming.entry(edge.to.as_str()).or_default() += 1;
    }
    let kind_of: HashMap<&str, NodeKind> = nodes.iter().map(|n| (n.id.as_str(), n.kind)).collect();

    let mut diagnostics = Vec::new();
    for node in nodes {
        let targets = outgoing.get(node.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let in_count = incoming.get(node.id.as_str()).copied().unwrap_or(0);

        if node.kind == NodeKind::ThankYou && !targets.is_empty() {
            diagnostics.push(Diagnostic::for_node(
                "thankyou",
                node,
                DiagnosticLevel::Warning,
                "Thank You pages must not have outgoing connections.".to_string(),
            ));
        }

        if node.kind == NodeKind::Sales {
            let reaches_order = targets
                .iter()
                .any(|target| kind_of.get(target) == Some(&NodeKind::Order));
            if targets.len() != 1 || !reaches_order {
                diagnostics.push(Diagnostic::for_node(
                    "sales",
                    node,
                    DiagnosticLevel::Warning,
                    "Sales Page should connect to exactly one Order Page (adjust to fix)."
                        .to_string(),
                ));
            }
        }

        if node.kind != NodeKind::Sales && in_count == 0 {
            diagnostics.push(Diagnostic::for_node(
                "orphan",
                node,
                DiagnosticLevel::Info,
                format!("{} has no incoming connection.", node.title),
            ));
        }
    }
    diagnostics
}

/// Strongest diagnostic level attached to `node_id`, if any.
pub fn node_status(diagnostics: &[Diagnostic], node_id: &str) -> Option<DiagnosticLevel> {
    diagnostics
        .iter()
        .filter(|d| d.node_id.as_deref() == Some(node_id))
        .map(|d| d.level)
        .max()
}

/// Warning and note counts, displayed as the panel headline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticSummary {
    pub warnings: usize,
    pub notes: usize,
}

impl DiagnosticSummary {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let warnings = diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count();
        Self {
            warnings,
            notes: diagnostics.len() - warnings,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings == 0 && self.notes == 0
    }
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("Everything looks connected.");
        }
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        write!(
            f,
            "{} warning{}, {} note{}",
            self.warnings,
            plural(self.warnings),
            self.notes,
            plural(self.notes)
        )
    }
}
