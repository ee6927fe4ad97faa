//! The persisted and exchanged funnel format.
//!
//! ```json
//! { "nodes": [{ "id", "type", "title", "x", "y" }],
//!   "edges": [{ "id", "from", "to" }],
//!   "pan": { "x", "y" },
//!   "zoom": 0.8 }
//! ```
//!
//! Reading is a two-step protocol: [`read_source`] pulls raw text out of
//! whatever the host handed over (and may fail), then [`parse_snapshot`]
//! validates and repairs it without touching any editor state.

use crate::geometry::{clamp_zoom, Point};
use crate::graph::{dedupe_edges, FunnelEdge, FunnelNode, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::Read;
use thiserror::Error;

/// Suggested file name for exports.
pub const EXPORT_FILE_NAME: &str = "funnel.json";

/// Message shown for any import that cannot be used.
pub const INVALID_FILE_MESSAGE: &str = "Invalid funnel JSON. Please check the file format.";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to parse funnel JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("funnel JSON has the wrong shape: {0}")]
    InvalidShape(&'static str),
    #[error("failed to read funnel source: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// The static message users see, whatever went wrong.
    pub fn user_message(&self) -> &'static str {
        INVALID_FILE_MESSAGE
    }
}

/// Nodes, edges and optionally the view, as saved or exported.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunnelSnapshot {
    pub nodes: Vec<FunnelNode>,
    pub edges: Vec<FunnelEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
}

impl FunnelSnapshot {
    /// Pretty-printed JSON, as offered for download.
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compact JSON, as written to storage.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Read the whole source as UTF-8 text.
pub fn read_source<R: Read>(mut reader: R) -> Result<String, SnapshotError> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    Ok(raw)
}

/// Parse and repair a snapshot.
///
/// Fails only when the text is not JSON, or is not an object holding `nodes`
/// and `edges` arrays. Everything else is repaired:
/// - nodes with an unknown or missing `type` are dropped,
/// - missing or duplicate ids are regenerated,
/// - missing or blank titles become the kind's label,
/// - non-numeric coordinates become 0,
/// - edges that loop, or point at missing nodes, are dropped,
/// - repeated `(from, to)` pairs collapse to the first,
/// - zoom is clamped, a malformed pan is ignored.
pub fn parse_snapshot(raw: &str) -> Result<FunnelSnapshot, SnapshotError> {
    let value: Value = serde_json::from_str(raw)?;
    let root = value
        .as_object()
        .ok_or(SnapshotError::InvalidShape("top level is not an object"))?;
    let raw_nodes = root
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or(SnapshotError::InvalidShape("`nodes` is not an array"))?;
    let raw_edges = root
        .get("edges")
        .and_then(Value::as_array)
        .ok_or(SnapshotError::InvalidShape("`edges` is not an array"))?;

    let mut ids = IdPool::new(raw_nodes.iter().chain(raw_edges));

    let nodes: Vec<FunnelNode> = raw_nodes
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| coerce_node(obj, &mut ids))
        .collect();

    let node_ids: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let mut edges: Vec<FunnelEdge> = raw_edges
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| coerce_edge(obj, &node_ids, &mut ids))
        .collect();
    dedupe_edges(&mut edges);

    let pan = root.get("pan").and_then(Value::as_object).and_then(|pan| {
        let x = pan.get("x").and_then(finite_f32)?;
        let y = pan.get("y").and_then(finite_f32)?;
        Some(Point::new(x, y))
    });
    let zoom = root.get("zoom").and_then(finite_f32).map(clamp_zoom);

    Ok(FunnelSnapshot {
        nodes,
        edges,
        pan,
        zoom,
    })
}

/// A JSON number that still fits an `f32`. Anything else counts as non-numeric.
fn finite_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32).filter(|v| v.is_finite())
}

fn coerce_node(obj: &Map<String, Value>, ids: &mut IdPool) -> Option<FunnelNode> {
    let kind: NodeKind = obj.get("type")?.as_str()?.parse().ok()?;
    let id = ids.claim(obj.get("id").and_then(Value::as_str), "node");
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .filter(|title| !title.trim().is_empty())
        .map_or_else(|| kind.label().to_string(), str::to_string);
    let coord = |key: &str| obj.get(key).and_then(finite_f32).unwrap_or(0.0);

    Some(FunnelNode {
        id,
        kind,
        title,
        x: coord("x"),
        y: coord("y"),
    })
}

fn coerce_edge(
    obj: &Map<String, Value>,
    node_ids: &HashSet<&str>,
    ids: &mut IdPool,
) -> Option<FunnelEdge> {
    let from = obj.get("from")?.as_str()?;
    let to = obj.get("to")?.as_str()?;
    if from == to || !node_ids.contains(from) || !node_ids.contains(to) {
        return None;
    }
    Some(FunnelEdge {
        id: ids.claim(obj.get("id").and_then(Value::as_str), "edge"),
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// Hands out ids during import: keeps an offered id the first time it is
/// seen, otherwise generates one that no raw record uses.
struct IdPool {
    reserved: HashSet<String>,
    claimed: HashSet<String>,
    counter: u64,
}

impl IdPool {
    fn new<'a>(records: impl Iterator<Item = &'a Value>) -> Self {
        let reserved = records
            .filter_map(|record| record.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Self {
            reserved,
            claimed: HashSet::new(),
            counter: 0,
        }
    }

    fn claim(&mut self, offered: Option<&str>, prefix: &str) -> String {
        if let Some(id) = offered {
            if self.claimed.insert(id.to_string()) {
                return id.to_string();
            }
        }
        loop {
            self.counter += 1;
            let candidate = format!("{}-import-{}", prefix, self.counter);
            if !self.reserved.contains(&candidate) && self.claimed.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Structural failures
    // ========================================================================

    #[test]
    fn test_not_json_is_error() {
        let err = parse_snapshot("{ nodes: oops").unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));
        assert_eq!(err.user_message(), INVALID_FILE_MESSAGE);
    }

    #[test]
    fn test_wrong_shapes_are_errors() {
        for raw in [
            "[]",
            "42",
            "null",
            r#"{"nodes": []}"#,
            r#"{"edges": []}"#,
            r#"{"nodes": {}, "edges": []}"#,
            r#"{"nodes": [], "edges": "none"}"#,
        ] {
            let err = parse_snapshot(raw).unwrap_err();
            assert!(matches!(err, SnapshotError::InvalidShape(_)), "{raw}");
        }
    }

    #[test]
    fn test_empty_funnel_is_valid() {
        let snapshot = parse_snapshot(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert_eq!(snapshot, FunnelSnapshot::default());
    }

    // ========================================================================
    // Node repair
    // ========================================================================

    #[test]
    fn test_unknown_type_drops_node() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [
                {"id": "a", "type": "checkout", "title": "A", "x": 0, "y": 0},
                {"id": "b", "type": "order", "title": "B", "x": 0, "y": 0},
                {"id": "c", "title": "C"},
                "garbage"
            ], "edges": []}"#,
        )
        .unwrap();
        let ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_missing_fields_are_filled() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [{"type": "upsell", "title": "   ", "x": "12", "y": null}], "edges": []}"#,
        )
        .unwrap();
        let node = &snapshot.nodes[0];
        assert!(!node.id.is_empty());
        assert_eq!(node.title, "Upsell");
        assert_eq!((node.x, node.y), (0.0, 0.0));
    }

    #[test]
    fn test_duplicate_node_ids_are_regenerated() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [
                {"id": "a", "type": "order", "title": "First"},
                {"id": "a", "type": "upsell", "title": "Second"}
            ], "edges": []}"#,
        )
        .unwrap();
        assert_eq!(snapshot.nodes[0].id, "a");
        assert_ne!(snapshot.nodes[1].id, "a");
    }

    #[test]
    fn test_generated_ids_avoid_existing_ones() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [
                {"type": "order"},
                {"id": "node-import-1", "type": "upsell"}
            ], "edges": []}"#,
        )
        .unwrap();
        assert_ne!(snapshot.nodes[0].id, snapshot.nodes[1].id);
        assert_eq!(snapshot.nodes[1].id, "node-import-1");
    }

    // ========================================================================
    // Edge repair
    // ========================================================================

    #[test]
    fn test_bad_edges_are_dropped() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [
                {"id": "o", "type": "order"},
                {"id": "u", "type": "upsell"}
            ], "edges": [
                {"id": "ok", "from": "o", "to": "u"},
                {"id": "dangling", "from": "o", "to": "ghost"},
                {"id": "loop", "from": "u", "to": "u"},
                {"id": "numeric", "from": 1, "to": "u"},
                {"id": "dup", "from": "o", "to": "u"}
            ]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = snapshot.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn test_edge_to_dropped_node_is_dropped() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [
                {"id": "o", "type": "order"},
                {"id": "x", "type": "mystery"}
            ], "edges": [{"id": "e", "from": "o", "to": "x"}]}"#,
        )
        .unwrap();
        assert!(snapshot.edges.is_empty());
    }

    #[test]
    fn test_edge_without_id_gets_one() {
        let snapshot = parse_snapshot(
            r#"{"nodes": [
                {"id": "o", "type": "order"},
                {"id": "u", "type": "upsell"}
            ], "edges": [{"from": "o", "to": "u"}]}"#,
        )
        .unwrap();
        assert!(snapshot.edges[0].id.starts_with("edge-"));
    }

    // ========================================================================
    // View
    // ========================================================================

    #[test]
    fn test_view_is_read_and_clamped() {
        let raw = r#"{"nodes": [], "edges": [], "pan": {"x": 5, "y": -7.5}, "zoom": 3}"#;
        let snapshot = parse_snapshot(raw).unwrap();
        assert_eq!(snapshot.pan, Some(Point::new(5.0, -7.5)));
        assert_eq!(snapshot.zoom, Some(1.6));
    }

    #[test]
    fn test_malformed_view_is_ignored() {
        let raw = r#"{"nodes": [], "edges": [], "pan": {"x": "5"}, "zoom": "big"}"#;
        let snapshot = parse_snapshot(raw).unwrap();
        assert_eq!(snapshot.pan, None);
        assert_eq!(snapshot.zoom, None);
    }

    #[test]
    fn test_numbers_beyond_f32_count_as_non_numeric() {
        let raw = r#"{
            "nodes": [{"id": "a", "type": "order", "title": "Order", "x": 1e39, "y": -4e38}],
            "edges": [],
            "pan": {"x": 1e39, "y": 0},
            "zoom": 1e39
        }"#;
        let snapshot = parse_snapshot(raw).unwrap();
        assert_eq!((snapshot.nodes[0].x, snapshot.nodes[0].y), (0.0, 0.0));
        assert_eq!(snapshot.pan, None);
        assert_eq!(snapshot.zoom, None);

        // Nothing infinite reaches the export, so it reads back the same
        let again = parse_snapshot(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(again, snapshot);
    }

    // ========================================================================
    // Export
    // ========================================================================

    #[test]
    fn test_export_uses_wire_names() {
        let snapshot = FunnelSnapshot {
            nodes: vec![FunnelNode {
                id: "t".to_string(),
                kind: NodeKind::ThankYou,
                title: "Thank You".to_string(),
                x: 1.0,
                y: 2.0,
            }],
            edges: Vec::new(),
            pan: None,
            zoom: Some(0.8),
        };
        let json = snapshot.to_json_pretty().unwrap();
        assert!(json.contains("\"type\": \"thankyou\""));
        assert!(json.contains("\"zoom\": 0.8"));
        assert!(!json.contains("pan"));
        assert!(json.contains('\n'));

        let back = parse_snapshot(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_read_source() {
        let raw = read_source(&b"{\"nodes\": [], \"edges\": []}"[..]).unwrap();
        assert!(parse_snapshot(&raw).is_ok());
    }
}
