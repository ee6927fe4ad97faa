//! Drawable primitives derived from editor state.
//!
//! [`build_scene`] is a pure function of the store, the gesture controller and
//! the canvas size. It produces everything a renderer needs in screen space:
//! grid, edge curves with arrowheads, the connection preview and node cards.
//! [`sync_edge_rows`] and [`sync_node_rows`] push the primitives into Slint
//! models, updating rows in place.

use crate::geometry::{HandleKind, Point, Viewport, NODE_HEIGHT, NODE_WIDTH};
use crate::gesture::{Gesture, GestureController};
use crate::graph::{FunnelGraph, NodeKind, NodeTemplate};
use crate::grid::generate_grid_commands;
use crate::path::{
    generate_bezier_path, generate_line_path, generate_polygon_path, CubicBezier, ARROW_LENGTH,
};
use crate::state::FunnelStore;
use crate::validation::{node_status, Diagnostic, DiagnosticLevel, DiagnosticSummary};
use slint::{Model, VecModel};

/// One edge, ready to stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePrimitive {
    pub id: String,
    /// Screen-space curve.
    pub curve: CubicBezier,
    pub path: String,
    /// Tip, left wing, right wing.
    pub arrow: [Point; 3],
    pub arrow_path: String,
}

/// Dashed straight line drawn while dragging a new connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPrimitive {
    pub start: Point,
    pub end: Point,
    pub path: String,
}

/// One node card in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePrimitive {
    pub id: String,
    pub kind: NodeKind,
    pub title: String,
    pub template: &'static NodeTemplate,
    /// Top-left corner.
    pub origin: Point,
    pub width: f32,
    pub height: f32,
    pub status: Option<DiagnosticLevel>,
    pub input_handle: Option<Point>,
    pub output_handle: Option<Point>,
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub viewport: Viewport,
    pub grid: String,
    pub edges: Vec<EdgePrimitive>,
    pub preview: Option<PreviewPrimitive>,
    pub nodes: Vec<NodePrimitive>,
    /// Title for the "Connecting to …" label.
    pub hovered_target_title: Option<String>,
    /// Idle pointer is near an edge: show the delete cursor.
    pub edge_hover: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: DiagnosticSummary,
}

/// Screen-space edge primitives. Edges with a missing endpoint are skipped.
pub fn edge_primitives(graph: &FunnelGraph, viewport: &Viewport) -> Vec<EdgePrimitive> {
    graph
        .edge_geometries()
        .map(|geometry| {
            let curve = geometry.curve().map(|p| viewport.world_to_screen(p));
            let arrow = curve.arrowhead(ARROW_LENGTH);
            EdgePrimitive {
                id: geometry.id.to_string(),
                curve,
                path: generate_bezier_path(&curve),
                arrow,
                arrow_path: generate_polygon_path(&arrow),
            }
        })
        .collect()
}

pub fn build_scene(store: &FunnelStore, gestures: &GestureController, canvas_size: Point) -> Scene {
    let viewport = store.viewport();
    let graph = store.graph();
    let diagnostics = store.diagnostics();

    let preview = match gestures.gesture() {
        Gesture::ConnectingEdge { start, end, .. } => {
            let start = viewport.world_to_screen(*start);
            let end = viewport.world_to_screen(*end);
            Some(PreviewPrimitive {
                start,
                end,
                path: generate_line_path(start, end),
            })
        }
        _ => None,
    };

    let nodes = graph
        .nodes()
        .iter()
        .map(|node| NodePrimitive {
            id: node.id.clone(),
            kind: node.kind,
            title: node.title.clone(),
            template: node.kind.template(),
            origin: viewport.world_to_screen(node.origin()),
            width: NODE_WIDTH * viewport.zoom,
            height: NODE_HEIGHT * viewport.zoom,
            status: node_status(&diagnostics, &node.id),
            input_handle: node
                .kind
                .has_input()
                .then(|| viewport.world_to_screen(node.handle(HandleKind::Input))),
            output_handle: node
                .kind
                .has_output()
                .then(|| viewport.world_to_screen(node.handle(HandleKind::Output))),
        })
        .collect();

    let hovered_target_title = gestures
        .hovered_target()
        .map(|id| graph.node(id).map_or_else(|| "node".to_string(), |node| node.title.clone()));

    Scene {
        viewport,
        grid: generate_grid_commands(
            canvas_size.x,
            canvas_size.y,
            &viewport,
            store.config().grid_spacing,
        ),
        edges: edge_primitives(graph, &viewport),
        preview,
        nodes,
        hovered_target_title,
        edge_hover: gestures.edge_hover() && gestures.gesture().is_idle(),
        summary: DiagnosticSummary::from_diagnostics(&diagnostics),
        diagnostics,
    }
}

/// Overwrite `model` with `items`, reusing existing rows.
fn sync_rows<T, P, F>(model: &VecModel<P>, items: &[T], constructor: F)
where
    P: Clone + 'static,
    F: Fn(&T) -> P,
{
    for (i, item) in items.iter().enumerate() {
        let row = constructor(item);
        if i < model.row_count() {
            model.set_row_data(i, row);
        } else {
            model.push(row);
        }
    }
    while model.row_count() > items.len() {
        model.remove(model.row_count() - 1);
    }
}

/// Sync edge primitives into a Slint model, one row per edge.
pub fn sync_edge_rows<P, F>(model: &VecModel<P>, edges: &[EdgePrimitive], constructor: F)
where
    P: Clone + 'static,
    F: Fn(&EdgePrimitive) -> P,
{
    sync_rows(model, edges, constructor);
}

/// Sync node primitives into a Slint model, one row per node.
pub fn sync_node_rows<P, F>(model: &VecModel<P>, nodes: &[NodePrimitive], constructor: F)
where
    P: Clone + 'static,
    F: Fn(&NodePrimitive) -> P,
{
    sync_rows(model, nodes, constructor);
}
