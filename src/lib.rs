//! # Funnel Editor
//!
//! Interaction and validation core for a visual marketing-funnel editor:
//! sales, order, upsell, downsell and thank-you pages connected by directed
//! flows on a pan/zoomable canvas.
//!
//! The crate is renderer-agnostic. Pointer, wheel and drop events go into a
//! [`GestureController`], which mutates a [`FunnelStore`]; a frame is drawn
//! from the pure [`build_scene`] output. Slint types appear only at the
//! edges ([`FunnelEditorController`] callbacks and model syncing).
//!
//! ## Modules
//!
//! - [`geometry`] - world/screen transforms, zoom clamping, handle positions
//! - [`path`] - the edge bezier, flattening and SVG path commands
//! - [`hit_test`] - edge, handle and node picking in world space
//! - [`graph`] - nodes, edges, connection rules
//! - [`validation`] - funnel diagnostics
//! - [`snapshot`] - JSON import/export with repair
//! - [`storage`] - key-value persistence
//! - [`state`] - the authoritative store
//! - [`gesture`] - pointer gesture state machine
//! - [`render`] - drawable primitives
//! - [`controller`] - callback-friendly facade
//!
//! ## Quick Start
//!
//! ```
//! use funnel_editor::{FunnelStore, GestureController, Point};
//!
//! let mut store = FunnelStore::in_memory();
//! let mut gestures = GestureController::new();
//!
//! // Drop an upsell page onto the canvas
//! gestures.drop_node(&mut store, "upsell", Point::new(400.0, 500.0));
//! store.commit();
//!
//! assert_eq!(store.nodes().len(), 6);
//! ```

pub mod controller;
pub mod geometry;
pub mod gesture;
pub mod graph;
pub mod grid;
pub mod path;
pub mod render;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod validation;

pub use controller::FunnelEditorController;
pub use geometry::{
    clamp_zoom, screen_to_world, world_to_screen, HandleKind, Point, Viewport, NODE_HEIGHT,
    NODE_WIDTH,
};
pub use gesture::{
    classify, ConnectionResult, Gesture, GestureController, PointerTarget, NODE_DRAG_MIME,
};
pub use graph::{
    CompositeRule, ConnectError, ConnectOutcome, ConnectionRule, FunnelEdge, FunnelGraph,
    FunnelNode, NodeKind, NodeTemplate, SalesFeedsOrder, TerminalThankYou,
};
pub use grid::generate_grid_commands;
pub use hit_test::{find_edge_at, find_handle_at, find_node_at};
pub use path::{generate_bezier_path, CubicBezier};
pub use render::{
    build_scene, sync_edge_rows, sync_node_rows, EdgePrimitive, NodePrimitive, Scene,
};
pub use snapshot::{
    parse_snapshot, read_source, FunnelSnapshot, SnapshotError, EXPORT_FILE_NAME,
};
pub use state::{default_funnel, EditorConfig, FunnelStore};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage, StorageError, STORAGE_KEY};
pub use validation::{validate, Diagnostic, DiagnosticLevel, DiagnosticSummary};
