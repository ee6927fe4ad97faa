//! Authoritative editor state: the funnel graph, the view, and the transient
//! warning and import-error slots.
//!
//! Every mutation goes through [`FunnelStore`] and bumps its revision.
//! Hosts call [`FunnelStore::commit`] once per handled event; it writes the
//! snapshot to storage only when something changed since the last write.

use crate::geometry::{
    step_zoom, Point, Viewport, DEFAULT_PAN, DEFAULT_ZOOM, NODE_HEIGHT, NODE_WIDTH, ZOOM_STEP,
};
use crate::graph::{ConnectError, ConnectOutcome, FunnelEdge, FunnelGraph, FunnelNode, NodeKind};
use crate::hit_test::{EDGE_HIT_DISTANCE, EDGE_HIT_SAMPLES, HANDLE_HIT_RADIUS};
use crate::snapshot::{parse_snapshot, read_source, FunnelSnapshot, SnapshotError};
use crate::storage::{MemoryStorage, SnapshotStorage, STORAGE_KEY};
use crate::validation::{node_status, validate, Diagnostic, DiagnosticLevel, DiagnosticSummary};
use std::io::Read;

/// Warning raised when a load or import dropped sales edges.
pub const SALES_PURGE_WARNING: &str = "Removed invalid Sales Page connections.";

/// World offset used by palette adds before the viewport size is known.
const PALETTE_FALLBACK_OFFSET: f32 = 120.0;

/// Host-tunable editor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub storage_key: String,
    /// Edge pick tolerance, screen pixels.
    pub edge_hit_distance: f32,
    pub edge_hit_samples: usize,
    /// Handle pick radius, screen pixels.
    pub handle_hit_radius: f32,
    /// Grid spacing at zoom 1.
    pub grid_spacing: f32,
    pub default_pan: Point,
    pub default_zoom: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.to_string(),
            edge_hit_distance: EDGE_HIT_DISTANCE,
            edge_hit_samples: EDGE_HIT_SAMPLES,
            handle_hit_radius: HANDLE_HIT_RADIUS,
            grid_spacing: crate::grid::GRID_SPACING,
            default_pan: DEFAULT_PAN,
            default_zoom: DEFAULT_ZOOM,
        }
    }
}

impl EditorConfig {
    pub fn default_viewport(&self) -> Viewport {
        Viewport::new(self.default_pan, self.default_zoom)
    }
}

/// The canonical five-page funnel shown on first start and after a reset.
pub fn default_funnel() -> FunnelGraph {
    let node = |id: &str, kind: NodeKind, title: &str, x: f32, y: f32| FunnelNode {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        x,
        y,
    };
    let edge = |id: &str, from: &str, to: &str| FunnelEdge {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    };

    FunnelGraph::from_parts(
        vec![
            node("node-sales", NodeKind::Sales, "Sales Page", 40.0, 200.0),
            node("node-order", NodeKind::Order, "Order Page", 340.0, 200.0),
            node("node-upsell-1", NodeKind::Upsell, "Upsell 1", 640.0, 140.0),
            node("node-upsell-2", NodeKind::Upsell, "Upsell 2", 940.0, 140.0),
            node("node-thanks", NodeKind::ThankYou, "Thank You", 1240.0, 200.0),
        ],
        vec![
            edge("edge-sales-order", "node-sales", "node-order"),
            edge("edge-order-upsell-1", "node-order", "node-upsell-1"),
            edge("edge-upsell-1-upsell-2", "node-upsell-1", "node-upsell-2"),
            edge("edge-upsell-2-thanks", "node-upsell-2", "node-thanks"),
        ],
    )
}

/// Owned editor state with a persistence hook.
pub struct FunnelStore {
    graph: FunnelGraph,
    viewport: Viewport,
    warning: Option<String>,
    import_error: Option<String>,
    revision: u64,
    persisted_revision: Option<u64>,
    config: EditorConfig,
    storage: Box<dyn SnapshotStorage>,
}

impl FunnelStore {
    /// Restore the last saved funnel from `storage`.
    ///
    /// Missing or unusable data falls back to the default funnel. Saved sales
    /// edges that break the sales→order rule are dropped with a warning.
    pub fn load(storage: impl SnapshotStorage + 'static, config: EditorConfig) -> Self {
        let mut store = Self {
            graph: default_funnel(),
            viewport: config.default_viewport(),
            warning: None,
            import_error: None,
            revision: 0,
            persisted_revision: None,
            config,
            storage: Box::new(storage),
        };

        match store.storage.get(&store.config.storage_key) {
            Some(raw) => match parse_snapshot(&raw) {
                Ok(snapshot) => store.apply_snapshot(snapshot),
                Err(err) => log::info!("ignoring saved funnel, using defaults: {}", err),
            },
            None => log::info!("no saved funnel, using defaults"),
        }
        store
    }

    /// A store over fresh in-memory storage with the default settings.
    pub fn in_memory() -> Self {
        Self::load(MemoryStorage::new(), EditorConfig::default())
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Replace graph and view wholesale, purging invalid sales edges.
    fn apply_snapshot(&mut self, snapshot: FunnelSnapshot) {
        let mut graph = FunnelGraph::from_parts(snapshot.nodes, snapshot.edges);
        let purged = graph.remove_invalid_sales_edges();

        self.graph = graph;
        self.viewport = Viewport::new(
            snapshot.pan.unwrap_or(self.config.default_pan),
            snapshot.zoom.unwrap_or(self.config.default_zoom),
        );
        self.warning = None;
        if purged > 0 {
            log::info!("dropped {} invalid sales edge(s) while loading", purged);
            self.warning = Some(SALES_PURGE_WARNING.to_string());
        }
        self.touch();
    }

    // === Queries ===

    pub fn graph(&self) -> &FunnelGraph {
        &self.graph
    }

    pub fn nodes(&self) -> &[FunnelNode] {
        self.graph.nodes()
    }

    pub fn edges(&self) -> &[FunnelEdge] {
        self.graph.edges()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pan(&self) -> Point {
        self.viewport.pan
    }

    pub fn zoom(&self) -> f32 {
        self.viewport.zoom
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The pending user-facing warning, if any.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// The message of the last failed import, cleared by the next successful one.
    pub fn import_error(&self) -> Option<&str> {
        self.import_error.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> FunnelSnapshot {
        FunnelSnapshot {
            nodes: self.graph.nodes().to_vec(),
            edges: self.graph.edges().to_vec(),
            pan: Some(self.viewport.pan),
            zoom: Some(self.viewport.zoom),
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        validate(self.graph.nodes(), self.graph.edges())
    }

    pub fn diagnostic_summary(&self) -> DiagnosticSummary {
        DiagnosticSummary::from_diagnostics(&self.diagnostics())
    }

    pub fn node_status(&self, node_id: &str) -> Option<DiagnosticLevel> {
        node_status(&self.diagnostics(), node_id)
    }

    // === Graph mutations ===

    /// Add a node with its top-left corner at a world position.
    pub fn add_node(&mut self, kind: NodeKind, position: Point) -> String {
        let id = self.graph.add_node(kind, position);
        self.touch();
        id
    }

    /// Add a node centred in the visible viewport (palette click).
    ///
    /// `viewport_size` is the canvas size in screen pixels; a zero width means
    /// the canvas has not been laid out yet.
    pub fn add_node_at_viewport_center(&mut self, kind: NodeKind, viewport_size: Point) -> String {
        let Viewport { pan, zoom } = self.viewport;
        let position = if viewport_size.x > 0.0 {
            Point::new(
                (viewport_size.x / 2.0 - pan.x) / zoom - NODE_WIDTH / 2.0,
                (viewport_size.y / 2.0 - pan.y) / zoom - NODE_HEIGHT / 2.0,
            )
        } else {
            Point::new(
                (PALETTE_FALLBACK_OFFSET - pan.x) / zoom,
                (PALETTE_FALLBACK_OFFSET - pan.y) / zoom,
            )
        };
        self.add_node(kind, position)
    }

    pub fn move_node(&mut self, id: &str, position: Point) -> bool {
        let moved = self.graph.move_node(id, position);
        if moved {
            self.touch();
        }
        moved
    }

    pub fn delete_node(&mut self, id: &str) -> Option<FunnelNode> {
        let removed = self.graph.delete_node(id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn delete_edge(&mut self, id: &str) -> Option<FunnelEdge> {
        let removed = self.graph.delete_edge(id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Connect two pages. User-visible refusals land in [`warning`](Self::warning).
    pub fn connect(&mut self, from: &str, to: &str) -> Result<ConnectOutcome, ConnectError> {
        let edges_before = self.graph.edges().len();
        let result = self.graph.connect(from, to);

        match &result {
            Ok(ConnectOutcome::Created(id)) => {
                log::debug!("connected {} -> {} as {}", from, to, id);
            }
            Ok(ConnectOutcome::AlreadyConnected(_)) => {}
            Err(err) => {
                log::info!("refused connection {} -> {}: {}", from, to, err);
                if err.is_user_visible() {
                    self.warning = Some(err.to_string());
                }
            }
        }
        if self.graph.edges().len() != edges_before {
            self.touch();
        }
        result
    }

    pub fn acknowledge_warning(&mut self) {
        self.warning = None;
    }

    // === View mutations ===

    pub fn set_pan(&mut self, pan: Point) {
        if pan != self.viewport.pan {
            self.viewport.pan = pan;
            self.touch();
        }
    }

    /// Set zoom and pan together. The zoom is clamped.
    pub fn set_view(&mut self, zoom: f32, pan: Point) {
        self.set_viewport(Viewport::new(pan, zoom));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        let viewport = Viewport::new(viewport.pan, viewport.zoom);
        if viewport != self.viewport {
            self.viewport = viewport;
            self.touch();
        }
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.set_viewport(Viewport { zoom, ..self.viewport });
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(step_zoom(self.viewport.zoom, ZOOM_STEP));
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(step_zoom(self.viewport.zoom, -ZOOM_STEP));
    }

    /// Back to the default zoom. Pan is kept.
    pub fn reset_zoom(&mut self) {
        self.set_zoom(self.config.default_zoom);
    }

    /// One wheel notch anchored at a screen point. Returns whether the zoom changed.
    pub fn zoom_at(&mut self, anchor: Point, wheel_delta: f32) -> bool {
        match self.viewport.zoom_at(anchor, wheel_delta) {
            Some(next) => {
                self.set_viewport(next);
                true
            }
            None => false,
        }
    }

    // === Whole-state operations ===

    /// Replace everything with the imported funnel, or change nothing.
    ///
    /// On failure the static user message is stored in
    /// [`import_error`](Self::import_error) and the graph and view are untouched.
    pub fn import_json(&mut self, raw: &str) -> Result<(), SnapshotError> {
        match parse_snapshot(raw) {
            Ok(snapshot) => {
                log::info!(
                    "imported funnel with {} node(s), {} edge(s)",
                    snapshot.nodes.len(),
                    snapshot.edges.len()
                );
                self.import_error = None;
                self.apply_snapshot(snapshot);
                Ok(())
            }
            Err(err) => {
                log::warn!("import failed: {}", err);
                self.import_error = Some(err.user_message().to_string());
                Err(err)
            }
        }
    }

    /// Read a source to the end, then import it.
    pub fn import_from<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        match read_source(reader) {
            Ok(raw) => self.import_json(&raw),
            Err(err) => {
                log::warn!("import failed: {}", err);
                self.import_error = Some(err.user_message().to_string());
                Err(err)
            }
        }
    }

    /// Pretty-printed snapshot for download.
    pub fn export_json(&self) -> Result<String, SnapshotError> {
        self.snapshot().to_json_pretty()
    }

    /// Back to the default funnel and view, clearing warning and import error.
    pub fn reset(&mut self) {
        self.graph = default_funnel();
        self.viewport = self.config.default_viewport();
        self.warning = None;
        self.import_error = None;
        self.touch();
    }

    // === Persistence ===

    /// Whether there are changes not yet written to storage.
    pub fn is_dirty(&self) -> bool {
        self.persisted_revision != Some(self.revision)
    }

    /// Write the snapshot if anything changed since the last write.
    ///
    /// Returns whether a write was attempted. Write failures are logged and
    /// otherwise ignored.
    pub fn commit(&mut self) -> bool {
        if !self.is_dirty() {
            return false;
        }
        self.persisted_revision = Some(self.revision);

        let written = self
            .snapshot()
            .to_json()
            .map_err(|err| err.to_string())
            .and_then(|json| {
                self.storage
                    .set(&self.config.storage_key, &json)
                    .map_err(|err| err.to_string())
            });
        if let Err(err) = written {
            log::warn!("could not persist funnel: {}", err);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn shared_store() -> (FunnelStore, Rc<MemoryStorage>) {
        let storage = Rc::new(MemoryStorage::new());
        let store = FunnelStore::load(storage.clone(), EditorConfig::default());
        (store, storage)
    }

    // ========================================================================
    // Startup
    // ========================================================================

    #[test]
    fn test_load_empty_storage_gives_default_funnel() {
        let store = FunnelStore::in_memory();
        assert_eq!(store.nodes().len(), 5);
        assert_eq!(store.edges().len(), 4);
        assert_eq!(store.viewport(), Viewport::default());
        assert!(store.diagnostics().is_empty());
        assert!(store.warning().is_none());
    }

    #[test]
    fn test_load_corrupt_storage_falls_back() {
        let storage = MemoryStorage::with_entry(STORAGE_KEY, "not json {");
        let store = FunnelStore::load(storage, EditorConfig::default());
        assert_eq!(store.graph(), &default_funnel());
    }

    #[test]
    fn test_load_restores_saved_funnel() {
        let saved = r#"{
            "nodes": [{"id": "o", "type": "order", "title": "Checkout", "x": 1, "y": 2}],
            "edges": [], "pan": {"x": 3, "y": 4}, "zoom": 1.2
        }"#;
        let storage = MemoryStorage::with_entry(STORAGE_KEY, saved);
        let store = FunnelStore::load(storage, EditorConfig::default());
        assert_eq!(store.nodes().len(), 1);
        assert_eq!(store.nodes()[0].title, "Checkout");
        assert_eq!(store.pan(), Point::new(3.0, 4.0));
        assert_eq!(store.zoom(), 1.2);
    }

    #[test]
    fn test_load_purges_invalid_sales_edges() {
        let saved = r#"{"nodes": [
                {"id": "s", "type": "sales", "title": "S"},
                {"id": "u", "type": "upsell", "title": "U"}
            ], "edges": [{"id": "e", "from": "s", "to": "u"}]}"#;
        let storage = MemoryStorage::with_entry(STORAGE_KEY, saved);
        let store = FunnelStore::load(storage, EditorConfig::default());
        assert!(store.edges().is_empty());
        assert_eq!(store.warning(), Some(SALES_PURGE_WARNING));
        assert_eq!(store.viewport(), Viewport::default());
    }

    #[test]
    fn test_custom_storage_key() {
        let config = EditorConfig {
            storage_key: "other".to_string(),
            ..EditorConfig::default()
        };
        let storage = Rc::new(MemoryStorage::new());
        let mut store = FunnelStore::load(storage.clone(), config);
        store.commit();
        assert!(storage.get("other").is_some());
        assert!(storage.get(STORAGE_KEY).is_none());
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    #[test]
    fn test_commit_writes_once_per_change() {
        let (mut store, storage) = shared_store();
        assert!(store.commit());
        assert!(!store.commit());

        store.move_node("node-order", Point::new(1.0, 1.0));
        assert!(store.is_dirty());
        assert!(store.commit());

        let saved = parse_snapshot(&storage.get(STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(saved.nodes[1].origin(), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_commit_survives_write_failure() {
        let mut store = FunnelStore::load(MemoryStorage::read_only(), EditorConfig::default());
        store.zoom_in();
        assert!(store.commit());
        assert!(!store.is_dirty());
        assert_eq!(store.zoom(), 0.9);
    }

    #[test]
    fn test_noop_mutations_do_not_dirty() {
        let (mut store, _) = shared_store();
        store.commit();
        assert!(!store.move_node("ghost", Point::default()));
        assert!(store.delete_edge("ghost").is_none());
        store.set_pan(store.pan());
        assert!(!store.is_dirty());
    }

    // ========================================================================
    // Connections and warnings
    // ========================================================================

    #[test]
    fn test_sales_violation_sets_warning() {
        let mut store = FunnelStore::in_memory();
        let result = store.connect("node-sales", "node-upsell-1");
        assert_eq!(result, Err(ConnectError::SalesTargetNotOrder));
        assert_eq!(store.warning(), Some("Sales Page can only connect to Order Page."));

        store.acknowledge_warning();
        assert!(store.warning().is_none());
    }

    #[test]
    fn test_silent_refusals_leave_warning_empty() {
        let mut store = FunnelStore::in_memory();
        assert!(store.connect("node-thanks", "node-order").is_err());
        assert!(store.connect("node-order", "node-order").is_err());
        assert!(store.warning().is_none());
    }

    // ========================================================================
    // View
    // ========================================================================

    #[test]
    fn test_zoom_buttons_step_and_clamp() {
        let mut store = FunnelStore::in_memory();
        store.zoom_in();
        store.zoom_in();
        assert_eq!(store.zoom(), 1.0);
        for _ in 0..20 {
            store.zoom_out();
        }
        assert_eq!(store.zoom(), 0.6);
        store.reset_zoom();
        assert_eq!(store.zoom(), DEFAULT_ZOOM);
    }

    #[test]
    fn test_set_view_clamps() {
        let mut store = FunnelStore::in_memory();
        store.set_view(12.0, Point::new(1.0, 2.0));
        assert_eq!(store.zoom(), 1.6);
        assert_eq!(store.pan(), Point::new(1.0, 2.0));
    }

    #[test]
    fn test_palette_add_centres_in_viewport() {
        let mut store = FunnelStore::in_memory();
        store.set_view(1.0, Point::new(0.0, 0.0));
        let id = store.add_node_at_viewport_center(NodeKind::Upsell, Point::new(800.0, 600.0));
        let node = store.graph().node(&id).unwrap();
        assert_eq!(node.origin(), Point::new(400.0 - NODE_WIDTH / 2.0, 300.0 - NODE_HEIGHT / 2.0));
        assert_eq!(node.title, "Upsell 3");
    }

    #[test]
    fn test_palette_add_without_viewport_uses_fallback() {
        let mut store = FunnelStore::in_memory();
        store.set_view(0.8, Point::new(80.0, 60.0));
        let id = store.add_node_at_viewport_center(NodeKind::Order, Point::default());
        let node = store.graph().node(&id).unwrap();
        assert_eq!(node.origin(), Point::new(50.0, 75.0));
    }

    // ========================================================================
    // Reset
    // ========================================================================

    #[test]
    fn test_reset_restores_everything() {
        let mut store = FunnelStore::in_memory();
        store.delete_node("node-order");
        store.set_view(1.5, Point::new(-300.0, 10.0));
        store.connect("node-sales", "node-thanks").ok();
        let _ = store.import_json("garbage");

        store.reset();

        assert_eq!(store.graph(), &default_funnel());
        assert_eq!(store.viewport(), Viewport::default());
        assert!(store.warning().is_none());
        assert!(store.import_error().is_none());
    }
}
