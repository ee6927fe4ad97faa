//! Pointer gesture state machine.
//!
//! A pointer-down is classified against the canonical geometry in the store
//! (handles first, then node cards, then edges, then bare canvas) and starts at
//! most one gesture. Moves update that gesture live; up commits, cancel aborts.
//! Wheel zoom and palette drops are independent of the active gesture.

use crate::geometry::{HandleKind, Point, NODE_HEIGHT, NODE_WIDTH};
use crate::graph::{ConnectError, ConnectOutcome, NodeKind};
use crate::hit_test::{find_edge_at, find_handle_at, find_node_at};
use crate::state::FunnelStore;

/// Drag-data type advertised by palette items. The payload is the node tag.
pub const NODE_DRAG_MIME: &str = "application/x-funnel-node";

/// The single active pointer interaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Moving a node; `grab_offset` is pointer world position minus node origin.
    DraggingNode { node_id: String, grab_offset: Point },
    /// Panning the canvas; both points in screen space.
    Panning { origin_pan: Point, pointer_start: Point },
    /// Drawing a new edge from `source_id`'s output handle. Points in world space.
    ConnectingEdge {
        source_id: String,
        start: Point,
        end: Point,
        hovered_target: Option<String>,
    },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }
}

/// What lies under the pointer, in pick priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    OutputHandle(String),
    InputHandle(String),
    Node(String),
    Edge(String),
    Canvas,
}

/// How a connection drag ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionResult {
    /// Released away from any input handle.
    NoTarget,
    Connected(ConnectOutcome),
    Refused(ConnectError),
}

/// Classify a screen point against the store's current geometry.
///
/// Handles hidden under a card drawn later do not count, so the topmost card
/// under the pointer wins over connectors beneath it.
pub fn classify(store: &FunnelStore, screen: Point) -> PointerTarget {
    let world = store.viewport().screen_to_world(screen);

    if let Some(id) = handle_at(store, world, HandleKind::Output) {
        return PointerTarget::OutputHandle(id);
    }
    if let Some(id) = handle_at(store, world, HandleKind::Input) {
        return PointerTarget::InputHandle(id);
    }
    if let Some(id) = find_node_at(world, store.graph().node_geometries()) {
        return PointerTarget::Node(id.to_string());
    }
    match edge_at(store, world) {
        Some(id) => PointerTarget::Edge(id),
        None => PointerTarget::Canvas,
    }
}

fn edge_at(store: &FunnelStore, world: Point) -> Option<String> {
    let config = store.config();
    find_edge_at(
        world,
        store.graph().edge_geometries(),
        store.zoom(),
        config.edge_hit_distance,
        config.edge_hit_samples,
    )
    .map(str::to_string)
}

fn handle_at(store: &FunnelStore, world: Point, kind: HandleKind) -> Option<String> {
    let graph = store.graph();
    find_handle_at(
        world,
        graph.handle_geometries(),
        graph.node_geometries(),
        kind,
        store.zoom(),
        store.config().handle_hit_radius,
    )
    .map(str::to_string)
}

/// Drives [`Gesture`] transitions against a [`FunnelStore`].
#[derive(Debug, Default)]
pub struct GestureController {
    gesture: Gesture,
    edge_hover: bool,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// Whether the idle pointer rests near an edge (delete affordance).
    pub fn edge_hover(&self) -> bool {
        self.edge_hover
    }

    /// Input handle currently targeted by a connection drag.
    pub fn hovered_target(&self) -> Option<&str> {
        match &self.gesture {
            Gesture::ConnectingEdge { hovered_target, .. } => hovered_target.as_deref(),
            _ => None,
        }
    }

    fn transition(&mut self, next: Gesture) {
        log::debug!("gesture {:?} -> {:?}", self.gesture, next);
        self.gesture = next;
    }

    /// Start a gesture. Ignored (returns `None`) while another one is active.
    ///
    /// Returns what was under the pointer. An edge under bare canvas is deleted
    /// on the spot and starts nothing.
    pub fn pointer_down(
        &mut self,
        store: &mut FunnelStore,
        screen: Point,
    ) -> Option<PointerTarget> {
        if !self.gesture.is_idle() {
            log::debug!("pointer down ignored during {:?}", self.gesture);
            return None;
        }
        self.edge_hover = false;

        let target = classify(store, screen);
        let world = store.viewport().screen_to_world(screen);
        match &target {
            PointerTarget::OutputHandle(id) => {
                let start = store
                    .graph()
                    .node(id)
                    .filter(|node| node.kind.has_output())
                    .map(|node| node.handle(HandleKind::Output));
                if let Some(start) = start {
                    self.transition(Gesture::ConnectingEdge {
                        source_id: id.clone(),
                        start,
                        end: start,
                        hovered_target: None,
                    });
                }
            }
            PointerTarget::InputHandle(_) => {}
            PointerTarget::Node(id) => {
                if let Some(node) = store.graph().node(id) {
                    let grab_offset = world.minus(node.origin());
                    self.transition(Gesture::DraggingNode {
                        node_id: id.clone(),
                        grab_offset,
                    });
                }
            }
            PointerTarget::Edge(id) => {
                log::debug!("deleting edge {} on click", id);
                store.delete_edge(id);
            }
            PointerTarget::Canvas => {
                self.transition(Gesture::Panning {
                    origin_pan: store.pan(),
                    pointer_start: screen,
                });
            }
        }
        Some(target)
    }

    /// Apply the latest pointer sample to the active gesture, or refresh the
    /// edge hover affordance when idle.
    pub fn pointer_move(&mut self, store: &mut FunnelStore, screen: Point) {
        let world = store.viewport().screen_to_world(screen);
        match &mut self.gesture {
            Gesture::Idle => {
                self.edge_hover = find_node_at(world, store.graph().node_geometries()).is_none()
                    && edge_at(store, world).is_some();
            }
            Gesture::DraggingNode { node_id, grab_offset } => {
                store.move_node(node_id, world.minus(*grab_offset));
            }
            Gesture::Panning { origin_pan, pointer_start } => {
                store.set_pan(origin_pan.plus(screen.minus(*pointer_start)));
            }
            Gesture::ConnectingEdge {
                source_id,
                end,
                hovered_target,
                ..
            } => {
                *end = world;
                *hovered_target =
                    handle_at(store, world, HandleKind::Input).filter(|id| *id != *source_id);
            }
        }
    }

    /// Pointer left the canvas.
    pub fn pointer_leave(&mut self) {
        self.edge_hover = false;
    }

    /// Finish the active gesture.
    ///
    /// For a connection drag, connects to the input handle under the pointer
    /// (if any) and returns the outcome. Always ends in `Idle`.
    pub fn pointer_up(
        &mut self,
        store: &mut FunnelStore,
        screen: Point,
    ) -> Option<ConnectionResult> {
        let finished = std::mem::take(&mut self.gesture);
        log::debug!("gesture {:?} -> Idle", finished);

        match finished {
            Gesture::ConnectingEdge { source_id, .. } => {
                let world = store.viewport().screen_to_world(screen);
                let result = match handle_at(store, world, HandleKind::Input) {
                    Some(target_id) => match store.connect(&source_id, &target_id) {
                        Ok(outcome) => ConnectionResult::Connected(outcome),
                        Err(err) => ConnectionResult::Refused(err),
                    },
                    None => ConnectionResult::NoTarget,
                };
                Some(result)
            }
            _ => None,
        }
    }

    /// Abort the active gesture. Live drag and pan changes stay applied; a
    /// pending connection is discarded.
    pub fn pointer_cancel(&mut self) {
        if !self.gesture.is_idle() {
            self.transition(Gesture::Idle);
        }
        self.edge_hover = false;
    }

    /// One wheel notch at a screen point. Works in any gesture state.
    pub fn wheel(&mut self, store: &mut FunnelStore, screen: Point, delta: f32) -> bool {
        store.zoom_at(screen, delta)
    }

    /// Palette drop: the node is centred on the drop point.
    ///
    /// `tag` is the drag payload; unknown tags are ignored.
    pub fn drop_node(
        &mut self,
        store: &mut FunnelStore,
        tag: &str,
        screen: Point,
    ) -> Option<String> {
        let kind: NodeKind = match tag.parse() {
            Ok(kind) => kind,
            Err(err) => {
                log::debug!("ignoring drop: {}", err);
                return None;
            }
        };
        let world = store.viewport().screen_to_world(screen);
        let origin = world.offset(-NODE_WIDTH / 2.0, -NODE_HEIGHT / 2.0);
        Some(store.add_node(kind, origin))
    }
}
