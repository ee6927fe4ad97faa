//! Test harness around [`FunnelEditorController`].
//!
//! Mirrors how a window wires the controller: raw pointer events in
//! canvas-local screen coordinates, persistence through a recording storage.

#![allow(dead_code)]

use super::RecordingStorage;
use funnel_editor::{
    EditorConfig, FunnelEditorController, FunnelNode, FunnelSnapshot, HandleKind, Point, Viewport,
    NODE_HEIGHT, NODE_WIDTH,
};

pub struct EditorHarness {
    pub ctrl: FunnelEditorController,
    pub storage: RecordingStorage,
}

impl EditorHarness {
    /// Default funnel over empty storage, canvas 1200x800.
    pub fn new() -> Self {
        Self::with_storage(RecordingStorage::new())
    }

    pub fn with_storage(storage: RecordingStorage) -> Self {
        let ctrl = FunnelEditorController::new(storage.clone(), EditorConfig::default());
        ctrl.set_canvas_size(1200.0, 800.0);
        Self { ctrl, storage }
    }

    /// Default funnel with zoom 1 and no pan, so screen == world.
    pub fn identity_view() -> Self {
        let harness = Self::new();
        harness.set_view(1.0, Point::new(0.0, 0.0));
        harness
    }

    pub fn set_view(&self, zoom: f32, pan: Point) {
        self.ctrl.store().borrow_mut().set_view(zoom, pan);
        self.ctrl.store().borrow_mut().commit();
    }

    pub fn viewport(&self) -> Viewport {
        self.ctrl.store().borrow().viewport()
    }

    pub fn node(&self, id: &str) -> FunnelNode {
        self.ctrl
            .store()
            .borrow()
            .graph()
            .node(id)
            .cloned()
            .unwrap_or_else(|| panic!("node {id} not found"))
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.ctrl.store().borrow().graph().node(id).is_some()
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.ctrl.store().borrow().graph().has_edge(from, to)
    }

    pub fn edge_count(&self) -> usize {
        self.ctrl.store().borrow().edges().len()
    }

    pub fn node_count(&self) -> usize {
        self.ctrl.store().borrow().nodes().len()
    }

    pub fn warning(&self) -> Option<String> {
        self.ctrl.store().borrow().warning().map(str::to_string)
    }

    pub fn snapshot(&self) -> FunnelSnapshot {
        self.ctrl.store().borrow().snapshot()
    }

    pub fn to_screen(&self, world: Point) -> Point {
        self.viewport().world_to_screen(world)
    }

    /// Screen position of the node's centre.
    pub fn node_center(&self, id: &str) -> Point {
        let node = self.node(id);
        self.to_screen(node.origin().offset(NODE_WIDTH / 2.0, NODE_HEIGHT / 2.0))
    }

    pub fn output_handle(&self, id: &str) -> Point {
        self.to_screen(self.node(id).handle(HandleKind::Output))
    }

    pub fn input_handle(&self, id: &str) -> Point {
        self.to_screen(self.node(id).handle(HandleKind::Input))
    }

    /// Press, move through `steps` evenly spaced samples, release.
    pub fn drag(&self, from: Point, to: Point, steps: usize) {
        self.ctrl.pointer_down(from.x, from.y);
        let steps = steps.max(1);
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            self.ctrl
                .pointer_move(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
        }
        self.ctrl.pointer_up(to.x, to.y);
    }

    /// Drag a connection from one node's output handle to another's input handle.
    pub fn connect_by_drag(&self, from: &str, to: &str) {
        self.drag(self.output_handle(from), self.input_handle(to), 4);
    }

    pub fn click(&self, at: Point) {
        self.ctrl.pointer_down(at.x, at.y);
        self.ctrl.pointer_up(at.x, at.y);
    }
}
