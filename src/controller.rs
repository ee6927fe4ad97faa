//! High-level controller for funnel editor applications.
//!
//! The [`FunnelEditorController`] owns the store and the gesture machine and
//! exposes them as toolkit-friendly handlers, so a Slint window only has to
//! forward raw events and redraw from [`FunnelEditorController::scene`].
//!
//! # Example
//!
//! ```ignore
//! use funnel_editor::{FunnelEditorController, FileStorage, EditorConfig};
//!
//! slint::include_modules!();
//!
//! fn main() {
//!     let window = MainWindow::new().unwrap();
//!     let ctrl = FunnelEditorController::new(FileStorage::new("data"), EditorConfig::default());
//!
//!     window.on_pointer_down(ctrl.pointer_down_callback());
//!     window.on_pointer_move(ctrl.pointer_move_callback());
//!     window.on_pointer_up(ctrl.pointer_up_callback());
//!     window.on_pointer_cancel(ctrl.pointer_cancel_callback());
//!     window.on_pointer_leave(ctrl.pointer_leave_callback());
//!     window.on_wheel(ctrl.wheel_callback());
//!     window.on_node_dropped(ctrl.drop_callback());
//!     window.on_palette_add(ctrl.palette_add_callback());
//!     window.on_compute_grid(ctrl.grid_commands_callback());
//!
//!     window.run().unwrap();
//! }
//! ```

use crate::geometry::Point;
use crate::gesture::{ConnectionResult, GestureController, PointerTarget};
use crate::graph::NodeKind;
use crate::grid::generate_grid_commands;
use crate::render::{build_scene, Scene};
use crate::snapshot::SnapshotError;
use crate::state::{EditorConfig, FunnelStore};
use crate::storage::{MemoryStorage, SnapshotStorage};
use slint::SharedString;
use std::cell::{Cell, RefCell};
use std::io::Read;
use std::rc::Rc;

/// Controller that routes UI events into the funnel store.
///
/// Every handler runs synchronously to completion and then persists the
/// snapshot if it changed, so one handled event is one render cycle.
///
/// Clone this controller to share it across callbacks.
#[derive(Clone)]
pub struct FunnelEditorController {
    store: Rc<RefCell<FunnelStore>>,
    gestures: Rc<RefCell<GestureController>>,
    canvas_size: Rc<Cell<Point>>,
}

impl Default for FunnelEditorController {
    fn default() -> Self {
        Self::new(MemoryStorage::new(), EditorConfig::default())
    }
}

impl FunnelEditorController {
    /// Load the saved funnel from `storage` (or the default funnel).
    pub fn new(storage: impl SnapshotStorage + 'static, config: EditorConfig) -> Self {
        let ctrl = Self {
            store: Rc::new(RefCell::new(FunnelStore::load(storage, config))),
            gestures: Rc::new(RefCell::new(GestureController::new())),
            canvas_size: Rc::new(Cell::new(Point::default())),
        };
        ctrl.commit();
        ctrl
    }

    /// Get access to the store.
    pub fn store(&self) -> Rc<RefCell<FunnelStore>> {
        self.store.clone()
    }

    pub fn gestures(&self) -> Rc<RefCell<GestureController>> {
        self.gestures.clone()
    }

    fn commit(&self) {
        self.store.borrow_mut().commit();
    }

    /// Record the canvas size in pixels (used by palette adds and the grid).
    pub fn set_canvas_size(&self, width: f32, height: f32) {
        self.canvas_size.set(Point::new(width, height));
    }

    pub fn canvas_size(&self) -> Point {
        self.canvas_size.get()
    }

    /// Current drawable state.
    pub fn scene(&self) -> Scene {
        build_scene(&self.store.borrow(), &self.gestures.borrow(), self.canvas_size.get())
    }

    // === Pointer handlers (canvas-local screen coordinates) ===

    pub fn pointer_down(&self, x: f32, y: f32) -> Option<PointerTarget> {
        let target = self
            .gestures
            .borrow_mut()
            .pointer_down(&mut self.store.borrow_mut(), Point::new(x, y));
        self.commit();
        target
    }

    pub fn pointer_move(&self, x: f32, y: f32) {
        self.gestures
            .borrow_mut()
            .pointer_move(&mut self.store.borrow_mut(), Point::new(x, y));
        self.commit();
    }

    pub fn pointer_up(&self, x: f32, y: f32) -> Option<ConnectionResult> {
        let result = self
            .gestures
            .borrow_mut()
            .pointer_up(&mut self.store.borrow_mut(), Point::new(x, y));
        self.commit();
        result
    }

    pub fn pointer_cancel(&self) {
        self.gestures.borrow_mut().pointer_cancel();
        self.commit();
    }

    pub fn pointer_leave(&self) {
        self.gestures.borrow_mut().pointer_leave();
    }

    pub fn wheel(&self, x: f32, y: f32, delta: f32) -> bool {
        let changed = self
            .gestures
            .borrow_mut()
            .wheel(&mut self.store.borrow_mut(), Point::new(x, y), delta);
        self.commit();
        changed
    }

    /// Palette drop at a canvas point. `tag` is the drag payload.
    pub fn drop_node(&self, tag: &str, x: f32, y: f32) -> Option<String> {
        let id = self
            .gestures
            .borrow_mut()
            .drop_node(&mut self.store.borrow_mut(), tag, Point::new(x, y));
        self.commit();
        id
    }

    // === Toolbar and panel handlers ===

    /// Palette click: add a node centred in the visible canvas.
    pub fn palette_add(&self, kind: NodeKind) -> String {
        let id = self
            .store
            .borrow_mut()
            .add_node_at_viewport_center(kind, self.canvas_size.get());
        self.commit();
        id
    }

    pub fn delete_node(&self, id: &str) -> bool {
        let removed = self.store.borrow_mut().delete_node(id).is_some();
        self.commit();
        removed
    }

    pub fn zoom_in(&self) {
        self.store.borrow_mut().zoom_in();
        self.commit();
    }

    pub fn zoom_out(&self) {
        self.store.borrow_mut().zoom_out();
        self.commit();
    }

    pub fn reset_zoom(&self) {
        self.store.borrow_mut().reset_zoom();
        self.commit();
    }

    pub fn reset(&self) {
        self.gestures.borrow_mut().pointer_cancel();
        self.store.borrow_mut().reset();
        self.commit();
    }

    pub fn acknowledge_warning(&self) {
        self.store.borrow_mut().acknowledge_warning();
    }

    pub fn import_json(&self, raw: &str) -> Result<(), SnapshotError> {
        let result = self.store.borrow_mut().import_json(raw);
        if result.is_ok() {
            self.gestures.borrow_mut().pointer_cancel();
        }
        self.commit();
        result
    }

    pub fn import_from<R: Read>(&self, reader: R) -> Result<(), SnapshotError> {
        let result = self.store.borrow_mut().import_from(reader);
        if result.is_ok() {
            self.gestures.borrow_mut().pointer_cancel();
        }
        self.commit();
        result
    }

    pub fn export_json(&self) -> Result<String, SnapshotError> {
        self.store.borrow().export_json()
    }

    /// Grid commands for the current view and canvas size.
    pub fn grid_commands(&self) -> SharedString {
        let store = self.store.borrow();
        let size = self.canvas_size.get();
        let spacing = store.config().grid_spacing;
        generate_grid_commands(size.x, size.y, &store.viewport(), spacing).into()
    }

    pub fn warning_text(&self) -> SharedString {
        self.store.borrow().warning().unwrap_or_default().into()
    }

    pub fn import_error_text(&self) -> SharedString {
        self.store.borrow().import_error().unwrap_or_default().into()
    }

    pub fn summary_text(&self) -> SharedString {
        self.store.borrow().diagnostic_summary().to_string().into()
    }

    // === Callback factories ===

    /// Returns a callback for `pointer-down(x, y)`.
    pub fn pointer_down_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| {
            ctrl.pointer_down(x, y);
        }
    }

    /// Returns a callback for `pointer-move(x, y)`.
    pub fn pointer_move_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| ctrl.pointer_move(x, y)
    }

    /// Returns a callback for `pointer-up(x, y)`.
    pub fn pointer_up_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| {
            ctrl.pointer_up(x, y);
        }
    }

    /// Returns a callback for `pointer-cancel()`.
    pub fn pointer_cancel_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || ctrl.pointer_cancel()
    }

    /// Returns a callback for `pointer-leave()`.
    pub fn pointer_leave_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || ctrl.pointer_leave()
    }

    /// Returns a callback for `wheel(x, y, delta)`.
    pub fn wheel_callback(&self) -> impl Fn(f32, f32, f32) {
        let ctrl = self.clone();
        move |x, y, delta| {
            ctrl.wheel(x, y, delta);
        }
    }

    /// Returns a callback for `node-dropped(tag, x, y)`.
    pub fn drop_callback(&self) -> impl Fn(SharedString, f32, f32) {
        let ctrl = self.clone();
        move |tag, x, y| {
            ctrl.drop_node(tag.as_str(), x, y);
        }
    }

    /// Returns a callback for `palette-add(tag)`. Unknown tags are ignored.
    pub fn palette_add_callback(&self) -> impl Fn(SharedString) {
        let ctrl = self.clone();
        move |tag| match tag.parse::<NodeKind>() {
            Ok(kind) => {
                ctrl.palette_add(kind);
            }
            Err(err) => log::debug!("ignoring palette add: {}", err),
        }
    }

    /// Returns a callback for `compute-grid(width, height)`.
    pub fn grid_commands_callback(&self) -> impl Fn(f32, f32) -> SharedString {
        let ctrl = self.clone();
        move |width, height| {
            ctrl.set_canvas_size(width, height);
            ctrl.grid_commands()
        }
    }

    /// Returns a callback for `export()` producing the pretty JSON, or an
    /// empty string if serialization failed.
    pub fn export_callback(&self) -> impl Fn() -> SharedString {
        let ctrl = self.clone();
        move || match ctrl.export_json() {
            Ok(json) => json.into(),
            Err(err) => {
                log::warn!("export failed: {}", err);
                SharedString::default()
            }
        }
    }

    /// Returns a callback for `import(text)`.
    pub fn import_callback(&self) -> impl Fn(SharedString) {
        let ctrl = self.clone();
        move |raw| {
            let _ = ctrl.import_json(raw.as_str());
        }
    }
}
