use crate::geometry::{handle_position, HandleKind, Point};
use crate::hit_test::{EdgeGeometry, HandleGeometry, NodeGeometry};
use serde::{Deserialize, Serialize};
use slint::Color;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The five kinds of funnel page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Sales,
    Order,
    Upsell,
    Downsell,
    #[serde(rename = "thankyou")]
    ThankYou,
}

/// Static presentation data for a [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTemplate {
    /// Default title, and the prefix for numbered upsell/downsell titles.
    pub label: &'static str,
    /// Caption of the call-to-action button on the page card.
    pub button_label: &'static str,
    pub helper: &'static str,
    /// Single-letter icon.
    pub glyph: char,
    accent_rgb: u32,
}

impl NodeTemplate {
    pub fn accent(&self) -> Color {
        let rgb = self.accent_rgb;
        Color::from_rgb_u8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }
}

const SALES_TEMPLATE: NodeTemplate = NodeTemplate {
    label: "Sales Page",
    button_label: "Start Checkout",
    helper: "Landing + product details",
    glyph: 'S',
    accent_rgb: 0xe07a5f,
};
const ORDER_TEMPLATE: NodeTemplate = NodeTemplate {
    label: "Order Page",
    button_label: "Place Order",
    helper: "Shipping + payment",
    glyph: 'O',
    accent_rgb: 0x3d405b,
};
const UPSELL_TEMPLATE: NodeTemplate = NodeTemplate {
    label: "Upsell",
    button_label: "Add to Order",
    helper: "Post-purchase offer",
    glyph: 'U',
    accent_rgb: 0x81b29a,
};
const DOWNSELL_TEMPLATE: NodeTemplate = NodeTemplate {
    label: "Downsell",
    button_label: "Keep Savings",
    helper: "Alternative offer",
    glyph: 'D',
    accent_rgb: 0xf2cc8f,
};
const THANK_YOU_TEMPLATE: NodeTemplate = NodeTemplate {
    label: "Thank You",
    button_label: "Finish",
    helper: "Confirmation + next steps",
    glyph: 'T',
    accent_rgb: 0x6b9080,
};

impl NodeKind {
    /// Palette order.
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Sales,
        NodeKind::Order,
        NodeKind::Upsell,
        NodeKind::Downsell,
        NodeKind::ThankYou,
    ];

    pub fn template(self) -> &'static NodeTemplate {
        match self {
            NodeKind::Sales => &SALES_TEMPLATE,
            NodeKind::Order => &ORDER_TEMPLATE,
            NodeKind::Upsell => &UPSELL_TEMPLATE,
            NodeKind::Downsell => &DOWNSELL_TEMPLATE,
            NodeKind::ThankYou => &THANK_YOU_TEMPLATE,
        }
    }

    pub fn label(self) -> &'static str {
        self.template().label
    }

    /// Tag used on the wire and in drag data.
    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::Sales => "sales",
            NodeKind::Order => "order",
            NodeKind::Upsell => "upsell",
            NodeKind::Downsell => "downsell",
            NodeKind::ThankYou => "thankyou",
        }
    }

    /// Sales pages are funnel entry points and take no incoming edges.
    pub fn has_input(self) -> bool {
        self != NodeKind::Sales
    }

    /// Thank-you pages are terminal.
    pub fn has_output(self) -> bool {
        self != NodeKind::ThankYou
    }

    /// Whether new titles of this kind are numbered ("Upsell 2").
    fn is_numbered(self) -> bool {
        matches!(self, NodeKind::Upsell | NodeKind::Downsell)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node type '{0}'")]
pub struct UnknownNodeKind(pub String);

impl FromStr for NodeKind {
    type Err = UnknownNodeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| UnknownNodeKind(s.to_string()))
    }
}

/// A funnel page placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub title: String,
    /// World-space top-left corner.
    pub x: f32,
    pub y: f32,
}

impl FunnelNode {
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn handle(&self, kind: HandleKind) -> Point {
        handle_position(self.origin(), kind)
    }
}

/// A directed connection from one page's output to another page's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelEdge {
    pub id: String,
    pub from: String,
    pub to: String,
}

// ============================================================================
// Connection rules
// ============================================================================

/// Reasons why a connection was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("A page cannot connect to itself.")]
    SelfLoop,
    #[error("Page '{0}' does not exist.")]
    NodeNotFound(String),
    #[error("Thank You pages must not have outgoing connections.")]
    TerminalSource,
    #[error("Sales Page can only connect to Order Page.")]
    SalesTargetNotOrder,
    /// Refusal from a host-supplied [`ConnectionRule`], carrying its message.
    #[error("{0}")]
    Rejected(String),
}

impl ConnectError {
    /// Whether the refusal should be shown to the user.
    ///
    /// The remaining refusals come from gestures the UI never offers (no
    /// output handle on thank-you pages, dropping onto the source itself).
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ConnectError::SalesTargetNotOrder | ConnectError::Rejected(_))
    }
}

/// Trait for domain rules checked before an edge is created.
///
/// Endpoint existence and self-loops are checked by [`FunnelGraph::connect_with`]
/// before any rule runs.
pub trait ConnectionRule {
    fn check(&self, from: &FunnelNode, to: &FunnelNode) -> Result<(), ConnectError>;
}

/// Thank-you pages end the funnel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalThankYou;

impl ConnectionRule for TerminalThankYou {
    fn check(&self, from: &FunnelNode, _to: &FunnelNode) -> Result<(), ConnectError> {
        if from.kind.has_output() {
            Ok(())
        } else {
            Err(ConnectError::TerminalSource)
        }
    }
}

/// A sales page may only feed an order page.
#[derive(Clone, Copy, Debug, Default)]
pub struct SalesFeedsOrder;

impl ConnectionRule for SalesFeedsOrder {
    fn check(&self, from: &FunnelNode, to: &FunnelNode) -> Result<(), ConnectError> {
        if from.kind == NodeKind::Sales && to.kind != NodeKind::Order {
            Err(ConnectError::SalesTargetNotOrder)
        } else {
            Ok(())
        }
    }
}

/// Runs rules in order and stops at the first refusal.
pub struct CompositeRule {
    rules: Vec<Box<dyn ConnectionRule>>,
}

impl CompositeRule {
    /// Create an empty rule set that accepts everything.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add<R: ConnectionRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

impl Default for CompositeRule {
    /// The funnel rules: terminal thank-you pages, sales feeds order.
    fn default() -> Self {
        Self::new().add(TerminalThankYou).add(SalesFeedsOrder)
    }
}

impl ConnectionRule for CompositeRule {
    fn check(&self, from: &FunnelNode, to: &FunnelNode) -> Result<(), ConnectError> {
        self.rules.iter().try_for_each(|rule| rule.check(from, to))
    }
}

/// Result of a successful [`FunnelGraph::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Created(String),
    /// The pair was already connected; holds the surviving edge id.
    AlreadyConnected(String),
}

impl ConnectOutcome {
    pub fn edge_id(&self) -> &str {
        match self {
            ConnectOutcome::Created(id) | ConnectOutcome::AlreadyConnected(id) => id,
        }
    }
}

// ============================================================================
// Graph
// ============================================================================

/// Node and edge collections with the funnel editing operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelGraph {
    nodes: Vec<FunnelNode>,
    edges: Vec<FunnelEdge>,
    next_id: u64,
}

impl FunnelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from collections that were already repaired.
    pub fn from_parts(nodes: Vec<FunnelNode>, edges: Vec<FunnelEdge>) -> Self {
        Self {
            nodes,
            edges,
            next_id: 0,
        }
    }

    pub fn into_parts(self) -> (Vec<FunnelNode>, Vec<FunnelEdge>) {
        (self.nodes, self.edges)
    }

    pub fn nodes(&self) -> &[FunnelNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FunnelEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FunnelNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&FunnelEdge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|edge| edge.from == from && edge.to == to)
    }

    fn id_taken(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id) || self.edges.iter().any(|edge| edge.id == id)
    }

    /// Allocate an id of the form `<prefix>-<n>` unused by any node or edge.
    pub fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let candidate = format!("{}-{}", prefix, self.next_id);
            if !self.id_taken(&candidate) {
                return candidate;
            }
        }
    }

    /// Add a node of `kind` at a world position. Returns the new id.
    pub fn add_node(&mut self, kind: NodeKind, position: Point) -> String {
        let id = self.fresh_id(&format!("node-{}", kind.tag()));
        let title = next_title(kind, &self.nodes);
        self.nodes.push(FunnelNode {
            id: id.clone(),
            kind,
            title,
            x: position.x,
            y: position.y,
        });
        id
    }

    /// Move a node. Returns `false` (and changes nothing) when the id is unknown.
    pub fn move_node(&mut self, id: &str, position: Point) -> bool {
        match self.nodes.iter_mut().find(|node| node.id == id) {
            Some(node) => {
                node.x = position.x;
                node.y = position.y;
                true
            }
            None => false,
        }
    }

    /// Remove a node and every edge touching it. Returns the removed node.
    pub fn delete_node(&mut self, id: &str) -> Option<FunnelNode> {
        let index = self.nodes.iter().position(|node| node.id == id)?;
        let node = self.nodes.remove(index);
        self.edges.retain(|edge| edge.from != id && edge.to != id);
        Some(node)
    }

    /// Remove an edge by id. Returns the removed edge.
    pub fn delete_edge(&mut self, id: &str) -> Option<FunnelEdge> {
        let index = self.edges.iter().position(|edge| edge.id == id)?;
        Some(self.edges.remove(index))
    }

    /// Connect two pages under the funnel rules.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<ConnectOutcome, ConnectError> {
        self.connect_with(from, to, &CompositeRule::default())
    }

    /// Connect two pages under a custom rule set.
    ///
    /// A refused sales→non-order connection also purges every other
    /// sales→non-order edge already in the graph.
    pub fn connect_with<R>(
        &mut self,
        from: &str,
        to: &str,
        rule: &R,
    ) -> Result<ConnectOutcome, ConnectError>
    where
        R: ConnectionRule + ?Sized,
    {
        if from == to {
            return Err(ConnectError::SelfLoop);
        }
        let from_node = self
            .node(from)
            .ok_or_else(|| ConnectError::NodeNotFound(from.to_string()))?;
        let to_node = self
            .node(to)
            .ok_or_else(|| ConnectError::NodeNotFound(to.to_string()))?;

        if let Err(err) = rule.check(from_node, to_node) {
            if err == ConnectError::SalesTargetNotOrder {
                let purged = self.remove_invalid_sales_edges();
                if purged > 0 {
                    log::info!("purged {} invalid sales edge(s)", purged);
                }
            }
            return Err(err);
        }

        if let Some(existing) = self.edges.iter().find(|edge| edge.from == from && edge.to == to) {
            return Ok(ConnectOutcome::AlreadyConnected(existing.id.clone()));
        }

        let id = self.fresh_id("edge");
        self.edges.push(FunnelEdge {
            id: id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(ConnectOutcome::Created(id))
    }

    /// Drop every edge leaving a sales page for anything but an order page.
    ///
    /// Returns how many edges were removed.
    pub fn remove_invalid_sales_edges(&mut self) -> usize {
        let before = self.edges.len();
        let nodes = &self.nodes;
        let kind_of = |id: &str| nodes.iter().find(|node| node.id == id).map(|node| node.kind);
        self.edges.retain(|edge| {
            let from_sales = kind_of(&edge.from) == Some(NodeKind::Sales);
            !(from_sales && kind_of(&edge.to) != Some(NodeKind::Order))
        });
        before - self.edges.len()
    }

    // === Geometry views ===

    /// World-space endpoints of every edge whose nodes both exist, in edge order.
    pub fn edge_geometries(&self) -> impl Iterator<Item = EdgeGeometry<'_>> + '_ {
        self.edges.iter().filter_map(move |edge| {
            let from = self.node(&edge.from)?;
            let to = self.node(&edge.to)?;
            Some(EdgeGeometry {
                id: &edge.id,
                start: from.handle(HandleKind::Output),
                end: to.handle(HandleKind::Input),
            })
        })
    }

    /// Every rendered handle. Sales pages have no input, thank-you pages no output.
    pub fn handle_geometries(&self) -> impl Iterator<Item = HandleGeometry<'_>> + '_ {
        self.nodes.iter().flat_map(|node| {
            let input = node.kind.has_input().then(|| HandleGeometry {
                node_id: &node.id,
                kind: HandleKind::Input,
                position: node.handle(HandleKind::Input),
            });
            let output = node.kind.has_output().then(|| HandleGeometry {
                node_id: &node.id,
                kind: HandleKind::Output,
                position: node.handle(HandleKind::Output),
            });
            input.into_iter().chain(output)
        })
    }

    pub fn node_geometries(&self) -> impl Iterator<Item = NodeGeometry<'_>> + '_ {
        self.nodes.iter().map(|node| NodeGeometry {
            id: &node.id,
            origin: node.origin(),
        })
    }
}

/// Remove later edges that repeat an earlier `(from, to)` pair.
///
/// Returns how many edges were removed.
pub fn dedupe_edges(edges: &mut Vec<FunnelEdge>) -> usize {
    let before = edges.len();
    let mut seen = HashSet::new();
    edges.retain(|edge| seen.insert((edge.from.clone(), edge.to.clone())));
    before - edges.len()
}

/// Title for a new node of `kind`.
///
/// Upsells and downsells get the smallest unused number among existing
/// "<Label> <N>" titles of the same kind; other kinds use the plain label.
pub fn next_title(kind: NodeKind, nodes: &[FunnelNode]) -> String {
    let label = kind.label();
    if !kind.is_numbered() {
        return label.to_string();
    }

    let used: HashSet<u32> = nodes
        .iter()
        .filter(|node| node.kind == kind)
        .filter_map(|node| parse_numbered_title(&node.title, label))
        .collect();

    let next = (1..).find(|n| !used.contains(n)).unwrap_or(1);
    format!("{} {}", label, next)
}

/// Parse "<label><whitespace><digits>", label compared case-insensitively.
fn parse_numbered_title(title: &str, label: &str) -> Option<u32> {
    let prefix = title.get(..label.len())?;
    if !prefix.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = &title[label.len()..];
    let digits = rest.trim_start();
    if digits.len() == rest.len()
        || digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

// ============================================================================
// Tests
// ============================================================================
