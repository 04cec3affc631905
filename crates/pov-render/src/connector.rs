//! Connector lines between clips.
//!
//! An edge is drawn from the source clip's outgoing anchor (bottom centre)
//! to the target clip's incoming anchor (top centre). The transition panel
//! of an edge sits on the connector midpoint.

use kurbo::{Affine, Line, Point, Rect};
use pov_core::id::NodeId;
use pov_core::layout::NodeMetrics;
use pov_core::model::{AnchorRole, Position, Transition};
use pov_core::SceneGraph;

/// Rectangle of a clip card placed at `position`.
pub fn node_rect(position: Position, metrics: &NodeMetrics) -> Rect {
    Rect::new(
        f64::from(position.x),
        f64::from(position.y),
        f64::from(position.x + metrics.width),
        f64::from(position.y + metrics.height),
    )
}

/// Centre of a clip's incoming (top) or outgoing (bottom) anchor.
pub fn anchor_point(position: Position, metrics: &NodeMetrics, role: AnchorRole) -> Point {
    let rect = node_rect(position, metrics);
    let x = rect.center().x;
    match role {
        AnchorRole::Incoming => Point::new(x, rect.y0),
        AnchorRole::Outgoing => Point::new(x, rect.y1),
    }
}

/// The projected line of one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connector {
    pub source: NodeId,
    pub target: NodeId,
    pub line: Line,
}

impl Connector {
    /// Project an edge. `None` when either endpoint is missing from the
    /// graph.
    pub fn from_edge(graph: &SceneGraph, edge: &Transition, metrics: &NodeMetrics) -> Option<Self> {
        let source = graph.node(edge.source)?;
        let target = graph.node(edge.target)?;
        Some(Self {
            source: edge.source,
            target: edge.target,
            line: Line::new(
                anchor_point(source.position, metrics, AnchorRole::Outgoing),
                anchor_point(target.position, metrics, AnchorRole::Incoming),
            ),
        })
    }

    /// Where the transition panel of this edge is anchored.
    pub fn midpoint(&self) -> Point {
        self.line.p0.midpoint(self.line.p1)
    }

    /// The same connector in screen space at `zoom`.
    pub fn scaled(&self, zoom: f64) -> Line {
        let scale = Affine::scale(zoom);
        Line::new(scale * self.line.p0, scale * self.line.p1)
    }
}

/// Project every edge of the graph, in edge order.
pub fn project_connectors(graph: &SceneGraph, metrics: &NodeMetrics) -> Vec<Connector> {
    let connectors: Vec<Connector> = graph
        .edges()
        .filter_map(|e| Connector::from_edge(graph, e, metrics))
        .collect();
    log::trace!("projected {} connectors", connectors.len());
    connectors
}
