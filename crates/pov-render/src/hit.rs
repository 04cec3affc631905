//! Hit testing: point → clip part lookup.
//!
//! Walks clips front-to-back (last inserted is painted on top) and reports
//! which part of the card is under the pointer. Anchors win over the card
//! they sit on, and the button strip at the bottom of the card is reported
//! separately so a press there never starts a drag.

use crate::connector::{anchor_point, node_rect};
use kurbo::Point;
use pov_core::id::NodeId;
use pov_core::layout::NodeMetrics;
use pov_core::model::AnchorRole;
use pov_core::SceneGraph;

/// Which part of a clip card was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    /// The card itself (preview area, title). Drags start here.
    Body,
    /// One of the two connection points.
    Anchor(AnchorRole),
    /// The button strip (play, play sequence, delete).
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub node: NodeId,
    pub part: HitPart,
}

impl Hit {
    pub fn is_body(&self) -> bool {
        self.part == HitPart::Body
    }
}

/// Find the topmost clip part at canvas position (px, py).
/// Returns `None` on empty canvas.
pub fn hit_test(graph: &SceneGraph, metrics: &NodeMetrics, px: f32, py: f32) -> Option<Hit> {
    let p = Point::new(f64::from(px), f64::from(py));
    let radius = f64::from(metrics.anchor_radius);

    for &id in graph.node_ids().iter().rev() {
        let Some(node) = graph.node(id) else {
            continue;
        };

        for role in [AnchorRole::Incoming, AnchorRole::Outgoing] {
            if anchor_point(node.position, metrics, role).distance(p) <= radius {
                return Some(Hit {
                    node: id,
                    part: HitPart::Anchor(role),
                });
            }
        }

        let rect = node_rect(node.position, metrics);
        if p.x < rect.x0 || p.x > rect.x1 || p.y < rect.y0 || p.y > rect.y1 {
            continue;
        }
        let toolbar_top = rect.y1 - f64::from(metrics.toolbar_height);
        let part = if p.y >= toolbar_top {
            HitPart::Control
        } else {
            HitPart::Body
        };
        return Some(Hit { node: id, part });
    }

    None
}
