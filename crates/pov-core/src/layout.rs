//! Canvas layout math: grid placement for bulk imports and the scrollable
//! extent of the canvas container.

use crate::graph::SceneGraph;
use crate::model::{Bounds, Position, Size};
use serde::{Deserialize, Serialize};

/// The visible canvas viewport, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Logical size of a clip card and its hot zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetrics {
    pub width: f32,
    pub height: f32,
    /// Radius of the incoming/outgoing connection points.
    pub anchor_radius: f32,
    /// Height of the button strip (play, play sequence, delete) at the
    /// bottom of the card.
    pub toolbar_height: f32,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 170.0,
            anchor_radius: 8.0,
            toolbar_height: 28.0,
        }
    }
}

impl NodeMetrics {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn bounds_at(&self, position: Position) -> Bounds {
        Bounds::at(position, self.size())
    }
}

/// Grid positions for `count` clips dropped at once.
///
/// `columns = floor(available_width / (width + margin))`, at least one;
/// item `i` lands at `(col * (w + m) + m, row * (h + m) + m)`.
pub fn grid_positions(
    count: usize,
    first_index: usize,
    available_width: f32,
    metrics: &NodeMetrics,
    margin: f32,
) -> Vec<Position> {
    let cell_w = metrics.width + margin;
    let cell_h = metrics.height + margin;
    let columns = if cell_w > 0.0 && available_width.is_finite() {
        ((available_width / cell_w).floor() as usize).max(1)
    } else {
        1
    };

    (first_index..first_index + count)
        .map(|i| {
            let col = i % columns;
            let row = i / columns;
            Position::new(
                col as f32 * cell_w + margin,
                row as f32 * cell_h + margin,
            )
        })
        .collect()
}

/// Screen-space size the canvas container must have so every clip is
/// reachable by scrolling: the bounding box of all clip rectangles plus
/// `margin`, scaled by `zoom`, never smaller than the viewport.
pub fn content_extent(
    graph: &SceneGraph,
    metrics: &NodeMetrics,
    margin: f32,
    viewport: Viewport,
    zoom: f32,
) -> Size {
    let (max_x, max_y) = graph
        .nodes()
        .map(|n| metrics.bounds_at(n.position))
        .fold((0.0f32, 0.0f32), |(mx, my), b| {
            (mx.max(b.right()), my.max(b.bottom()))
        });

    Size::new(
        ((max_x + margin) * zoom).max(viewport.width),
        ((max_y + margin) * zoom).max(viewport.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn grid_wraps_by_available_width() {
        let m = NodeMetrics::default();
        // (200 + 20) * 3 = 660 → 3 columns in 700px
        let p = grid_positions(5, 0, 700.0, &m, 20.0);
        assert_eq!(p[0], Position::new(20.0, 20.0));
        assert_eq!(p[1], Position::new(240.0, 20.0));
        assert_eq!(p[2], Position::new(460.0, 20.0));
        assert_eq!(p[3], Position::new(20.0, 210.0));
        assert_eq!(p[4], Position::new(240.0, 210.0));
    }

    #[test]
    fn grid_uses_one_column_when_too_narrow() {
        let m = NodeMetrics::default();
        let p = grid_positions(2, 0, 50.0, &m, 20.0);
        assert_eq!(p[1], Position::new(20.0, 210.0));
    }

    #[test]
    fn grid_continues_from_first_index() {
        let m = NodeMetrics::default();
        let p = grid_positions(1, 3, 700.0, &m, 20.0);
        assert_eq!(p[0], Position::new(20.0, 210.0));
    }

    #[test]
    fn extent_never_shrinks_below_viewport() {
        let g = SceneGraph::new();
        let vp = Viewport {
            width: 800.0,
            height: 600.0,
        };
        let size = content_extent(&g, &NodeMetrics::default(), 50.0, vp, 1.0);
        assert_eq!(size, Size::new(800.0, 600.0));
    }

    #[test]
    fn extent_grows_with_far_nodes_and_zoom() {
        let mut g = SceneGraph::new();
        g.add_node(
            MediaRef::Blob("b".into()),
            "far",
            Position::new(1000.0, 900.0),
        );
        let vp = Viewport {
            width: 800.0,
            height: 600.0,
        };
        let m = NodeMetrics::default();
        let size = content_extent(&g, &m, 50.0, vp, 1.0);
        assert_eq!(size, Size::new(1250.0, 1120.0));

        let zoomed = content_extent(&g, &m, 50.0, vp, 2.0);
        assert_eq!(zoomed, Size::new(2500.0, 2240.0));

        let shrunk = content_extent(&g, &m, 50.0, vp, 0.5);
        assert_eq!(shrunk, Size::new(800.0, 600.0));
    }
}
