//! Tool system for canvas interactions.
//!
//! Each tool translates input events into `EditorMutation`s that are
//! applied via the `SyncEngine`. Both tools see every pointer event; what
//! they react to is decided by the hit part under the pointer:
//!
//! | Hit part | Drag Tool | Link Tool |
//! |----------|-----------|-----------|
//! | **Body** | Start drag | ignored |
//! | **Anchor** | ignored | Pick / complete link |
//! | **Control** | ignored | ignored |
//!
//! Event coordinates are logical canvas units (already divided by zoom).

use crate::input::InputEvent;
use crate::sync::EditorMutation;
use pov_core::SceneGraph;
use pov_core::id::NodeId;
use pov_core::model::{Anchor, Position};
use pov_render::hit::{Hit, HitPart};

/// Trait for tools that handle input and produce mutations.
pub trait Tool {
    /// Handle an input event, returning zero or more mutations.
    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, graph: &SceneGraph) -> Vec<EditorMutation>;

    /// Drop any state referring to a clip that is about to disappear.
    fn forget(&mut self, id: NodeId);
}

// ─── Drag Tool ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Grab {
    node: NodeId,
    /// Pointer offset from the clip's top-left corner at pointer-down.
    offset_x: f32,
    offset_y: f32,
}

#[derive(Debug, Default)]
pub struct DragTool {
    grab: Option<Grab>,
}

impl DragTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dragging(&self) -> Option<NodeId> {
        self.grab.map(|g| g.node)
    }
}

impl Tool for DragTool {
    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, graph: &SceneGraph) -> Vec<EditorMutation> {
        match event {
            InputEvent::PointerDown { x, y, .. } => {
                self.grab = hit
                    .filter(|h| h.part == HitPart::Body)
                    .and_then(|h| graph.node(h.node))
                    .map(|n| Grab {
                        node: n.id,
                        offset_x: x - n.position.x,
                        offset_y: y - n.position.y,
                    });
                if let Some(g) = self.grab {
                    log::debug!("drag start {}", g.node);
                }
                vec![]
            }
            InputEvent::PointerMove { x, y, .. } => match self.grab {
                Some(g) => vec![EditorMutation::MoveNode {
                    id: g.node,
                    position: Position::new(x - g.offset_x, y - g.offset_y).clamped(),
                }],
                None => vec![],
            },
            InputEvent::PointerUp { .. } => {
                self.grab = None;
                vec![]
            }
        }
    }

    fn forget(&mut self, id: NodeId) {
        if self.dragging() == Some(id) {
            self.grab = None;
        }
    }
}

// ─── Link Tool ───────────────────────────────────────────────────────────

/// Click-to-link protocol state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Idle,
    /// First anchor picked, shown as active.
    Pending(Anchor),
}

#[derive(Debug, Default)]
pub struct LinkTool {
    state: LinkState,
}

impl LinkTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn pending(&self) -> Option<Anchor> {
        match self.state {
            LinkState::Pending(a) => Some(a),
            LinkState::Idle => None,
        }
    }

    /// Abort a pending link. Returns true if one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.pending().is_some();
        self.state = LinkState::Idle;
        was_pending
    }

    fn click(&mut self, anchor: Anchor) -> Vec<EditorMutation> {
        match self.state {
            LinkState::Idle => {
                log::debug!("link pending at {} {:?}", anchor.node, anchor.role);
                self.state = LinkState::Pending(anchor);
                vec![]
            }
            // Clicking the active anchor again keeps it active.
            LinkState::Pending(first) if first == anchor => vec![],
            LinkState::Pending(first) => {
                self.state = LinkState::Idle;
                match Anchor::edge_between(first, anchor) {
                    Some((source, target)) => vec![EditorMutation::AddEdge { source, target }],
                    None => {
                        log::debug!("link rejected: {first:?} / {anchor:?}");
                        vec![]
                    }
                }
            }
        }
    }
}

impl Tool for LinkTool {
    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, _graph: &SceneGraph) -> Vec<EditorMutation> {
        match (event, hit) {
            (
                InputEvent::PointerDown { .. },
                Some(Hit {
                    node,
                    part: HitPart::Anchor(role),
                }),
            ) => self.click(Anchor::new(node, role)),
            _ => vec![],
        }
    }

    fn forget(&mut self, id: NodeId) {
        if self.pending().is_some_and(|a| a.node == id) {
            self.state = LinkState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pov_core::model::{AnchorRole, MediaRef};
    use pretty_assertions::assert_eq;

    fn graph() -> (SceneGraph, NodeId, NodeId) {
        let mut g = SceneGraph::new();
        let a = g.add_node(MediaRef::Blob("a".into()), "a", Position::new(100.0, 100.0));
        let b = g.add_node(MediaRef::Blob("b".into()), "b", Position::new(400.0, 100.0));
        (g, a, b)
    }

    fn anchor(node: NodeId, role: AnchorRole) -> Option<Hit> {
        Some(Hit {
            node,
            part: HitPart::Anchor(role),
        })
    }

    fn body(node: NodeId) -> Option<Hit> {
        Some(Hit {
            node,
            part: HitPart::Body,
        })
    }

    #[test]
    fn drag_keeps_pointer_offset() {
        let (g, a, _) = graph();
        let mut tool = DragTool::new();
        tool.handle(&InputEvent::pointer_down(110.0, 120.0), body(a), &g);
        let m = tool.handle(&InputEvent::pointer_move(210.0, 320.0), None, &g);
        assert_eq!(
            m,
            vec![EditorMutation::MoveNode {
                id: a,
                position: Position::new(200.0, 300.0)
            }]
        );
        tool.handle(&InputEvent::pointer_up(210.0, 320.0), None, &g);
        assert!(tool.handle(&InputEvent::pointer_move(0.0, 0.0), None, &g).is_empty());
    }

    #[test]
    fn drag_clamps_to_canvas_origin() {
        let (g, a, _) = graph();
        let mut tool = DragTool::new();
        tool.handle(&InputEvent::pointer_down(110.0, 110.0), body(a), &g);
        let m = tool.handle(&InputEvent::pointer_move(-50.0, 5.0), None, &g);
        assert_eq!(
            m,
            vec![EditorMutation::MoveNode {
                id: a,
                position: Position::new(0.0, 0.0)
            }]
        );
    }

    #[test]
    fn drag_never_starts_on_controls_or_anchors() {
        let (g, a, _) = graph();
        let mut tool = DragTool::new();
        let control = Some(Hit {
            node: a,
            part: HitPart::Control,
        });
        tool.handle(&InputEvent::pointer_down(110.0, 260.0), control, &g);
        assert_eq!(tool.dragging(), None);
        tool.handle(
            &InputEvent::pointer_down(200.0, 100.0),
            anchor(a, AnchorRole::Incoming),
            &g,
        );
        assert_eq!(tool.dragging(), None);
    }

    #[test]
    fn forgetting_the_dragged_clip_ends_the_drag() {
        let (g, a, _) = graph();
        let mut tool = DragTool::new();
        tool.handle(&InputEvent::pointer_down(110.0, 120.0), body(a), &g);
        tool.forget(a);
        assert!(tool.handle(&InputEvent::pointer_move(300.0, 300.0), None, &g).is_empty());
    }

    #[test]
    fn link_in_either_order() {
        let (g, a, b) = graph();
        let mut tool = LinkTool::new();
        let down = InputEvent::pointer_down(0.0, 0.0);

        tool.handle(&down, anchor(b, AnchorRole::Incoming), &g);
        let m = tool.handle(&down, anchor(a, AnchorRole::Outgoing), &g);
        assert_eq!(m, vec![EditorMutation::AddEdge { source: a, target: b }]);
        assert_eq!(tool.state(), LinkState::Idle);
    }

    #[test]
    fn same_role_returns_to_idle_without_edge() {
        let (g, a, b) = graph();
        let mut tool = LinkTool::new();
        let down = InputEvent::pointer_down(0.0, 0.0);
        tool.handle(&down, anchor(a, AnchorRole::Outgoing), &g);
        let m = tool.handle(&down, anchor(b, AnchorRole::Outgoing), &g);
        assert!(m.is_empty());
        assert_eq!(tool.state(), LinkState::Idle);
    }

    #[test]
    fn same_anchor_twice_stays_pending() {
        let (g, a, _) = graph();
        let mut tool = LinkTool::new();
        let down = InputEvent::pointer_down(0.0, 0.0);
        tool.handle(&down, anchor(a, AnchorRole::Outgoing), &g);
        tool.handle(&down, anchor(a, AnchorRole::Outgoing), &g);
        assert_eq!(
            tool.pending(),
            Some(Anchor::new(a, AnchorRole::Outgoing))
        );
    }

    #[test]
    fn cancel_drops_pending_link() {
        let (g, a, b) = graph();
        let mut tool = LinkTool::new();
        let down = InputEvent::pointer_down(0.0, 0.0);
        tool.handle(&down, anchor(a, AnchorRole::Outgoing), &g);
        assert!(tool.cancel());
        assert!(!tool.cancel());
        assert_eq!(tool.state(), LinkState::Idle);
        // The next anchor starts a fresh link rather than completing one.
        let m = tool.handle(&down, anchor(b, AnchorRole::Incoming), &g);
        assert!(m.is_empty());
        assert!(tool.pending().is_some());
    }

    #[test]
    fn body_clicks_do_not_disturb_a_pending_link() {
        let (g, a, b) = graph();
        let mut tool = LinkTool::new();
        let down = InputEvent::pointer_down(0.0, 0.0);
        tool.handle(&down, anchor(a, AnchorRole::Outgoing), &g);
        tool.handle(&down, body(b), &g);
        assert!(tool.pending().is_some());
    }
}
