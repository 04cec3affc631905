//! Transition editor: one floating panel per edge.
//!
//! A panel exists for every edge that carries at least one transition line.
//! It is anchored at the connector midpoint (screen space) and re-anchored
//! whenever a sync reports that the edge's connector moved, so there is no
//! per-frame polling. Deleting a transition clears its lines, which removes
//! the panel while the edge and its default target stay.
//!
//! Line linking uses one global arm: at most one line is waiting for a clip
//! click at any time.

use crate::sync::{EditorMutation, SyncEngine, ViewDelta};
use pov_core::SceneGraph;
use pov_core::id::NodeId;
use pov_core::model::Position;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPanel {
    pub source: NodeId,
    pub target: NodeId,
    pub collapsed: bool,
    /// Connector midpoint in container pixels.
    pub anchor: Position,
}

/// The line currently waiting for a clip click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkArm {
    pub source: NodeId,
    pub line: usize,
}

#[derive(Debug, Default)]
pub struct TransitionEditor {
    panels: HashMap<NodeId, TransitionPanel>,
    armed: Option<LinkArm>,
}

impl TransitionEditor {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Projection ──────────────────────────────────────────────────────

    /// Bring panels in line with the engine after a sync. Returns true when
    /// any panel appeared, vanished or moved, or the arm was dropped.
    pub fn sync(&mut self, engine: &SyncEngine, delta: &ViewDelta) -> bool {
        let mut changed = false;
        if delta.full {
            let stale: Vec<NodeId> = self
                .panels
                .keys()
                .filter(|s| engine.graph.outgoing(**s).is_none())
                .copied()
                .collect();
            for source in stale {
                self.panels.remove(&source);
            }
            let sources: Vec<NodeId> = engine.graph.edges().map(|e| e.source).collect();
            for source in sources {
                self.refresh(engine, source);
            }
            changed = true;
        } else {
            let touched = delta
                .connectors
                .iter()
                .chain(&delta.removed_connectors)
                .chain(&delta.panels);
            for source in touched {
                changed |= self.refresh(engine, *source);
            }
        }
        changed | self.prune_arm(&engine.graph)
    }

    fn refresh(&mut self, engine: &SyncEngine, source: NodeId) -> bool {
        let edge = engine
            .graph
            .outgoing(source)
            .filter(|e| !e.lines.is_empty());
        let (Some(edge), Some(anchor)) = (edge, engine.panel_anchor(source)) else {
            return self.panels.remove(&source).is_some();
        };

        match self.panels.get_mut(&source) {
            Some(panel) if panel.target == edge.target => {
                let moved = panel.anchor != anchor;
                panel.anchor = anchor;
                moved
            }
            _ => {
                self.panels.insert(
                    source,
                    TransitionPanel {
                        source,
                        target: edge.target,
                        collapsed: false,
                        anchor,
                    },
                );
                true
            }
        }
    }

    fn prune_arm(&mut self, graph: &SceneGraph) -> bool {
        let Some(arm) = self.armed else {
            return false;
        };
        let valid = graph
            .outgoing(arm.source)
            .is_some_and(|e| arm.line < e.lines.len());
        if !valid {
            log::debug!("link arm on {} line {} dropped", arm.source, arm.line);
            self.armed = None;
        }
        !valid
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn panel(&self, source: NodeId) -> Option<&TransitionPanel> {
        self.panels.get(&source)
    }

    /// Panels in edge order.
    pub fn panels<'a>(&'a self, graph: &'a SceneGraph) -> impl Iterator<Item = &'a TransitionPanel> {
        graph.edges().filter_map(|e| self.panels.get(&e.source))
    }

    pub fn armed(&self) -> Option<LinkArm> {
        self.armed
    }

    // ─── Panel state ─────────────────────────────────────────────────────

    pub fn toggle_collapsed(&mut self, source: NodeId) -> bool {
        match self.panels.get_mut(&source) {
            Some(panel) => {
                panel.collapsed = !panel.collapsed;
                true
            }
            None => false,
        }
    }

    // ─── Line editing ────────────────────────────────────────────────────

    pub fn edit_line(&self, source: NodeId, index: usize, text: impl Into<String>) -> Vec<EditorMutation> {
        if !self.panels.contains_key(&source) {
            return vec![];
        }
        vec![EditorMutation::SetLineText {
            source,
            index,
            text: text.into(),
        }]
    }

    /// Append a blank line. Works on a deleted transition too: the edge
    /// is still there, and its panel comes back with the new line.
    pub fn add_line(&self, graph: &SceneGraph, source: NodeId) -> Vec<EditorMutation> {
        if graph.outgoing(source).is_none() {
            return vec![];
        }
        vec![EditorMutation::AddLine { source }]
    }

    /// Remove one line. The last remaining line cannot be removed; use
    /// [`Self::delete_transition`] to drop the panel.
    pub fn remove_line(&mut self, graph: &SceneGraph, source: NodeId, index: usize) -> Vec<EditorMutation> {
        let count = graph.outgoing(source).map_or(0, |e| e.lines.len());
        if count <= 1 || index >= count {
            return vec![];
        }
        if let Some(arm) = self.armed.filter(|a| a.source == source) {
            self.armed = match arm.line.cmp(&index) {
                std::cmp::Ordering::Less => Some(arm),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(LinkArm {
                    line: arm.line - 1,
                    ..arm
                }),
            };
        }
        vec![EditorMutation::RemoveLine { source, index }]
    }

    /// Clear every line of the edge leaving `source`. The edge stays.
    pub fn delete_transition(&mut self, source: NodeId) -> Vec<EditorMutation> {
        if self.armed.is_some_and(|a| a.source == source) {
            self.armed = None;
        }
        vec![EditorMutation::ClearLines { source }]
    }

    // ─── Line linking ────────────────────────────────────────────────────

    /// Arm `line` of `source` for linking. Arming the armed line again
    /// disarms it. Returns whether a line is armed afterwards.
    pub fn arm_link(&mut self, graph: &SceneGraph, source: NodeId, line: usize) -> bool {
        let arm = LinkArm { source, line };
        if self.armed == Some(arm) {
            self.armed = None;
            return false;
        }
        let exists = graph
            .outgoing(source)
            .is_some_and(|e| line < e.lines.len());
        if !exists {
            return self.armed.is_some();
        }
        log::debug!("armed link on {source} line {line}");
        self.armed = Some(arm);
        true
    }

    /// Returns true if a line was armed.
    pub fn disarm(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// A clip body was clicked. Completes an armed link.
    pub fn node_clicked(&mut self, node: NodeId) -> Vec<EditorMutation> {
        match self.armed.take() {
            Some(arm) => vec![EditorMutation::SetLineLink {
                source: arm.source,
                index: arm.line,
                target: Some(node),
            }],
            None => vec![],
        }
    }

    pub fn unlink_line(&self, source: NodeId, index: usize) -> Vec<EditorMutation> {
        vec![EditorMutation::SetLineLink {
            source,
            index,
            target: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use pov_core::layout::Viewport;
    use pov_core::model::MediaRef;
    use pretty_assertions::assert_eq;

    struct Fixture {
        engine: SyncEngine,
        editor: TransitionEditor,
        a: NodeId,
        b: NodeId,
        d: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut engine = SyncEngine::new(EditorConfig::default(), Viewport::default());
            let a = engine.add_node(MediaRef::Blob("a".into()), "a", Position::new(0.0, 0.0));
            let b = engine.add_node(MediaRef::Blob("b".into()), "b", Position::new(300.0, 0.0));
            let d = engine.add_node(MediaRef::Blob("d".into()), "d", Position::new(0.0, 300.0));
            engine.apply_mutation(EditorMutation::AddEdge { source: a, target: b });
            let mut f = Self {
                engine,
                editor: TransitionEditor::new(),
                a,
                b,
                d,
            };
            f.sync();
            f
        }

        fn apply(&mut self, mutations: Vec<EditorMutation>) {
            self.engine.apply_mutations(mutations);
            self.sync();
        }

        fn sync(&mut self) -> bool {
            let delta = self.engine.sync();
            self.editor.sync(&self.engine, &delta)
        }
    }

    #[test]
    fn new_edge_gets_a_panel_at_the_midpoint() {
        let f = Fixture::new();
        let panel = f.editor.panel(f.a).unwrap();
        assert_eq!(panel.target, f.b);
        assert_eq!(panel.anchor, Position::new(250.0, 85.0));
        assert!(!panel.collapsed);
    }

    #[test]
    fn panel_follows_dragged_endpoint() {
        let mut f = Fixture::new();
        let b = f.b;
        f.apply(vec![EditorMutation::MoveNode {
            id: b,
            position: Position::new(300.0, 400.0),
        }]);
        assert_eq!(
            f.editor.panel(f.a).unwrap().anchor,
            Position::new(250.0, 285.0)
        );
    }

    #[test]
    fn collapse_survives_moves() {
        let mut f = Fixture::new();
        let (a, b) = (f.a, f.b);
        assert!(f.editor.toggle_collapsed(a));
        f.apply(vec![EditorMutation::MoveNode {
            id: b,
            position: Position::new(310.0, 0.0),
        }]);
        assert!(f.editor.panel(a).unwrap().collapsed);
    }

    #[test]
    fn delete_transition_keeps_edge() {
        let mut f = Fixture::new();
        let a = f.a;
        let m = f.editor.delete_transition(a);
        f.apply(m);
        assert!(f.editor.panel(a).is_none());
        assert_eq!(f.engine.graph.outgoing(a).unwrap().target, f.b);
    }

    #[test]
    fn last_line_cannot_be_removed() {
        let mut f = Fixture::new();
        let a = f.a;
        for _ in 0..2 {
            let m = f.editor.remove_line(&f.engine.graph, a, 0);
            f.apply(m);
        }
        assert_eq!(f.engine.graph.outgoing(a).unwrap().lines.len(), 1);
        assert!(f.editor.remove_line(&f.engine.graph, a, 0).is_empty());
        let m = f.editor.add_line(&f.engine.graph, a);
        f.apply(m);
        assert_eq!(f.engine.graph.outgoing(a).unwrap().lines.len(), 2);
    }

    #[test]
    fn adding_a_line_restores_a_deleted_transition() {
        let mut f = Fixture::new();
        let a = f.a;
        let m = f.editor.delete_transition(a);
        f.apply(m);
        assert!(f.editor.panel(a).is_none());

        let m = f.editor.add_line(&f.engine.graph, a);
        f.apply(m);
        assert_eq!(f.engine.graph.outgoing(a).unwrap().lines.len(), 1);
        let panel = f.editor.panel(a).unwrap();
        assert_eq!((panel.target, panel.collapsed), (f.b, false));
    }

    #[test]
    fn clip_without_edge_gets_no_line() {
        let f = Fixture::new();
        assert!(f.editor.add_line(&f.engine.graph, f.d).is_empty());
    }

    #[test]
    fn armed_line_links_to_the_next_clicked_clip() {
        let mut f = Fixture::new();
        let (a, d) = (f.a, f.d);
        assert!(f.editor.arm_link(&f.engine.graph, a, 1));
        let m = f.editor.node_clicked(d);
        f.apply(m);
        assert_eq!(f.editor.armed(), None);
        assert_eq!(f.engine.graph.outgoing(a).unwrap().lines[1].linked, Some(d));

        let m = f.editor.unlink_line(a, 1);
        f.apply(m);
        assert_eq!(f.engine.graph.outgoing(a).unwrap().lines[1].linked, None);
    }

    #[test]
    fn arming_twice_disarms() {
        let mut f = Fixture::new();
        let a = f.a;
        assert!(f.editor.arm_link(&f.engine.graph, a, 0));
        assert!(!f.editor.arm_link(&f.engine.graph, a, 0));
        assert!(f.editor.node_clicked(f.d).is_empty());
    }

    #[test]
    fn only_one_line_is_armed() {
        let mut f = Fixture::new();
        let a = f.a;
        f.editor.arm_link(&f.engine.graph, a, 0);
        f.editor.arm_link(&f.engine.graph, a, 2);
        assert_eq!(f.editor.armed(), Some(LinkArm { source: a, line: 2 }));
    }

    #[test]
    fn arm_is_dropped_with_its_edge() {
        let mut f = Fixture::new();
        let (a, b) = (f.a, f.b);
        f.editor.arm_link(&f.engine.graph, a, 0);
        f.apply(vec![EditorMutation::RemoveNode { id: b }]);
        assert_eq!(f.editor.armed(), None);
        assert!(f.editor.panel(a).is_none());
    }

    #[test]
    fn removing_a_line_shifts_the_arm() {
        let mut f = Fixture::new();
        let a = f.a;
        f.editor.arm_link(&f.engine.graph, a, 2);
        let m = f.editor.remove_line(&f.engine.graph, a, 0);
        f.apply(m);
        assert_eq!(f.editor.armed(), Some(LinkArm { source: a, line: 1 }));
    }
}
