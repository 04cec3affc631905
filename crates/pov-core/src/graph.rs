//! The graph store: single source of truth for clips and transitions.
//!
//! Wraps a `StableDiGraph` so node indices survive removals. All mutation
//! goes through `SceneGraph`; each successful mutation appends a
//! [`GraphChange`] that observers drain with [`SceneGraph::take_changes`]
//! and use to re-project only what changed.
//!
//! Invariants upheld here:
//! - node ids are unique and never reused;
//! - every edge endpoint and every line link names an existing node;
//! - a node has at most one outgoing edge (adding a second replaces it);
//! - no self-loops.

use crate::id::NodeId;
use crate::model::*;
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// What changed in the store. Observers re-render from these.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    NodeMoved(NodeId),
    /// Label, media handle or media status changed.
    NodeUpdated(NodeId),
    EdgeAdded { source: NodeId, target: NodeId },
    EdgeRemoved { source: NodeId, target: NodeId },
    /// Transition lines of the edge leaving `source` changed.
    LinesChanged(NodeId),
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    graph: StableDiGraph<VideoNode, Transition>,
    id_index: HashMap<NodeId, NodeIndex>,
    /// Insertion order, used for stable iteration and save order.
    order: Vec<NodeId>,
    changes: Vec<GraphChange>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Nodes ───────────────────────────────────────────────────────────

    /// Insert a new clip with a fresh id.
    pub fn add_node(&mut self, media: MediaRef, label: impl Into<String>, position: Position) -> NodeId {
        let node = VideoNode::new(NodeId::fresh(), media, label, position.clamped());
        self.insert_node(node)
    }

    /// Insert a fully built node. The caller guarantees the id is fresh;
    /// an id collision replaces nothing and is reported as a no-op.
    pub fn insert_node(&mut self, node: VideoNode) -> NodeId {
        let id = node.id;
        if self.id_index.contains_key(&id) {
            log::warn!("insert_node: id {id} already present, ignoring");
            return id;
        }
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.order.push(id);
        self.changes.push(GraphChange::NodeAdded(id));
        id
    }

    /// Remove a clip and every edge touching it. Line links that pointed at
    /// the clip are cleared. No-op when the id is unknown.
    pub fn remove_node(&mut self, id: NodeId) -> Option<VideoNode> {
        let idx = self.id_index.get(&id).copied()?;

        let incident: Vec<(NodeId, NodeId)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| (e.weight().source, e.weight().target))
            .collect();

        let removed = self.graph.remove_node(idx)?;
        self.id_index.remove(&id);
        self.order.retain(|n| *n != id);

        for (source, target) in incident {
            self.changes.push(GraphChange::EdgeRemoved { source, target });
        }

        let mut relinked = Vec::new();
        for edge in self.graph.edge_weights_mut() {
            let mut touched = false;
            for line in edge.lines.iter_mut().filter(|l| l.linked == Some(id)) {
                line.linked = None;
                touched = true;
            }
            if touched {
                relinked.push(edge.source);
            }
        }
        self.changes
            .extend(relinked.into_iter().map(GraphChange::LinesChanged));

        self.changes.push(GraphChange::NodeRemoved(id));
        log::debug!("removed node {id}");
        Some(removed)
    }

    pub fn update_node_position(&mut self, id: NodeId, position: Position) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        let position = position.clamped();
        if node.position == position {
            return false;
        }
        node.position = position;
        self.changes.push(GraphChange::NodeMoved(id));
        true
    }

    pub fn set_node_media(&mut self, id: NodeId, media: MediaRef) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.media = media;
        self.changes.push(GraphChange::NodeUpdated(id));
        true
    }

    pub fn set_media_status(&mut self, id: NodeId, status: MediaStatus) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        if node.status == status {
            return false;
        }
        node.status = status;
        self.changes.push(GraphChange::NodeUpdated(id));
        true
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.label = label.into();
        self.changes.push(GraphChange::NodeUpdated(id));
        true
    }

    // ─── Edges ───────────────────────────────────────────────────────────

    /// Link `source → target`. Any existing outgoing edge of `source` is
    /// removed first. Self-loops, unknown endpoints, and line links to
    /// unknown nodes are rejected (the offending links are dropped).
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        lines: impl IntoIterator<Item = TransitionLine>,
    ) -> Option<&Transition> {
        if source == target {
            log::debug!("add_edge: rejected self-loop on {source}");
            return None;
        }
        let (Some(s), Some(t)) = (self.index_of(source), self.index_of(target)) else {
            log::debug!("add_edge: unknown endpoint {source} -> {target}");
            return None;
        };

        let replaced: Vec<EdgeIndex> = self
            .graph
            .edges_directed(s, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for e in replaced {
            if let Some(old) = self.graph.remove_edge(e) {
                self.changes.push(GraphChange::EdgeRemoved {
                    source: old.source,
                    target: old.target,
                });
            }
        }

        let lines: TransitionLines = lines
            .into_iter()
            .map(|mut l| {
                if l.linked.is_some_and(|n| !self.id_index.contains_key(&n)) {
                    l.linked = None;
                }
                l
            })
            .collect();

        let e = self.graph.add_edge(
            s,
            t,
            Transition {
                source,
                target,
                lines,
            },
        );
        self.changes.push(GraphChange::EdgeAdded { source, target });
        self.graph.edge_weight(e)
    }

    /// Remove the edge `source → target`. Returns false if it doesn't exist.
    pub fn remove_edge(&mut self, source: NodeId, target: NodeId) -> bool {
        let (Some(s), Some(t)) = (self.index_of(source), self.index_of(target)) else {
            return false;
        };
        let Some(e) = self.graph.find_edge(s, t) else {
            return false;
        };
        self.graph.remove_edge(e);
        self.changes
            .push(GraphChange::EdgeRemoved { source, target });
        true
    }

    /// Replace every line on the edge leaving `source`.
    pub fn update_edge_lines(
        &mut self,
        source: NodeId,
        lines: impl IntoIterator<Item = TransitionLine>,
    ) -> bool {
        let lines: TransitionLines = lines
            .into_iter()
            .map(|mut l| {
                if l.linked.is_some_and(|n| !self.id_index.contains_key(&n)) {
                    l.linked = None;
                }
                l
            })
            .collect();
        let Some(edge) = self.outgoing_mut(source) else {
            return false;
        };
        edge.lines = lines;
        self.changes.push(GraphChange::LinesChanged(source));
        true
    }

    pub fn set_line_text(&mut self, source: NodeId, index: usize, text: impl Into<String>) -> bool {
        let Some(line) = self
            .outgoing_mut(source)
            .and_then(|e| e.lines.get_mut(index))
        else {
            return false;
        };
        line.text = text.into();
        self.changes.push(GraphChange::LinesChanged(source));
        true
    }

    /// Set or clear a line's branch override. Linking to an unknown node
    /// is rejected.
    pub fn set_line_link(&mut self, source: NodeId, index: usize, target: Option<NodeId>) -> bool {
        if target.is_some_and(|t| !self.contains(t)) {
            return false;
        }
        let Some(line) = self
            .outgoing_mut(source)
            .and_then(|e| e.lines.get_mut(index))
        else {
            return false;
        };
        line.linked = target;
        self.changes.push(GraphChange::LinesChanged(source));
        true
    }

    pub fn push_line(&mut self, source: NodeId, line: TransitionLine) -> bool {
        if line.linked.is_some_and(|t| !self.contains(t)) {
            return false;
        }
        let Some(edge) = self.outgoing_mut(source) else {
            return false;
        };
        edge.lines.push(line);
        self.changes.push(GraphChange::LinesChanged(source));
        true
    }

    pub fn remove_line(&mut self, source: NodeId, index: usize) -> Option<TransitionLine> {
        let edge = self.outgoing_mut(source)?;
        if index >= edge.lines.len() {
            return None;
        }
        let line = edge.lines.remove(index);
        self.changes.push(GraphChange::LinesChanged(source));
        Some(line)
    }

    /// Drop all transition copy from the edge leaving `source`. The edge
    /// and its default target stay.
    pub fn clear_transition_lines(&mut self, source: NodeId) -> bool {
        let Some(edge) = self.outgoing_mut(source) else {
            return false;
        };
        if edge.lines.is_empty() {
            return false;
        }
        edge.lines.clear();
        self.changes.push(GraphChange::LinesChanged(source));
        true
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&VideoNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &VideoNode> {
        self.order.iter().filter_map(|id| self.node(*id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Edges ordered by their source's insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Transition> {
        self.order.iter().filter_map(|id| self.outgoing(*id))
    }

    /// The (at most one) edge leaving `source`.
    pub fn outgoing(&self, source: NodeId) -> Option<&Transition> {
        let idx = self.index_of(source)?;
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .map(|e| e.weight())
    }

    /// Edges arriving at `target`.
    pub fn incoming(&self, target: NodeId) -> Vec<&Transition> {
        let Some(idx) = self.index_of(target) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.weight())
            .collect()
    }

    /// Sources of every edge touching `id` (the edge key, since a source
    /// has at most one outgoing edge).
    pub fn incident_sources(&self, id: NodeId) -> Vec<NodeId> {
        let mut sources: Vec<NodeId> = self.incoming(id).iter().map(|e| e.source).collect();
        if self.outgoing(id).is_some() {
            sources.push(id);
        }
        sources
    }

    /// Where playback goes after `source`. `choice` is the index of the
    /// transition line the viewer picked, if any. Returns `None` when there
    /// is no edge or the resolved node no longer exists.
    pub fn resolve_next(&self, source: NodeId, choice: Option<usize>) -> Option<NodeId> {
        let edge = self.outgoing(source)?;
        let target = choice
            .and_then(|i| edge.lines.get(i))
            .and_then(|l| l.linked)
            .unwrap_or(edge.target);
        if self.contains(target) {
            Some(target)
        } else {
            log::warn!("resolve_next: {source} points at missing node {target}");
            None
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Drain the change log accumulated since the last call.
    pub fn take_changes(&mut self) -> Vec<GraphChange> {
        std::mem::take(&mut self.changes)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut VideoNode> {
        let idx = self.index_of(id)?;
        self.graph.node_weight_mut(idx)
    }

    fn outgoing_mut(&mut self, source: NodeId) -> Option<&mut Transition> {
        let idx = self.index_of(source)?;
        let e = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .map(|e| e.id())?;
        self.graph.edge_weight_mut(e)
    }
}
