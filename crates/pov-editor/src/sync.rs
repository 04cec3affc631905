//! Sync engine: graph store → view projection.
//!
//! The engine owns the `SceneGraph` and everything derived from it that the
//! host needs to draw: one connector line per edge, the transition panel
//! anchor of each edge, and the scrollable container extent.
//!
//! Mutations from tools and editors go through [`SyncEngine::apply_mutation`].
//! [`SyncEngine::sync`] then drains the graph's change log and re-projects
//! only what the changes touched. Dragging a clip therefore re-projects the
//! connectors incident to that clip and nothing else.

use crate::config::EditorConfig;
use crate::zoom::Zoom;
use pov_core::id::NodeId;
use pov_core::layout::{Viewport, content_extent};
use pov_core::model::*;
use pov_core::{GraphChange, SceneGraph};
use pov_render::connector::{Connector, project_connectors};
use serde::Serialize;
use std::collections::HashMap;

/// A mutation that can be applied to the scene graph from canvas interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorMutation {
    MoveNode {
        id: NodeId,
        position: Position,
    },
    RemoveNode {
        id: NodeId,
    },
    RenameNode {
        id: NodeId,
        label: String,
    },
    /// Link `source → target` with the configured number of empty lines.
    AddEdge {
        source: NodeId,
        target: NodeId,
    },
    RemoveEdge {
        source: NodeId,
        target: NodeId,
    },
    SetLineText {
        source: NodeId,
        index: usize,
        text: String,
    },
    SetLineLink {
        source: NodeId,
        index: usize,
        target: Option<NodeId>,
    },
    AddLine {
        source: NodeId,
    },
    RemoveLine {
        source: NodeId,
        index: usize,
    },
    ClearLines {
        source: NodeId,
    },
}

/// What the host must redraw after a sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDelta {
    /// Clips added, moved or updated.
    pub nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    /// Edge sources whose connector line was (re)projected.
    pub connectors: Vec<NodeId>,
    pub removed_connectors: Vec<NodeId>,
    /// Edge sources whose transition lines changed.
    pub panels: Vec<NodeId>,
    /// New container size, when it changed.
    pub extent: Option<Size>,
    /// Everything must be redrawn (zoom change, project swap).
    pub full: bool,
}

impl ViewDelta {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.connectors.is_empty()
            && self.removed_connectors.is_empty()
            && self.panels.is_empty()
            && self.extent.is_none()
            && !self.full
    }

    /// Fold a later delta into this one.
    pub fn merge(&mut self, other: ViewDelta) {
        for id in other.nodes {
            push_unique(&mut self.nodes, id);
        }
        for id in other.removed_nodes {
            self.nodes.retain(|n| *n != id);
            push_unique(&mut self.removed_nodes, id);
        }
        for id in other.connectors {
            self.removed_connectors.retain(|n| *n != id);
            push_unique(&mut self.connectors, id);
        }
        for id in other.removed_connectors {
            self.connectors.retain(|n| *n != id);
            push_unique(&mut self.removed_connectors, id);
        }
        for id in other.panels {
            push_unique(&mut self.panels, id);
        }
        if other.extent.is_some() {
            self.extent = other.extent;
        }
        self.full |= other.full;
    }
}

fn push_unique(list: &mut Vec<NodeId>, id: NodeId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// The sync engine holds the authoritative scene graph and its projection.
pub struct SyncEngine {
    /// The current scene graph (single source of truth).
    pub graph: SceneGraph,
    pub config: EditorConfig,
    pub zoom: Zoom,
    pub viewport: Viewport,
    /// Connector of each edge, keyed by edge source.
    connectors: HashMap<NodeId, Connector>,
    extent: Size,
}

impl SyncEngine {
    pub fn new(config: EditorConfig, viewport: Viewport) -> Self {
        let mut engine = Self {
            graph: SceneGraph::new(),
            zoom: Zoom::from_config(&config),
            config,
            viewport,
            connectors: HashMap::new(),
            extent: Size::new(viewport.width, viewport.height),
        };
        engine.reproject_all();
        engine
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Apply one mutation. Returns false when the graph rejected it.
    pub fn apply_mutation(&mut self, mutation: EditorMutation) -> bool {
        log::trace!("apply {mutation:?}");
        match mutation {
            EditorMutation::MoveNode { id, position } => {
                self.graph.update_node_position(id, position)
            }
            EditorMutation::RemoveNode { id } => self.graph.remove_node(id).is_some(),
            EditorMutation::RenameNode { id, label } => self.graph.set_label(id, label),
            EditorMutation::AddEdge { source, target } => {
                let lines = blank_lines(self.config.default_lines);
                self.graph.add_edge(source, target, lines).is_some()
            }
            EditorMutation::RemoveEdge { source, target } => self.graph.remove_edge(source, target),
            EditorMutation::SetLineText {
                source,
                index,
                text,
            } => self.graph.set_line_text(source, index, text),
            EditorMutation::SetLineLink {
                source,
                index,
                target,
            } => self.graph.set_line_link(source, index, target),
            EditorMutation::AddLine { source } => {
                self.graph.push_line(source, TransitionLine::default())
            }
            EditorMutation::RemoveLine { source, index } => {
                self.graph.remove_line(source, index).is_some()
            }
            EditorMutation::ClearLines { source } => self.graph.clear_transition_lines(source),
        }
    }

    /// Apply a batch; true if any of them changed the graph.
    pub fn apply_mutations(&mut self, mutations: impl IntoIterator<Item = EditorMutation>) -> bool {
        mutations
            .into_iter()
            .fold(false, |changed, m| self.apply_mutation(m) || changed)
    }

    /// Insert a clip directly (file import). Position is in logical units.
    pub fn add_node(&mut self, media: MediaRef, label: impl Into<String>, position: Position) -> NodeId {
        self.graph.add_node(media, label, position)
    }

    /// Swap in a whole new graph (archive load). The previous graph is
    /// dropped only here, after the new one was fully built.
    pub fn replace_graph(&mut self, graph: SceneGraph) -> ViewDelta {
        self.graph = graph;
        self.graph.take_changes();
        self.reproject_all();
        ViewDelta {
            extent: Some(self.extent),
            full: true,
            ..ViewDelta::default()
        }
    }

    // ─── Projection ──────────────────────────────────────────────────────

    /// Drain pending graph changes and re-project what they touched.
    pub fn sync(&mut self) -> ViewDelta {
        let mut delta = ViewDelta::default();
        let changes = self.graph.take_changes();
        if changes.is_empty() {
            return delta;
        }

        let mut geometry_changed = false;
        for change in changes {
            match change {
                GraphChange::NodeAdded(id) => {
                    push_unique(&mut delta.nodes, id);
                    geometry_changed = true;
                }
                GraphChange::NodeUpdated(id) => push_unique(&mut delta.nodes, id),
                GraphChange::NodeMoved(id) => {
                    push_unique(&mut delta.nodes, id);
                    for source in self.graph.incident_sources(id) {
                        self.project(source, &mut delta);
                    }
                    geometry_changed = true;
                }
                GraphChange::NodeRemoved(id) => {
                    delta.nodes.retain(|n| *n != id);
                    push_unique(&mut delta.removed_nodes, id);
                    geometry_changed = true;
                }
                GraphChange::EdgeAdded { source, .. } => self.project(source, &mut delta),
                GraphChange::EdgeRemoved { source, target } => {
                    let stale = self
                        .connectors
                        .get(&source)
                        .is_some_and(|c| c.target == target);
                    if stale && self.graph.outgoing(source).is_none_or(|e| e.target == target) {
                        self.connectors.remove(&source);
                        delta.connectors.retain(|n| *n != source);
                        push_unique(&mut delta.removed_connectors, source);
                    }
                }
                GraphChange::LinesChanged(source) => push_unique(&mut delta.panels, source),
            }
        }
        log::trace!("sync: {} connectors re-projected", delta.connectors.len());

        if geometry_changed && self.refresh_extent() {
            delta.extent = Some(self.extent);
        }
        delta
    }

    /// Zoom changed or the viewport was resized: every screen position is
    /// stale.
    pub fn view_changed(&mut self) -> ViewDelta {
        self.refresh_extent();
        ViewDelta {
            extent: Some(self.extent),
            full: true,
            ..ViewDelta::default()
        }
    }

    pub fn resize(&mut self, viewport: Viewport) -> ViewDelta {
        self.viewport = viewport;
        self.view_changed()
    }

    fn project(&mut self, source: NodeId, delta: &mut ViewDelta) {
        let projected = self
            .graph
            .outgoing(source)
            .and_then(|e| Connector::from_edge(&self.graph, e, &self.config.node));
        match projected {
            Some(c) => {
                self.connectors.insert(source, c);
                delta.removed_connectors.retain(|n| *n != source);
                push_unique(&mut delta.connectors, source);
            }
            None => {
                if self.connectors.remove(&source).is_some() {
                    push_unique(&mut delta.removed_connectors, source);
                }
            }
        }
    }

    fn reproject_all(&mut self) {
        self.connectors = project_connectors(&self.graph, &self.config.node)
            .into_iter()
            .map(|c| (c.source, c))
            .collect();
        self.refresh_extent();
    }

    fn refresh_extent(&mut self) -> bool {
        let extent = content_extent(
            &self.graph,
            &self.config.node,
            self.config.container_margin,
            self.viewport,
            self.zoom.value(),
        );
        let changed = extent != self.extent;
        self.extent = extent;
        changed
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Connector of the edge leaving `source`, in logical units.
    pub fn connector(&self, source: NodeId) -> Option<&Connector> {
        self.connectors.get(&source)
    }

    /// All connectors in edge order.
    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.graph
            .edges()
            .filter_map(|e| self.connectors.get(&e.source))
    }

    /// Screen position of the transition panel of the edge leaving `source`.
    pub fn panel_anchor(&self, source: NodeId) -> Option<Position> {
        let mid = self.connectors.get(&source)?.midpoint();
        let (x, y) = self.zoom.to_screen(mid.x as f32, mid.y as f32);
        Some(Position::new(x, y))
    }

    /// Current container size in screen pixels.
    pub fn extent(&self) -> Size {
        self.extent
    }

    /// Logical width available to the import grid.
    pub fn available_width(&self) -> f32 {
        self.viewport.width / self.zoom.value()
    }
}
