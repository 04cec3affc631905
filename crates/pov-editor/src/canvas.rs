//! Canvas controller: the single entry point the host drives.
//!
//! Owns the sync engine, both tools, the transition editor, the import
//! tracker and the playback engine. Every call returns an [`Outcome`]
//! describing what to redraw and which playback effects to perform.
//! Pointer coordinates arrive in container pixels and are divided by the
//! zoom factor before hit testing.

use crate::config::EditorConfig;
use crate::import::{ImportFile, ImportTracker, import_files};
use crate::input::{InputEvent, Modifiers};
use crate::playback::{PlaybackEffect, PlaybackEngine, Ticket};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::sync::{EditorMutation, SyncEngine, ViewDelta};
use crate::tools::{DragTool, LinkTool, Tool};
use crate::transitions::TransitionEditor;
use pov_core::archive::{MediaAsset, MediaSource, SavedArchive};
use pov_core::id::NodeId;
use pov_core::layout::Viewport;
use pov_core::model::{Anchor, MediaRef, MediaStatus};
use pov_core::project::sanitize_project_name;
use pov_core::{ArchiveError, LoadPolicy, LoadReport, SceneGraph};
use pov_render::hit::{Hit, hit_test};
use serde::Serialize;

/// Result of one host call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Anything visible changed (graph, panels, selection, link state).
    pub changed: bool,
    pub delta: ViewDelta,
    pub effects: Vec<PlaybackEffect>,
}

/// A project read from a `.pov` archive and now on the canvas.
#[derive(Debug)]
pub struct LoadedArchive {
    pub name: String,
    /// Media payloads; the host turns each into a playable handle and
    /// calls [`Canvas::attach_media`] for every node listed.
    pub assets: Vec<MediaAsset>,
    pub report: LoadReport,
    pub outcome: Outcome,
}

pub struct Canvas {
    engine: SyncEngine,
    drag: DragTool,
    link: LinkTool,
    transitions: TransitionEditor,
    imports: ImportTracker,
    playback: PlaybackEngine,
    selected: Option<NodeId>,
    project_name: Option<String>,
}

impl Canvas {
    pub fn new(config: EditorConfig, viewport: Viewport) -> Self {
        let playback = PlaybackEngine::new(config.playback);
        Self {
            engine: SyncEngine::new(config, viewport),
            drag: DragTool::new(),
            link: LinkTool::new(),
            transitions: TransitionEditor::new(),
            imports: ImportTracker::new(),
            playback,
            selected: None,
            project_name: None,
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.engine.graph
    }

    pub fn transitions(&self) -> &TransitionEditor {
        &self.transitions
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    pub fn imports(&self) -> &ImportTracker {
        &self.imports
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// The anchor picked as the first half of a link, if any.
    pub fn pending_link(&self) -> Option<Anchor> {
        self.link.pending()
    }

    pub fn dragging(&self) -> Option<NodeId> {
        self.drag.dragging()
    }

    /// Name of the last loaded or saved project.
    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    // ─── Pointer ─────────────────────────────────────────────────────────

    pub fn pointer_down(&mut self, x: f32, y: f32, modifiers: Modifiers) -> Outcome {
        let event = self.to_canvas(InputEvent::PointerDown { x, y, modifiers });
        let (cx, cy) = event.position();
        let hit = self.hit(cx, cy);

        let body = hit.filter(Hit::is_body).map(|h| h.node);
        let selection_changed = self.select(body);

        // A clip click completes an armed line link instead of dragging.
        if let (Some(node), Some(_)) = (body, self.transitions.armed()) {
            let mutations = self.transitions.node_clicked(node);
            let changed = self.engine.apply_mutations(mutations);
            return self.settle(ViewDelta::default(), changed || selection_changed, vec![]);
        }

        let was_pending = self.link.pending();
        let changed = self.dispatch(&event, hit);
        let link_changed = was_pending != self.link.pending();
        self.settle(
            ViewDelta::default(),
            changed || selection_changed || link_changed,
            vec![],
        )
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, modifiers: Modifiers) -> Outcome {
        if self.drag.dragging().is_none() {
            return Outcome::default();
        }
        let event = self.to_canvas(InputEvent::PointerMove { x, y, modifiers });
        let changed = self.dispatch(&event, None);
        self.settle(ViewDelta::default(), changed, vec![])
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) -> Outcome {
        let event = self.to_canvas(InputEvent::pointer_up(x, y));
        let changed = self.dispatch(&event, None);
        self.settle(ViewDelta::default(), changed, vec![])
    }

    /// Container pixels → logical canvas units.
    fn to_canvas(&self, event: InputEvent) -> InputEvent {
        let zoom = self.engine.zoom;
        event.map_position(|x, y| zoom.to_canvas(x, y))
    }

    fn hit(&self, x: f32, y: f32) -> Option<Hit> {
        hit_test(&self.engine.graph, &self.engine.config.node, x, y)
    }

    fn dispatch(&mut self, event: &InputEvent, hit: Option<Hit>) -> bool {
        let graph = &self.engine.graph;
        let mut mutations = self.drag.handle(event, hit, graph);
        mutations.extend(self.link.handle(event, hit, graph));
        self.engine.apply_mutations(mutations)
    }

    fn select(&mut self, node: Option<NodeId>) -> bool {
        let changed = self.selected != node;
        self.selected = node;
        changed
    }

    // ─── Keyboard ────────────────────────────────────────────────────────

    /// Handle a key press that did not originate in a text field.
    pub fn key(&mut self, key: &str, modifiers: Modifiers) -> Outcome {
        let Some(action) = ShortcutMap::resolve(key, modifiers) else {
            return Outcome::default();
        };
        log::debug!("shortcut {key:?} -> {action:?}");
        match action {
            ShortcutAction::Cancel => self.cancel(),
            ShortcutAction::ZoomIn => self.zoom_in(),
            ShortcutAction::ZoomOut => self.zoom_out(),
            ShortcutAction::ZoomReset => self.zoom_reset(),
            ShortcutAction::Delete => match self.selected {
                Some(id) => self.delete_node(id),
                None => Outcome::default(),
            },
            ShortcutAction::TogglePlayback => match self.selected {
                Some(id) => self.toggle_playback(id),
                None => Outcome::default(),
            },
        }
    }

    /// Escape: drop a pending link and an armed line, and stop playback.
    pub fn cancel(&mut self) -> Outcome {
        let link = self.link.cancel();
        let arm = self.transitions.disarm();
        let effects = self.playback.stop();
        let changed = link || arm || !effects.is_empty();
        self.settle(ViewDelta::default(), changed, effects)
    }

    // ─── View ────────────────────────────────────────────────────────────

    pub fn zoom_in(&mut self) -> Outcome {
        let changed = self.engine.zoom.zoom_in();
        self.zoomed(changed)
    }

    pub fn zoom_out(&mut self) -> Outcome {
        let changed = self.engine.zoom.zoom_out();
        self.zoomed(changed)
    }

    pub fn zoom_reset(&mut self) -> Outcome {
        let changed = self.engine.zoom.reset();
        self.zoomed(changed)
    }

    pub fn set_zoom(&mut self, value: f32) -> Outcome {
        let changed = self.engine.zoom.set(value);
        self.zoomed(changed)
    }

    fn zoomed(&mut self, changed: bool) -> Outcome {
        if !changed {
            return Outcome::default();
        }
        let delta = self.engine.view_changed();
        self.settle(delta, true, vec![])
    }

    pub fn resize(&mut self, viewport: Viewport) -> Outcome {
        let delta = self.engine.resize(viewport);
        self.settle(delta, true, vec![])
    }

    // ─── Clips ───────────────────────────────────────────────────────────

    /// Add dropped files as pending clips. Each must report readiness
    /// before `now_ms + media_timeout_ms` or it is marked errored.
    pub fn import_files(&mut self, files: &[ImportFile], now_ms: u64) -> Outcome {
        let width = self.engine.available_width();
        let ids = import_files(&mut self.engine.graph, files, width, &self.engine.config);
        let deadline = now_ms.saturating_add(self.engine.config.media_timeout_ms);
        for id in &ids {
            self.imports.track(*id, deadline);
        }
        log::info!("imported {} clip(s)", ids.len());
        self.settle(ViewDelta::default(), !ids.is_empty(), vec![])
    }

    pub fn media_ready(&mut self, id: NodeId) -> Outcome {
        let changed = self.imports.ready(&mut self.engine.graph, id);
        self.settle(ViewDelta::default(), changed, vec![])
    }

    pub fn media_failed(&mut self, id: NodeId) -> Outcome {
        let changed = self.imports.failed(&mut self.engine.graph, id);
        self.settle(ViewDelta::default(), changed, vec![])
    }

    /// Mark clips whose media never reported as errored.
    pub fn expire_imports(&mut self, now_ms: u64) -> Outcome {
        let expired = self.imports.expire(&mut self.engine.graph, now_ms);
        self.settle(ViewDelta::default(), !expired.is_empty(), vec![])
    }

    /// Point a clip at a new media handle (e.g. an object URL created for
    /// an archived asset). The clip goes back to pending until the host
    /// reports on it.
    pub fn attach_media(&mut self, id: NodeId, media: MediaRef, now_ms: u64) -> Outcome {
        if !self.engine.graph.set_node_media(id, media) {
            return Outcome::default();
        }
        self.engine.graph.set_media_status(id, MediaStatus::Pending);
        self.imports
            .track(id, now_ms.saturating_add(self.engine.config.media_timeout_ms));
        self.settle(ViewDelta::default(), true, vec![])
    }

    /// Change a clip's label. Blank labels are ignored.
    pub fn rename_node(&mut self, id: NodeId, label: &str) -> Outcome {
        let label = label.trim();
        if label.is_empty() {
            return Outcome::default();
        }
        self.apply(vec![EditorMutation::RenameNode {
            id,
            label: label.to_string(),
        }])
    }

    /// Remove a clip with its incident edges and any line links to it.
    pub fn delete_node(&mut self, id: NodeId) -> Outcome {
        if !self.engine.graph.contains(id) {
            return Outcome::default();
        }
        self.drag.forget(id);
        self.link.forget(id);
        self.imports.untrack(id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        let effects = match self.playback.cursor() {
            Some(cursor) if cursor.current == id || cursor.origin == id => self.playback.stop(),
            _ => vec![],
        };
        let changed = self.engine.apply_mutation(EditorMutation::RemoveNode { id });
        self.settle(ViewDelta::default(), changed, effects)
    }

    // ─── Transition panels ───────────────────────────────────────────────

    pub fn toggle_panel(&mut self, source: NodeId) -> Outcome {
        let changed = self.transitions.toggle_collapsed(source);
        Outcome {
            changed,
            ..Outcome::default()
        }
    }

    pub fn edit_line(&mut self, source: NodeId, index: usize, text: &str) -> Outcome {
        let mutations = self.transitions.edit_line(source, index, text);
        self.apply(mutations)
    }

    pub fn add_line(&mut self, source: NodeId) -> Outcome {
        let mutations = self.transitions.add_line(&self.engine.graph, source);
        self.apply(mutations)
    }

    pub fn remove_line(&mut self, source: NodeId, index: usize) -> Outcome {
        let mutations = self
            .transitions
            .remove_line(&self.engine.graph, source, index);
        self.apply(mutations)
    }

    pub fn delete_transition(&mut self, source: NodeId) -> Outcome {
        let mutations = self.transitions.delete_transition(source);
        self.apply(mutations)
    }

    /// Arm (or disarm) a line for linking; the next clip click links it.
    pub fn arm_link(&mut self, source: NodeId, line: usize) -> Outcome {
        let before = self.transitions.armed();
        self.transitions.arm_link(&self.engine.graph, source, line);
        Outcome {
            changed: before != self.transitions.armed(),
            ..Outcome::default()
        }
    }

    pub fn unlink_line(&mut self, source: NodeId, index: usize) -> Outcome {
        let mutations = self.transitions.unlink_line(source, index);
        self.apply(mutations)
    }

    fn apply(&mut self, mutations: Vec<EditorMutation>) -> Outcome {
        let changed = self.engine.apply_mutations(mutations);
        self.settle(ViewDelta::default(), changed, vec![])
    }

    // ─── Playback ────────────────────────────────────────────────────────

    pub fn toggle_playback(&mut self, node: NodeId) -> Outcome {
        let effects = self.playback.toggle(&self.engine.graph, node);
        self.effects(effects)
    }

    pub fn stop_playback(&mut self) -> Outcome {
        let effects = self.playback.stop();
        self.effects(effects)
    }

    pub fn media_ended(&mut self, ticket: Ticket) -> Outcome {
        let effects = self.playback.media_ended(&self.engine.graph, ticket);
        self.effects(effects)
    }

    pub fn timer_fired(&mut self, ticket: Ticket) -> Outcome {
        let effects = self.playback.timer_fired(&self.engine.graph, ticket);
        self.effects(effects)
    }

    pub fn choose(&mut self, ticket: Ticket, index: usize) -> Outcome {
        let effects = self.playback.choose(&self.engine.graph, ticket, index);
        self.effects(effects)
    }

    pub fn fullscreen_failed(&mut self) {
        self.playback.fullscreen_failed();
    }

    fn effects(&self, effects: Vec<PlaybackEffect>) -> Outcome {
        Outcome {
            changed: !effects.is_empty(),
            delta: ViewDelta::default(),
            effects,
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Bundle the current project. The canvas is not modified.
    pub fn save_archive(&mut self, source: &dyn MediaSource, name: &str) -> Result<SavedArchive, ArchiveError> {
        let saved = pov_core::save_archive(&self.engine.graph, source, name)?;
        log::info!("saved {} ({} bytes)", saved.file_name, saved.bytes.len());
        self.project_name = sanitize_project_name(name).ok();
        Ok(saved)
    }

    /// Replace the current project with an archive. On error the current
    /// project is untouched.
    pub fn load_archive(
        &mut self,
        bytes: &[u8],
        policy: LoadPolicy,
        now_ms: u64,
    ) -> Result<LoadedArchive, ArchiveError> {
        let loaded = pov_core::load_archive(bytes, policy)?;
        if !loaded.report.is_clean() {
            log::warn!(
                "load: dropped {} edge(s), cleared {} link(s)",
                loaded.report.dropped_edges.len(),
                loaded.report.cleared_links
            );
        }

        let effects = self.playback.stop();
        self.drag = DragTool::new();
        self.link.cancel();
        self.transitions = TransitionEditor::new();
        self.imports.clear();
        self.selected = None;

        let delta = self.engine.replace_graph(loaded.graph);
        let deadline = now_ms.saturating_add(self.engine.config.media_timeout_ms);
        for id in self.engine.graph.node_ids().to_vec() {
            self.imports.track(id, deadline);
        }
        self.project_name = Some(loaded.name.clone());
        log::info!("loaded project {:?}", loaded.name);

        let outcome = self.settle(delta, true, effects);
        Ok(LoadedArchive {
            name: loaded.name,
            assets: loaded.assets,
            report: loaded.report,
            outcome,
        })
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Fold pending graph changes into `delta` and bring panels along.
    fn settle(&mut self, mut delta: ViewDelta, changed: bool, effects: Vec<PlaybackEffect>) -> Outcome {
        delta.merge(self.engine.sync());
        let panels = self.transitions.sync(&self.engine, &delta);
        Outcome {
            changed: changed || panels || !delta.is_empty(),
            delta,
            effects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pov_core::model::{AnchorRole, Position};
    use pretty_assertions::assert_eq;

    fn canvas() -> (Canvas, NodeId, NodeId) {
        let mut c = Canvas::new(EditorConfig::default(), Viewport::default());
        let a = c
            .engine
            .add_node(MediaRef::Blob("a".into()), "a", Position::new(100.0, 100.0));
        let b = c
            .engine
            .add_node(MediaRef::Blob("b".into()), "b", Position::new(400.0, 100.0));
        c.engine.sync();
        (c, a, b)
    }

    #[test]
    fn body_click_selects_and_empty_click_clears() {
        let (mut c, a, _) = canvas();
        let o = c.pointer_down(150.0, 180.0, Modifiers::default());
        assert!(o.changed);
        assert_eq!(c.selected(), Some(a));
        c.pointer_up(150.0, 180.0);
        c.pointer_down(900.0, 600.0, Modifiers::default());
        assert_eq!(c.selected(), None);
    }

    #[test]
    fn pointer_is_scaled_by_zoom() {
        let (mut c, a, _) = canvas();
        c.set_zoom(2.0);
        // Logical (150, 180) is screen (300, 360) at 2x.
        c.pointer_down(300.0, 360.0, Modifiers::default());
        assert_eq!(c.dragging(), Some(a));
    }

    #[test]
    fn anchors_link_two_clips() {
        let (mut c, a, b) = canvas();
        let m = c.engine.config.node;
        // Bottom-center of a, then top-center of b.
        c.pointer_down(100.0 + m.width / 2.0, 100.0 + m.height, Modifiers::default());
        assert_eq!(
            c.pending_link(),
            Some(Anchor::new(a, AnchorRole::Outgoing))
        );
        let o = c.pointer_down(400.0 + m.width / 2.0, 100.0, Modifiers::default());
        assert_eq!(o.delta.connectors, vec![a]);
        assert_eq!(c.graph().outgoing(a).unwrap().target, b);
        assert!(c.transitions().panel(a).is_some());
    }

    #[test]
    fn delete_shortcut_removes_selection() {
        let (mut c, a, _) = canvas();
        c.pointer_down(150.0, 180.0, Modifiers::default());
        c.pointer_up(150.0, 180.0);
        let o = c.key("Delete", Modifiers::default());
        assert_eq!(o.delta.removed_nodes, vec![a]);
        assert!(!c.graph().contains(a));
        assert_eq!(c.selected(), None);
    }

    #[test]
    fn zoom_shortcut_forces_full_redraw() {
        let (mut c, _, _) = canvas();
        let o = c.key("+", Modifiers::default());
        assert!(o.delta.full);
        assert_eq!(c.engine().zoom.value(), 1.1);
        c.key("0", Modifiers::default());
        assert_eq!(c.engine().zoom.value(), 1.0);
        assert!(!c.key("0", Modifiers::default()).changed);
    }

    #[test]
    fn rename_trims_and_ignores_blank_labels() {
        let (mut c, a, _) = canvas();
        let o = c.rename_node(a, "  Opening  ");
        assert_eq!(o.delta.nodes, vec![a]);
        assert_eq!(c.graph().node(a).unwrap().label, "Opening");
        assert!(!c.rename_node(a, "   ").changed);
        assert_eq!(c.graph().node(a).unwrap().label, "Opening");
    }

    #[test]
    fn import_tracks_deadlines() {
        let mut c = Canvas::new(EditorConfig::default(), Viewport::default());
        let files = [ImportFile {
            name: "a.mp4".into(),
            mime: "video/mp4".into(),
            locator: "blob:a".into(),
        }];
        let o = c.import_files(&files, 1_000);
        assert_eq!(o.delta.nodes.len(), 1);
        assert_eq!(c.imports().pending(), 1);
        assert!(!c.expire_imports(10_999).changed);
        assert!(c.expire_imports(11_000).changed);
        assert_eq!(c.imports().pending(), 0);
    }
}
