//! WASM bridge for POV: exposes the Rust editor to the browser page.
//!
//! Compiled via `wasm-pack build --target web`. The page owns the DOM,
//! the shared fullscreen `<video>` element and every timer; this crate
//! owns the project. Each interaction returns an outcome as JSON:
//!
//! ```json
//! { "changed": true,
//!   "delta": { "nodes": [], "removedNodes": [], "connectors": [], "removedConnectors": [],
//!              "panels": [], "extent": null, "full": false },
//!   "effects": [ { "type": "loadMedia", "node": "clip_3", "media": { ... } } ] }
//! ```
//!
//! Timers and media ends are reported back with the ticket from the effect
//! that requested them.

use pov_core::id::NodeId;
use pov_core::layout::Viewport;
use pov_core::model::MediaRef;
use pov_core::{ArchiveError, LoadPolicy};
use pov_editor::import::ImportFile;
use pov_editor::input::Modifiers;
use pov_editor::playback::Ticket;
use pov_editor::{Canvas, EditorConfig, Outcome};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

/// The main WASM-facing editor.
///
/// Holds the canvas controller plus the raw bytes of every media handle the
/// page registered, which is what a save bundles into the archive.
#[wasm_bindgen]
pub struct PovEditor {
    canvas: Canvas,
    /// Media payloads by locator (`blob:` URL or archive path).
    media: HashMap<String, Vec<u8>>,
}

#[wasm_bindgen]
impl PovEditor {
    /// Create an editor for a canvas viewport of the given size.
    /// `config_json` may be empty or a partial `EditorConfig` object; a
    /// config that fails to parse or validate is replaced by the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(width: f32, height: f32, config_json: &str) -> Self {
        console_error_panic_hook_setup();

        let config = if config_json.trim().is_empty() {
            EditorConfig::default()
        } else {
            EditorConfig::from_json(config_json).unwrap_or_else(|e| {
                log::warn!("invalid editor config, using defaults: {e}");
                EditorConfig::default()
            })
        };

        Self {
            canvas: Canvas::new(config, Viewport { width, height }),
            media: HashMap::new(),
        }
    }

    // ─── View ────────────────────────────────────────────────────────────

    pub fn resize(&mut self, width: f32, height: f32) -> String {
        outcome_json(&self.canvas.resize(Viewport { width, height }))
    }

    pub fn zoom_in(&mut self) -> String {
        outcome_json(&self.canvas.zoom_in())
    }

    pub fn zoom_out(&mut self) -> String {
        outcome_json(&self.canvas.zoom_out())
    }

    pub fn zoom_reset(&mut self) -> String {
        outcome_json(&self.canvas.zoom_reset())
    }

    pub fn get_zoom(&self) -> f32 {
        self.canvas.engine().zoom.value()
    }

    /// Full snapshot for a redraw: clips, connectors and panels, all in
    /// container pixels.
    pub fn get_scene_json(&self) -> String {
        let engine = self.canvas.engine();
        let zoom = engine.zoom.value();
        let metrics = engine.config.node;

        let nodes: Vec<serde_json::Value> = self
            .canvas
            .graph()
            .nodes()
            .map(|n| {
                serde_json::json!({
                    "id": n.id,
                    "label": n.label,
                    "media": n.media,
                    "status": n.status,
                    "x": n.position.x * zoom,
                    "y": n.position.y * zoom,
                    "width": metrics.width * zoom,
                    "height": metrics.height * zoom,
                    "selected": self.canvas.selected() == Some(n.id),
                })
            })
            .collect();

        let connectors: Vec<serde_json::Value> = engine
            .connectors()
            .map(|c| {
                let line = c.scaled(f64::from(zoom));
                serde_json::json!({
                    "source": c.source,
                    "target": c.target,
                    "x1": line.p0.x, "y1": line.p0.y,
                    "x2": line.p1.x, "y2": line.p1.y,
                })
            })
            .collect();

        let panels: Vec<serde_json::Value> = self
            .canvas
            .transitions()
            .panels(self.canvas.graph())
            .map(|p| {
                let lines = self
                    .canvas
                    .graph()
                    .outgoing(p.source)
                    .map(|e| e.lines.to_vec())
                    .unwrap_or_default();
                serde_json::json!({
                    "source": p.source,
                    "target": p.target,
                    "collapsed": p.collapsed,
                    "x": p.anchor.x,
                    "y": p.anchor.y,
                    "lines": lines,
                })
            })
            .collect();

        serde_json::json!({
            "zoom": zoom,
            "extent": engine.extent(),
            "nodes": nodes,
            "connectors": connectors,
            "panels": panels,
            "armed": self.canvas.transitions().armed(),
            "pendingLink": self.canvas.pending_link(),
            "playing": self.canvas.playback().is_playing(),
        })
        .to_string()
    }

    // ─── Pointer / keyboard ──────────────────────────────────────────────

    pub fn handle_pointer_down(
        &mut self,
        x: f32,
        y: f32,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> String {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        outcome_json(&self.canvas.pointer_down(x, y, modifiers))
    }

    pub fn handle_pointer_move(
        &mut self,
        x: f32,
        y: f32,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> String {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        outcome_json(&self.canvas.pointer_move(x, y, modifiers))
    }

    pub fn handle_pointer_up(&mut self, x: f32, y: f32) -> String {
        outcome_json(&self.canvas.pointer_up(x, y))
    }

    /// Keyboard shortcut. The page must not forward keys typed into a
    /// transition line field.
    pub fn handle_key(&mut self, key: &str, shift: bool, ctrl: bool, alt: bool, meta: bool) -> String {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        outcome_json(&self.canvas.key(key, modifiers))
    }

    pub fn get_selected_id(&self) -> String {
        self.canvas
            .selected()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    // ─── Clips ───────────────────────────────────────────────────────────

    /// `files_json` is `[{"name","mime","locator"}]`. Returns the outcome;
    /// new clip ids are in `delta.nodes`.
    pub fn import_files(&mut self, files_json: &str, now_ms: f64) -> String {
        let files: Vec<ImportFile> = match serde_json::from_str(files_json) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("import_files: bad payload: {e}");
                return outcome_json(&Outcome::default());
            }
        };
        outcome_json(&self.canvas.import_files(&files, now_ms as u64))
    }

    /// Make the bytes behind a media handle available to save.
    pub fn register_media(&mut self, locator: &str, bytes: Vec<u8>) {
        self.media.insert(locator.to_string(), bytes);
    }

    pub fn forget_media(&mut self, locator: &str) {
        self.media.remove(locator);
    }

    pub fn media_ready(&mut self, node_id: &str) -> String {
        match node(node_id) {
            Some(id) => outcome_json(&self.canvas.media_ready(id)),
            None => outcome_json(&Outcome::default()),
        }
    }

    pub fn media_failed(&mut self, node_id: &str) -> String {
        match node(node_id) {
            Some(id) => outcome_json(&self.canvas.media_failed(id)),
            None => outcome_json(&Outcome::default()),
        }
    }

    /// Call periodically; clips that never became ready are marked errored.
    pub fn expire_imports(&mut self, now_ms: f64) -> String {
        outcome_json(&self.canvas.expire_imports(now_ms as u64))
    }

    /// Point a clip at a page-created handle (e.g. an object URL for an
    /// archived asset). The payload registered under the clip's previous
    /// locator moves to the new one; the old entry is dropped once no clip
    /// uses it, so fetch `asset_bytes` before attaching.
    pub fn attach_media(&mut self, node_id: &str, locator: &str, now_ms: f64) -> String {
        let Some(id) = node(node_id) else {
            return outcome_json(&Outcome::default());
        };
        let previous = self.locator_of(id);
        if let Some(bytes) = previous.as_ref().and_then(|p| self.media.get(p).cloned()) {
            self.media.entry(locator.to_string()).or_insert(bytes);
        }
        let media = MediaRef::Blob(locator.to_string());
        let outcome = self.canvas.attach_media(id, media, now_ms as u64);
        if outcome.changed {
            self.release_media(previous);
        }
        outcome_json(&outcome)
    }

    pub fn rename_node(&mut self, node_id: &str, label: &str) -> String {
        self.with_node(node_id, |c, id| c.rename_node(id, label))
    }

    /// Remove a clip. Its registered bytes go too unless another clip
    /// shares the handle.
    pub fn delete_node(&mut self, node_id: &str) -> String {
        let Some(id) = node(node_id) else {
            return outcome_json(&Outcome::default());
        };
        let locator = self.locator_of(id);
        let outcome = self.canvas.delete_node(id);
        if outcome.changed {
            self.release_media(locator);
        }
        outcome_json(&outcome)
    }

    // ─── Transition panels ───────────────────────────────────────────────

    pub fn toggle_panel(&mut self, source: &str) -> String {
        self.with_node(source, |c, id| c.toggle_panel(id))
    }

    pub fn edit_line(&mut self, source: &str, index: usize, text: &str) -> String {
        self.with_node(source, |c, id| c.edit_line(id, index, text))
    }

    pub fn add_line(&mut self, source: &str) -> String {
        self.with_node(source, |c, id| c.add_line(id))
    }

    pub fn remove_line(&mut self, source: &str, index: usize) -> String {
        self.with_node(source, |c, id| c.remove_line(id, index))
    }

    pub fn delete_transition(&mut self, source: &str) -> String {
        self.with_node(source, |c, id| c.delete_transition(id))
    }

    pub fn arm_link(&mut self, source: &str, index: usize) -> String {
        self.with_node(source, |c, id| c.arm_link(id, index))
    }

    pub fn unlink_line(&mut self, source: &str, index: usize) -> String {
        self.with_node(source, |c, id| c.unlink_line(id, index))
    }

    // ─── Playback ────────────────────────────────────────────────────────

    pub fn toggle_playback(&mut self, node_id: &str) -> String {
        self.with_node(node_id, |c, id| c.toggle_playback(id))
    }

    pub fn stop_playback(&mut self) -> String {
        outcome_json(&self.canvas.stop_playback())
    }

    pub fn media_ended(&mut self, ticket: u32) -> String {
        outcome_json(&self.canvas.media_ended(Ticket(ticket)))
    }

    pub fn timer_fired(&mut self, ticket: u32) -> String {
        outcome_json(&self.canvas.timer_fired(Ticket(ticket)))
    }

    pub fn choose(&mut self, ticket: u32, index: usize) -> String {
        outcome_json(&self.canvas.choose(Ticket(ticket), index))
    }

    pub fn fullscreen_failed(&mut self) {
        self.canvas.fullscreen_failed();
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Bundle the project into `.pov` archive bytes. Fails without touching
    /// anything when a clip's media was never registered.
    pub fn save_project(&mut self, name: &str) -> Result<Vec<u8>, JsValue> {
        let saved = self
            .canvas
            .save_archive(&self.media, name)
            .map_err(js_error)?;
        Ok(saved.bytes)
    }

    /// Download name for a project called `name`.
    pub fn project_file_name(&self, name: &str) -> Result<String, JsValue> {
        pov_core::project::sanitize_project_name(name)
            .map(|n| format!("{n}.{}", pov_core::archive::ARCHIVE_EXTENSION))
            .map_err(|e| js_error(ArchiveError::from(e)))
    }

    /// Replace the project with an archive. On error the current project
    /// stays. Returns `{name, assets: [{path, nodes}], report, outcome}`;
    /// fetch each asset with `asset_bytes` and hand its clips a playable
    /// handle through `attach_media`.
    pub fn load_project(&mut self, bytes: &[u8], strict: bool, now_ms: f64) -> Result<String, JsValue> {
        self.load(bytes, strict, now_ms).map_err(js_error)
    }

    /// Payload of an archived asset from the last load.
    pub fn asset_bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.media.get(path).cloned()
    }

    pub fn get_project_name(&self) -> String {
        self.canvas.project_name().unwrap_or_default().to_string()
    }
}

impl PovEditor {
    fn locator_of(&self, id: NodeId) -> Option<String> {
        self.canvas
            .graph()
            .node(id)
            .map(|n| n.media.locator().to_string())
    }

    /// Drop the bytes under `locator` once no clip refers to it.
    fn release_media(&mut self, locator: Option<String>) {
        let Some(locator) = locator else {
            return;
        };
        let in_use = self
            .canvas
            .graph()
            .nodes()
            .any(|n| n.media.locator() == locator);
        if !in_use && self.media.remove(&locator).is_some() {
            log::debug!("released media {locator}");
        }
    }

    fn with_node(&mut self, raw: &str, f: impl FnOnce(&mut Canvas, NodeId) -> Outcome) -> String {
        match node(raw) {
            Some(id) => outcome_json(&f(&mut self.canvas, id)),
            None => outcome_json(&Outcome::default()),
        }
    }

    fn load(&mut self, bytes: &[u8], strict: bool, now_ms: f64) -> Result<String, ArchiveError> {
        let policy = if strict {
            LoadPolicy::Strict
        } else {
            LoadPolicy::Lenient
        };
        let loaded = self.canvas.load_archive(bytes, policy, now_ms as u64)?;

        self.media.clear();
        let assets: Vec<serde_json::Value> = loaded
            .assets
            .into_iter()
            .map(|asset| {
                let summary = serde_json::json!({
                    "path": asset.path,
                    "nodes": asset.nodes,
                    "size": asset.bytes.len(),
                });
                self.media.insert(asset.path, asset.bytes);
                summary
            })
            .collect();

        let dropped: Vec<serde_json::Value> = loaded
            .report
            .dropped_edges
            .iter()
            .map(|(source, target)| serde_json::json!({ "source": source, "target": target }))
            .collect();

        Ok(serde_json::json!({
            "name": loaded.name,
            "assets": assets,
            "report": {
                "droppedEdges": dropped,
                "clearedLinks": loaded.report.cleared_links,
                "upgraded": loaded.report.upgraded,
            },
            "outcome": loaded.outcome,
        })
        .to_string())
    }
}

fn node(raw: &str) -> Option<NodeId> {
    NodeId::lookup(raw)
}

fn outcome_json(outcome: &Outcome) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|_| r#"{"changed":false}"#.to_string())
}

fn js_error(e: ArchiveError) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

/// Route `log` output and panics to the browser console.
fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            if let Err(e) = console_log::init_with_level(log::Level::Info) {
                web_sys::console::warn_1(&format!("POV: logger already set: {e}").into());
            }
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("POV WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone helpers (no editor needed) ───────────────────────────────

/// Default name offered in the save prompt, e.g. `projet_video_2024-05-01`.
#[wasm_bindgen]
pub fn suggested_project_name(date: &str) -> String {
    pov_core::project::suggested_project_name(date)
}
