//! Integration tests: canvas editing (pov-editor ↔ pov-core ↔ pov-render).
//!
//! Drives the canvas the way the host does and checks the deltas it gets
//! back: what was re-projected, which panels exist and where.

use pov_core::LoadPolicy;
use pov_core::id::NodeId;
use pov_core::layout::Viewport;
use pov_core::model::{AnchorRole, MediaRef, Position};
use pov_editor::import::ImportFile;
use pov_editor::{Canvas, EditorConfig};
use pov_render::connector::anchor_point;
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn video(name: &str) -> ImportFile {
    ImportFile {
        name: name.into(),
        mime: "video/mp4".into(),
        locator: format!("blob:{name}"),
    }
}

/// a → b → c, imported in one drop.
fn chain() -> (Canvas, NodeId, NodeId, NodeId) {
    let mut canvas = Canvas::new(EditorConfig::default(), Viewport::default());
    canvas.import_files(&[video("a.mp4"), video("b.mp4"), video("c.mp4")], 0);
    let ids = canvas.graph().node_ids().to_vec();
    link(&mut canvas, ids[0], ids[1]);
    link(&mut canvas, ids[1], ids[2]);
    (canvas, ids[0], ids[1], ids[2])
}

fn link(canvas: &mut Canvas, source: NodeId, target: NodeId) {
    let m = canvas.engine().config.node;
    let s = canvas.graph().node(source).unwrap().position;
    let t = canvas.graph().node(target).unwrap().position;
    canvas.pointer_down(s.x + m.width / 2.0, s.y + m.height, Default::default());
    canvas.pointer_down(t.x + m.width / 2.0, t.y, Default::default());
}

fn grab_point(canvas: &Canvas, id: NodeId) -> (f32, f32) {
    let p = canvas.graph().node(id).unwrap().position;
    (p.x + 30.0, p.y + 30.0)
}

// ─── Drag ───────────────────────────────────────────────────────────────

#[test]
fn dragging_a_leaf_touches_only_its_incoming_connector() {
    let (mut canvas, _, b, c) = chain();
    let (x, y) = grab_point(&canvas, c);
    canvas.pointer_down(x, y, Default::default());
    let o = canvas.pointer_move(x, y + 300.0, Default::default());
    assert_eq!(o.delta.nodes, vec![c]);
    assert_eq!(o.delta.connectors, vec![b]);
    canvas.pointer_up(x, y + 300.0);

    let after = canvas.pointer_move(x, y + 500.0, Default::default());
    assert!(after.delta.is_empty());
}

#[test]
fn dragging_a_middle_clip_moves_both_edges_and_the_panels() {
    let (mut canvas, a, b, _) = chain();
    let before = canvas.transitions().panel(a).unwrap().anchor;
    let (x, y) = grab_point(&canvas, b);
    canvas.pointer_down(x, y, Default::default());
    let o = canvas.pointer_move(x + 40.0, y + 200.0, Default::default());
    let mut touched = o.delta.connectors.clone();
    touched.sort_by_key(|id| id.as_str().to_string());
    let mut expected = vec![a, b];
    expected.sort_by_key(|id| id.as_str().to_string());
    assert_eq!(touched, expected);
    assert_ne!(canvas.transitions().panel(a).unwrap().anchor, before);
}

#[test]
fn dragged_clip_endpoints_match_its_new_anchors() {
    let mut canvas = Canvas::new(EditorConfig::default(), Viewport::default());
    let files = ["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"].map(video);
    canvas.import_files(&files, 0);
    let ids = canvas.graph().node_ids().to_vec();
    let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
    link(&mut canvas, a, b);
    link(&mut canvas, b, c);
    link(&mut canvas, d, e);
    let untouched = *canvas.engine().connector(d).unwrap();
    let start = canvas.graph().node(b).unwrap().position;

    let (x, y) = grab_point(&canvas, b);
    canvas.pointer_down(x, y, Default::default());
    canvas.pointer_move(x + 75.0, y + 260.0, Default::default());
    canvas.pointer_up(x + 75.0, y + 260.0);

    let m = canvas.engine().config.node;
    let pos = |id: NodeId| canvas.graph().node(id).unwrap().position;
    let moved = pos(b);
    assert_eq!(moved, Position::new(start.x + 75.0, start.y + 260.0));

    let incoming = canvas.engine().connector(a).unwrap();
    assert_eq!(incoming.line.p0, anchor_point(pos(a), &m, AnchorRole::Outgoing));
    assert_eq!(incoming.line.p1, anchor_point(moved, &m, AnchorRole::Incoming));

    let outgoing = canvas.engine().connector(b).unwrap();
    assert_eq!(outgoing.line.p0, anchor_point(moved, &m, AnchorRole::Outgoing));
    assert_eq!(outgoing.line.p1, anchor_point(pos(c), &m, AnchorRole::Incoming));

    assert_eq!(*canvas.engine().connector(d).unwrap(), untouched);
}

#[test]
fn drag_is_clamped_at_the_canvas_origin() {
    let (mut canvas, a, _, _) = chain();
    let (x, y) = grab_point(&canvas, a);
    canvas.pointer_down(x, y, Default::default());
    canvas.pointer_move(-400.0, -400.0, Default::default());
    assert_eq!(canvas.graph().node(a).unwrap().position, Position::new(0.0, 0.0));
}

// ─── Linking ────────────────────────────────────────────────────────────

#[test]
fn relinking_a_source_replaces_its_edge() {
    let (mut canvas, a, b, c) = chain();
    link(&mut canvas, a, c);
    assert_eq!(canvas.graph().outgoing(a).unwrap().target, c);
    assert_eq!(canvas.graph().edge_count(), 2);
    assert!(canvas.graph().incoming(b).is_empty());
}

#[test]
fn escape_cancels_a_half_made_link() {
    let (mut canvas, a, _, c) = chain();
    let m = canvas.engine().config.node;
    let p = canvas.graph().node(c).unwrap().position;
    canvas.pointer_down(p.x + m.width / 2.0, p.y + m.height, Default::default());
    assert!(canvas.pending_link().is_some());
    let o = canvas.key("Escape", Default::default());
    assert!(o.changed);
    assert!(canvas.pending_link().is_none());
    assert!(canvas.graph().outgoing(c).is_none());
    assert_eq!(canvas.graph().outgoing(a).map(|e| e.lines.len()), Some(3));
}

// ─── Transition panels ──────────────────────────────────────────────────

#[test]
fn panel_lifecycle() {
    let (mut canvas, a, _, _) = chain();
    assert!(canvas.transitions().panel(a).is_some());

    canvas.add_line(a);
    assert_eq!(canvas.graph().outgoing(a).unwrap().lines.len(), 4);
    canvas.remove_line(a, 0);
    canvas.remove_line(a, 0);
    canvas.remove_line(a, 0);
    // The last line stays.
    canvas.remove_line(a, 0);
    assert_eq!(canvas.graph().outgoing(a).unwrap().lines.len(), 1);

    assert!(canvas.toggle_panel(a).changed);
    assert!(canvas.transitions().panel(a).unwrap().collapsed);

    let o = canvas.delete_transition(a);
    assert!(o.changed);
    assert!(canvas.transitions().panel(a).is_none());
    // The edge itself survives.
    assert!(canvas.graph().outgoing(a).is_some());

    assert!(canvas.add_line(a).changed);
    assert_eq!(canvas.graph().outgoing(a).unwrap().lines.len(), 1);
    assert!(canvas.transitions().panel(a).is_some());
}

#[test]
fn deleting_a_link_target_clears_the_line_link() {
    let (mut canvas, a, _, c) = chain();
    canvas.arm_link(a, 2);
    let (x, y) = grab_point(&canvas, c);
    canvas.pointer_down(x, y, Default::default());
    assert_eq!(canvas.graph().outgoing(a).unwrap().lines[2].linked, Some(c));

    canvas.delete_node(c);
    assert_eq!(canvas.graph().outgoing(a).unwrap().lines[2].linked, None);
}

// ─── Persistence ────────────────────────────────────────────────────────

#[test]
fn save_then_load_swaps_the_project() {
    let (mut canvas, a, _, _) = chain();
    canvas.edit_line(a, 0, "Later");
    let media: HashMap<String, Vec<u8>> = ["a.mp4", "b.mp4", "c.mp4"]
        .iter()
        .map(|n| (format!("blob:{n}"), n.as_bytes().to_vec()))
        .collect();
    let saved = canvas.save_archive(&media, "My Story").unwrap();
    assert_eq!(saved.file_name, "My Story.pov");

    let mut other = Canvas::new(EditorConfig::default(), Viewport::default());
    other.import_files(&[video("stray.mp4")], 0);
    let loaded = other
        .load_archive(&saved.bytes, LoadPolicy::Lenient, 5_000)
        .unwrap();
    assert!(loaded.outcome.delta.full);
    assert_eq!(loaded.assets.len(), 3);
    assert_eq!(other.graph().len(), 3);
    assert_eq!(other.graph().edge_count(), 2);
    assert_eq!(other.imports().pending(), 3);

    let first = other.graph().node_ids()[0];
    let line = &other.graph().outgoing(first).unwrap().lines[0];
    assert_eq!(line.text, "Later");
    assert!(other.transitions().panel(first).is_some());

    let o = other.attach_media(first, MediaRef::Blob("blob:restored".into()), 5_000);
    assert_eq!(o.delta.nodes, vec![first]);
}

#[test]
fn failed_load_keeps_the_current_project() {
    let (mut canvas, _, _, _) = chain();
    let err = canvas.load_archive(b"not a zip", LoadPolicy::Lenient, 0);
    assert!(err.is_err());
    assert_eq!(canvas.graph().len(), 3);
    assert_eq!(canvas.graph().edge_count(), 2);
}
