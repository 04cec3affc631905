//! Data model for POV projects.
//!
//! A project is a directed graph of video clips. Nodes are clips placed on
//! the canvas; an edge is the default "what plays next" link out of a clip,
//! carrying optional transition copy. Each transition line may override the
//! branch target, which is how one structural edge fans out into several
//! viewer choices.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Geometry ────────────────────────────────────────────────────────────

/// Canvas position in logical (unzoomed) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp to the non-negative quadrant. Non-finite coordinates collapse to 0.
    pub fn clamped(self) -> Self {
        let fix = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            x: fix(self.x),
            y: fix(self.y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn at(position: Position, size: Size) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }
}

// ─── Media ───────────────────────────────────────────────────────────────

/// Opaque handle to a clip's video asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "locator", rename_all = "camelCase")]
pub enum MediaRef {
    /// In-memory blob owned by the host (e.g. a `blob:` object URL).
    Blob(String),
    /// Entry path inside a `.pov` archive (`videos/intro.mp4`).
    Archived(String),
    /// Uploaded asset reachable by URL.
    Remote(String),
}

impl MediaRef {
    pub fn locator(&self) -> &str {
        match self {
            MediaRef::Blob(s) | MediaRef::Archived(s) | MediaRef::Remote(s) => s,
        }
    }
}

/// Readiness of a clip's media, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaStatus {
    #[default]
    Pending,
    Ready,
    /// Could not be decoded or never became ready; the node stays usable
    /// but shows an empty preview.
    Errored,
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// A video clip placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoNode {
    pub id: NodeId,
    pub label: String,
    pub media: MediaRef,
    pub position: Position,
    pub status: MediaStatus,
}

impl VideoNode {
    pub fn new(id: NodeId, media: MediaRef, label: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            label: label.into(),
            media,
            position,
            status: MediaStatus::Pending,
        }
    }
}

// ─── Transitions ─────────────────────────────────────────────────────────

/// One line of transition copy. When `linked` is set, picking this line
/// during playback branches to that node instead of the edge target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransitionLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<NodeId>,
}

impl TransitionLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            linked: None,
        }
    }

    pub fn linked_to(text: impl Into<String>, target: NodeId) -> Self {
        Self {
            text: text.into(),
            linked: Some(target),
        }
    }

    /// Whitespace-only lines are never shown to the viewer.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub type TransitionLines = SmallVec<[TransitionLine; 3]>;

/// A directed edge: the default successor of `source`, plus its copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub source: NodeId,
    pub target: NodeId,
    pub lines: TransitionLines,
}

impl Transition {
    /// True when at least one line has visible text.
    pub fn has_text(&self) -> bool {
        self.lines.iter().any(|l| !l.is_blank())
    }

    /// Non-blank lines with their original index.
    pub fn visible_lines(&self) -> impl Iterator<Item = (usize, &TransitionLine)> {
        self.lines.iter().enumerate().filter(|(_, l)| !l.is_blank())
    }

    /// True when any visible line overrides the branch target.
    pub fn has_branches(&self) -> bool {
        self.visible_lines().any(|(_, l)| l.linked.is_some())
    }
}

/// `count` empty lines, the starting copy of a freshly linked edge.
pub fn blank_lines(count: usize) -> TransitionLines {
    (0..count).map(|_| TransitionLine::default()).collect()
}

// ─── Anchors ─────────────────────────────────────────────────────────────

/// Which connection point on a node was clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorRole {
    /// Top anchor, where edges arrive.
    Incoming,
    /// Bottom anchor, where edges leave.
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub node: NodeId,
    pub role: AnchorRole,
}

impl Anchor {
    pub const fn new(node: NodeId, role: AnchorRole) -> Self {
        Self { node, role }
    }

    /// Orient two anchors as `(source, target)` when they describe a legal
    /// edge: opposite roles on different nodes.
    pub fn edge_between(a: Anchor, b: Anchor) -> Option<(NodeId, NodeId)> {
        if a.node == b.node {
            return None;
        }
        match (a.role, b.role) {
            (AnchorRole::Outgoing, AnchorRole::Incoming) => Some((a.node, b.node)),
            (AnchorRole::Incoming, AnchorRole::Outgoing) => Some((b.node, a.node)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_between_orients_by_role() {
        let a = NodeId::intern("m_a");
        let b = NodeId::intern("m_b");
        let out_a = Anchor::new(a, AnchorRole::Outgoing);
        let in_b = Anchor::new(b, AnchorRole::Incoming);
        assert_eq!(Anchor::edge_between(out_a, in_b), Some((a, b)));
        assert_eq!(Anchor::edge_between(in_b, out_a), Some((a, b)));
    }

    #[test]
    fn edge_between_rejects_same_role_and_same_node() {
        let a = NodeId::intern("m_c");
        let b = NodeId::intern("m_d");
        assert_eq!(
            Anchor::edge_between(
                Anchor::new(a, AnchorRole::Outgoing),
                Anchor::new(b, AnchorRole::Outgoing)
            ),
            None
        );
        assert_eq!(
            Anchor::edge_between(
                Anchor::new(a, AnchorRole::Outgoing),
                Anchor::new(a, AnchorRole::Incoming)
            ),
            None
        );
    }

    #[test]
    fn visible_lines_skip_blank_text() {
        let t = Transition {
            source: NodeId::intern("m_e"),
            target: NodeId::intern("m_f"),
            lines: [
                TransitionLine::new("Go left"),
                TransitionLine::new("   "),
                TransitionLine::new("Go right"),
            ]
            .into_iter()
            .collect(),
        };
        let idx: Vec<usize> = t.visible_lines().map(|(i, _)| i).collect();
        assert_eq!(idx, vec![0, 2]);
        assert!(t.has_text());
        assert!(!t.has_branches());
    }

    #[test]
    fn clamped_position_is_non_negative() {
        let p = Position::new(-5.0, f32::NAN).clamped();
        assert_eq!(p, Position::new(0.0, 0.0));
    }
}
