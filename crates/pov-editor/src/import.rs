//! Bulk import of dropped files.
//!
//! Dropped files become clips immediately, laid out on a grid after the
//! existing clips. Media readiness is reported later by the host; clips that
//! never report within the configured timeout are marked errored so nothing
//! waits on them forever.

use crate::config::EditorConfig;
use pov_core::SceneGraph;
use pov_core::id::NodeId;
use pov_core::layout::grid_positions;
use pov_core::model::{MediaRef, MediaStatus};
use serde::Deserialize;
use std::collections::HashMap;

/// One dropped file as described by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFile {
    pub name: String,
    /// MIME type reported by the browser (`video/mp4`, ...).
    pub mime: String,
    /// Object URL or other handle the host created for the file.
    pub locator: String,
}

impl ImportFile {
    pub fn is_video(&self) -> bool {
        self.mime
            .split('/')
            .next()
            .is_some_and(|t| t.eq_ignore_ascii_case("video"))
    }
}

/// Create one pending clip per video file. Non-video files are skipped.
/// Returns the new ids in drop order.
pub fn import_files(
    graph: &mut SceneGraph,
    files: &[ImportFile],
    available_width: f32,
    config: &EditorConfig,
) -> Vec<NodeId> {
    let videos: Vec<&ImportFile> = files.iter().filter(|f| f.is_video()).collect();
    let skipped = files.len() - videos.len();
    if skipped > 0 {
        log::warn!("import: skipped {skipped} non-video file(s)");
    }

    let positions = grid_positions(
        videos.len(),
        graph.len(),
        available_width,
        &config.node,
        config.grid_margin,
    );
    videos
        .into_iter()
        .zip(positions)
        .map(|(file, position)| {
            graph.add_node(MediaRef::Blob(file.locator.clone()), file.name.clone(), position)
        })
        .collect()
}

/// Readiness deadlines of clips whose media has not reported yet.
#[derive(Debug, Default)]
pub struct ImportTracker {
    deadlines: HashMap<NodeId, u64>,
}

impl ImportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, id: NodeId, deadline_ms: u64) {
        self.deadlines.insert(id, deadline_ms);
    }

    pub fn untrack(&mut self, id: NodeId) {
        self.deadlines.remove(&id);
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_pending(&self, id: NodeId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// The host decoded the clip's media.
    pub fn ready(&mut self, graph: &mut SceneGraph, id: NodeId) -> bool {
        self.untrack(id);
        graph.set_media_status(id, MediaStatus::Ready)
    }

    /// The host could not decode the clip's media. The clip stays.
    pub fn failed(&mut self, graph: &mut SceneGraph, id: NodeId) -> bool {
        self.untrack(id);
        log::warn!("media for {id} failed to load");
        graph.set_media_status(id, MediaStatus::Errored)
    }

    /// Mark every clip whose deadline passed as errored. Returns them.
    pub fn expire(&mut self, graph: &mut SceneGraph, now_ms: u64) -> Vec<NodeId> {
        let mut expired: Vec<NodeId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now_ms)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_by_key(|id| graph.node_ids().iter().position(|n| n == id));
        for id in &expired {
            self.deadlines.remove(id);
            log::warn!("media for {id} not ready after timeout");
            graph.set_media_status(*id, MediaStatus::Errored);
        }
        expired
    }
}
