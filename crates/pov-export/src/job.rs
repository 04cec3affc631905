//! Turning a clip graph into the ordered list of things to render.
//!
//! Export follows default edges only: line-level branch links need a
//! viewer to pick them, so a flat video takes the path a viewer who never
//! clicks would see.

use crate::error::ExportError;
use pov_core::SceneGraph;
use pov_core::id::NodeId;
use pov_core::model::VideoNode;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A short card shown between two clips.
#[derive(Debug, Clone, PartialEq)]
pub enum TitleCard {
    /// Pre-rendered frames, as an image2 pattern (`card/%04d.png`).
    Frames(PathBuf),
    /// Lines of text drawn centred on black.
    Text(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Clip(PathBuf),
    TitleCard(TitleCard),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportJob {
    pub steps: Vec<Step>,
}

impl ExportJob {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clip_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Clip(_)))
            .count()
    }

    /// Replace text cards with frames rendered ahead of time. The n-th
    /// title card of the job (from 0) is taken from `dir/card_NNN/%04d.png`
    /// when `0001.png` exists there; other cards keep their text. Returns
    /// how many cards were replaced.
    pub fn use_rendered_cards(&mut self, dir: &Path) -> usize {
        let mut replaced = 0;
        let cards = self.steps.iter_mut().filter_map(|s| match s {
            Step::TitleCard(card) => Some(card),
            Step::Clip(_) => None,
        });
        for (n, card) in cards.enumerate() {
            let frames = dir.join(format!("card_{n:03}"));
            if frames.join("0001.png").is_file() {
                log::debug!("export: card {n} uses frames in {}", frames.display());
                *card = TitleCard::Frames(frames.join("%04d.png"));
                replaced += 1;
            }
        }
        replaced
    }
}

/// Walk default edges from `start` until the sequence ends or a clip would
/// play twice. `clip_path` maps each visited clip to its file on disk.
pub fn linearize(
    graph: &SceneGraph,
    start: NodeId,
    mut clip_path: impl FnMut(&VideoNode) -> Option<PathBuf>,
) -> Result<ExportJob, ExportError> {
    if !graph.contains(start) {
        return Err(ExportError::UnknownStart(start.as_str().to_string()));
    }

    let mut job = ExportJob::default();
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if !seen.insert(id) {
            log::info!("export: sequence loops back to {id}, stopping");
            break;
        }
        let Some(node) = graph.node(id) else {
            break;
        };
        let path = clip_path(node).ok_or_else(|| {
            ExportError::MissingClip(PathBuf::from(node.media.locator()))
        })?;
        job.steps.push(Step::Clip(path));

        current = graph.resolve_next(id, None);
        let Some(next) = current else {
            break;
        };
        if seen.contains(&next) {
            continue;
        }
        if let Some(edge) = graph.outgoing(id).filter(|e| e.has_text()) {
            let lines = edge.visible_lines().map(|(_, l)| l.text.trim().to_string());
            job.steps
                .push(Step::TitleCard(TitleCard::Text(lines.collect())));
        }
    }
    log::debug!(
        "export: {} step(s), {} clip(s)",
        job.steps.len(),
        job.clip_count()
    );
    Ok(job)
}

/// The clip a sequence most likely starts from: the first one nothing
/// links into, else the first clip.
pub fn default_start(graph: &SceneGraph) -> Option<NodeId> {
    graph
        .node_ids()
        .iter()
        .copied()
        .find(|id| graph.incoming(*id).is_empty())
        .or_else(|| graph.node_ids().first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pov_core::model::{MediaRef, Position, TransitionLine, blank_lines};
    use pretty_assertions::assert_eq;

    fn clip(g: &mut SceneGraph, name: &str) -> NodeId {
        g.add_node(MediaRef::Archived(format!("videos/{name}.mp4")), name, Position::default())
    }

    fn path_of(n: &VideoNode) -> Option<PathBuf> {
        Some(PathBuf::from(format!("/work/{}.mp4", n.label)))
    }

    #[test]
    fn text_hops_become_title_cards() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        let c = clip(&mut g, "c");
        g.add_edge(a, b, [TransitionLine::new(" Later "), TransitionLine::new("")]);
        g.add_edge(b, c, blank_lines(3));

        let job = linearize(&g, a, path_of).unwrap();
        assert_eq!(
            job.steps,
            vec![
                Step::Clip("/work/a.mp4".into()),
                Step::TitleCard(TitleCard::Text(vec!["Later".into()])),
                Step::Clip("/work/b.mp4".into()),
                Step::Clip("/work/c.mp4".into()),
            ]
        );
    }

    #[test]
    fn branch_links_are_not_followed() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        let d = clip(&mut g, "d");
        g.add_edge(a, b, [TransitionLine::linked_to("Go", d)]);
        let job = linearize(&g, a, path_of).unwrap();
        assert_eq!(job.clip_count(), 2);
        assert_eq!(job.steps[2], Step::Clip("/work/b.mp4".into()));
    }

    #[test]
    fn loops_stop_before_repeating() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        g.add_edge(a, b, [TransitionLine::new("Again?")]);
        g.add_edge(b, a, [TransitionLine::new("Back")]);
        let job = linearize(&g, a, path_of).unwrap();
        // No card for the hop that would repeat a.
        assert_eq!(job.steps.len(), 3);
        assert_eq!(job.clip_count(), 2);
    }

    #[test]
    fn unknown_start_and_missing_files_fail() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        assert!(matches!(
            linearize(&g, NodeId::intern("nowhere"), path_of),
            Err(ExportError::UnknownStart(_))
        ));
        assert!(matches!(
            linearize(&g, a, |_| None),
            Err(ExportError::MissingClip(_))
        ));
    }

    #[test]
    fn rendered_frames_replace_matching_text_cards() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        let c = clip(&mut g, "c");
        g.add_edge(a, b, [TransitionLine::new("First")]);
        g.add_edge(b, c, [TransitionLine::new("Second")]);
        let mut job = linearize(&g, a, path_of).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let second = dir.path().join("card_001");
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(second.join("0001.png"), b"png").unwrap();
        std::fs::create_dir_all(dir.path().join("card_000")).unwrap();

        assert_eq!(job.use_rendered_cards(dir.path()), 1);
        assert_eq!(
            job.steps[1],
            Step::TitleCard(TitleCard::Text(vec!["First".into()]))
        );
        assert_eq!(
            job.steps[3],
            Step::TitleCard(TitleCard::Frames(second.join("%04d.png")))
        );
    }

    #[test]
    fn default_start_prefers_a_root() {
        let mut g = SceneGraph::new();
        let a = clip(&mut g, "a");
        let b = clip(&mut g, "b");
        g.add_edge(b, a, blank_lines(1));
        assert_eq!(default_start(&g), Some(b));
        assert_eq!(default_start(&SceneGraph::new()), None);
    }
}
