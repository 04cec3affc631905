//! Project manifest: the serialisable form of a scene graph.
//!
//! The manifest is the `project.json` entry of a `.pov` archive. Version
//! `2.0` carries transitions with per-line links; version `1.0` manifests
//! (clip list + bare connections, CSS pixel positions) are upgraded on read.

use crate::error::ProjectError;
use crate::graph::SceneGraph;
use crate::id::NodeId;
use crate::model::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FORMAT_VERSION: &str = "2.0";
pub const LEGACY_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub version: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<ProjectNode>,
    #[serde(default)]
    pub edges: Vec<ProjectEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub id: String,
    pub label: String,
    /// Entry path of the clip inside the archive.
    pub media_path: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub lines: Vec<ProjectLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<String>,
}

// ─── Legacy 1.0 layout ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProject {
    nodes: Vec<LegacyNode>,
    #[serde(default)]
    connections: Vec<LegacyConnection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyNode {
    id: String,
    video_name: String,
    #[serde(default)]
    video_path: Option<String>,
    position: LegacyPosition,
}

#[derive(Deserialize)]
struct LegacyPosition {
    left: String,
    top: String,
}

#[derive(Deserialize)]
struct LegacyConnection {
    source: String,
    target: String,
}

/// How strictly to treat references to missing nodes on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Skip bad edges and links, report them in [`LoadReport`].
    #[default]
    Lenient,
    /// Fail the whole load on the first bad reference.
    Strict,
}

/// What a lenient load had to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// `(source, target)` manifest ids of edges that were skipped.
    pub dropped_edges: Vec<(String, String)>,
    /// Line links cleared because their node didn't exist.
    pub cleared_links: usize,
    /// Whether the manifest was upgraded from the 1.0 layout.
    pub upgraded: bool,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_edges.is_empty() && self.cleared_links == 0
    }
}

/// A manifest turned back into a live graph with fresh ids.
#[derive(Debug)]
pub struct Restored {
    pub graph: SceneGraph,
    /// Archive media path for each restored node.
    pub media_paths: Vec<(NodeId, String)>,
    pub report: LoadReport,
}

impl Project {
    /// Snapshot a graph. `media_path` decides where each clip's media is
    /// stored in the archive.
    pub fn capture(
        graph: &SceneGraph,
        name: &str,
        mut media_path: impl FnMut(&VideoNode) -> String,
    ) -> Self {
        let nodes = graph
            .nodes()
            .map(|n| ProjectNode {
                id: n.id.as_str().to_string(),
                label: n.label.clone(),
                media_path: media_path(n),
                position: n.position,
            })
            .collect();

        let edges = graph
            .edges()
            .map(|e| ProjectEdge {
                source: e.source.as_str().to_string(),
                target: e.target.as_str().to_string(),
                lines: e
                    .lines
                    .iter()
                    .map(|l| ProjectLine {
                        text: l.text.clone(),
                        linked: l.linked.map(|t| t.as_str().to_string()),
                    })
                    .collect(),
            })
            .collect();

        Self {
            version: FORMAT_VERSION.to_string(),
            name: name.to_string(),
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a manifest of any supported version.
    pub fn from_json(text: &str) -> Result<(Self, bool), ProjectError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let version = value
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or(ProjectError::MissingVersion)?
            .to_string();

        match version.as_str() {
            FORMAT_VERSION => Ok((serde_json::from_value(value)?, false)),
            LEGACY_VERSION => {
                let legacy: LegacyProject = serde_json::from_value(value)?;
                Ok((upgrade(legacy)?, true))
            }
            _ => Err(ProjectError::UnsupportedVersion(version)),
        }
    }

    /// Rebuild a graph. Nothing outside the returned value is touched, so a
    /// failed restore leaves the caller's current project intact.
    pub fn restore(&self, policy: LoadPolicy) -> Result<Restored, ProjectError> {
        let mut graph = SceneGraph::new();
        let mut id_map: HashMap<String, NodeId> = HashMap::with_capacity(self.nodes.len());
        let mut media_paths = Vec::with_capacity(self.nodes.len());
        let mut report = LoadReport::default();
        // Manifest target of the edge placed for each manifest source.
        let mut placed: HashMap<&str, &str> = HashMap::new();

        for n in &self.nodes {
            if id_map.contains_key(&n.id) {
                return Err(ProjectError::DuplicateNode(n.id.clone()));
            }
            let id = graph.add_node(
                MediaRef::Archived(n.media_path.clone()),
                n.label.clone(),
                n.position,
            );
            id_map.insert(n.id.clone(), id);
            media_paths.push((id, n.media_path.clone()));
        }

        for e in &self.edges {
            let endpoints = (id_map.get(&e.source), id_map.get(&e.target));
            let (Some(&source), Some(&target)) = endpoints else {
                if policy == LoadPolicy::Strict {
                    return Err(ProjectError::DanglingEdge {
                        source_id: e.source.clone(),
                        target_id: e.target.clone(),
                    });
                }
                log::warn!("dropping edge {} -> {}: missing node", e.source, e.target);
                report
                    .dropped_edges
                    .push((e.source.clone(), e.target.clone()));
                continue;
            };

            let mut lines = Vec::with_capacity(e.lines.len());
            for l in &e.lines {
                let linked = match &l.linked {
                    Some(raw) => match id_map.get(raw) {
                        Some(&t) => Some(t),
                        None if policy == LoadPolicy::Strict => {
                            return Err(ProjectError::DanglingEdge {
                                source_id: e.source.clone(),
                                target_id: raw.clone(),
                            });
                        }
                        None => {
                            report.cleared_links += 1;
                            None
                        }
                    },
                    None => None,
                };
                lines.push(TransitionLine {
                    text: l.text.clone(),
                    linked,
                });
            }

            if graph.add_edge(source, target, lines).is_none() {
                if policy == LoadPolicy::Strict {
                    return Err(ProjectError::DanglingEdge {
                        source_id: e.source.clone(),
                        target_id: e.target.clone(),
                    });
                }
                report
                    .dropped_edges
                    .push((e.source.clone(), e.target.clone()));
                continue;
            }

            // A later edge from the same source replaces the earlier one.
            if let Some(previous) = placed.insert(&e.source, &e.target) {
                if policy == LoadPolicy::Strict {
                    return Err(ProjectError::DuplicateEdge {
                        source_id: e.source.clone(),
                    });
                }
                log::warn!(
                    "edge {} -> {previous} replaced by {} -> {}",
                    e.source,
                    e.source,
                    e.target
                );
                report
                    .dropped_edges
                    .push((e.source.clone(), previous.to_string()));
            }
        }

        // Restoring is not an edit; observers re-project everything on swap.
        graph.take_changes();

        Ok(Restored {
            graph,
            media_paths,
            report,
        })
    }
}

fn upgrade(legacy: LegacyProject) -> Result<Project, ProjectError> {
    let nodes = legacy
        .nodes
        .into_iter()
        .map(|n| {
            let media_path = n
                .video_path
                .unwrap_or_else(|| format!("videos/{}", n.video_name));
            Ok(ProjectNode {
                id: n.id,
                label: n.video_name,
                media_path,
                position: Position::new(
                    parse_css_px(&n.position.left)?,
                    parse_css_px(&n.position.top)?,
                ),
            })
        })
        .collect::<Result<Vec<_>, ProjectError>>()?;

    let edges = legacy
        .connections
        .into_iter()
        .map(|c| ProjectEdge {
            source: c.source,
            target: c.target,
            lines: Vec::new(),
        })
        .collect();

    Ok(Project {
        version: FORMAT_VERSION.to_string(),
        name: String::new(),
        nodes,
        edges,
    })
}

/// Parse `"120px"`, `"120"` or `""` (→ 0).
fn parse_css_px(raw: &str) -> Result<f32, ProjectError> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    if number.is_empty() {
        return Ok(0.0);
    }
    number
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProjectError::InvalidPosition(raw.to_string()))
}

/// Default name offered in the save prompt.
pub fn suggested_project_name(date: &str) -> String {
    format!("projet_video_{date}")
}

/// Trim a user-entered project name and strip characters that are not
/// safe in a file name.
pub fn sanitize_project_name(raw: &str) -> Result<String, ProjectError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        Err(ProjectError::EmptyName)
    } else {
        Ok(cleaned)
    }
}
