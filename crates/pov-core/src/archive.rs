//! `.pov` archive: a zip container holding `project.json` plus one
//! `videos/<asset>` entry per distinct clip media.

use crate::error::{ArchiveError, ProjectError};
use crate::graph::SceneGraph;
use crate::id::NodeId;
use crate::model::{MediaRef, VideoNode};
use crate::project::{LoadPolicy, LoadReport, Project, sanitize_project_name};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MANIFEST_ENTRY: &str = "project.json";
pub const MEDIA_DIR: &str = "videos";
pub const ARCHIVE_EXTENSION: &str = "pov";

/// Supplies the raw bytes behind a clip's media handle when saving.
pub trait MediaSource {
    fn fetch(&self, media: &MediaRef) -> std::io::Result<Vec<u8>>;
}

/// Bytes registered by locator (blob URL, archive path, ...).
impl MediaSource for HashMap<String, Vec<u8>> {
    fn fetch(&self, media: &MediaRef) -> std::io::Result<Vec<u8>> {
        self.get(media.locator()).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no media registered for {}", media.locator()),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct SavedArchive {
    /// Suggested download name, e.g. `my_project.pov`.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One media entry extracted from an archive, shared by every node that
/// referenced it.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub path: String,
    pub bytes: Vec<u8>,
    pub nodes: Vec<NodeId>,
}

#[derive(Debug)]
pub struct LoadedProject {
    pub name: String,
    pub graph: SceneGraph,
    pub assets: Vec<MediaAsset>,
    pub report: LoadReport,
}

/// Bundle the graph and every referenced media payload into one archive.
/// Nodes sharing a media handle share one entry. A media fetch failure
/// aborts the save.
pub fn save_archive(
    graph: &SceneGraph,
    source: &dyn MediaSource,
    name: &str,
) -> Result<SavedArchive, ArchiveError> {
    let name = sanitize_project_name(name)?;
    let paths = assign_asset_paths(graph);

    let project = Project::capture(graph, &name, |n| {
        paths.get(&n.media).cloned().unwrap_or_default()
    });
    let manifest = project.to_json()?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(MANIFEST_ENTRY, entry_options(CompressionMethod::Deflated))?;
    zip.write_all(manifest.as_bytes())?;

    let mut written = HashSet::new();
    for node in graph.nodes() {
        let Some(path) = paths.get(&node.media) else {
            continue;
        };
        if !written.insert(path.clone()) {
            continue;
        }
        let bytes = source
            .fetch(&node.media)
            .map_err(|source| ArchiveError::MediaFetch {
                label: node.label.clone(),
                source,
            })?;
        // Video payloads are already compressed.
        zip.start_file(path.as_str(), entry_options(CompressionMethod::Stored))?;
        zip.write_all(&bytes)?;
    }

    let bytes = zip.finish()?.into_inner();
    log::debug!(
        "saved archive {name}.{ARCHIVE_EXTENSION}: {} clips, {} bytes",
        graph.len(),
        bytes.len()
    );
    Ok(SavedArchive {
        file_name: format!("{name}.{ARCHIVE_EXTENSION}"),
        bytes,
    })
}

/// Read an archive into a fresh graph. The caller's current project is
/// not involved, so any error leaves it untouched.
pub fn load_archive(bytes: &[u8], policy: LoadPolicy) -> Result<LoadedProject, ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))?;

    let manifest = {
        let mut entry = match zip.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingManifest(MANIFEST_ENTRY));
            }
            Err(e) => return Err(e.into()),
        };
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        text
    };

    let (project, upgraded) = Project::from_json(&manifest)?;
    let mut restored = project.restore(policy)?;
    restored.report.upgraded = upgraded;

    let mut assets: Vec<MediaAsset> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();
    for (node, path) in &restored.media_paths {
        if let Some(&i) = by_path.get(path) {
            assets[i].nodes.push(*node);
            continue;
        }
        let mut entry = match zip.by_name(path) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingMedia(path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        by_path.insert(path.clone(), assets.len());
        assets.push(MediaAsset {
            path: path.clone(),
            bytes: data,
            nodes: vec![*node],
        });
    }

    log::debug!(
        "loaded archive {:?}: {} clips, {} edges, {} assets",
        project.name,
        restored.graph.len(),
        restored.graph.edge_count(),
        assets.len()
    );

    Ok(LoadedProject {
        name: project.name,
        graph: restored.graph,
        assets,
        report: restored.report,
    })
}

fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().compression_method(method);
    match method {
        CompressionMethod::Stored => options,
        _ => options.compression_level(Some(5)),
    }
}

/// Map each distinct media handle to a unique `videos/<name>` path derived
/// from the first clip label that uses it.
fn assign_asset_paths(graph: &SceneGraph) -> HashMap<MediaRef, String> {
    let mut paths: HashMap<MediaRef, String> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    for node in graph.nodes() {
        if paths.contains_key(&node.media) {
            continue;
        }
        let path = unique_asset_path(node, &mut used);
        paths.insert(node.media.clone(), path);
    }
    paths
}

fn unique_asset_path(node: &VideoNode, used: &mut HashSet<String>) -> String {
    let base = sanitize_asset_name(&node.label);
    let (stem, ext) = match base.rfind('.') {
        Some(dot) if dot > 0 => (&base[..dot], &base[dot..]),
        _ => (base.as_str(), ""),
    };
    let mut candidate = format!("{MEDIA_DIR}/{base}");
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{MEDIA_DIR}/{stem} ({n}){ext}");
        n += 1;
    }
    candidate
}

fn sanitize_asset_name(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "clip".to_string()
    } else {
        cleaned.to_string()
    }
}
