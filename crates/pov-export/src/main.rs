use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::Parser;
use pov_core::{LoadPolicy, NodeId, SceneGraph};
use pov_export::{ExportConfig, Ffmpeg, default_start, export, linearize};

/// Render a `.pov` project to one video, following its default path.
#[derive(Parser, Debug)]
#[command(name = "pov-export", version)]
struct Cli {
    /// Project archive.
    archive: PathBuf,

    /// Output video path.
    #[arg(short, long)]
    out: PathBuf,

    /// Clip to start from, by label. Defaults to the first clip nothing
    /// links into.
    #[arg(long)]
    start: Option<String>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    #[arg(long, default_value_t = 23)]
    crf: u8,

    /// Duration of title cards rendered from transition text.
    #[arg(long, default_value_t = 3.0)]
    title_seconds: f32,

    /// ffmpeg binary to use.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Pre-rendered title cards: `card_000/0001.png`, `card_001/…`, one
    /// directory per card in playback order. Cards without frames are
    /// drawn from their text.
    #[arg(long)]
    card_frames: Option<PathBuf>,

    /// Directory for per-export scratch files.
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Fail on dangling edges instead of skipping them.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let bytes = std::fs::read(&cli.archive)
        .with_context(|| format!("read archive '{}'", cli.archive.display()))?;
    let policy = if cli.strict {
        LoadPolicy::Strict
    } else {
        LoadPolicy::Lenient
    };
    let project = pov_core::load_archive(&bytes, policy)
        .with_context(|| format!("open project '{}'", cli.archive.display()))?;
    for (source, target) in &project.report.dropped_edges {
        log::warn!("skipped dangling edge {source} -> {target}");
    }

    // Media comes out of the archive into its own directory; the pipeline
    // keeps intermediates in a separate session.
    let extracted = tempfile::Builder::new()
        .prefix("pov-extract-")
        .tempdir()
        .context("create extraction directory")?;
    let mut files: HashMap<NodeId, PathBuf> = HashMap::new();
    for (i, asset) in project.assets.iter().enumerate() {
        let name = asset
            .path
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .map_or_else(|| format!("asset_{i}"), |n| format!("{i:03}_{n}"));
        let path = extracted.path().join(name);
        std::fs::write(&path, &asset.bytes)
            .with_context(|| format!("extract '{}'", asset.path))?;
        for node in &asset.nodes {
            files.insert(*node, path.clone());
        }
    }

    let start = match &cli.start {
        Some(label) => find_by_label(&project.graph, label)
            .with_context(|| format!("no clip labelled {label:?} in the project"))?,
        None => match default_start(&project.graph) {
            Some(id) => id,
            None => bail!("project {:?} has no clips", project.name),
        },
    };

    let mut job = linearize(&project.graph, start, |n| files.get(&n.id).cloned())?;
    if let Some(dir) = &cli.card_frames {
        let replaced = job.use_rendered_cards(dir);
        log::info!("using {replaced} pre-rendered title card(s) from {}", dir.display());
    }
    let config = ExportConfig {
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        crf: cli.crf,
        title_seconds: cli.title_seconds,
        program: cli.ffmpeg.clone(),
        scratch_dir: cli.scratch.clone(),
        ..ExportConfig::default()
    };
    let tool = Ffmpeg::new(&config.program);
    let summary = export(&job, &config, &tool, &cli.out)
        .with_context(|| format!("export '{}'", project.name))?;

    eprintln!(
        "wrote {} ({} clips, {} parts)",
        summary.output.display(),
        job.clip_count(),
        summary.parts
    );
    Ok(())
}

fn find_by_label(graph: &SceneGraph, label: &str) -> Option<NodeId> {
    graph
        .nodes()
        .find(|n| n.label == label)
        .map(|n| n.id)
}
