//! Render an [`ExportJob`] to one video file.
//!
//! Every step is first rendered to a uniform part (same size, frame rate,
//! codecs and audio layout) inside a per-session temporary directory, then
//! the parts are joined with the concat demuxer using stream copy. The
//! session directory is owned by a `TempDir`, so it is removed whether the
//! export succeeds or fails at any stage.

use crate::config::ExportConfig;
use crate::error::{ExportError, Stage};
use crate::job::{ExportJob, Step, TitleCard};
use crate::tool::MediaTool;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// What a finished export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub parts: usize,
}

pub fn export(
    job: &ExportJob,
    config: &ExportConfig,
    tool: &dyn MediaTool,
    out: &Path,
) -> Result<ExportSummary, ExportError> {
    config.validate()?;
    if job.is_empty() {
        return Err(ExportError::EmptyJob);
    }
    for step in &job.steps {
        if let Step::Clip(path) = step
            && !path.exists()
        {
            return Err(ExportError::MissingClip(path.clone()));
        }
    }
    if !tool.available() {
        return Err(ExportError::ToolMissing(tool.program().to_path_buf()));
    }
    ensure_parent_dir(out)?;

    let session = new_session(config)?;
    log::info!(
        "export: {} step(s) in {}",
        job.steps.len(),
        session.path().display()
    );

    let mut parts = Vec::with_capacity(job.steps.len());
    for (step_index, step) in job.steps.iter().enumerate() {
        let part = session.path().join(format!("part_{step_index:04}.mp4"));
        let (stage, args) = match step {
            Step::Clip(clip) => (Stage::Normalize, normalize_args(clip, &part, config)),
            Step::TitleCard(card) => (Stage::TitleCard, title_card_args(card, &part, config)),
        };
        log::debug!("export: {stage} step {step_index}");
        tool.run(&args).map_err(|source| ExportError::Stage {
            stage,
            step: step_index,
            source,
        })?;
        parts.push(part);
    }

    let list = session.path().join("concat.txt");
    std::fs::write(&list, concat_list(&parts))?;
    tool.run(&concat_args(&list, out))
        .map_err(|source| ExportError::Stage {
            stage: Stage::Concat,
            step: parts.len(),
            source,
        })?;

    log::info!("export: wrote {}", out.display());
    Ok(ExportSummary {
        output: out.to_path_buf(),
        parts: parts.len(),
    })
}

fn new_session(config: &ExportConfig) -> std::io::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pov-export-");
    match &config.scratch_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            builder.tempdir_in(dir)
        }
        None => builder.tempdir(),
    }
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

// ─── Argument builders ───────────────────────────────────────────────────

fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

/// Scale into the frame keeping aspect, pad the rest black.
fn fit_filter(config: &ExportConfig) -> String {
    let (w, h) = (config.width, config.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={}",
        config.fps
    )
}

fn silence(config: &ExportConfig) -> String {
    format!(
        "anullsrc=channel_layout=stereo:sample_rate={}",
        config.sample_rate
    )
}

fn encode_args(config: &ExportConfig, out: &Path) -> Vec<OsString> {
    let mut a = args([
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        "aac",
        "-ac",
        "2",
    ]);
    a.extend(args([
        "-crf".to_string(),
        config.crf.to_string(),
        "-ar".to_string(),
        config.sample_rate.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]));
    a.push(out.as_os_str().to_os_string());
    a
}

pub(crate) fn normalize_args(clip: &Path, out: &Path, config: &ExportConfig) -> Vec<OsString> {
    let mut a = args(["-y", "-loglevel", "error", "-i"]);
    a.push(clip.as_os_str().to_os_string());
    a.extend(args(["-map", "0:v:0", "-map", "0:a:0?", "-vf"]));
    a.push(fit_filter(config).into());
    a.extend(encode_args(config, out));
    a
}

pub(crate) fn title_card_args(card: &TitleCard, out: &Path, config: &ExportConfig) -> Vec<OsString> {
    let mut a = args(["-y", "-loglevel", "error"]);
    let video_filter = match card {
        TitleCard::Frames(pattern) => {
            a.extend(args(["-framerate".to_string(), config.fps.to_string(), "-i".to_string()]));
            a.push(pattern.as_os_str().to_os_string());
            fit_filter(config)
        }
        TitleCard::Text(lines) => {
            a.extend(args([
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                format!(
                    "color=c=black:s={}:r={}:d={}",
                    config.size(),
                    config.fps,
                    config.title_seconds
                ),
            ]));
            drawtext_filter(lines, config)
        }
    };
    a.extend(args(["-f".to_string(), "lavfi".to_string(), "-i".to_string(), silence(config)]));
    a.extend(args(["-map", "0:v:0", "-map", "1:a:0", "-shortest", "-vf"]));
    a.push(video_filter.into());
    a.extend(encode_args(config, out));
    a
}

pub(crate) fn concat_args(list: &Path, out: &Path) -> Vec<OsString> {
    let mut a = args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"]);
    a.push(list.as_os_str().to_os_string());
    a.extend(args(["-c", "copy"]));
    a.push(out.as_os_str().to_os_string());
    a
}

/// One `drawtext` per line, stacked and centred.
fn drawtext_filter(lines: &[String], config: &ExportConfig) -> String {
    if lines.is_empty() {
        return "null".to_string();
    }
    let size = (config.height / 15).max(12);
    let step = size * 3 / 2;
    let block = step * lines.len() as u32;
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "drawtext=text='{}':fontcolor=white:fontsize={size}:x=(w-text_w)/2:y=(h-{block})/2+{}",
                escape_drawtext(line),
                step * i as u32
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape for a single-quoted drawtext value inside a filter graph.
fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push_str("'\\\\\\''"),
            ':' => out.push_str("\\\\:"),
            '%' => out.push_str("\\\\%"),
            c => out.push(c),
        }
    }
    out
}

/// Concat demuxer list. Paths are single-quoted; embedded quotes are
/// closed, escaped and reopened.
pub(crate) fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let quoted = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{quoted}'\n")
        })
        .collect()
}
