//! The external media tool, behind a trait so the pipeline can be driven
//! without ffmpeg installed.

use crate::error::ToolFailure;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Runs one media tool invocation to completion.
pub trait MediaTool {
    fn program(&self) -> &Path;

    /// Whether the tool can be started at all.
    fn available(&self) -> bool;

    fn run(&self, args: &[OsString]) -> Result<(), ToolFailure>;
}

/// The system `ffmpeg` (or another binary with the same CLI).
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaTool for Ffmpeg {
    fn program(&self) -> &Path {
        &self.program
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run(&self, args: &[OsString]) -> Result<(), ToolFailure> {
        log::debug!("{} {}", self.program.display(), render_args(args));
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ToolFailure {
                program: self.program.display().to_string(),
                status: format!("could not start: {e}"),
                stderr: String::new(),
            })?;

        if output.status.success() {
            return Ok(());
        }
        let status = match output.status.code() {
            Some(code) => format!("exited with {code}"),
            None => "killed by signal".to_string(),
        };
        Err(ToolFailure {
            program: self.program.display().to_string(),
            status,
            stderr: stderr_tail(&output.stderr),
        })
    }
}

/// Last few lines of stderr; ffmpeg puts the actual error at the end.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(8);
    lines[start..].join("\n")
}

pub(crate) fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
