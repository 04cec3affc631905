use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a tool invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    TitleCard,
    Concat,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Normalize => "normalize",
            Stage::TitleCard => "title card",
            Stage::Concat => "concat",
        })
    }
}

/// A media tool run that did not succeed.
#[derive(Debug, Clone, Error)]
#[error("{program} {status}: {stderr}")]
pub struct ToolFailure {
    pub program: String,
    /// `exited with 1`, `killed by signal`, `could not start: ...`
    pub status: String,
    /// Tail of the tool's stderr.
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0:?} was not found; install ffmpeg or point --ffmpeg at it")]
    ToolMissing(PathBuf),

    #[error("invalid export config: {0}")]
    InvalidConfig(String),

    #[error("nothing to export")]
    EmptyJob,

    #[error("start clip {0:?} is not in the project")]
    UnknownStart(String),

    #[error("clip file {0:?} does not exist")]
    MissingClip(PathBuf),

    #[error("{stage} failed at step {step}: {source}")]
    Stage {
        stage: Stage,
        step: usize,
        #[source]
        source: ToolFailure,
    },

    #[error("export session I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Stage of a failed tool run, if that is what went wrong.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ExportError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
