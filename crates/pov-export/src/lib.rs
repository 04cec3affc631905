//! Offline export of a POV project to a single video.
//!
//! [`linearize`] turns the clip graph into an [`ExportJob`]; [`export`]
//! renders the job with a [`MediaTool`] (normally [`Ffmpeg`]).

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod tool;

pub use config::ExportConfig;
pub use error::{ExportError, Stage, ToolFailure};
pub use job::{ExportJob, Step, TitleCard, default_start, linearize};
pub use pipeline::{ExportSummary, export};
pub use tool::{Ffmpeg, MediaTool};
