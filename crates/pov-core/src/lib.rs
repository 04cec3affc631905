pub mod archive;
pub mod error;
pub mod graph;
pub mod id;
pub mod layout;
pub mod model;
pub mod project;

pub use archive::{LoadedProject, MediaAsset, MediaSource, SavedArchive, load_archive, save_archive};
pub use error::{ArchiveError, ProjectError};
pub use graph::{GraphChange, SceneGraph};
pub use id::NodeId;
pub use layout::{NodeMetrics, Viewport, content_extent, grid_positions};
pub use model::*;
pub use project::{LoadPolicy, LoadReport, Project};
