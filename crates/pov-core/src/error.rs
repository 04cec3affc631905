use thiserror::Error;

/// Problems with a project manifest.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest has no version field")]
    MissingVersion,

    #[error("unsupported project version {0:?}")]
    UnsupportedVersion(String),

    #[error("duplicate node id {0:?} in manifest")]
    DuplicateNode(String),

    #[error("edge {source_id:?} -> {target_id:?} references a missing node")]
    DanglingEdge { source_id: String, target_id: String },

    #[error("node {source_id:?} has more than one outgoing edge")]
    DuplicateEdge { source_id: String },

    #[error("invalid position {0:?}")]
    InvalidPosition(String),

    #[error("project name is empty")]
    EmptyName,
}

/// Problems reading or writing a `.pov` archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive has no {0} entry")]
    MissingManifest(&'static str),

    #[error("archive is missing media entry {0:?}")]
    MissingMedia(String),

    #[error("could not read media for {label:?}: {source}")]
    MediaFetch {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
