pub mod canvas;
pub mod config;
pub mod import;
pub mod input;
pub mod playback;
pub mod shortcuts;
pub mod sync;
pub mod tools;
pub mod transitions;
pub mod zoom;

pub use canvas::{Canvas, Outcome};
pub use config::{ConfigError, EditorConfig, PlaybackConfig};
pub use sync::{EditorMutation, SyncEngine, ViewDelta};
