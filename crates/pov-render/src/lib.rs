//! Pure geometry for the clip canvas.
//!
//! The host draws the DOM; this crate only answers "where": clip
//! rectangles, anchor points, connector lines, panel midpoints, and which
//! part of which clip sits under the pointer. Everything is in logical
//! canvas units unless a zoom factor is passed in.

pub mod connector;
pub mod hit;

pub use connector::{Connector, anchor_point, node_rect, project_connectors};
pub use hit::{Hit, HitPart, hit_test};
