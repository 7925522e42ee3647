//! GPU-facing data types.
//!
//! - `transform` holds the transform components and the per-object record
//! - `mesh` holds the vertex layout and GPU mesh entries
//! - `texture` holds GPU texture wrappers and creation utilities
//! - `model` holds model templates and their spawning

pub mod mesh;
pub mod model;
pub mod texture;
pub mod transform;
