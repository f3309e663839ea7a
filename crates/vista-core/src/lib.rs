//! Vista Core - Shared value types for the Vista model viewer
//!
//! This crate provides the small vocabulary used by every other crate:
//! - Mathematical primitives (re-exported from glam)
//! - Axis-aligned bounding boxes
//! - Linear RGBA colors used for material factors
//! - Camera parameters extracted from imported scenes

pub mod types;

pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
pub use types::{Aabb, CameraParams, Color};
