//! Core math and geometry primitives for `boardcal`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, ...),
//! - composable camera models (projection + distortion + intrinsics),
//! - chessboard geometry ([`BoardSpec`]) and its object-point grid,
//! - synthetic planar projection helpers used by tests across the workspace.
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ projection(dir)`

/// Chessboard target geometry.
pub mod board;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera models and distortion utilities.
pub mod models;
/// Synthetic planar scene generation for tests.
pub mod synthetic;
/// Per-view correspondence containers.
pub mod view;

pub use board::*;
pub use math::*;
pub use models::*;
pub use view::*;
