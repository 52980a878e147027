//! Detector surfaces and trajectory intersection.
//!
//! This module handles:
//! - **Geometry**: building planar and cylindrical detector descriptions
//! - **Intersection**: finding where a finished trajectory first crosses one
//!
//! ## Bracket and interpolate
//!
//! Each surface maps a position to a scalar "level" (distance along the
//! plane normal, or distance from the Z axis). A crossing is the first pair
//! of consecutive trajectory points whose levels bracket the surface:
//!
//! ```text
//!   level
//!     │              ● p2   level(p2) ≥ d
//!   d ┼ ─ ─ ─ ─ ─ ╳ ─ ─ ─
//!     │        ●            level(p1) < d
//!     │       p1
//!     └───────────────────── step
//! ```
//!
//! The crossing point and time are interpolated linearly between the pair.

pub mod geometry;
pub mod intersection;

pub use geometry::*;
pub use intersection::*;
