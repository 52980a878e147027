//! Detector descriptions.

use serde::{Deserialize, Serialize};

use crate::types::Vec3;

/// A rectangular planar detector.
///
/// The plane is `pos · normal = distance`. `v` and `w` are orthogonal unit
/// vectors in the plane that orient the rectangle; `width` runs along `w`
/// and `height` along `v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneDetector {
    pub normal: Vec3,
    pub distance: f64,
    pub v: Vec3,
    pub w: Vec3,
    pub width: f64,
    pub height: f64,
}

impl PlaneDetector {
    /// Build from a normal and one in-plane direction; `w = normal × v`.
    pub fn new(normal: Vec3, distance: f64, v: Vec3, width: f64, height: f64) -> Self {
        let normal = normal.normalized();
        // Drop any component of v along the normal
        let v = (v - normal * v.dot(&normal)).normalized();
        let w = normal.cross(&v);
        Self {
            normal,
            distance,
            v,
            w,
            width,
            height,
        }
    }

    /// Square detector facing the origin, `distance` meters out on +X.
    pub fn along_x(distance: f64, width: f64) -> Self {
        Self::new(
            Vec3::new(1.0, 0.0, 0.0),
            distance,
            Vec3::new(0.0, 1.0, 0.0),
            width,
            width,
        )
    }

    pub fn center(&self) -> Vec3 {
        self.normal * self.distance
    }

    /// The four corners, for drawing: (+w+v, +w−v, −w−v, −w+v).
    pub fn corners(&self) -> [Vec3; 4] {
        let c = self.center();
        let hw = self.w * (self.width / 2.0);
        let hv = self.v * (self.height / 2.0);
        [c + hw + hv, c + hw - hv, c - hw - hv, c - hw + hv]
    }
}

impl Default for PlaneDetector {
    fn default() -> Self {
        Self::along_x(33.0, 1.0)
    }
}

/// A cylinder of the given radius around the Z axis, unbounded in z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylinderDetector {
    pub radius: f64,
}

impl CylinderDetector {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}
