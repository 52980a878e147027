//! First-crossing search over a finished trajectory.

use serde::{Deserialize, Serialize};

use super::geometry::{CylinderDetector, PlaneDetector};
use crate::integrator::Trajectory;
use crate::types::{PhaseState, Vec3};

/// Angles of incidence on a planar detector (radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncidenceAngles {
    /// Between the direction of flight and the plane normal
    pub theta: f64,
    /// Projected angle along the detector's `w` axis
    pub theta_w: f64,
    /// Projected angle along the detector's `v` axis
    pub theta_v: f64,
}

/// Where and when a trajectory hit a detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub point: Vec3,
    /// ns
    pub time: f64,
    /// MeV/c
    pub momentum: Vec3,
    /// Only planar detectors report angles.
    pub angles: Option<IncidenceAngles>,
}

/// The bracketing pair found by the scan, with the interpolated crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub before: PhaseState,
    pub after: PhaseState,
    /// Position of the crossing between `before` (0) and `after` (1)
    pub fraction: f64,
    pub point: Vec3,
    pub time: f64,
}

/// A surface a trajectory can cross.
pub trait DetectorSurface {
    /// Scalar compared against [`threshold`](Self::threshold).
    fn level(&self, pos: &Vec3) -> f64;

    fn threshold(&self) -> f64;

    /// Turn the first crossing into a hit, or `None` if it misses the
    /// active area.
    fn resolve(&self, crossing: &Crossing) -> Option<Intersection>;
}

/// Find the first pair with `level(p1) < threshold <= level(p2)`.
pub fn find_crossing<S: DetectorSurface + ?Sized>(
    surface: &S,
    states: &[PhaseState],
    times: &[f64],
) -> Option<Crossing> {
    let d = surface.threshold();
    let n = states.len().min(times.len());

    for i in 0..n.saturating_sub(1) {
        let (p1, p2) = (&states[i], &states[i + 1]);
        let l2 = surface.level(&p2.pos);
        if l2 < d {
            continue;
        }
        let l1 = surface.level(&p1.pos);
        if l1 >= d {
            continue;
        }

        let fraction = (d - l1) / (l2 - l1);
        return Some(Crossing {
            before: *p1,
            after: *p2,
            fraction,
            point: p1.pos.lerp(&p2.pos, fraction),
            time: times[i] + fraction * (times[i + 1] - times[i]),
        });
    }
    None
}

/// Scan a trajectory for its first crossing of `surface`.
///
/// Only the first crossing is considered: if a planar detector's plane is
/// first crossed outside its footprint, the result is `None` even if the
/// particle later comes back through the active area.
pub fn find_intersection<S: DetectorSurface + ?Sized>(
    surface: &S,
    trajectory: &Trajectory,
) -> Option<Intersection> {
    find_intersection_in(surface, &trajectory.states, &trajectory.times)
}

/// [`find_intersection`] over bare state and time slices.
pub fn find_intersection_in<S: DetectorSurface + ?Sized>(
    surface: &S,
    states: &[PhaseState],
    times: &[f64],
) -> Option<Intersection> {
    let crossing = find_crossing(surface, states, times)?;
    surface.resolve(&crossing)
}

impl DetectorSurface for PlaneDetector {
    fn level(&self, pos: &Vec3) -> f64 {
        pos.dot(&self.normal)
    }

    fn threshold(&self) -> f64 {
        self.distance
    }

    fn resolve(&self, crossing: &Crossing) -> Option<Intersection> {
        let w = crossing.point.dot(&self.w);
        let v = crossing.point.dot(&self.v);
        if w.abs() >= self.width / 2.0 || v.abs() >= self.height / 2.0 {
            return None;
        }

        let unit = (crossing.after.pos - crossing.before.pos).normalized();
        let proj_w = unit.dot(&self.w);
        let proj_v = unit.dot(&self.v);

        let theta = unit.dot(&self.normal).clamp(-1.0, 1.0).acos();
        let theta_w = (proj_w / (unit - self.v * proj_v).magnitude())
            .clamp(-1.0, 1.0)
            .asin();
        let theta_v = (proj_v / (unit - self.w * proj_w).magnitude())
            .clamp(-1.0, 1.0)
            .asin();

        Some(Intersection {
            point: crossing.point,
            time: crossing.time,
            // Taken at the pre-crossing point, not interpolated
            momentum: crossing.before.mom,
            angles: Some(IncidenceAngles {
                theta,
                theta_w,
                theta_v,
            }),
        })
    }
}

impl DetectorSurface for CylinderDetector {
    fn level(&self, pos: &Vec3) -> f64 {
        pos.transverse()
    }

    fn threshold(&self) -> f64 {
        self.radius
    }

    fn resolve(&self, crossing: &Crossing) -> Option<Intersection> {
        Some(Intersection {
            point: crossing.point,
            time: crossing.time,
            momentum: crossing.before.mom.lerp(&crossing.after.mom, crossing.fraction),
            angles: None,
        })
    }
}

/// Either detector shape, for callers that pick one at run time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Detector {
    Plane(PlaneDetector),
    Cylinder(CylinderDetector),
}

impl DetectorSurface for Detector {
    fn level(&self, pos: &Vec3) -> f64 {
        match self {
            Detector::Plane(d) => d.level(pos),
            Detector::Cylinder(d) => d.level(pos),
        }
    }

    fn threshold(&self) -> f64 {
        match self {
            Detector::Plane(d) => d.threshold(),
            Detector::Cylinder(d) => d.threshold(),
        }
    }

    fn resolve(&self, crossing: &Crossing) -> Option<Intersection> {
        match self {
            Detector::Plane(d) => d.resolve(crossing),
            Detector::Cylinder(d) => d.resolve(crossing),
        }
    }
}

impl From<PlaneDetector> for Detector {
    fn from(d: PlaneDetector) -> Self {
        Detector::Plane(d)
    }
}

impl From<CylinderDetector> for Detector {
    fn from(d: CylinderDetector) -> Self {
        Detector::Cylinder(d)
    }
}

// =============================================================================
// Tests
// =============================================================================
