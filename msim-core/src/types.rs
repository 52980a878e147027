//! Core types for the propagation engine.
//!
//! Units follow the detector-physics convention used throughout the crate:
//! - Position: meters (m)
//! - Momentum: MeV/c
//! - Mass and energy: MeV
//! - Time: nanoseconds (ns)
//! - Magnetic field: Tesla (T)

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Vec3 - 3D Vector
// =============================================================================

/// A 3D vector used for positions, momenta and field values.
///
/// Coordinate system:
/// - Z: the solenoid symmetry axis (the "uniform" field points along +Z)
/// - X, Y: the transverse plane, azimuth measured from +X toward +Y
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared magnitude (avoids sqrt for comparisons)
    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Magnitude (length) of the vector
    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    /// Distance from the Z axis.
    pub fn transverse(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// True only for the exact zero vector.
    ///
    /// Stopping is pinned to exact zero; a tiny but nonzero momentum is
    /// still a moving particle.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Returns a unit vector in the same direction, or zero if magnitude is zero
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < constants::EPSILON {
            Self::ZERO
        } else {
            *self / mag
        }
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Linear interpolation between two vectors
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        *self + (*other - *self) * t
    }

    /// Any unit vector perpendicular to `self`.
    pub fn any_orthogonal(&self) -> Self {
        let dir = self.normalized();
        // Cross with the basis axis least aligned with dir.
        let axis = if dir.x.abs() <= dir.y.abs() && dir.x.abs() <= dir.z.abs() {
            Vec3::new(1.0, 0.0, 0.0)
        } else if dir.y.abs() <= dir.z.abs() {
            Vec3::new(0.0, 1.0, 0.0)
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        };
        dir.cross(&axis).normalized()
    }
}

// Operator overloads for Vec3
impl Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self {
            x: self.x / scalar,
            y: self.y / scalar,
            z: self.z / scalar,
        }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

// =============================================================================
// Phase-space state
// =============================================================================

/// The 6D state of a particle: position (m) and momentum (MeV/c).
///
/// The same type doubles as a rate (dx/dt, dp/dt) and as an additive delta,
/// which is what the Runge-Kutta stages and the scattering models exchange.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseState {
    pub pos: Vec3,
    pub mom: Vec3,
}

impl PhaseState {
    pub const ZERO: PhaseState = PhaseState {
        pos: Vec3::ZERO,
        mom: Vec3::ZERO,
    };

    pub fn new(pos: Vec3, mom: Vec3) -> Self {
        Self { pos, mom }
    }

    /// Build from a flat `[x, y, z, px, py, pz]` array.
    pub fn from_array(v: [f64; 6]) -> Self {
        Self {
            pos: Vec3::new(v[0], v[1], v[2]),
            mom: Vec3::new(v[3], v[4], v[5]),
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.pos.x, self.pos.y, self.pos.z, self.mom.x, self.mom.y, self.mom.z,
        ]
    }

    /// Total energy for a particle of the given mass.
    pub fn energy(&self, mass: f64) -> f64 {
        (self.mom.magnitude_squared() + mass * mass).sqrt()
    }

    /// True once the momentum has been driven to exactly zero.
    pub fn is_stopped(&self) -> bool {
        self.mom.is_zero()
    }
}

impl Add for PhaseState {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            pos: self.pos + other.pos,
            mom: self.mom + other.mom,
        }
    }
}

impl AddAssign for PhaseState {
    fn add_assign(&mut self, other: Self) {
        self.pos += other.pos;
        self.mom += other.mom;
    }
}

impl Mul<f64> for PhaseState {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            pos: self.pos * scalar,
            mom: self.mom * scalar,
        }
    }
}

// =============================================================================
// Physical Constants
// =============================================================================

/// Physical constants and unit conversions used in the simulation.
pub mod constants {
    /// Speed of light in m/ns: converts p/E into dx/dt.
    pub const C_M_PER_NS: f64 = 2.9979e-1;

    /// Speed of light in cm/ns: converts β·dt into a path length in cm.
    pub const C_CM_PER_NS: f64 = 2.9979e1;

    /// dp/dt = LORENTZ_FACTOR · Q · (v/c × B) for p in MeV/c, B in T, t in ns.
    pub const LORENTZ_FACTOR: f64 = 89.8755;

    /// Electron mass (MeV)
    pub const ELECTRON_MASS: f64 = 0.511;

    /// Bethe-Bloch coefficient K = 4πN_A r_e² m_e c² (MeV cm²/mol)
    pub const BETHE_K: f64 = 0.307075;

    /// Adaptive step: dt = ADAPTIVE_STEP_COEFF / β below the rest mass.
    pub const ADAPTIVE_STEP_COEFF: f64 = 0.1 / 3.0;

    /// Highland formula scale (MeV)
    pub const HIGHLAND_SCALE: f64 = 13.6;

    /// Muon mass (MeV)
    pub const MUON_MASS: f64 = 105.658;

    /// Small value for floating-point comparisons
    pub const EPSILON: f64 = 1e-10;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a - b, Vec3::new(-3.0, -3.0, -3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.dot(&b), 32.0); // 1*4 + 2*5 + 3*6 = 32
    }

    #[test]
    fn test_vec3_cross_product() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        let z = x.cross(&y);
        assert!((z.x).abs() < 1e-10);
        assert!((z.y).abs() < 1e-10);
        assert!((z.z - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_transverse_ignores_z() {
        let v = Vec3::new(3.0, 4.0, 100.0);
        assert!((v.transverse() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_is_zero_is_exact() {
        assert!(Vec3::ZERO.is_zero());
        assert!(Vec3::new(-0.0, 0.0, 0.0).is_zero());
        assert!(!Vec3::new(1e-300, 0.0, 0.0).is_zero());
    }

    #[test]
    fn test_any_orthogonal() {
        for v in [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.3, -2.0, 0.7),
        ] {
            let u = v.any_orthogonal();
            assert!((u.magnitude() - 1.0).abs() < 1e-10);
            assert!(u.dot(&v).abs() < 1e-10);
        }
    }

    #[test]
    fn test_phase_state_arithmetic() {
        let s = PhaseState::from_array([1.0, 2.0, 3.0, 10.0, 20.0, 30.0]);
        let d = s * 0.5 + s;
        assert_eq!(d.to_array(), [1.5, 3.0, 4.5, 15.0, 30.0, 45.0]);
    }

    #[test]
    fn test_energy() {
        let s = PhaseState::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        assert!((s.energy(4.0) - 5.0).abs() < 1e-12);
        assert!(!s.is_stopped());
        assert!(PhaseState::ZERO.is_stopped());
    }
}
