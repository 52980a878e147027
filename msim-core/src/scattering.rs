//! Multiple Coulomb scattering.
//!
//! A [`ScatteringModel`] returns an additive 6D delta for one step. The
//! integrator computes it from the pre-step state and adds it to the
//! Runge-Kutta delta.
//!
//! Both physical models use the Highland width for the plane-projected
//! angle over a path length x:
//!
//! ```text
//! θ0 = 13.6 MeV / (β c p) · |Q| · √(x/X0) · [1 + 0.038 ln(x Q² / (X0 β²))]
//! ```
//!
//! - `pdg`: correlated lateral offset and angle per plane (PDG review,
//!   "Passage of particles through matter").
//! - `kuhn`: angle only, with a small admixture of wide single scatters.

use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use crate::config::{ScatteringMode, SimConfig};
use crate::materials::{MaterialError, MaterialLayout, MaterialMap, MaterialTable};
use crate::types::{constants, PhaseState, Vec3};

/// Probability that a `kuhn` plane angle comes from the wide component.
const KUHN_TAIL_FRACTION: f64 = 0.02;
/// Width of the wide component in units of θ0.
const KUHN_TAIL_WIDTH: f64 = 3.0;

/// Produces a per-step perturbation of the 6D state.
pub trait ScatteringModel {
    fn perturb(&self, state: &PhaseState, dt: f64, rng: &mut dyn RngCore) -> PhaseState;
}

/// No scattering: always the zero delta.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScattering;

impl ScatteringModel for NoScattering {
    fn perturb(&self, _state: &PhaseState, _dt: f64, _rng: &mut dyn RngCore) -> PhaseState {
        PhaseState::ZERO
    }
}

/// Material-dependent Highland width shared by the physical models.
#[derive(Debug, Clone, Copy)]
pub struct Highland<'a> {
    mass: f64,
    charge: f64,
    table: &'a MaterialTable,
    layout: MaterialLayout,
}

impl<'a> Highland<'a> {
    pub fn new(
        mass: f64,
        charge: f64,
        table: &'a MaterialTable,
        layout: MaterialLayout,
    ) -> Result<Self, MaterialError> {
        table.covers(&layout)?;
        Ok(Self {
            mass,
            charge,
            table,
            layout,
        })
    }

    /// Path length (cm) and θ0 (rad) for one step, or `None` when there is
    /// nothing to scatter.
    pub fn width(&self, state: &PhaseState, dt: f64) -> Option<(f64, f64)> {
        let p = state.mom.magnitude();
        if p == 0.0 || dt <= 0.0 {
            return None;
        }
        let mat = self.layout.material_at(&state.pos);
        let x0 = self.table.properties.get(&mat)?.radiation_length;

        let beta = p / state.energy(self.mass);
        let path = beta * constants::C_CM_PER_NS * dt;
        let t = path / x0;
        let q = self.charge.abs();

        let theta0 = constants::HIGHLAND_SCALE / (beta * p)
            * q
            * t.sqrt()
            * (1.0 + 0.038 * (t * q * q / (beta * beta)).ln());
        Some((path, theta0.max(0.0)))
    }
}

/// Two unit vectors spanning the plane transverse to `dir`.
fn transverse_basis(dir: &Vec3) -> (Vec3, Vec3) {
    let u = dir.any_orthogonal();
    let v = dir.normalized().cross(&u);
    (u, v)
}

/// Tilt `mom` by small plane angles along `u` and `v`, keeping |p|.
fn deflect(mom: &Vec3, u: &Vec3, v: &Vec3, theta_u: f64, theta_v: f64) -> Vec3 {
    let p = mom.magnitude();
    let dir = (mom.normalized() + *u * theta_u + *v * theta_v).normalized();
    dir * p - *mom
}

/// Gaussian offset and angle per plane (PDG).
#[derive(Debug, Clone, Copy)]
pub struct PdgScattering<'a> {
    highland: Highland<'a>,
}

impl<'a> PdgScattering<'a> {
    pub fn new(highland: Highland<'a>) -> Self {
        Self { highland }
    }
}

impl ScatteringModel for PdgScattering<'_> {
    fn perturb(&self, state: &PhaseState, dt: f64, rng: &mut dyn RngCore) -> PhaseState {
        let Some((path, theta0)) = self.highland.width(state, dt) else {
            return PhaseState::ZERO;
        };
        let (u, v) = transverse_basis(&state.mom);

        let mut offsets = [0.0; 2];
        let mut angles = [0.0; 2];
        for plane in 0..2 {
            let z1: f64 = rng.sample(StandardNormal);
            let z2: f64 = rng.sample(StandardNormal);
            offsets[plane] = path * (z1 * theta0 / 12f64.sqrt() + z2 * theta0 / 2.0);
            angles[plane] = z2 * theta0;
        }

        // offsets are in cm
        let pos = (u * offsets[0] + v * offsets[1]) / 100.0;
        let mom = deflect(&state.mom, &u, &v, angles[0], angles[1]);
        PhaseState::new(pos, mom)
    }
}

/// Angle-only Gaussian core with a wide single-scatter component.
#[derive(Debug, Clone, Copy)]
pub struct KuhnScattering<'a> {
    highland: Highland<'a>,
}

impl<'a> KuhnScattering<'a> {
    pub fn new(highland: Highland<'a>) -> Self {
        Self { highland }
    }

    fn plane_angle(theta0: f64, rng: &mut dyn RngCore) -> f64 {
        let width = if rng.gen::<f64>() < KUHN_TAIL_FRACTION {
            KUHN_TAIL_WIDTH * theta0
        } else {
            theta0
        };
        let z: f64 = rng.sample(StandardNormal);
        z * width
    }
}

impl ScatteringModel for KuhnScattering<'_> {
    fn perturb(&self, state: &PhaseState, dt: f64, rng: &mut dyn RngCore) -> PhaseState {
        let Some((_, theta0)) = self.highland.width(state, dt) else {
            return PhaseState::ZERO;
        };
        let (u, v) = transverse_basis(&state.mom);
        let theta_u = Self::plane_angle(theta0, rng);
        let theta_v = Self::plane_angle(theta0, rng);
        PhaseState::new(Vec3::ZERO, deflect(&state.mom, &u, &v, theta_u, theta_v))
    }
}

/// Build the model a configuration selects.
pub fn from_config<'a>(
    config: &SimConfig,
    table: &'a MaterialTable,
) -> Result<Box<dyn ScatteringModel + 'a>, MaterialError> {
    let highland = || {
        Highland::new(
            config.mass,
            config.charge,
            table,
            MaterialLayout::from_config(config),
        )
    };
    Ok(match config.scattering {
        ScatteringMode::None => Box::new(NoScattering),
        ScatteringMode::Pdg => Box::new(PdgScattering::new(highland()?)),
        ScatteringMode::Kuhn => Box::new(KuhnScattering::new(highland()?)),
    })
}

// =============================================================================
// Tests
// =============================================================================
