//! Trajectory integration.
//!
//! A [`Propagator`] advances a 6D state with classical 4th-order
//! Runge-Kutta, optionally perturbed by scattering and slowed by energy
//! loss after each step.
//!
//! ## Equations of motion
//!
//! With p in MeV/c, B in T, positions in m and time in ns:
//!
//! ```text
//! dx/dt = 0.29979 · p/E
//! dp/dt = 89.8755 · Q · (p/E × B)
//! ```
//!
//! ## One step
//!
//! ```text
//! 1. dt  = step size (1/β scaled below the rest mass if adaptive)
//! 2. k1..k4 from the derivative, Δ = dt/6 (k1 + 2k2 + 2k3 + k4)
//! 3. Δ  += scattering(pre-step state, dt)
//! 4. t  += dt, x += Δ
//! 5. energy loss on the new state
//! 6. stop if p == 0, else stop if the cutoff is reached
//! ```

use std::fmt;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{CutoffAxis, SimConfig};
use crate::energy_loss::{EnergyLoss, EnergyLossOutcome};
use crate::field::MagneticField;
use crate::materials::{MaterialError, MaterialTable};
use crate::scattering::{self, NoScattering, ScatteringModel};
use crate::types::{constants, PhaseState, Vec3};

/// Mass (MeV) and charge (e) of the propagated particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub mass: f64,
    pub charge: f64,
}

impl Particle {
    pub fn muon() -> Self {
        Self {
            mass: constants::MUON_MASS,
            charge: 1.0,
        }
    }

    /// β for a momentum magnitude p.
    pub fn beta(&self, p: f64) -> f64 {
        let p_over_m = p / self.mass;
        p_over_m / (1.0 + p_over_m * p_over_m).sqrt()
    }
}

/// Time derivative of the state in a magnetic field.
pub fn derivative<F: MagneticField + ?Sized>(
    state: &PhaseState,
    particle: &Particle,
    field: &F,
) -> PhaseState {
    let velocity = state.mom / state.energy(particle.mass);
    let b = field.field_at(&state.pos);
    PhaseState {
        pos: velocity * constants::C_M_PER_NS,
        mom: velocity.cross(&b) * (constants::LORENTZ_FACTOR * particle.charge),
    }
}

/// Classical 4th-order Runge-Kutta.
pub struct RungeKutta4;

impl RungeKutta4 {
    /// The state change over one step of `dt` nanoseconds.
    pub fn delta<F: MagneticField + ?Sized>(
        state: &PhaseState,
        particle: &Particle,
        field: &F,
        dt: f64,
    ) -> PhaseState {
        let k1 = derivative(state, particle, field);
        let k2 = derivative(&(*state + k1 * (dt / 2.0)), particle, field);
        let k3 = derivative(&(*state + k2 * (dt / 2.0)), particle, field);
        let k4 = derivative(&(*state + k3 * dt), particle, field);
        (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
    }
}

// =============================================================================
// Trajectory
// =============================================================================

/// Why integration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Every step was taken.
    Completed,
    /// Momentum reached exactly zero.
    Stopped,
    /// The cutoff coordinate was reached.
    CutoffReached,
}

/// Non-fatal conditions reported alongside a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackWarning {
    /// A cutoff value was configured without an axis; no cutoff was applied.
    CutoffAxisMissing { cutoff: f64 },
    /// All steps were taken without reaching the cutoff.
    CutoffNotReached { axis: CutoffAxis, cutoff: f64 },
    /// The particle lost all its energy.
    ParticleStopped {
        /// |p| at t = 0 (MeV/c)
        initial_momentum: f64,
        /// Distance from the origin where it stopped (m)
        radius: f64,
    },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Termination::Completed => "completed",
            Termination::Stopped => "stopped",
            Termination::CutoffReached => "cutoff_reached",
        })
    }
}

impl fmt::Display for TrackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackWarning::CutoffAxisMissing { cutoff } => {
                write!(f, "Cutoff {} given without a cutoff axis, not using cutoff", cutoff)
            }
            TrackWarning::CutoffNotReached { axis, cutoff } => {
                write!(f, "Cutoff {} = {} not reached", axis, cutoff)
            }
            TrackWarning::ParticleStopped {
                initial_momentum,
                radius,
            } => write!(
                f,
                "Stopped particle (initial p = {:.2} GeV, at r = {:.2} m)",
                initial_momentum / 1000.0,
                radius
            ),
        }
    }
}

/// States at each accepted step and the times they were reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub states: Vec<PhaseState>,
    pub times: Vec<f64>,
    pub termination: Termination,
    pub warnings: Vec<TrackWarning>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn last(&self) -> Option<&PhaseState> {
        self.states.last()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.states.iter().map(|s| s.pos)
    }
}

// =============================================================================
// Propagator
// =============================================================================

/// Integrates single-particle trajectories.
///
/// Holds only shared references to the field and material data, so one
/// propagator per thread can run over the same maps.
pub struct Propagator<'a> {
    config: &'a SimConfig,
    particle: Particle,
    field: &'a dyn MagneticField,
    energy_loss: Option<EnergyLoss<'a>>,
    scattering: Box<dyn ScatteringModel + 'a>,
}

impl<'a> Propagator<'a> {
    /// Field-only propagation: no energy loss, no scattering.
    pub fn new(config: &'a SimConfig, field: &'a dyn MagneticField) -> Self {
        Self {
            config,
            particle: Particle {
                mass: config.mass,
                charge: config.charge,
            },
            field,
            energy_loss: None,
            scattering: Box::new(NoScattering),
        }
    }

    /// Energy loss and scattering as the configuration selects them.
    pub fn from_config(
        config: &'a SimConfig,
        field: &'a dyn MagneticField,
        table: &'a MaterialTable,
    ) -> Result<Self, MaterialError> {
        let mut propagator =
            Self::new(config, field).with_scattering(scattering::from_config(config, table)?);
        if config.energy_loss {
            propagator = propagator.with_energy_loss(EnergyLoss::from_config(config, table)?);
        }
        Ok(propagator)
    }

    pub fn with_energy_loss(mut self, energy_loss: EnergyLoss<'a>) -> Self {
        self.energy_loss = Some(energy_loss);
        self
    }

    pub fn with_scattering(mut self, scattering: Box<dyn ScatteringModel + 'a>) -> Self {
        self.scattering = scattering;
        self
    }

    /// Step size for step `index` taken from `state`.
    fn step_size(&self, state: &PhaseState, index: usize) -> f64 {
        if !self.config.adaptive_step || index == 0 {
            return self.config.dt;
        }
        let p = state.mom.magnitude();
        if p > 0.0 && p < self.particle.mass {
            constants::ADAPTIVE_STEP_COEFF / self.particle.beta(p)
        } else {
            self.config.dt
        }
    }

    fn cutoff(&self, warnings: &mut Vec<TrackWarning>) -> Option<(CutoffAxis, f64)> {
        match (self.config.cutoff, self.config.cutoff_axis) {
            (Some(value), Some(axis)) => Some((axis, value)),
            (Some(value), None) => {
                let warning = TrackWarning::CutoffAxisMissing { cutoff: value };
                log::warn!("{}", warning);
                warnings.push(warning);
                None
            }
            (None, _) => None,
        }
    }

    /// Integrate from `initial` for at most `config.nsteps` steps.
    pub fn propagate<R: RngCore>(&self, initial: PhaseState, rng: &mut R) -> Trajectory {
        let mut warnings = Vec::new();
        let cutoff = self.cutoff(&mut warnings);

        let nsteps = self.config.nsteps;
        let mut states = Vec::with_capacity(nsteps + 1);
        let mut times = Vec::with_capacity(nsteps + 1);
        states.push(initial);
        times.push(0.0);

        let mut state = initial;
        let mut t = 0.0;

        for i in 0..nsteps {
            let dt = self.step_size(&state, i);

            let mut delta = RungeKutta4::delta(&state, &self.particle, self.field, dt);
            delta += self.scattering.perturb(&state, dt, rng);

            t += dt;
            state += delta;

            let mut stopped = state.is_stopped();
            if let Some(energy_loss) = &self.energy_loss {
                stopped |= energy_loss.apply(&mut state, dt) == EnergyLossOutcome::Stopped;
            }

            states.push(state);
            times.push(t);

            if stopped {
                if !self.config.suppress_stopped_warning {
                    let warning = TrackWarning::ParticleStopped {
                        initial_momentum: initial.mom.magnitude(),
                        radius: state.pos.magnitude(),
                    };
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
                return Trajectory {
                    states,
                    times,
                    termination: Termination::Stopped,
                    warnings,
                };
            }

            if let Some((axis, value)) = cutoff {
                if axis.measure(&state.pos) >= value {
                    log::debug!("Cutoff {} = {} reached after {} steps", axis, value, i + 1);
                    return Trajectory {
                        states,
                        times,
                        termination: Termination::CutoffReached,
                        warnings,
                    };
                }
            }
        }

        if let Some((axis, value)) = cutoff {
            let warning = TrackWarning::CutoffNotReached {
                axis,
                cutoff: value,
            };
            log::warn!("{} after {} steps", warning, nsteps);
            warnings.push(warning);
        }

        Trajectory {
            states,
            times,
            termination: Termination::Completed,
            warnings,
        }
    }

    /// [`propagate`](Self::propagate) with a fresh RNG seeded from `seed`.
    pub fn propagate_seeded(&self, initial: PhaseState, seed: u64) -> Trajectory {
        let mut rng = StdRng::seed_from_u64(seed);
        self.propagate(initial, &mut rng)
    }
}

// =============================================================================
// Tests
// =============================================================================
