//! Mean ionization energy loss (Bethe-Bloch with density effect).
//!
//! ```text
//! -dE/dx = K ρ Q² (Z/A) / β² · [ ½ ln(2 mₑ β² γ² Wmax / I²) − β² − δ/2 ]
//!
//! Wmax = 2 mₑ β² γ² / (1 + 2γ mₑ/m + (mₑ/m)²)
//! ```
//!
//! The loss over one step is (dE/dx) · β c · dt. A step that would take more
//! than the kinetic energy stops the particle: the momentum becomes exactly
//! zero and the caller sees [`EnergyLossOutcome::Stopped`].

use crate::config::SimConfig;
use crate::materials::{
    DensityEffect, MaterialError, MaterialLayout, MaterialMap, MaterialProperties, MaterialTable,
};
use crate::types::{constants, PhaseState, Vec3};

/// What happened to the particle during one energy-loss update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyLossOutcome {
    /// Momentum was scaled down (possibly by nothing) and is still nonzero.
    Slowed,
    /// All kinetic energy was lost; momentum is exactly zero.
    Stopped,
}

/// Bethe-Bloch energy loss for one particle species.
#[derive(Debug, Clone, Copy)]
pub struct EnergyLoss<'a> {
    mass: f64,
    charge: f64,
    table: &'a MaterialTable,
    layout: MaterialLayout,
}

impl<'a> EnergyLoss<'a> {
    /// Fails if the table lacks an entry for a material the layout can
    /// return.
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

    pub fn from_config(
        config: &SimConfig,
        table: &'a MaterialTable,
    ) -> Result<Self, MaterialError> {
        Self::new(
            config.mass,
            config.charge,
            table,
            MaterialLayout::from_config(config),
        )
    }

    fn lookup(&self, pos: &Vec3) -> Option<(&MaterialProperties, &DensityEffect)> {
        let mat = self.layout.material_at(pos);
        Some((
            self.table.properties.get(&mat)?,
            self.table.density_effect.get(&mat)?,
        ))
    }

    /// Mean stopping power (MeV/cm) at the state's position, or `None` for a
    /// stopped particle.
    pub fn stopping_power(&self, state: &PhaseState) -> Option<f64> {
        let p = state.mom.magnitude();
        if p == 0.0 {
            return None;
        }
        let (props, density_effect) = self.lookup(&state.pos)?;

        let m = self.mass;
        let me = constants::ELECTRON_MASS;
        let e = state.energy(m);
        let gamma = e / m;
        let beta = p / e;
        let bg2 = beta * beta * gamma * gamma;

        let w_max = 2.0 * me * bg2 / (1.0 + 2.0 * gamma * me / m + (me / m).powi(2));
        let i = density_effect.mean_excitation_ev / 1e6;
        let delta = density_effect.delta((p / m).log10());

        let prefactor = constants::BETHE_K * props.density * self.charge * self.charge * props.z
            / props.a
            / (beta * beta);
        let bracket = 0.5 * (2.0 * me * bg2 * w_max / (i * i)).ln() - beta * beta - delta / 2.0;

        Some(prefactor * bracket)
    }

    /// Apply the mean loss over `dt` nanoseconds to `state` in place.
    ///
    /// Position is never touched. Momentum only shrinks.
    pub fn apply(&self, state: &mut PhaseState, dt: f64) -> EnergyLossOutcome {
        let Some(dedx) = self.stopping_power(state) else {
            // Already stopped, or a material the table does not cover (ruled
            // out in `new`).
            return if state.is_stopped() {
                EnergyLossOutcome::Stopped
            } else {
                EnergyLossOutcome::Slowed
            };
        };

        let m = self.mass;
        let p = state.mom.magnitude();
        let e = state.energy(m);
        let beta = p / e;

        let de = (dedx * beta * constants::C_CM_PER_NS * dt).max(0.0);

        if de > e - m {
            state.mom = Vec3::ZERO;
            return EnergyLossOutcome::Stopped;
        }

        let new_e = e - de;
        let new_p = (new_e * new_e - m * m).max(0.0).sqrt();
        if new_p == 0.0 {
            state.mom = Vec3::ZERO;
            return EnergyLossOutcome::Stopped;
        }

        state.mom = state.mom * (new_p / p);
        EnergyLossOutcome::Slowed
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaterialSetup;

    fn muon_in(setup: MaterialSetup, table: &MaterialTable) -> EnergyLoss<'_> {
        EnergyLoss::new(constants::MUON_MASS, 1.0, table, MaterialLayout::new(setup)).unwrap()
    }

    #[test]
    fn test_stopping_power_in_iron_is_near_minimum_ionizing() {
        let table = MaterialTable::standard();
        let loss = muon_in(MaterialSetup::Iron, &table);
        let state = PhaseState::new(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));

        // ~1.5 MeV cm²/g times 7.874 g/cm³
        let dedx = loss.stopping_power(&state).unwrap();
        assert!(dedx > 10.0 && dedx < 16.0, "dE/dx = {}", dedx);
    }

    #[test]
    fn test_iron_loses_more_than_air() {
        let table = MaterialTable::standard();
        let state = PhaseState::new(Vec3::ZERO, Vec3::new(0.0, 3000.0, 0.0));
        let iron = muon_in(MaterialSetup::Iron, &table).stopping_power(&state).unwrap();
        let air = muon_in(MaterialSetup::Air, &table).stopping_power(&state).unwrap();
        assert!(iron > 1000.0 * air, "iron {} air {}", iron, air);
    }

    #[test]
    fn test_loss_preserves_direction_and_reduces_magnitude() {
        let table = MaterialTable::standard();
        let loss = muon_in(MaterialSetup::Iron, &table);
        let mom = Vec3::new(300.0, -400.0, 1200.0);
        let mut state = PhaseState::new(Vec3::new(1.0, 2.0, 3.0), mom);

        let outcome = loss.apply(&mut state, 0.1);

        assert_eq!(outcome, EnergyLossOutcome::Slowed);
        assert_eq!(state.pos, Vec3::new(1.0, 2.0, 3.0));
        assert!(state.mom.magnitude() < mom.magnitude());
        let cos = state.mom.normalized().dot(&mom.normalized());
        assert!((cos - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_never_increases_momentum() {
        let table = MaterialTable::standard();
        for setup in [MaterialSetup::Air, MaterialSetup::Iron, MaterialSetup::SiFe] {
            let loss = muon_in(setup, &table);
            for p in [0.5, 5.0, 50.0, 500.0, 5e4, 5e6] {
                let mut state = PhaseState::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, p));
                loss.apply(&mut state, 0.1);
                let after = state.mom.magnitude();
                assert!(after.is_finite() && after <= p, "p {} -> {}", p, after);
            }
        }
    }

    #[test]
    fn test_overshoot_stops_with_exact_zero() {
        let table = MaterialTable::standard();
        let loss = muon_in(MaterialSetup::Iron, &table);
        let mut state = PhaseState::new(Vec3::new(4.0, 5.0, 6.0), Vec3::new(10.0, 0.0, 0.0));

        let outcome = loss.apply(&mut state, 1.0);

        assert_eq!(outcome, EnergyLossOutcome::Stopped);
        assert_eq!(state.mom, Vec3::ZERO);
        assert!(state.is_stopped());
        assert_eq!(state.pos, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_zero_momentum_is_stopped_without_nan() {
        let table = MaterialTable::standard();
        let loss = muon_in(MaterialSetup::Iron, &table);
        let mut state = PhaseState::new(Vec3::ZERO, Vec3::ZERO);

        assert_eq!(loss.apply(&mut state, 0.1), EnergyLossOutcome::Stopped);
        assert_eq!(state.mom, Vec3::ZERO);
        assert!(loss.stopping_power(&state).is_none());
    }

    #[test]
    fn test_uncovered_layout_rejected() {
        let mut table = MaterialTable::standard();
        table.density_effect.remove(&crate::materials::Material::Si);
        let result = EnergyLoss::new(
            constants::MUON_MASS,
            1.0,
            &table,
            MaterialLayout::new(MaterialSetup::SiFe),
        );
        assert!(matches!(result, Err(MaterialError::NotFound(_))));
    }
}
