//! # msim core
//!
//! Propagation of a single charged particle through a magnetic field and
//! matter, and its intersection with detector surfaces.
//!
//! ## Architecture
//!
//! - `types`: Core data structures (Vec3, 6D phase-space state, constants)
//! - `config`: Immutable run configuration, loadable from YAML
//! - `field`: Magnetic field presets and cylindrical field-map lookup
//! - `materials`: Material tables (YAML-loadable) and position lookup
//! - `energy_loss`: Bethe-Bloch mean ionization loss
//! - `scattering`: Multiple Coulomb scattering models
//! - `integrator`: Runge-Kutta 4 trajectory propagation
//! - `detector`: Detector geometry and first-crossing search
//!
//! ## Example
//!
//! ```
//! use msim_core::config::{FieldMode, SimConfig};
//! use msim_core::detector::{find_intersection, PlaneDetector};
//! use msim_core::field::FieldSampler;
//! use msim_core::integrator::Propagator;
//! use msim_core::types::{PhaseState, Vec3};
//!
//! let config = SimConfig {
//!     field: FieldMode::None,
//!     energy_loss: false,
//!     ..SimConfig::default()
//! };
//! let field = FieldSampler::analytic(config.field).unwrap();
//! let propagator = Propagator::new(&config, &field);
//!
//! let start = PhaseState::new(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));
//! let trajectory = propagator.propagate_seeded(start, 0);
//!
//! let hit = find_intersection(&PlaneDetector::along_x(10.0, 1.0), &trajectory);
//! assert!(hit.is_some());
//! ```

pub mod config;
pub mod detector;
pub mod energy_loss;
pub mod field;
pub mod integrator;
pub mod materials;
pub mod scattering;
pub mod types;
