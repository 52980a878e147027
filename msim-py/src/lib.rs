//! Python bindings for the msim-core particle propagator.
//!
//! ```python
//! from msim_physics import Simulation
//!
//! sim = Simulation("field: uniform\nmaterials: iron\nnsteps: 2000\n")
//! states, times, termination, warnings = sim.propagate([0, 0, 0, 1000, 0, 0], seed=7)
//! hit = sim.plane_intersection(states, times, distance=3.0)
//! if hit is not None:
//!     print(hit.point, hit.time)
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use msim_core::config::SimConfig;
use msim_core::detector::{
    find_intersection_in, CylinderDetector, Intersection as CoreIntersection, PlaneDetector,
};
use msim_core::config::GridResolution;
use msim_core::field::{FieldGrid, FieldMaps, FieldSampler, GridAxis, GridBounds, MagneticField};
use msim_core::integrator::Propagator;
use msim_core::materials::{MaterialLayout, MaterialMap, MaterialTable};
use msim_core::types::{PhaseState, Vec3 as CoreVec3};

fn value_error<E: std::fmt::Display>(err: E) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// 3D vector for positions, momenta and fields.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec3 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
    #[pyo3(get, set)]
    pub z: f64,
}

#[pymethods]
impl Vec3 {
    #[new]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn __repr__(&self) -> String {
        format!("Vec3({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }

    fn magnitude(&self) -> f64 {
        CoreVec3::from(*self).magnitude()
    }

    fn to_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

impl From<CoreVec3> for Vec3 {
    fn from(v: CoreVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for CoreVec3 {
    fn from(v: Vec3) -> Self {
        CoreVec3::new(v.x, v.y, v.z)
    }
}

/// A detector hit.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Intersection {
    #[pyo3(get)]
    pub point: Vec3,
    /// ns
    #[pyo3(get)]
    pub time: f64,
    /// MeV/c
    #[pyo3(get)]
    pub momentum: Vec3,
    /// (theta, theta_w, theta_v) in radians; planar detectors only
    #[pyo3(get)]
    pub angles: Option<(f64, f64, f64)>,
}

#[pymethods]
impl Intersection {
    fn __repr__(&self) -> String {
        format!(
            "Intersection(point=({:.4}, {:.4}, {:.4}), time={:.4})",
            self.point.x, self.point.y, self.point.z, self.time
        )
    }
}

impl From<CoreIntersection> for Intersection {
    fn from(hit: CoreIntersection) -> Self {
        Self {
            point: hit.point.into(),
            time: hit.time,
            momentum: hit.momentum.into(),
            angles: hit.angles.map(|a| (a.theta, a.theta_w, a.theta_v)),
        }
    }
}

/// (min, max, step) per axis, in the map's length unit and degrees.
type AxisTuple = (f64, f64, f64);

/// `(states, times, termination, warnings)`
type PropagateResult = (Vec<[f64; 6]>, Vec<f64>, String, Vec<String>);

fn unpack(states: &[[f64; 6]]) -> Vec<PhaseState> {
    states.iter().copied().map(PhaseState::from_array).collect()
}

/// A configured propagation environment.
///
/// Holds the configuration, material table and any loaded field maps; each
/// `propagate` call builds its own propagator from them.
#[pyclass]
pub struct Simulation {
    config: SimConfig,
    maps: FieldMaps,
    table: MaterialTable,
}

#[pymethods]
impl Simulation {
    /// Create a simulation from an optional YAML configuration string.
    #[new]
    #[pyo3(signature = (config_yaml=None))]
    fn new(config_yaml: Option<&str>) -> PyResult<Self> {
        let config = match config_yaml {
            Some(text) => SimConfig::from_yaml_str(text).map_err(value_error)?,
            None => SimConfig::default(),
        };
        Ok(Self {
            config,
            maps: FieldMaps::none(),
            table: MaterialTable::standard(),
        })
    }

    /// Create a simulation from a YAML configuration file.
    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        let config = SimConfig::from_yaml_file(path).map_err(value_error)?;
        Ok(Self {
            config,
            maps: FieldMaps::none(),
            table: MaterialTable::standard(),
        })
    }

    /// Current configuration as YAML.
    fn config_yaml(&self) -> PyResult<String> {
        self.config.to_yaml_string().map_err(value_error)
    }

    /// Replace the material table with one loaded from a YAML file.
    fn load_materials(&mut self, path: &str) -> PyResult<()> {
        self.table = MaterialTable::load(path).map_err(value_error)?;
        Ok(())
    }

    /// Load a text field map for the given resolution ("coarse" or "fine").
    ///
    /// `bounds` is `((r_min, r_max, dr), (z_min, z_max, dz), (phi_min,
    /// phi_max, dphi))`. Without it the preset CMS bounds are used; the fine
    /// preset allocates about 1.25 GB.
    #[pyo3(signature = (path, resolution="coarse", bounds=None))]
    fn load_field_map(
        &mut self,
        path: &str,
        resolution: &str,
        bounds: Option<(AxisTuple, AxisTuple, AxisTuple)>,
    ) -> PyResult<()> {
        let resolution: GridResolution = resolution.parse().map_err(value_error)?;
        let bounds = match bounds {
            Some((r, z, phi)) => GridBounds {
                r: GridAxis::new(r.0, r.1, r.2),
                z: GridAxis::new(z.0, z.1, z.2),
                phi: GridAxis::new(phi.0, phi.1, phi.2),
            },
            None => GridBounds::for_resolution(resolution),
        };
        let grid = FieldGrid::from_text_file(bounds, path).map_err(value_error)?;
        match resolution {
            GridResolution::Coarse => self.maps.coarse = Some(grid),
            GridResolution::Fine => self.maps.fine = Some(grid),
        }
        Ok(())
    }

    /// Propagate from `[x, y, z, px, py, pz]` (m, MeV/c).
    ///
    /// Returns `(states, times, termination, warnings)`. `termination` is
    /// one of "completed", "stopped" or "cutoff_reached"; `warnings` holds
    /// one message per non-fatal condition met during the run.
    #[pyo3(signature = (x0, seed=0))]
    fn propagate(&self, x0: [f64; 6], seed: u64) -> PyResult<PropagateResult> {
        let field = FieldSampler::from_config(&self.config, &self.maps).map_err(value_error)?;
        let propagator =
            Propagator::from_config(&self.config, &field, &self.table).map_err(value_error)?;

        let trajectory = propagator.propagate_seeded(PhaseState::from_array(x0), seed);
        let states = trajectory.states.iter().map(PhaseState::to_array).collect();
        let warnings = trajectory.warnings.iter().map(ToString::to_string).collect();
        Ok((
            states,
            trajectory.times,
            trajectory.termination.to_string(),
            warnings,
        ))
    }

    /// First hit on a rectangular plane. Defaults to a square facing +X.
    #[pyo3(signature = (states, times, distance, normal=(1.0, 0.0, 0.0), v=(0.0, 1.0, 0.0), width=1.0, height=None))]
    #[allow(clippy::too_many_arguments)]
    fn plane_intersection(
        &self,
        states: Vec<[f64; 6]>,
        times: Vec<f64>,
        distance: f64,
        normal: (f64, f64, f64),
        v: (f64, f64, f64),
        width: f64,
        height: Option<f64>,
    ) -> Option<Intersection> {
        let detector = PlaneDetector::new(
            CoreVec3::new(normal.0, normal.1, normal.2),
            distance,
            CoreVec3::new(v.0, v.1, v.2),
            width,
            height.unwrap_or(width),
        );
        find_intersection_in(&detector, &unpack(&states), &times).map(Intersection::from)
    }

    /// First crossing of a Z-axis cylinder of the given radius (m).
    fn cylinder_intersection(
        &self,
        states: Vec<[f64; 6]>,
        times: Vec<f64>,
        radius: f64,
    ) -> Option<Intersection> {
        let detector = CylinderDetector::new(radius);
        find_intersection_in(&detector, &unpack(&states), &times).map(Intersection::from)
    }

    /// Material name at a position (m).
    fn material_at(&self, x: f64, y: f64, z: f64) -> String {
        MaterialLayout::from_config(&self.config)
            .material_at(&CoreVec3::new(x, y, z))
            .to_string()
    }

    /// Field in Tesla at a position (m).
    fn field_at(&self, x: f64, y: f64, z: f64) -> PyResult<Vec3> {
        let field = FieldSampler::from_config(&self.config, &self.maps).map_err(value_error)?;
        Ok(field.field_at(&CoreVec3::new(x, y, z)).into())
    }
}

/// Python module definition.
#[pymodule]
fn msim_physics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec3>()?;
    m.add_class::<Intersection>()?;
    m.add_class::<Simulation>()?;
    Ok(())
}
