//! Simulation configuration.
//!
//! A [`SimConfig`] is built once (in code or from YAML) and then shared by
//! reference with every component. Nothing reads configuration from global
//! state.
//!
//! ```yaml
//! mass: 105.658
//! charge: 1.0
//! field: grid
//! grid_resolution: fine
//! scattering: pdg
//! materials: cms
//! cutoff: 33.0
//! cutoff_axis: r
//! dt: 0.1
//! nsteps: 5000
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::constants;

/// Error type for configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {kind} '{value}', expected one of: {expected}")]
    InvalidMode {
        kind: &'static str,
        value: String,
        expected: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("field mode 'grid' requires a loaded {0} field grid")]
    MissingFieldGrid(GridResolution),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Declares a string-selected mode enum.
///
/// Parsing is case-insensitive and rejects unknown names with
/// [`ConfigError::InvalidMode`], which lists the accepted values. The same
/// parser backs serde, so YAML files fail the same way.
macro_rules! mode_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                $(
                    if lower == $text {
                        return Ok($name::$variant);
                    }
                )+
                Err(ConfigError::InvalidMode {
                    kind: $kind,
                    value: s.to_string(),
                    expected: [$($text),+].join(", "),
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = ConfigError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(mode: $name) -> String {
                mode.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mode_enum! {
    /// Source of the magnetic field.
    FieldMode, "field mode" {
        None => "none",
        /// 1 T along +Z everywhere
        Uniform => "uniform",
        /// 3 T inside r < 4 m, reversed 1/r return field outside
        UpDown => "updown",
        /// Lookup into a loaded [`FieldGrid`](crate::field::FieldGrid)
        Grid => "grid",
    }
}

mode_enum! {
    /// Which of the two field grids to sample.
    GridResolution, "grid resolution" {
        Coarse => "coarse",
        Fine => "fine",
    }
}

mode_enum! {
    /// Multiple-scattering model applied per step.
    ScatteringMode, "scattering mode" {
        None => "none",
        Pdg => "pdg",
        Kuhn => "kuhn",
    }
}

mode_enum! {
    /// Material layout used by the energy-loss and scattering models.
    MaterialSetup, "material setup" {
        Air => "air",
        Iron => "iron",
        /// Silicon for x < 4 m, iron beyond
        SiFe => "sife",
        /// Layered solenoid detector surrounded by rock
        Cms => "cms",
    }
}

mode_enum! {
    /// Quantity compared against the cutoff value.
    CutoffAxis, "cutoff axis" {
        X => "x",
        Y => "y",
        Z => "z",
        /// Distance from the origin
        R => "r",
        /// Distance from the Z axis
        Rxy => "rxy",
    }
}

impl CutoffAxis {
    /// The value of this coordinate at `pos`.
    pub fn measure(&self, pos: &crate::types::Vec3) -> f64 {
        match self {
            CutoffAxis::X => pos.x,
            CutoffAxis::Y => pos.y,
            CutoffAxis::Z => pos.z,
            CutoffAxis::R => pos.magnitude(),
            CutoffAxis::Rxy => pos.transverse(),
        }
    }
}

/// Immutable configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Particle rest mass (MeV)
    pub mass: f64,
    /// Particle charge in units of e
    pub charge: f64,

    pub field: FieldMode,
    pub grid_resolution: GridResolution,
    /// Interpolate the field along the radial axis
    pub interpolate: bool,
    /// Multiplier from meters to the field grid's length unit
    pub grid_length_scale: f64,

    pub energy_loss: bool,
    pub scattering: ScatteringMode,
    pub materials: MaterialSetup,
    /// Full length of the solenoid along Z (m)
    pub solenoid_length: f64,
    /// Distance from the origin beyond which everything is rock (m)
    pub rock_begins: f64,

    /// Shrink the step as 1/β once p < m
    pub adaptive_step: bool,
    pub cutoff: Option<f64>,
    pub cutoff_axis: Option<CutoffAxis>,
    /// Step size (ns)
    pub dt: f64,
    /// Maximum number of steps
    pub nsteps: usize,

    pub suppress_stopped_warning: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mass: constants::MUON_MASS,
            charge: 1.0,
            field: FieldMode::None,
            grid_resolution: GridResolution::Coarse,
            interpolate: true,
            grid_length_scale: 100.0,
            energy_loss: true,
            scattering: ScatteringMode::None,
            materials: MaterialSetup::Cms,
            solenoid_length: 21.6,
            rock_begins: 17.0,
            adaptive_step: false,
            cutoff: None,
            cutoff_axis: None,
            dt: 0.1,
            nsteps: 1000,
            suppress_stopped_warning: false,
        }
    }
}

impl SimConfig {
    /// A configuration with no field, no energy loss and no scattering.
    pub fn vacuum() -> Self {
        Self {
            field: FieldMode::None,
            energy_loss: false,
            scattering: ScatteringMode::None,
            ..Self::default()
        }
    }

    /// Parse from a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject values the integrator cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(ConfigError::InvalidParameter(format!(
                "mass must be positive, got {}",
                self.mass
            )));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(ConfigError::InvalidParameter(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if !(self.grid_length_scale > 0.0) {
            return Err(ConfigError::InvalidParameter(format!(
                "grid_length_scale must be positive, got {}",
                self.grid_length_scale
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
