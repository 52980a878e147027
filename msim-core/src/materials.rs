//! Materials: property tables and position lookup.
//!
//! The [`MaterialTable`] holds, for every [`Material`], the bulk properties
//! used by energy loss and scattering plus the Sternheimer density-effect
//! constants for Bethe-Bloch. The built-in values can be replaced from YAML:
//!
//! ```text
//! materials/
//! └── standard.yaml
//! ```
//!
//! A [`MaterialMap`] answers "what is at this point?". [`MaterialLayout`]
//! implements it for the configured setups.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MaterialSetup, SimConfig};
use crate::types::Vec3;

/// Error type for material loading operations.
#[derive(Error, Debug)]
pub enum MaterialError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Material not found: {0}")]
    NotFound(Material),
}

/// Material identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Air,
    Si,
    Fe,
    #[serde(rename = "pbwo4")]
    PbWO4,
    Rock,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Air => "air",
            Material::Si => "si",
            Material::Fe => "fe",
            Material::PbWO4 => "pbwo4",
            Material::Rock => "rock",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bulk properties of a material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// Atomic number (effective for compounds)
    pub z: f64,
    /// Atomic mass (g/mol)
    pub a: f64,
    /// Density (g/cm³)
    pub density: f64,
    /// Radiation length (cm)
    pub radiation_length: f64,
}

/// Sternheimer density-effect parameterization.
///
/// With x = log10(p/m):
/// - x ≥ x1: δ = 2 ln10 · x − C̄
/// - x0 ≤ x < x1: δ = 2 ln10 · x − C̄ + a (x1 − x)^k
/// - x < x0: δ = δ0 · 10^(2(x − x0))
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityEffect {
    /// Mean excitation energy (eV)
    pub mean_excitation_ev: f64,
    pub a: f64,
    pub k: f64,
    pub x0: f64,
    pub x1: f64,
    pub c_bar: f64,
    pub delta0: f64,
}

impl DensityEffect {
    pub fn delta(&self, x: f64) -> f64 {
        let ln10 = std::f64::consts::LN_10;
        if x >= self.x1 {
            2.0 * ln10 * x - self.c_bar
        } else if x >= self.x0 {
            2.0 * ln10 * x - self.c_bar + self.a * (self.x1 - x).powf(self.k)
        } else {
            self.delta0 * 10f64.powf(2.0 * (x - self.x0))
        }
    }
}

/// Per-material properties and density-effect constants. Read-only once
/// loaded; share it by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialTable {
    pub properties: HashMap<Material, MaterialProperties>,
    pub density_effect: HashMap<Material, DensityEffect>,
}

impl MaterialTable {
    /// Built-in values (PDG atomic and nuclear properties).
    pub fn standard() -> Self {
        let rows = [
            (Material::Air, (7.3, 14.624, 1.205e-3, 30390.0), (85.7, 0.10914, 3.3994, 1.7418, 4.2759, 10.5961, 0.0)),
            (Material::Si, (14.0, 28.0855, 2.329, 9.370), (173.0, 0.14921, 3.2546, 0.2015, 2.8716, 4.4355, 0.14)),
            (Material::Fe, (26.0, 55.845, 7.874, 1.757), (286.0, 0.14680, 2.9632, -0.0012, 3.1531, 4.2911, 0.12)),
            (Material::PbWO4, (31.3, 75.76, 8.300, 0.8903), (600.7, 0.22758, 3.0, 0.4068, 3.0023, 5.8528, 0.0)),
            (Material::Rock, (11.0, 22.0, 2.650, 10.02), (136.4, 0.08301, 3.4120, 0.0492, 3.0549, 3.7738, 0.0)),
        ];

        let mut properties = HashMap::new();
        let mut density_effect = HashMap::new();
        for (mat, (z, a, density, radiation_length), (i, da, k, x0, x1, c_bar, delta0)) in rows {
            properties.insert(
                mat,
                MaterialProperties {
                    z,
                    a,
                    density,
                    radiation_length,
                },
            );
            density_effect.insert(
                mat,
                DensityEffect {
                    mean_excitation_ev: i,
                    a: da,
                    k,
                    x0,
                    x1,
                    c_bar,
                    delta0,
                },
            );
        }

        Self {
            properties,
            density_effect,
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, MaterialError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load a table from a YAML file.
    ///
    /// # Example
    /// ```ignore
    /// let table = MaterialTable::load("materials/standard.yaml")?;
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MaterialError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn properties(&self, mat: Material) -> Result<&MaterialProperties, MaterialError> {
        self.properties.get(&mat).ok_or(MaterialError::NotFound(mat))
    }

    pub fn density_effect(&self, mat: Material) -> Result<&DensityEffect, MaterialError> {
        self.density_effect
            .get(&mat)
            .ok_or(MaterialError::NotFound(mat))
    }

    /// Check that every material `layout` can return has both entries.
    pub fn covers(&self, layout: &MaterialLayout) -> Result<(), MaterialError> {
        for &mat in layout.reachable() {
            self.properties(mat)?;
            self.density_effect(mat)?;
        }
        Ok(())
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// Position lookup
// =============================================================================

/// Anything that can report the material at a position (m).
pub trait MaterialMap {
    fn material_at(&self, pos: &Vec3) -> Material;
}

/// Solenoid shells, innermost first: (outer radius in m, material).
const SOLENOID_SHELLS: [(f64, Material); 5] = [
    (1.29, Material::Air),
    (1.8, Material::PbWO4),
    (2.95, Material::Fe),
    (4.0, Material::Fe),
    (7.0, Material::Fe),
];

/// Boundary between the silicon and iron halves of the `sife` setup.
const SIFE_BOUNDARY_X: f64 = 4.0;

/// The material layout selected by [`MaterialSetup`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialLayout {
    pub setup: MaterialSetup,
    /// Full solenoid length along Z (m)
    pub solenoid_length: f64,
    /// Distance from the origin where rock starts (m)
    pub rock_begins: f64,
}

impl MaterialLayout {
    pub fn new(setup: MaterialSetup) -> Self {
        let defaults = SimConfig::default();
        Self {
            setup,
            solenoid_length: defaults.solenoid_length,
            rock_begins: defaults.rock_begins,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            setup: config.materials,
            solenoid_length: config.solenoid_length,
            rock_begins: config.rock_begins,
        }
    }

    /// Every material this layout can return.
    pub fn reachable(&self) -> &'static [Material] {
        match self.setup {
            MaterialSetup::Air => &[Material::Air],
            MaterialSetup::Iron => &[Material::Fe],
            MaterialSetup::SiFe => &[Material::Si, Material::Fe],
            MaterialSetup::Cms => &[Material::Air, Material::PbWO4, Material::Fe, Material::Rock],
        }
    }

    fn solenoid_material(&self, pos: &Vec3) -> Material {
        let half = self.solenoid_length / 2.0;
        if !(-half < pos.z && pos.z < half) {
            return Material::Air;
        }

        let r = pos.transverse();
        let mut mat = SOLENOID_SHELLS
            .iter()
            .find(|(outer, _)| r < *outer)
            .map(|&(_, m)| m)
            .unwrap_or(Material::Air);

        // Rock wins over any shell, so it is checked last.
        if (r * r + pos.z * pos.z).sqrt() > self.rock_begins {
            mat = Material::Rock;
        }
        mat
    }
}

impl MaterialMap for MaterialLayout {
    fn material_at(&self, pos: &Vec3) -> Material {
        match self.setup {
            MaterialSetup::Air => Material::Air,
            MaterialSetup::Iron => Material::Fe,
            MaterialSetup::SiFe => {
                if pos.x < SIFE_BOUNDARY_X {
                    Material::Si
                } else {
                    Material::Fe
                }
            }
            MaterialSetup::Cms => self.solenoid_material(pos),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;

    fn get_materials_path() -> PathBuf {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(manifest_dir).join("..").join("materials")
    }

    #[test]
    fn test_sife_splits_on_x() {
        let layout = MaterialLayout::new(MaterialSetup::SiFe);
        for (y, z) in [(0.0, 0.0), (-3.0, 12.0), (50.0, -7.5)] {
            assert_eq!(layout.material_at(&Vec3::new(2.0, y, z)), Material::Si);
            assert_eq!(layout.material_at(&Vec3::new(6.0, y, z)), Material::Fe);
        }
    }

    #[test]
    fn test_constant_setups() {
        let p = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(MaterialLayout::new(MaterialSetup::Air).material_at(&p), Material::Air);
        assert_eq!(MaterialLayout::new(MaterialSetup::Iron).material_at(&p), Material::Fe);
    }

    #[test]
    fn test_solenoid_shells() {
        let layout = MaterialLayout::new(MaterialSetup::Cms);
        let at = |r: f64| layout.material_at(&Vec3::new(r, 0.0, 0.0));

        assert_eq!(at(0.5), Material::Air);
        assert_eq!(at(1.5), Material::PbWO4);
        assert_eq!(at(2.0), Material::Fe);
        assert_eq!(at(5.0), Material::Fe);
        assert_eq!(at(8.0), Material::Air);
    }

    #[test]
    fn test_outside_solenoid_length_is_air() {
        let layout = MaterialLayout::new(MaterialSetup::Cms);
        assert_eq!(layout.material_at(&Vec3::new(2.0, 0.0, 11.0)), Material::Air);
        assert_eq!(layout.material_at(&Vec3::new(2.0, 0.0, -10.7)), Material::Fe);
    }

    #[test]
    fn test_rock_overrides_shells() {
        let layout = MaterialLayout {
            setup: MaterialSetup::Cms,
            solenoid_length: 40.0,
            rock_begins: 5.0,
        };
        // r = 4.5 is iron by shell, but |pos| = 5.5 > 5
        assert_eq!(layout.material_at(&Vec3::new(4.5, 0.0, 3.16)), Material::Rock);
        assert_eq!(layout.material_at(&Vec3::new(4.5, 0.0, 0.0)), Material::Fe);
        assert_eq!(layout.material_at(&Vec3::new(12.0, 0.0, 0.0)), Material::Rock);
    }

    #[test]
    fn test_density_effect_regimes() {
        let fe = MaterialTable::standard().density_effect[&Material::Fe];
        let high = fe.delta(4.0);
        assert!((high - (2.0 * std::f64::consts::LN_10 * 4.0 - fe.c_bar)).abs() < 1e-12);

        let low = fe.delta(-1.0);
        assert!(low > 0.0 && low < fe.delta0);

        // Continuous at x1
        let below = fe.delta(fe.x1 - 1e-9);
        assert!((below - fe.delta(fe.x1)).abs() < 1e-6);
    }

    #[test]
    fn test_standard_table_covers_all_layouts() {
        let table = MaterialTable::standard();
        for &setup in MaterialSetup::ALL {
            assert!(table.covers(&MaterialLayout::new(setup)).is_ok());
        }
    }

    #[test]
    fn test_missing_material_reported() {
        let mut table = MaterialTable::standard();
        table.properties.remove(&Material::Rock);
        match table.properties(Material::Rock) {
            Err(MaterialError::NotFound(Material::Rock)) => {}
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_standard_yaml_matches_builtin() {
        let table = MaterialTable::load(get_materials_path().join("standard.yaml"));
        assert!(table.is_ok(), "Should load standard.yaml: {:?}", table.err());
        assert_eq!(table.unwrap(), MaterialTable::standard());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = MaterialTable::load(get_materials_path().join("nonexistent_xyz.yaml"));
        assert!(matches!(result, Err(MaterialError::IoError(_))));
    }
}
