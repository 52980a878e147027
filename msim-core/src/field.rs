//! Magnetic field sampling.
//!
//! The integrator only sees the [`MagneticField`] trait. [`FieldSampler`]
//! implements it for the analytic presets and for lookups into a
//! [`FieldGrid`], a cylindrical (r, z, φ) map of field vectors.
//!
//! ## Grid lookup
//!
//! ```text
//!   z, φ : rounded to the nearest grid node
//!   r    : linear interpolation between the two bracketing radial planes
//!
//!   B = f·B[ceil(r/dr)] + (1 − f)·B[floor(r/dr)],   f = r/dr − floor(r/dr)
//! ```
//!
//! Queries outside the grid's z or r range return a zero field.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, FieldMode, GridResolution, SimConfig};
use crate::types::Vec3;

/// Anything that can report the magnetic field (T) at a position (m).
pub trait MagneticField {
    fn field_at(&self, pos: &Vec3) -> Vec3;
}

/// Error type for field-map loading.
#[derive(Error, Debug)]
pub enum FieldMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid grid axis '{axis}': {reason}")]
    InvalidAxis { axis: &'static str, reason: String },
}

// =============================================================================
// Grid geometry
// =============================================================================

/// One axis of the grid: nodes at min, min + step, ..., max.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl GridAxis {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Number of nodes along the axis.
    pub fn len(&self) -> usize {
        ((self.max - self.min) / self.step).round() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinate of node `i`.
    pub fn node(&self, i: usize) -> f64 {
        self.min + i as f64 * self.step
    }

    /// Index of the bin containing `v` (floor division), if allocated.
    fn bin(&self, v: f64) -> Option<usize> {
        let i = ((v - self.min) / self.step).floor();
        if i >= 0.0 && (i as usize) < self.len() {
            Some(i as usize)
        } else {
            None
        }
    }

    fn validate(&self, axis: &'static str) -> Result<(), FieldMapError> {
        if !(self.step > 0.0) || !(self.max >= self.min) {
            return Err(FieldMapError::InvalidAxis {
                axis,
                reason: format!(
                    "need step > 0 and max >= min, got min={} max={} step={}",
                    self.min, self.max, self.step
                ),
            });
        }
        Ok(())
    }
}

/// Extents of a cylindrical field grid, in the grid's length unit (cm for
/// the CMS maps) and degrees for φ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub r: GridAxis,
    pub z: GridAxis,
    pub phi: GridAxis,
}

impl GridBounds {
    /// Coarse CMS solenoid map: 10 cm in r and z, 5° in φ.
    pub fn cms_coarse() -> Self {
        Self {
            r: GridAxis::new(0.0, 900.0, 10.0),
            z: GridAxis::new(-1500.0, 1500.0, 10.0),
            phi: GridAxis::new(0.0, 355.0, 5.0),
        }
    }

    /// Fine CMS solenoid map: 1 cm in r and z over the central barrel.
    ///
    /// About 39 million nodes, so a grid built on these bounds takes
    /// roughly 1.25 GB. Pass narrower bounds when only part of the map is
    /// needed.
    pub fn cms_fine() -> Self {
        Self {
            r: GridAxis::new(0.0, 900.0, 1.0),
            z: GridAxis::new(-300.0, 300.0, 1.0),
            phi: GridAxis::new(0.0, 355.0, 5.0),
        }
    }

    /// Preset bounds for a map resolution.
    pub fn for_resolution(resolution: GridResolution) -> Self {
        match resolution {
            GridResolution::Coarse => Self::cms_coarse(),
            GridResolution::Fine => Self::cms_fine(),
        }
    }

    /// Number of grid nodes.
    pub fn cell_count(&self) -> usize {
        self.r.len() * self.z.len() * self.phi.len()
    }
}

// =============================================================================
// FieldGrid
// =============================================================================

/// A cylindrical grid of field vectors. Read-only once built.
#[derive(Debug, Clone)]
pub struct FieldGrid {
    bounds: GridBounds,
    nr: usize,
    nz: usize,
    nphi: usize,
    field: Vec<Vec3>,
    magnitude: Vec<f64>,
}

impl FieldGrid {
    /// An all-zero grid with the given extents.
    pub fn zeros(bounds: GridBounds) -> Result<Self, FieldMapError> {
        bounds.r.validate("r")?;
        bounds.z.validate("z")?;
        bounds.phi.validate("phi")?;

        let (nr, nz, nphi) = (bounds.r.len(), bounds.z.len(), bounds.phi.len());
        let cells = bounds.cell_count();
        log::debug!(
            "Allocating {}x{}x{} field grid ({} MB)",
            nr,
            nz,
            nphi,
            cells * (std::mem::size_of::<Vec3>() + std::mem::size_of::<f64>()) / (1 << 20)
        );
        Ok(Self {
            bounds,
            nr,
            nz,
            nphi,
            field: vec![Vec3::ZERO; cells],
            magnitude: vec![0.0; cells],
        })
    }

    /// Fill every node from a function of (r, z, φ°).
    pub fn from_fn<F>(bounds: GridBounds, f: F) -> Result<Self, FieldMapError>
    where
        F: Fn(f64, f64, f64) -> Vec3,
    {
        let mut grid = Self::zeros(bounds)?;
        for ir in 0..grid.nr {
            for iz in 0..grid.nz {
                for iphi in 0..grid.nphi {
                    let b = f(
                        bounds.r.node(ir),
                        bounds.z.node(iz),
                        bounds.phi.node(iphi),
                    );
                    grid.set(ir, iz, iphi, b);
                }
            }
        }
        Ok(grid)
    }

    /// Load a whitespace-separated text map with rows `r z phi (Bx,By,Bz)`.
    pub fn from_text_file<P: AsRef<Path>>(
        bounds: GridBounds,
        path: P,
    ) -> Result<Self, FieldMapError> {
        let file = File::open(path)?;
        Self::from_text_reader(bounds, BufReader::new(file))
    }

    /// Parse a text map from any reader.
    ///
    /// Rows without exactly four columns, with unparsable numbers, or that
    /// land outside the grid are skipped.
    pub fn from_text_reader<R: BufRead>(
        bounds: GridBounds,
        reader: R,
    ) -> Result<Self, FieldMapError> {
        let mut grid = Self::zeros(bounds)?;
        let mut loaded = 0usize;
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            match parse_row(&line).and_then(|(r, z, phi, b)| {
                Some((bounds.r.bin(r)?, bounds.z.bin(z)?, bounds.phi.bin(phi)?, b))
            }) {
                Some((ir, iz, iphi, b)) => {
                    grid.set(ir, iz, iphi, b);
                    loaded += 1;
                }
                None => skipped += 1,
            }
        }

        log::debug!(
            "Loaded field map: {} rows, {} skipped, {}x{}x{} grid",
            loaded,
            skipped,
            grid.nr,
            grid.nz,
            grid.nphi
        );
        Ok(grid)
    }

    pub fn bounds(&self) -> &GridBounds {
        &self.bounds
    }

    /// Grid dimensions as (nr, nz, nphi).
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nr, self.nz, self.nphi)
    }

    fn index(&self, ir: usize, iz: usize, iphi: usize) -> Option<usize> {
        if ir < self.nr && iz < self.nz && iphi < self.nphi {
            Some((ir * self.nz + iz) * self.nphi + iphi)
        } else {
            None
        }
    }

    /// Store a field vector. Out-of-range indices are ignored.
    pub fn set(&mut self, ir: usize, iz: usize, iphi: usize, b: Vec3) {
        if let Some(i) = self.index(ir, iz, iphi) {
            self.field[i] = b;
            self.magnitude[i] = b.magnitude();
        }
    }

    /// Field vector at a node, if it exists.
    pub fn get(&self, ir: usize, iz: usize, iphi: usize) -> Option<Vec3> {
        self.index(ir, iz, iphi).map(|i| self.field[i])
    }

    /// |B| at a node, if it exists.
    pub fn magnitude(&self, ir: usize, iz: usize, iphi: usize) -> Option<f64> {
        self.index(ir, iz, iphi).map(|i| self.magnitude[i])
    }

    /// Sample at a point already expressed in grid units.
    ///
    /// `interpolate` selects radial interpolation; z and φ always snap to
    /// the nearest node.
    pub fn sample(&self, pos: &Vec3, interpolate: bool) -> Vec3 {
        let GridBounds { r: ra, z: za, phi: pa } = self.bounds;
        let r = pos.transverse();

        if !(pos.z > za.min && pos.z < za.max && r >= ra.min && r < ra.max) {
            return Vec3::ZERO;
        }

        let mut phi = pos.y.atan2(pos.x).to_degrees();
        if phi < 0.0 {
            phi += 360.0;
        }

        let near_z = za.step * (pos.z / za.step).round();
        let mut near_phi = pa.step * (phi / pa.step).round();
        if near_phi >= 360.0 {
            near_phi = 0.0;
        }

        let iz = ((near_z - za.min) / za.step).round();
        let iphi = ((near_phi - pa.min) / pa.step).round();
        if iz < 0.0 || iphi < 0.0 {
            return Vec3::ZERO;
        }
        let (iz, iphi) = (iz as usize, iphi as usize);

        let ir = (r - ra.min) / ra.step;
        let (low, high, frac) = if interpolate {
            (ir.floor() as usize, ir.ceil() as usize, ir - ir.floor())
        } else {
            let nearest = ir.round() as usize;
            (nearest, nearest, 1.0)
        };

        match (self.get(low, iz, iphi), self.get(high, iz, iphi)) {
            (Some(b_low), Some(b_high)) => b_high * frac + b_low * (1.0 - frac),
            _ => Vec3::ZERO,
        }
    }
}

fn parse_row(line: &str) -> Option<(f64, f64, f64, Vec3)> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() != 4 {
        return None;
    }
    let r = cols[0].parse().ok()?;
    let z = cols[1].parse().ok()?;
    let phi = cols[2].parse().ok()?;

    let mut comps = cols[3]
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(|s| s.trim().parse::<f64>());
    let bx = comps.next()?.ok()?;
    let by = comps.next()?.ok()?;
    let bz = comps.next()?.ok()?;
    if comps.next().is_some() {
        return None;
    }
    Some((r, z, phi, Vec3::new(bx, by, bz)))
}

/// The coarse and fine grids available to a run. Either may be absent when
/// no grid-mode sampling is needed.
#[derive(Debug, Clone, Default)]
pub struct FieldMaps {
    pub coarse: Option<FieldGrid>,
    pub fine: Option<FieldGrid>,
}

impl FieldMaps {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn coarse(grid: FieldGrid) -> Self {
        Self {
            coarse: Some(grid),
            fine: None,
        }
    }

    pub fn get(&self, resolution: GridResolution) -> Option<&FieldGrid> {
        match resolution {
            GridResolution::Coarse => self.coarse.as_ref(),
            GridResolution::Fine => self.fine.as_ref(),
        }
    }
}

// =============================================================================
// FieldSampler
// =============================================================================

/// The configured field source.
#[derive(Debug, Clone, Copy)]
pub struct FieldSampler<'a> {
    mode: FieldMode,
    grid: Option<&'a FieldGrid>,
    interpolate: bool,
    length_scale: f64,
}

impl<'a> FieldSampler<'a> {
    /// An analytic sampler. Fails for [`FieldMode::Grid`], which needs a map.
    pub fn analytic(mode: FieldMode) -> Result<Self, ConfigError> {
        if mode == FieldMode::Grid {
            return Err(ConfigError::MissingFieldGrid(GridResolution::Coarse));
        }
        Ok(Self {
            mode,
            grid: None,
            interpolate: true,
            length_scale: 1.0,
        })
    }

    /// Sample a grid. `length_scale` converts meters into grid units.
    pub fn grid(grid: &'a FieldGrid, interpolate: bool, length_scale: f64) -> Self {
        Self {
            mode: FieldMode::Grid,
            grid: Some(grid),
            interpolate,
            length_scale,
        }
    }

    /// Build the sampler a configuration asks for.
    pub fn from_config(config: &SimConfig, maps: &'a FieldMaps) -> Result<Self, ConfigError> {
        match config.field {
            FieldMode::Grid => {
                let grid = maps
                    .get(config.grid_resolution)
                    .ok_or(ConfigError::MissingFieldGrid(config.grid_resolution))?;
                Ok(Self::grid(grid, config.interpolate, config.grid_length_scale))
            }
            mode => Self::analytic(mode),
        }
    }

    pub fn mode(&self) -> FieldMode {
        self.mode
    }
}

impl MagneticField for FieldSampler<'_> {
    fn field_at(&self, pos: &Vec3) -> Vec3 {
        match self.mode {
            FieldMode::None => Vec3::ZERO,
            FieldMode::Uniform => Vec3::new(0.0, 0.0, 1.0),
            FieldMode::UpDown => {
                let r = pos.transverse();
                if r < 4.0 {
                    Vec3::new(0.0, 0.0, 3.0)
                } else {
                    Vec3::new(0.0, 0.0, -3.0) / r
                }
            }
            FieldMode::Grid => match self.grid {
                Some(grid) => grid.sample(&(*pos * self.length_scale), self.interpolate),
                None => Vec3::ZERO,
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn small_bounds() -> GridBounds {
        GridBounds {
            r: GridAxis::new(0.0, 100.0, 10.0),
            z: GridAxis::new(-50.0, 50.0, 10.0),
            phi: GridAxis::new(0.0, 355.0, 5.0),
        }
    }

    /// Bz equal to the node radius, Bx equal to the node azimuth.
    fn radial_ramp() -> FieldGrid {
        FieldGrid::from_fn(small_bounds(), |r, _z, phi| Vec3::new(phi, 0.0, r)).unwrap()
    }

    #[test]
    fn test_presets() {
        let none = FieldSampler::analytic(FieldMode::None).unwrap();
        let uniform = FieldSampler::analytic(FieldMode::Uniform).unwrap();
        let updown = FieldSampler::analytic(FieldMode::UpDown).unwrap();
        let p = Vec3::new(1.0, 2.0, 3.0);

        assert_eq!(none.field_at(&p), Vec3::ZERO);
        assert_eq!(uniform.field_at(&p), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(updown.field_at(&p), Vec3::new(0.0, 0.0, 3.0));

        let outside = updown.field_at(&Vec3::new(6.0, 0.0, 0.0));
        assert!((outside.z + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_grid_mode_requires_a_map() {
        assert!(FieldSampler::analytic(FieldMode::Grid).is_err());

        let config = SimConfig {
            field: FieldMode::Grid,
            grid_resolution: GridResolution::Fine,
            ..SimConfig::default()
        };
        let maps = FieldMaps::coarse(radial_ramp());
        match FieldSampler::from_config(&config, &maps) {
            Err(ConfigError::MissingFieldGrid(GridResolution::Fine)) => {}
            other => panic!("Expected MissingFieldGrid(Fine), got {:?}", other),
        }
    }

    #[test]
    fn test_outside_bounds_is_exact_zero() {
        let grid = FieldGrid::from_fn(small_bounds(), |_, _, _| Vec3::new(1.0, 1.0, 1.0)).unwrap();

        // z at or beyond the limits, r at or beyond r_max
        for p in [
            Vec3::new(10.0, 0.0, 50.0),
            Vec3::new(10.0, 0.0, -60.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(80.0, 80.0, 0.0),
        ] {
            assert_eq!(grid.sample(&p, true), Vec3::ZERO, "at {:?}", p);
        }
        assert_eq!(grid.sample(&Vec3::new(10.0, 0.0, 0.0), true), Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_radial_interpolation() {
        let grid = radial_ramp();
        let b = grid.sample(&Vec3::new(23.0, 0.0, 0.0), true);
        assert!((b.z - 23.0).abs() < 1e-9, "got {}", b.z);

        let nearest = grid.sample(&Vec3::new(23.0, 0.0, 0.0), false);
        assert!((nearest.z - 20.0).abs() < 1e-9, "got {}", nearest.z);

        let nearest_up = grid.sample(&Vec3::new(27.0, 0.0, 0.0), false);
        assert!((nearest_up.z - 30.0).abs() < 1e-9, "got {}", nearest_up.z);
    }

    #[test]
    fn test_azimuth_rounds_to_nearest() {
        let grid = radial_ramp();
        let angle = 47.0_f64.to_radians();
        let b = grid.sample(&Vec3::new(20.0 * angle.cos(), 20.0 * angle.sin(), 0.0), true);
        // 47° snaps to the 45° node
        assert!((b.x - 45.0).abs() < 1e-9, "got {}", b.x);
    }

    #[test]
    fn test_azimuth_360_wraps_to_zero() {
        let grid = radial_ramp();
        // -1° becomes 359°, which rounds to 360° and must wrap to node 0
        let angle = (-1.0_f64).to_radians();
        let b = grid.sample(&Vec3::new(20.0 * angle.cos(), 20.0 * angle.sin(), 0.0), true);
        assert_eq!(b.x, 0.0);
        assert!((b.z - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sampler_converts_meters_to_grid_units() {
        let grid = radial_ramp();
        let sampler = FieldSampler::grid(&grid, true, 100.0);
        let b = sampler.field_at(&Vec3::new(0.35, 0.0, 0.0));
        assert!((b.z - 35.0).abs() < 1e-9);
        assert_eq!(sampler.field_at(&Vec3::new(2.0, 0.0, 0.0)), Vec3::ZERO);
    }

    #[test]
    fn test_text_loader_skips_malformed_rows() {
        let text = "\
# header line that is not data
10 0 0 (0.1,0.2,3.8)
20 0 0 (0.0,0.0,3.5)
20 0 5
bad 0 0 (1,1,1)
30 0 0 (1,2)
500 0 0 (9,9,9)
";
        let grid = FieldGrid::from_text_reader(small_bounds(), Cursor::new(text)).unwrap();
        let iz = 5; // z = 0 with z_min = -50, step 10

        assert_eq!(grid.get(1, iz, 0), Some(Vec3::new(0.1, 0.2, 3.8)));
        assert_eq!(grid.get(2, iz, 0), Some(Vec3::new(0.0, 0.0, 3.5)));
        assert_eq!(grid.get(3, iz, 0), Some(Vec3::ZERO));
        assert!((grid.magnitude(2, iz, 0).unwrap() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_text_loader_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 0 90 (0,0,2)").unwrap();
        writeln!(file, "10 0 90 (0,0,4)").unwrap();

        let grid = FieldGrid::from_text_file(small_bounds(), file.path()).unwrap();
        let b = grid.sample(&Vec3::new(0.0, 5.0, 0.0), true);
        assert!((b.z - 3.0).abs() < 1e-9, "got {:?}", b);
    }

    #[test]
    fn test_invalid_axis_rejected() {
        let bounds = GridBounds {
            r: GridAxis::new(0.0, 10.0, 0.0),
            ..small_bounds()
        };
        assert!(matches!(
            FieldGrid::zeros(bounds),
            Err(FieldMapError::InvalidAxis { axis: "r", .. })
        ));
    }

    #[test]
    fn test_preset_bounds_sizes() {
        assert_eq!(GridBounds::cms_coarse().cell_count(), 91 * 301 * 72);
        assert_eq!(GridBounds::cms_fine().cell_count(), 901 * 601 * 72);
        assert_eq!(
            GridBounds::for_resolution(GridResolution::Fine),
            GridBounds::cms_fine()
        );
        assert_eq!(small_bounds().cell_count(), 11 * 11 * 72);
    }

    #[test]
    fn test_sampler_picks_grid_by_resolution() {
        let coarse = FieldGrid::from_fn(small_bounds(), |_, _, _| Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let fine = FieldGrid::from_fn(small_bounds(), |_, _, _| Vec3::new(0.0, 0.0, 2.0)).unwrap();
        let maps = FieldMaps {
            coarse: Some(coarse),
            fine: Some(fine),
        };
        let p = Vec3::new(0.2, 0.1, 0.0);

        for (resolution, bz) in [(GridResolution::Coarse, 1.0), (GridResolution::Fine, 2.0)] {
            let config = SimConfig {
                field: FieldMode::Grid,
                grid_resolution: resolution,
                ..SimConfig::default()
            };
            let sampler = FieldSampler::from_config(&config, &maps).unwrap();
            assert_eq!(sampler.mode(), FieldMode::Grid);
            let b = sampler.field_at(&p);
            assert!((b.z - bz).abs() < 1e-12, "{:?}: got {:?}", resolution, b);
        }
    }
}
