use std::path::Path;

use serde::Deserialize;
use tmm_kernel::{BoundaryPolicy, TileConfig, DEFAULT_TILE, MAX_GROUPS_PER_AXIS};

use crate::error::{BenchError, Result};

/// Value every element of `A` is filled with.
pub const DEFAULT_FILL_A: f32 = 3.0;
/// Value every element of `B` is filled with.
pub const DEFAULT_FILL_B: f32 = 4.0;

/// Validated benchmark configuration.
///
/// Only `repeat_factor` is required; the matrix dimension is
/// `tile * repeat_factor`. Every constructor, including deserialization,
/// goes through the same validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawBenchConfig")]
pub struct BenchConfig {
    repeat_factor: usize,
    tile: TileConfig,
    fill_a: f32,
    fill_b: f32,
    runs: usize,
}

/// On-disk form of [`BenchConfig`]. Unknown keys are rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBenchConfig {
    #[serde(alias = "COEnumber")]
    repeat_factor: i64,
    #[serde(default = "default_tile")]
    tile: usize,
    #[serde(default)]
    boundary: BoundaryPolicy,
    #[serde(default = "default_fill_a")]
    fill_a: f32,
    #[serde(default = "default_fill_b")]
    fill_b: f32,
    #[serde(default = "default_runs")]
    runs: usize,
}

fn default_tile() -> usize {
    DEFAULT_TILE
}

fn default_fill_a() -> f32 {
    DEFAULT_FILL_A
}

fn default_fill_b() -> f32 {
    DEFAULT_FILL_B
}

fn default_runs() -> usize {
    1
}

impl TryFrom<RawBenchConfig> for BenchConfig {
    type Error = BenchError;

    fn try_from(raw: RawBenchConfig) -> Result<Self> {
        BenchConfig::new(raw.repeat_factor)?
            .with_tile(raw.tile)?
            .with_boundary(raw.boundary)
            .with_fill(raw.fill_a, raw.fill_b)?
            .with_runs(raw.runs)
    }
}

impl BenchConfig {
    /// Reference configuration for the given repeat factor: tile 32, fills
    /// 3.0 and 4.0, one run.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `repeat_factor < 1`.
    pub fn new(repeat_factor: i64) -> Result<Self> {
        let repeat_factor = usize::try_from(repeat_factor)
            .ok()
            .filter(|&r| r >= 1)
            .ok_or_else(|| {
                BenchError::InvalidArgument(format!(
                    "repeat factor must be a positive integer, got {repeat_factor}"
                ))
            })?;
        let config = BenchConfig {
            repeat_factor,
            tile: TileConfig::default(),
            fill_a: DEFAULT_FILL_A,
            fill_b: DEFAULT_FILL_B,
            runs: 1,
        };
        config.check_extent()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    pub fn with_repeat_factor(self, repeat_factor: i64) -> Result<Self> {
        let base = BenchConfig::new(repeat_factor)?;
        let config = BenchConfig {
            repeat_factor: base.repeat_factor,
            ..self
        };
        config.check_extent()?;
        Ok(config)
    }

    /// Change the tile edge, keeping the boundary policy.
    pub fn with_tile(self, tile: usize) -> Result<Self> {
        let boundary = self.tile.boundary();
        let tile = TileConfig::new(tile)?.with_boundary(boundary);
        let config = BenchConfig { tile, ..self };
        config.check_extent()?;
        Ok(config)
    }

    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.tile = self.tile.with_boundary(boundary);
        self
    }

    /// Change the constant fill values of `A` and `B`.
    pub fn with_fill(mut self, fill_a: f32, fill_b: f32) -> Result<Self> {
        if !fill_a.is_finite() || !fill_b.is_finite() {
            return Err(BenchError::InvalidArgument(format!(
                "fill values must be finite, got {fill_a} and {fill_b}"
            )));
        }
        self.fill_a = fill_a;
        self.fill_b = fill_b;
        Ok(self)
    }

    pub fn with_runs(mut self, runs: usize) -> Result<Self> {
        if runs == 0 {
            return Err(BenchError::InvalidArgument(
                "runs must be at least 1".to_string(),
            ));
        }
        self.runs = runs;
        Ok(self)
    }

    pub fn repeat_factor(&self) -> usize {
        self.repeat_factor
    }

    pub fn tile_config(&self) -> &TileConfig {
        &self.tile
    }

    pub fn fill_a(&self) -> f32 {
        self.fill_a
    }

    pub fn fill_b(&self) -> f32 {
        self.fill_b
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Matrix dimension `N = tile * repeat_factor`.
    pub fn matrix_dim(&self) -> usize {
        self.tile.tile() * self.repeat_factor
    }

    /// Value every element of `C` holds after a correct multiply.
    pub fn expected_value(&self) -> f32 {
        self.fill_a * self.fill_b * self.matrix_dim() as f32
    }

    fn check_extent(&self) -> Result<()> {
        let n = self
            .tile
            .tile()
            .checked_mul(self.repeat_factor)
            .ok_or_else(|| {
                BenchError::InvalidArgument(format!(
                    "tile {} x repeat factor {} overflows",
                    self.tile.tile(),
                    self.repeat_factor
                ))
            })?;
        let bytes = n
            .checked_mul(n)
            .and_then(|elems| elems.checked_mul(std::mem::size_of::<f32>()))
            .filter(|&bytes| bytes <= isize::MAX as usize);
        if bytes.is_none() {
            return Err(BenchError::InvalidArgument(format!(
                "a {n}x{n} f32 matrix does not fit in memory"
            )));
        }
        let groups = n.div_ceil(self.tile.tile());
        if groups > MAX_GROUPS_PER_AXIS {
            return Err(BenchError::InvalidArgument(format!(
                "N={n} needs {groups} groups per axis, limit is {MAX_GROUPS_PER_AXIS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_new_reference_config() {
        let cfg = BenchConfig::new(2).unwrap();
        assert_eq!(cfg.repeat_factor(), 2);
        assert_eq!(cfg.tile_config().tile(), 32);
        assert_eq!(cfg.matrix_dim(), 64);
        assert_eq!(cfg.fill_a(), 3.0);
        assert_eq!(cfg.fill_b(), 4.0);
        assert_eq!(cfg.runs(), 1);
        assert_eq!(cfg.expected_value(), 768.0);
    }

    #[test]
    fn test_rejects_non_positive_repeat_factor() {
        for bad in [0, -1, -32] {
            let err = BenchConfig::new(bad).unwrap_err();
            assert!(matches!(err, BenchError::InvalidArgument(_)));
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_rejects_repeat_factor_past_device_limits() {
        // N = 2^31: the element count fits in usize but the byte count does not.
        let err = BenchConfig::new(1 << 26).unwrap_err();
        assert!(matches!(err, BenchError::InvalidArgument(_)));
        assert!(err.to_string().contains("does not fit"));

        let err = BenchConfig::new(MAX_GROUPS_PER_AXIS as i64 + 1).unwrap_err();
        assert!(err.to_string().contains("groups per axis"));

        let cfg = BenchConfig::new(MAX_GROUPS_PER_AXIS as i64).unwrap();
        assert_eq!(cfg.matrix_dim(), 32 * MAX_GROUPS_PER_AXIS);
    }

    #[test]
    fn test_builder_validation() {
        let cfg = BenchConfig::new(1).unwrap();
        assert!(cfg.clone().with_tile(0).is_err());
        assert!(cfg.clone().with_tile(64).is_err());
        assert!(cfg.clone().with_runs(0).is_err());
        assert!(cfg.clone().with_fill(f32::NAN, 1.0).is_err());
        assert!(cfg.clone().with_repeat_factor(0).is_err());

        let cfg = cfg
            .with_boundary(BoundaryPolicy::EitherAxis)
            .with_tile(16)
            .unwrap();
        assert_eq!(cfg.tile_config().boundary(), BoundaryPolicy::EitherAxis);
        assert_eq!(cfg.matrix_dim(), 16);
    }

    #[test]
    fn test_from_toml_minimal() {
        let cfg = BenchConfig::from_toml_str("repeat_factor = 3").unwrap();
        assert_eq!(cfg, BenchConfig::new(3).unwrap());
    }

    #[test]
    fn test_from_toml_full() {
        let cfg = BenchConfig::from_toml_str(
            r#"
            repeat_factor = 4
            tile = 8
            boundary = "either-axis"
            fill_a = 1.0
            fill_b = 2.0
            runs = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.matrix_dim(), 32);
        assert_eq!(cfg.tile_config().boundary(), BoundaryPolicy::EitherAxis);
        assert_eq!(cfg.runs(), 5);
        assert_eq!(cfg.expected_value(), 64.0);
    }

    #[test]
    fn test_from_toml_accepts_legacy_key() {
        let cfg = BenchConfig::from_toml_str("COEnumber = 2").unwrap();
        assert_eq!(cfg.repeat_factor(), 2);
    }

    #[test]
    fn test_from_toml_rejects_unknown_and_missing_keys() {
        assert!(BenchConfig::from_toml_str("repeat_factor = 1\ndup = 3").is_err());
        assert!(BenchConfig::from_toml_str("tile = 32").is_err());
        let err = BenchConfig::from_toml_str("repeat_factor = -2").unwrap_err();
        assert!(matches!(err, BenchError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "repeat_factor = 2\ntile = 16").unwrap();
        let cfg = BenchConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.matrix_dim(), 32);

        let err = BenchConfig::from_file("/nonexistent/tmm.toml").unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));
    }
}
