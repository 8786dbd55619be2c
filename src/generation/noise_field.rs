//! # Noise Field
//!
//! Deterministic scalar noise for terrain synthesis.
//!
//! ## Determinism
//!
//! A `NoiseField` is a pure function of its seed and the sample coordinate.
//! Two fields built with the same seed return bit-identical values, so chunks
//! can be generated on any worker in any order.
//!
//! ## Fractal Noise
//!
//! Fractal (fBm) sums add `octaves` layers of Perlin noise. Octave `i` is
//! sampled at `lacunarity^i` times the base frequency and weighted by
//! `persistence^i`. The sum is divided by the total weight so the result stays
//! in `[-1, 1]`.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};

/// World seed type shared by every generator.
pub type Seed = u32;

/// Derives an independent seed for a secondary field (caves, structure gates).
///
/// FNV-1a over the seed bytes followed by the purpose tag.
pub fn derive_seed(seed: Seed, purpose: &str) -> Seed {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET;
    for byte in seed.to_le_bytes().iter().chain(purpose.as_bytes()) {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Octave parameters for fractal noise.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalParams {
    /// Number of noise layers. Must be at least 1.
    pub octaves: u32,
    /// Amplitude decay per octave, in `(0, 1]`.
    pub persistence: f64,
    /// Frequency growth per octave, greater than 1.
    pub lacunarity: f64,
}

impl Default for FractalParams {
    fn default() -> Self {
        FractalParams {
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

impl FractalParams {
    /// Creates validated fractal parameters.
    ///
    /// # Errors
    /// `TerrainError::InvalidNoiseParameters` when any value is out of range.
    pub fn new(octaves: u32, persistence: f64, lacunarity: f64) -> TerrainResult<Self> {
        let params = FractalParams {
            octaves,
            persistence,
            lacunarity,
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks the parameter ranges.
    pub fn validate(&self) -> TerrainResult<()> {
        if self.octaves < 1 {
            return Err(TerrainError::InvalidNoiseParameters(format!(
                "octaves must be >= 1, got {}",
                self.octaves
            )));
        }
        if !(self.persistence > 0.0 && self.persistence <= 1.0) {
            return Err(TerrainError::InvalidNoiseParameters(format!(
                "persistence must be in (0, 1], got {}",
                self.persistence
            )));
        }
        if !(self.lacunarity > 1.0) || !self.lacunarity.is_finite() {
            return Err(TerrainError::InvalidNoiseParameters(format!(
                "lacunarity must be > 1, got {}",
                self.lacunarity
            )));
        }
        Ok(())
    }
}

/// A seeded Perlin noise source with a base frequency and octave settings.
#[derive(Clone, Debug)]
pub struct NoiseField {
    seed: Seed,
    frequency: f64,
    fractal: FractalParams,
    perlin: Perlin,
}

impl NoiseField {
    /// Creates a field with unit frequency and the default octave settings.
    pub fn new(seed: Seed) -> Self {
        NoiseField {
            seed,
            frequency: 1.0,
            fractal: FractalParams::default(),
            perlin: Perlin::new(seed),
        }
    }

    /// Creates a field with a base frequency and validated octave settings.
    ///
    /// # Arguments
    /// * `seed` - The seed for the underlying Perlin permutation table
    /// * `frequency` - Scale applied to coordinates before sampling
    /// * `fractal` - Octave settings used by [`NoiseField::sample_2d`] and
    ///   [`NoiseField::sample_3d`]
    ///
    /// # Errors
    /// `TerrainError::InvalidNoiseParameters` for a non-positive frequency or
    /// invalid octave settings.
    pub fn with_params(seed: Seed, frequency: f64, fractal: FractalParams) -> TerrainResult<Self> {
        fractal.validate()?;
        if !(frequency > 0.0) || !frequency.is_finite() {
            return Err(TerrainError::InvalidNoiseParameters(format!(
                "frequency must be > 0, got {}",
                frequency
            )));
        }
        Ok(Self::from_parts(seed, frequency, fractal))
    }

    /// Builds a field from settings the caller already validated.
    pub(crate) fn from_parts(seed: Seed, frequency: f64, fractal: FractalParams) -> Self {
        NoiseField {
            seed,
            frequency,
            fractal,
            perlin: Perlin::new(seed),
        }
    }

    /// The current seed.
    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Re-seeds the field in place. Only the permutation table is rebuilt.
    pub fn set_seed(&mut self, seed: Seed) {
        self.seed = seed;
        self.perlin = Perlin::new(seed);
    }

    /// The base frequency.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// The stored octave settings.
    pub fn fractal_params(&self) -> FractalParams {
        self.fractal
    }

    /// Raw 2D Perlin noise in `[-1, 1]`. Coordinates are not scaled.
    pub fn perlin_2d(&self, x: f64, z: f64) -> f64 {
        self.perlin.get([x, z]).clamp(-1.0, 1.0)
    }

    /// Raw 3D Perlin noise in `[-1, 1]`. Coordinates are not scaled.
    pub fn perlin_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        self.perlin.get([x, y, z]).clamp(-1.0, 1.0)
    }

    /// Normalised 2D fractal noise in `[-1, 1]`. Coordinates are not scaled.
    pub fn fractal_2d(&self, x: f64, z: f64, params: &FractalParams) -> f64 {
        self.fractal(params, |frequency| {
            self.perlin_2d(x * frequency, z * frequency)
        })
    }

    /// Normalised 3D fractal noise in `[-1, 1]`. Coordinates are not scaled.
    pub fn fractal_3d(&self, x: f64, y: f64, z: f64, params: &FractalParams) -> f64 {
        self.fractal(params, |frequency| {
            self.perlin_3d(x * frequency, y * frequency, z * frequency)
        })
    }

    /// Fractal 2D noise at the field's base frequency and octave settings.
    pub fn sample_2d(&self, x: f64, z: f64) -> f64 {
        self.fractal_2d(x * self.frequency, z * self.frequency, &self.fractal)
    }

    /// Fractal 3D noise at the field's base frequency and octave settings.
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let f = self.frequency;
        self.fractal_3d(x * f, y * f, z * f, &self.fractal)
    }

    fn fractal(&self, params: &FractalParams, sample: impl Fn(f64) -> f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..params.octaves.max(1) {
            total += sample(frequency) * amplitude;
            max_value += amplitude;
            amplitude *= params.persistence;
            frequency *= params.lacunarity;
        }

        (total / max_value).clamp(-1.0, 1.0)
    }
}
