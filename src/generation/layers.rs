//! # Column Profile
//!
//! Maps a normalized terrain height to the voxel types of a column.
//!
//! A profile is an ordered list of [`LayerRule`]s. Together the rules must
//! cover `[0, 1]` exactly: the first starts at 0, the last ends at 1, each rule
//! starts where the previous one ends and every range is non-empty. A table
//! that breaks any of these is replaced by the built-in default when the
//! generator is constructed, so a bad config can never fail generation.
//!
//! ## Column Layout
//! ```text
//! depth 0       surface type picked by the layer rules
//! depth 1..=3   dirt (sand under a sand surface)
//! deeper        stone
//! y = 0         bedrock
//! ```

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::voxels::block::VoxelType;

/// Depth below the surface down to which subsurface soil is placed.
pub const SUBSURFACE_DEPTH: i32 = 3;

const RANGE_EPSILON: f32 = 1e-6;

/// A normalized height range and the surface voxel used inside it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRule {
    /// Inclusive lower bound.
    pub min_height: f32,
    /// Exclusive upper bound (inclusive for the last rule).
    pub max_height: f32,
    /// Surface voxel for columns in this range.
    pub voxel: VoxelType,
}

impl LayerRule {
    /// Creates a new layer rule.
    pub const fn new(min_height: f32, max_height: f32, voxel: VoxelType) -> Self {
        LayerRule {
            min_height,
            max_height,
            voxel,
        }
    }
}

/// The built-in layering used when no valid table is configured.
pub fn default_layer_rules() -> Vec<LayerRule> {
    vec![
        LayerRule::new(0.0, 0.3, VoxelType::Sand),
        LayerRule::new(0.3, 0.4, VoxelType::Dirt),
        LayerRule::new(0.4, 0.7, VoxelType::Grass),
        LayerRule::new(0.7, 0.9, VoxelType::Stone),
        LayerRule::new(0.9, 1.0, VoxelType::Snow),
    ]
}

/// Checks that a rule table covers `[0, 1]` without gaps or overlaps.
///
/// # Errors
/// `TerrainError::MalformedLayerConfig` describing the first problem found.
pub fn validate_layer_rules(rules: &[LayerRule]) -> TerrainResult<()> {
    let first = rules
        .first()
        .ok_or_else(|| TerrainError::MalformedLayerConfig("no layer rules".to_string()))?;
    if first.min_height.abs() > RANGE_EPSILON {
        return Err(TerrainError::MalformedLayerConfig(format!(
            "first rule starts at {} instead of 0",
            first.min_height
        )));
    }

    for (i, rule) in rules.iter().enumerate() {
        if !(rule.min_height < rule.max_height) {
            return Err(TerrainError::MalformedLayerConfig(format!(
                "rule {} has empty range [{}, {})",
                i, rule.min_height, rule.max_height
            )));
        }
        if let Some(next) = rules.get(i + 1) {
            let gap = next.min_height - rule.max_height;
            if gap > RANGE_EPSILON {
                return Err(TerrainError::MalformedLayerConfig(format!(
                    "gap between {} and {}",
                    rule.max_height, next.min_height
                )));
            }
            if gap < -RANGE_EPSILON {
                return Err(TerrainError::MalformedLayerConfig(format!(
                    "rules {} and {} overlap",
                    i,
                    i + 1
                )));
            }
        }
    }

    // `first` exists, so `last` does too.
    let last_max = rules.last().map_or(1.0, |rule| rule.max_height);
    if (last_max - 1.0).abs() > RANGE_EPSILON {
        return Err(TerrainError::MalformedLayerConfig(format!(
            "last rule ends at {} instead of 1",
            last_max
        )));
    }
    Ok(())
}

/// Validated layering rules for column filling.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnProfile {
    rules: Vec<LayerRule>,
}

impl Default for ColumnProfile {
    fn default() -> Self {
        ColumnProfile {
            rules: default_layer_rules(),
        }
    }
}

impl ColumnProfile {
    /// Creates a profile from a validated rule table.
    ///
    /// # Errors
    /// `TerrainError::MalformedLayerConfig` if the table does not cover `[0, 1]`.
    pub fn new(rules: Vec<LayerRule>) -> TerrainResult<Self> {
        validate_layer_rules(&rules)?;
        Ok(ColumnProfile { rules })
    }

    /// Creates a profile, falling back to the default table with a warning
    /// when `rules` is malformed.
    pub fn or_default(rules: Vec<LayerRule>) -> Self {
        match ColumnProfile::new(rules) {
            Ok(profile) => profile,
            Err(err) => {
                warn!("{}; using default layer rules", err);
                ColumnProfile::default()
            }
        }
    }

    /// The rules in selection order.
    pub fn rules(&self) -> &[LayerRule] {
        &self.rules
    }

    /// Picks the surface voxel for a normalized height.
    ///
    /// The first rule with `min <= h < max` wins. Heights are clamped to
    /// `[0, 1]` and `h = 1` selects the last rule.
    pub fn surface_type(&self, normalized_height: f32) -> VoxelType {
        let h = if normalized_height.is_nan() {
            0.0
        } else {
            normalized_height.clamp(0.0, 1.0)
        };

        self.rules
            .iter()
            .find(|rule| rule.min_height <= h && h < rule.max_height)
            .or_else(|| self.rules.last())
            .map_or(VoxelType::Stone, |rule| rule.voxel)
    }

    /// The voxel at `depth` below a surface of type `surface`.
    pub fn voxel_at_depth(surface: VoxelType, depth: i32) -> VoxelType {
        match depth {
            0 => surface,
            d if d <= SUBSURFACE_DEPTH => {
                if surface == VoxelType::Sand {
                    VoxelType::Sand
                } else {
                    VoxelType::Dirt
                }
            }
            _ => VoxelType::Stone,
        }
    }

    /// The voxel at world height `y` in a column whose surface is at
    /// `surface_height`. Above the surface this is always air.
    pub fn column_voxel(&self, y: i32, surface_height: i32, normalized_height: f32) -> VoxelType {
        if y > surface_height {
            return VoxelType::Air;
        }
        if y == 0 {
            return VoxelType::Bedrock;
        }
        Self::voxel_at_depth(self.surface_type(normalized_height), surface_height - y)
    }
}
