//! Tunable collision-detection parameters

use serde::{Deserialize, Serialize};

/// Collision detection settings
///
/// All values have working defaults; construct with `CollisionSettings::default()`
/// and override individual fields as needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionSettings {
    /// Safety envelope added around every shape's AABB, in world units.
    ///
    /// Lets the broadphase surface pairs slightly before they touch, so
    /// the solver sees contacts the step they form rather than one step
    /// late. The closed-form narrow-phase routines also detect within this
    /// envelope and may report small negative depths.
    pub envelope: f32,

    /// Maximum separation at which a contact is still reported.
    ///
    /// Contacts with `depth < -separation_tolerance` are dropped. With the
    /// default of `0.0`, only touching or penetrating contacts survive.
    pub separation_tolerance: f32,

    /// Scale factor applied to the mean shape extent when choosing the
    /// broadphase grid cell size. Larger values mean coarser grids.
    pub cell_size_factor: f32,

    /// Upper bound on the number of grid cells along each axis.
    pub max_bins_per_axis: u32,

    /// Effective contact curvature radius reported for contacts between
    /// flat-faced shapes (cuboids, hulls, meshes), which have no radius of
    /// their own.
    pub default_curvature_radius: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            envelope: 0.01,
            separation_tolerance: 0.0,
            cell_size_factor: 1.0,
            max_bins_per_axis: 64,
            default_curvature_radius: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = CollisionSettings::default();
        assert!(settings.envelope >= 0.0);
        assert!(settings.separation_tolerance >= 0.0);
        assert!(settings.cell_size_factor > 0.0);
        assert!(settings.max_bins_per_axis >= 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let settings = CollisionSettings {
            envelope: 0.05,
            max_bins_per_axis: 32,
            ..Default::default()
        };
        let text = ron::to_string(&settings).unwrap();
        let back: CollisionSettings = ron::from_str(&text).unwrap();
        assert_eq!(back.envelope, settings.envelope);
        assert_eq!(back.max_bins_per_axis, settings.max_bins_per_axis);
    }
}
