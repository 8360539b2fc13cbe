//! Collision family system for filtering collision detection
//!
//! Based on Game Engine Architecture 3rd Edition, Section 13.3.8:
//! "Most games need to filter collisions... This is typically done via
//! collision layers or groups."
//!
//! Every registered shape belongs to one family (a bit) and carries a mask
//! of the families it is allowed to collide with. Broadphase drops pairs
//! whose families do not mutually accept each other, before any geometry
//! is touched.

/// Collision family definitions and mask helpers
pub struct CollisionFamilies;

impl CollisionFamilies {
    /// No collision family
    pub const NONE: u32 = 0;

    /// All collision families
    pub const ALL: u32 = 0xFFFF_FFFF;

    /// The default family assigned by [`crate::CollisionSystem::add`]
    pub const DEFAULT: u32 = 1 << 0;

    /// The bit for family `n` (0-31)
    ///
    /// # Panics
    /// Panics if `n` is 32 or larger.
    pub fn family(n: u32) -> u32 {
        assert!(n < 32, "collision family index out of range: {n}");
        1 << n
    }

    /// Check if two shapes should collide based on their families and masks
    ///
    /// Both directions must accept: A's family must be in B's mask and B's
    /// family must be in A's mask.
    pub fn should_collide(family_a: u32, mask_a: u32, family_b: u32, mask_b: u32) -> bool {
        (family_a & mask_b) != 0 && (family_b & mask_a) != 0
    }

    /// Helper to create a mask from multiple families
    pub fn mask(families: &[u32]) -> u32 {
        families.iter().fold(0, |acc, &family| acc | family)
    }
}
