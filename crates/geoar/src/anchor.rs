//! Geographic anchor of the tileset and the policy that chooses it.

use crate::sensor::GeoFix;

/// Where the tileset's local origin sits on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoAnchor {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoAnchor {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<GeoFix> for GeoAnchor {
    fn from(fix: GeoFix) -> Self {
        Self::new(fix.latitude, fix.longitude)
    }
}

/// How the anchor is chosen from incoming fixes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AnchorPolicy {
    /// Anchor at the first valid fix and never move.
    #[default]
    FirstFix,
    /// Re-anchor on every fix.
    Follow,
    /// Anchor at a fixed location once the first fix arrives.
    Fixed { latitude: f64, longitude: f64 },
}

impl AnchorPolicy {
    /// The anchor this policy derives from a fix.
    pub fn anchor_for(&self, fix: &GeoFix) -> GeoAnchor {
        match *self {
            Self::FirstFix | Self::Follow => GeoAnchor::from(*fix),
            Self::Fixed {
                latitude,
                longitude,
            } => GeoAnchor::new(latitude, longitude),
        }
    }

    /// True if later fixes move the anchor.
    pub fn follows_fixes(&self) -> bool {
        matches!(self, Self::Follow)
    }
}

/// Single-assignment anchor latch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AnchorState {
    #[default]
    Unanchored,
    Anchored(GeoAnchor),
}

impl AnchorState {
    /// Latch `anchor` if nothing is latched yet. Returns true if it was latched.
    pub fn try_anchor(&mut self, anchor: GeoAnchor) -> bool {
        match self {
            Self::Unanchored => {
                *self = Self::Anchored(anchor);
                true
            }
            Self::Anchored(_) => false,
        }
    }

    /// Move an existing anchor. Has no effect while unanchored.
    pub fn relocate(&mut self, anchor: GeoAnchor) -> bool {
        match self {
            Self::Anchored(current) if *current != anchor => {
                *current = anchor;
                true
            }
            _ => false,
        }
    }

    pub fn anchor(&self) -> Option<GeoAnchor> {
        match self {
            Self::Unanchored => None,
            Self::Anchored(anchor) => Some(*anchor),
        }
    }

    pub fn is_anchored(&self) -> bool {
        matches!(self, Self::Anchored(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_is_single_assignment() {
        let mut state = AnchorState::default();
        assert!(state.try_anchor(GeoAnchor::new(1.0, 2.0)));
        assert!(!state.try_anchor(GeoAnchor::new(3.0, 4.0)));
        assert_eq!(state.anchor(), Some(GeoAnchor::new(1.0, 2.0)));
    }

    #[test]
    fn test_relocate_requires_anchor() {
        let mut state = AnchorState::default();
        assert!(!state.relocate(GeoAnchor::new(1.0, 2.0)));
        assert!(!state.is_anchored());

        state.try_anchor(GeoAnchor::new(1.0, 2.0));
        assert!(!state.relocate(GeoAnchor::new(1.0, 2.0)));
        assert!(state.relocate(GeoAnchor::new(5.0, 6.0)));
        assert_eq!(state.anchor(), Some(GeoAnchor::new(5.0, 6.0)));
    }

    #[test]
    fn test_fixed_policy_ignores_fix_position() {
        let policy = AnchorPolicy::Fixed {
            latitude: 10.0,
            longitude: 20.0,
        };
        let anchor = policy.anchor_for(&GeoFix::new(51.0, -0.7, 5.0));
        assert_eq!(anchor, GeoAnchor::new(10.0, 20.0));
        assert!(!policy.follows_fixes());
        assert!(AnchorPolicy::Follow.follows_fixes());
    }
}
