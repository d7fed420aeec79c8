//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the model input schema.**
//!
//! The scaler and the model are fit against this exact column order, so the
//! persisted artifacts carry `FEATURE_VERSION` and the layout hash and are
//! rejected at load time when they no longer match.
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::PsiError;

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Regional context (0-6), filled from the nearest historical row ===
    "crime_rate",       // 0: Reported crime rate for the area
    "light_level",      // 1: Street lighting level
    "crowd_density",    // 2: Typical crowd density
    "sos_count",        // 3: Number of SOS alerts raised nearby
    "time_risk",        // 4: Time-of-day risk factor
    "user_rating",      // 5: Community safety rating
    "sentiment_score",  // 6: Sentiment of user feedback

    // === Location (7-8) ===
    "lat",              // 7: Latitude in degrees
    "lng",              // 8: Longitude in degrees
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 9;

/// Number of leading features taken from historical context
pub const CONTEXT_FEATURE_COUNT: usize = 7;

/// Index of latitude in the vector
pub const LAT_INDEX: usize = 7;

/// Index of longitude in the vector
pub const LNG_INDEX: usize = 8;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Validate that a persisted artifact matches the current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), PsiError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(PsiError::LayoutMismatch {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Get feature name by index
pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_COUNT, 9);
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_location_indices() {
        assert_eq!(feature_index("lat"), Some(LAT_INDEX));
        assert_eq!(feature_index("lng"), Some(LNG_INDEX));
        assert_eq!(LAT_INDEX, CONTEXT_FEATURE_COUNT);
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(compute_layout_hash(), compute_layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(FEATURE_VERSION, layout_hash()).is_ok());
        assert!(validate_layout(FEATURE_VERSION + 1, layout_hash()).is_err());
        assert!(validate_layout(FEATURE_VERSION, layout_hash().wrapping_add(1)).is_err());
    }

    #[test]
    fn test_feature_lookup() {
        assert_eq!(feature_index("crime_rate"), Some(0));
        assert_eq!(feature_index("sentiment_score"), Some(6));
        assert_eq!(feature_index("area"), None);
        assert_eq!(feature_name(3), Some("sos_count"));
        assert_eq!(feature_name(9), None);
    }

    #[test]
    fn test_layout_info() {
        let info = LayoutInfo::current();
        assert_eq!(info.version, FEATURE_VERSION);
        assert_eq!(info.feature_names.len(), FEATURE_COUNT);
        assert_eq!(info.feature_names[0], "crime_rate");
    }
}
