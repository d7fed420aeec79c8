//! Feature Vector - Core data structure for model input
//!
//! Values are stored in the order defined by `FEATURE_LAYOUT`.

use serde::{Deserialize, Serialize};

use super::layout::{FEATURE_COUNT, FEATURE_LAYOUT, LAT_INDEX, LNG_INDEX};

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Model input row in layout order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create a zeroed feature vector
    pub fn new() -> Self {
        Self { values: [0.0; FEATURE_COUNT] }
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Copy of this vector with the location features replaced
    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.values[LAT_INDEX] = lat;
        self.values[LNG_INDEX] = lng;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Named values for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        let named: serde_json::Map<String, serde_json::Value> = FEATURE_LAYOUT
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect();
        serde_json::Value::Object(named)
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self::from_values(values)
    }
}

// ============================================================================
// SAFETY FEATURES (named form)
// ============================================================================

/// The full set of model inputs by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyFeatures {
    pub crime_rate: f64,
    pub light_level: f64,
    pub crowd_density: f64,
    pub sos_count: i64,
    pub time_risk: f64,
    pub user_rating: f64,
    pub sentiment_score: f64,
    pub lat: f64,
    pub lng: f64,
}

impl SafetyFeatures {
    pub fn to_vector(&self) -> FeatureVector {
        FeatureVector::from_values([
            self.crime_rate,
            self.light_level,
            self.crowd_density,
            self.sos_count as f64,
            self.time_risk,
            self.user_rating,
            self.sentiment_score,
            self.lat,
            self.lng,
        ])
    }
}

impl From<&SafetyFeatures> for FeatureVector {
    fn from(features: &SafetyFeatures) -> Self {
        features.to_vector()
    }
}

// ============================================================================
// TESTS
// ============================================================================
