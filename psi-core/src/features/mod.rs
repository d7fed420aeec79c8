//! Features Module - model input schema and vectors

pub mod layout;
pub mod vector;

pub use layout::{
    feature_index, feature_name, layout_hash, validate_layout, LayoutInfo,
    CONTEXT_FEATURE_COUNT, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION,
};
pub use vector::{FeatureVector, SafetyFeatures};
