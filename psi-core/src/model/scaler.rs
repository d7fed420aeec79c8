//! Standard scaler fit at training time and applied before every prediction.

use std::path::Path;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PsiError, Result};
use crate::features::{
    feature_name, layout_hash, validate_layout, FeatureVector, FEATURE_COUNT, FEATURE_VERSION,
};

/// Per-column standardization: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub layout_version: u8,
    pub layout_hash: u32,
    pub mean: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Identity transform
    pub fn identity() -> Self {
        Self {
            layout_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            mean: [0.0; FEATURE_COUNT],
            scale: [1.0; FEATURE_COUNT],
        }
    }

    /// Fit mean and population standard deviation per column.
    /// Constant columns get a scale of 1.0.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self> {
        if rows.is_empty() {
            return Err(PsiError::EmptyDataset);
        }

        let flat: Vec<f64> = rows.iter().flat_map(|r| r.values).collect();
        let matrix = Array2::from_shape_vec((rows.len(), FEATURE_COUNT), flat)
            .map_err(|e| PsiError::InvalidData(format!("feature matrix: {}", e)))?;

        let means = matrix.mean_axis(Axis(0)).ok_or(PsiError::EmptyDataset)?;
        let stds = matrix.std_axis(Axis(0), 0.0);

        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            mean[i] = means[i];
            if stds[i] > 0.0 && stds[i].is_finite() {
                scale[i] = stds[i];
            }
        }

        let scaler = Self {
            layout_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            mean,
            scale,
        };
        scaler.check()?;
        Ok(scaler)
    }

    pub fn transform(&self, vector: &FeatureVector) -> FeatureVector {
        let mut scaled = [0.0; FEATURE_COUNT];
        for (i, value) in vector.values.iter().enumerate() {
            scaled[i] = (value - self.mean[i]) / self.scale[i];
        }
        FeatureVector::from_values(scaled)
    }

    pub fn transform_batch(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Load from JSON and validate against the current layout
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| PsiError::io(path, e))?;
        let scaler: StandardScaler = serde_json::from_str(&raw)?;

        validate_layout(scaler.layout_version, scaler.layout_hash)?;
        scaler.check()?;

        log::info!("Scaler loaded from {}", path.display());
        Ok(scaler)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| PsiError::io(path, e))
    }

    fn check(&self) -> Result<()> {
        for i in 0..FEATURE_COUNT {
            let name = feature_name(i).unwrap_or("?");
            if !self.mean[i].is_finite() {
                return Err(PsiError::InvalidData(format!("scaler mean for {} is not finite", name)));
            }
            if !self.scale[i].is_finite() || self.scale[i] == 0.0 {
                return Err(PsiError::InvalidData(format!(
                    "scaler scale for {} must be finite and non-zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::identity()
    }
}
