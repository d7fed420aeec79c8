//! Inference Engine - regressor backends
//!
//! The scoring engine only sees the `Regressor` trait, so backends can be
//! swapped without touching the request path.

use std::path::Path;

use chrono::{DateTime, Utc};
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PsiError, Result};
use crate::features::FeatureVector;

// ============================================================================
// REGRESSOR TRAIT
// ============================================================================

/// A pretrained model mapping scaled feature rows to scores
pub trait Regressor: Send + Sync {
    /// One score per input row, in input order
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>>;

    /// Backend name for status reporting
    fn name(&self) -> &'static str;
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub backend: String,
    pub model_path: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// GBDT BACKEND
// ============================================================================

/// Gradient-boosted regression tree ensemble
pub struct GbdtRegressor {
    model: GBDT,
}

impl GbdtRegressor {
    pub fn from_model(model: GBDT) -> Self {
        Self { model }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model = GBDT::load_model(path_str(path)?)
            .map_err(|e| PsiError::Model(format!("Failed to load model {}: {}", path.display(), e)))?;
        Ok(Self { model })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.model
            .save_model(path_str(path)?)
            .map_err(|e| PsiError::Model(format!("Failed to save model {}: {}", path.display(), e)))
    }
}

impl Regressor for GbdtRegressor {
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let data: DataVec = rows
            .iter()
            .map(|row| Data::new_test_data(row.values.iter().map(|&v| v as f32).collect(), None))
            .collect();

        let predicted = self.model.predict(&data);
        Ok(predicted.into_iter().map(f64::from).collect())
    }

    fn name(&self) -> &'static str {
        "gbdt"
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load a model file, picking the backend from the extension
pub fn load_regressor(path: impl AsRef<Path>) -> Result<(Box<dyn Regressor>, ModelMetadata)> {
    let path = path.as_ref();
    log::info!("Loading model from: {}", path.display());

    if !path.exists() {
        return Err(PsiError::Model(format!("Model not found: {}", path.display())));
    }

    let regressor: Box<dyn Regressor> = match path.extension().and_then(|e| e.to_str()) {
        Some("onnx") => load_onnx(path)?,
        _ => Box::new(GbdtRegressor::load(path)?),
    };

    let bytes = std::fs::read(path).map_err(|e| PsiError::io(path, e))?;
    let metadata = ModelMetadata {
        backend: regressor.name().to_string(),
        model_path: path.display().to_string(),
        checksum: checksum(&bytes),
        size_bytes: bytes.len() as u64,
        loaded_at: Utc::now(),
    };

    log::info!(
        "Model loaded: backend={} sha256={} ({} bytes)",
        metadata.backend,
        metadata.checksum,
        metadata.size_bytes
    );

    Ok((regressor, metadata))
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Box<dyn Regressor>> {
    Ok(Box::new(super::onnx::OnnxRegressor::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path) -> Result<Box<dyn Regressor>> {
    Err(PsiError::Model(format!(
        "{} is an ONNX model but this build has no `onnx` feature",
        path.display()
    )))
}

/// Check that a backend returned one finite score per row
pub fn check_predictions(rows: usize, predictions: &[f64]) -> Result<()> {
    if predictions.len() != rows {
        return Err(PsiError::Model(format!(
            "expected {} predictions, got {}",
            rows,
            predictions.len()
        )));
    }
    if let Some(i) = predictions.iter().position(|p| !p.is_finite()) {
        return Err(PsiError::Model(format!("prediction {} is not finite", i)));
    }
    Ok(())
}

/// SHA-256 checksum (hex)
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| PsiError::Model(format!("non UTF-8 path: {}", path.display())))
}
