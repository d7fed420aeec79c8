//! ONNX Runtime backend for exported tabular regressors.

use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use super::inference::Regressor;
use crate::error::{PsiError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};

/// Regressor exported to ONNX, input `[N, 9]` f32
pub struct OnnxRegressor {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxRegressor {
    pub fn load(path: &Path) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| PsiError::Model(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PsiError::Model(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| PsiError::Model(format!("Failed to load ONNX model {}: {}", path.display(), e)))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| PsiError::Model("No output defined".to_string()))?;

        log::info!("ONNX model loaded, output tensor '{}'", output_name);

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let data: Vec<f32> = rows
            .iter()
            .flat_map(|r| r.values.iter().map(|&v| v as f32))
            .collect();

        let input = Array2::<f32>::from_shape_vec((rows.len(), FEATURE_COUNT), data)
            .map_err(|e| PsiError::Model(format!("Array error: {}", e)))?;

        let tensor = Value::from_array(input)
            .map_err(|e| PsiError::Model(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| PsiError::Model(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| PsiError::Model("No output".to_string()))?;

        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PsiError::Model(format!("Extract error: {}", e)))?;

        Ok(values.iter().map(|&v| f64::from(v)).collect())
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load_regressor;

    #[test]
    fn test_load_rejects_invalid_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not a model").unwrap();

        let err = OnnxRegressor::load(&path).err().unwrap();
        assert!(matches!(err, PsiError::Model(_)));
        assert!(err.to_string().contains("Failed to load ONNX model"));
    }

    #[test]
    fn test_onnx_extension_selects_onnx_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not a model").unwrap();

        let err = load_regressor(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to load ONNX model"));
    }
}
