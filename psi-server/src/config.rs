//! Configuration module

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Trained model (`.onnx` selects the ONNX backend)
    pub model_path: String,

    /// Fitted scaler JSON
    pub scaler_path: String,

    /// Historical dataset CSV used for context lookup
    pub dataset_path: String,

    /// Environment (development, production)
    pub environment: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            model_path: lookup("PSI_MODEL_PATH")
                .unwrap_or_else(|| "suraksha_psi_model.json".to_string()),

            scaler_path: lookup("PSI_SCALER_PATH")
                .unwrap_or_else(|| "scaler.json".to_string()),

            dataset_path: lookup("PSI_DATASET_PATH")
                .unwrap_or_else(|| "suraksha_pune_dataset_with_coords.csv".to_string()),

            environment: lookup("ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),

            log_format: lookup("LOG_FORMAT")
                .unwrap_or_else(|| "pretty".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
