//! Model Module - scaler and regressor backends

pub mod inference;
pub mod scaler;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use inference::{
    check_predictions, checksum, load_regressor, GbdtRegressor, ModelMetadata, Regressor,
};
pub use scaler::StandardScaler;
