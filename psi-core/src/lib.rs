//! Suraksha PSI Engine - core library
//!
//! Personal Safety Index scoring: a pretrained tree ensemble behind a
//! standard scaler, with regional context filled in from the nearest row of a
//! historical dataset.
//!
//! # Modules
//!
//! - [`features`]: model input layout and vectors
//! - [`model`]: scaler and regressor backends
//! - [`spatial`]: historical dataset and nearest-neighbor index
//! - [`engine`]: location, route and safest-route scoring
//! - [`training`]: offline fit and evaluation used by `psi-train`

pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod spatial;
pub mod training;

pub use engine::{EngineStatus, LocationPsi, PointScore, PsiEngine, RouteScore, SafestRoute};
pub use error::{PsiError, Result};
pub use features::{FeatureVector, LayoutInfo, SafetyFeatures};
pub use model::{ModelMetadata, Regressor, StandardScaler};
pub use spatial::{HistoricalDataset, HistoricalRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
