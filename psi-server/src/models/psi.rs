//! PSI request/response models

use psi_core::SafetyFeatures;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::{AppError, AppResult};

/// Full feature set; `lat`/`lng` are model inputs here, not lookup keys
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub crime_rate: f64,
    pub light_level: f64,
    pub crowd_density: f64,
    #[serde(deserialize_with = "integral_count")]
    pub sos_count: i64,
    pub time_risk: f64,
    pub user_rating: f64,
    pub sentiment_score: f64,
    pub lat: f64,
    pub lng: f64,
}

/// Accepts `3` and `3.0`, rejects `3.5`
fn integral_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Int(i64),
        Float(f64),
    }

    match Count::deserialize(deserializer)? {
        Count::Int(n) => Ok(n),
        Count::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
            Ok(f as i64)
        }
        Count::Float(f) => Err(D::Error::custom(format!("expected an integer count, got {}", f))),
    }
}

impl From<PredictRequest> for SafetyFeatures {
    fn from(req: PredictRequest) -> Self {
        SafetyFeatures {
            crime_rate: req.crime_rate,
            light_level: req.light_level,
            crowd_density: req.crowd_density,
            sos_count: req.sos_count,
            time_risk: req.time_risk,
            user_rating: req.user_rating,
            sentiment_score: req.sentiment_score,
            lat: req.lat,
            lng: req.lng,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsiScoreResponse {
    pub psi_score: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

/// Candidate routes, each a list of `[lat, lng]` pairs
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRequest {
    pub routes: Vec<Vec<[f64; 2]>>,
}

impl RouteRequest {
    /// Range-check every point; emptiness is checked by the engine
    pub fn validate_points(&self) -> AppResult<()> {
        for (r, route) in self.routes.iter().enumerate() {
            for (p, &[lat, lng]) in route.iter().enumerate() {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err(AppError::ValidationError(format!(
                        "Route {} point {} is out of range: [{}, {}]",
                        r, p, lat, lng
                    )));
                }
            }
        }
        Ok(())
    }
}
