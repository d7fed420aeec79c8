//! PSI scoring engine
//!
//! Owns the regressor, the scaler, the historical dataset and its spatial
//! index. Everything is immutable after construction, so one engine is shared
//! read-only by all requests.
//!
//! ```text
//! (lat, lng) ──► KdTree ──► nearest historical row
//!                               │ copy context features, substitute lat/lng
//!                               ▼
//!                         StandardScaler ──► Regressor ──► psi
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{PsiError, Result};
use crate::features::{FeatureVector, LayoutInfo, SafetyFeatures};
use crate::model::{check_predictions, load_regressor, ModelMetadata, Regressor, StandardScaler};
use crate::spatial::{HistoricalDataset, HistoricalRecord, KdTree};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Score for a bare coordinate, with the historical row that supplied context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPsi {
    pub area: String,
    pub psi_score: f64,
    pub nearest_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointScore {
    pub lat: f64,
    pub lng: f64,
    pub psi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteScore {
    pub avg_score: f64,
    pub segments: Vec<PointScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafestRoute {
    pub best_route_index: usize,
    pub safest_psi: f64,
    pub heatmap_data: Vec<PointScore>,
    /// Average score of every candidate, in request order
    pub route_scores: Vec<f64>,
}

/// Engine status for the info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model: ModelMetadata,
    pub layout: LayoutInfo,
    pub dataset_rows: usize,
    pub inference_count: u64,
    pub rows_scored: u64,
    pub avg_latency_ms: f64,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct PsiEngine {
    regressor: Box<dyn Regressor>,
    metadata: ModelMetadata,
    scaler: StandardScaler,
    dataset: HistoricalDataset,
    index: KdTree,
    inference_count: AtomicU64,
    rows_scored: AtomicU64,
    latency_sum_us: AtomicU64,
}

impl PsiEngine {
    pub fn new(
        regressor: Box<dyn Regressor>,
        metadata: ModelMetadata,
        scaler: StandardScaler,
        dataset: HistoricalDataset,
    ) -> Self {
        let index = KdTree::build(dataset.coordinates());
        log::debug!("Spatial index built over {} points", index.len());

        Self {
            regressor,
            metadata,
            scaler,
            dataset,
            index,
            inference_count: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
        }
    }

    /// Load model, scaler and dataset from disk
    pub fn load(
        model_path: impl AsRef<Path>,
        scaler_path: impl AsRef<Path>,
        dataset_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let (regressor, metadata) = load_regressor(model_path)?;
        let scaler = StandardScaler::load(scaler_path)?;
        let dataset = HistoricalDataset::from_csv(dataset_path)?;

        Ok(Self::new(regressor, metadata, scaler, dataset))
    }

    /// Score a full feature set
    pub fn predict(&self, features: &SafetyFeatures) -> Result<f64> {
        let vector = features.to_vector();
        if !vector.is_finite() {
            return Err(PsiError::Validation("feature values must be finite".to_string()));
        }
        log::debug!("Scoring feature set {}", vector.to_log_entry());

        let scores = self.predict_rows(&[vector])?;
        Ok(scores[0])
    }

    /// Score a bare coordinate using the nearest historical row as context
    pub fn location_psi(&self, lat: f64, lng: f64) -> Result<LocationPsi> {
        let (vector, record, distance) = self.context_for(lat, lng)?;
        let scores = self.predict_rows(&[vector])?;

        Ok(LocationPsi {
            area: record.area.clone(),
            psi_score: scores[0],
            nearest_distance: distance,
        })
    }

    /// Score every point of a route and average
    pub fn score_route(&self, points: &[[f64; 2]]) -> Result<RouteScore> {
        if points.is_empty() {
            return Err(PsiError::Validation("Route has no points".to_string()));
        }

        let segments = self.score_points(points)?;
        Ok(RouteScore {
            avg_score: average(&segments),
            segments,
        })
    }

    /// Pick the route with the highest average score; the first one wins ties
    pub fn safest_route(&self, routes: &[Vec<[f64; 2]>]) -> Result<SafestRoute> {
        if routes.is_empty() {
            return Err(PsiError::Validation("No routes provided".to_string()));
        }
        if let Some(i) = routes.iter().position(|r| r.is_empty()) {
            return Err(PsiError::Validation(format!("Route {} has no points", i)));
        }

        // One model call for all points of all routes
        let all_points: Vec<[f64; 2]> = routes.iter().flatten().copied().collect();
        let mut scored = self.score_points(&all_points)?.into_iter();

        let mut route_details = Vec::with_capacity(routes.len());
        for route in routes {
            let segments: Vec<PointScore> = scored.by_ref().take(route.len()).collect();
            route_details.push(RouteScore {
                avg_score: average(&segments),
                segments,
            });
        }

        let mut best_index = 0;
        for (i, route) in route_details.iter().enumerate() {
            if route.avg_score > route_details[best_index].avg_score {
                best_index = i;
            }
        }

        let route_scores = route_details.iter().map(|r| r.avg_score).collect();
        let best = route_details.swap_remove(best_index);

        log::debug!(
            "Safest of {} routes: #{} (avg psi {:.3})",
            routes.len(),
            best_index,
            best.avg_score
        );

        Ok(SafestRoute {
            best_route_index: best_index,
            safest_psi: best.avg_score,
            heatmap_data: best.segments,
            route_scores,
        })
    }

    pub fn status(&self) -> EngineStatus {
        let count = self.inference_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f64 / count as f64) / 1000.0 } else { 0.0 };

        EngineStatus {
            model: self.metadata.clone(),
            layout: LayoutInfo::current(),
            dataset_rows: self.dataset.len(),
            inference_count: count,
            rows_scored: self.rows_scored.load(Ordering::Relaxed),
            avg_latency_ms: avg,
        }
    }

    pub fn dataset(&self) -> &HistoricalDataset {
        &self.dataset
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    // ------------------------------------------------------------------------

    /// Scale, predict and validate a batch of raw rows
    fn predict_rows(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        let start = Instant::now();

        let scaled = self.scaler.transform_batch(rows);
        let predictions = self.regressor.predict(&scaled)?;
        check_predictions(rows.len(), &predictions)?;

        self.latency_sum_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.rows_scored.fetch_add(rows.len() as u64, Ordering::Relaxed);

        Ok(predictions)
    }

    fn context_for(&self, lat: f64, lng: f64) -> Result<(FeatureVector, &HistoricalRecord, f64)> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(PsiError::Validation("coordinates must be finite".to_string()));
        }

        let neighbor = self.index.nearest([lat, lng]).ok_or(PsiError::EmptyDataset)?;
        let record = self
            .dataset
            .record(neighbor.index)
            .ok_or_else(|| PsiError::InvalidData(format!("no dataset row {}", neighbor.index)))?;

        Ok((record.feature_vector().with_location(lat, lng), record, neighbor.distance))
    }

    fn score_points(&self, points: &[[f64; 2]]) -> Result<Vec<PointScore>> {
        let mut rows = Vec::with_capacity(points.len());
        for &[lat, lng] in points {
            let (vector, _, _) = self.context_for(lat, lng)?;
            rows.push(vector);
        }

        let scores = self.predict_rows(&rows)?;
        Ok(points
            .iter()
            .zip(scores)
            .map(|(&[lat, lng], psi)| PointScore { lat, lng, psi })
            .collect())
    }
}

fn average(segments: &[PointScore]) -> f64 {
    segments.iter().map(|s| s.psi).sum::<f64>() / segments.len() as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// psi = 100 * (1 - crime_rate), after scaling
    struct CrimeStub;

    impl Regressor for CrimeStub {
        fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
            Ok(rows.iter().map(|r| 100.0 * (1.0 - r.values[0])).collect())
        }

        fn name(&self) -> &'static str {
            "crime-stub"
        }
    }

    /// psi = latitude fed to the model
    struct LatStub;

    impl Regressor for LatStub {
        fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
            Ok(rows.iter().map(|r| r.values[7]).collect())
        }

        fn name(&self) -> &'static str {
            "lat-stub"
        }
    }

    /// Always returns a single score
    struct ShortStub;

    impl Regressor for ShortStub {
        fn predict(&self, _rows: &[FeatureVector]) -> Result<Vec<f64>> {
            Ok(vec![1.0])
        }

        fn name(&self) -> &'static str {
            "short-stub"
        }
    }

    fn record(area: &str, crime_rate: f64, lat: f64, lng: f64) -> HistoricalRecord {
        HistoricalRecord {
            area: area.to_string(),
            crime_rate,
            light_level: 0.5,
            crowd_density: 0.5,
            sos_count: 2.0,
            time_risk: 0.3,
            user_rating: 3.5,
            sentiment_score: 0.0,
            lat,
            lng,
            feedback_text: None,
            psi_score: None,
        }
    }

    fn dataset() -> HistoricalDataset {
        HistoricalDataset::new(vec![
            record("Swargate", 0.9, 18.50, 73.80),
            record("Baner", 0.1, 18.60, 73.90),
            record("Deccan", 0.5, 18.55, 73.85),
        ])
        .unwrap()
    }

    fn metadata(backend: &str) -> ModelMetadata {
        ModelMetadata {
            backend: backend.to_string(),
            model_path: "<memory>".to_string(),
            checksum: String::new(),
            size_bytes: 0,
            loaded_at: Utc::now(),
        }
    }

    fn engine(regressor: Box<dyn Regressor>) -> PsiEngine {
        let name = regressor.name();
        PsiEngine::new(regressor, metadata(name), StandardScaler::identity(), dataset())
    }

    fn features(crime_rate: f64) -> SafetyFeatures {
        SafetyFeatures {
            crime_rate,
            light_level: 0.5,
            crowd_density: 0.5,
            sos_count: 1,
            time_risk: 0.2,
            user_rating: 4.0,
            sentiment_score: 0.1,
            lat: 18.52,
            lng: 73.85,
        }
    }

    #[test]
    fn test_predict_uses_full_feature_set() {
        let engine = engine(Box::new(CrimeStub));
        let psi = engine.predict(&features(0.25)).unwrap();
        assert!((psi - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_applies_scaler() {
        let mut scaler = StandardScaler::identity();
        scaler.mean[0] = 0.5;
        scaler.scale[0] = 0.5;
        let engine = PsiEngine::new(Box::new(CrimeStub), metadata("crime-stub"), scaler, dataset());

        // (0.9 - 0.5) / 0.5 = 0.8
        let psi = engine.predict(&features(0.9)).unwrap();
        assert!((psi - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_rejects_non_finite() {
        let engine = engine(Box::new(CrimeStub));
        let err = engine.predict(&features(f64::NAN)).unwrap_err();
        assert!(matches!(err, PsiError::Validation(_)));
    }

    #[test]
    fn test_location_psi_uses_nearest_row() {
        let engine = engine(Box::new(CrimeStub));
        let result = engine.location_psi(18.501, 73.801).unwrap();

        assert_eq!(result.area, "Swargate");
        assert!((result.psi_score - 10.0).abs() < 1e-9);
        assert!((result.nearest_distance - (2.0f64 * 0.001 * 0.001).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_location_psi_substitutes_query_coordinates() {
        let engine = engine(Box::new(LatStub));
        let result = engine.location_psi(18.59, 73.91).unwrap();

        assert_eq!(result.area, "Baner");
        assert_eq!(result.psi_score, 18.59);
    }

    #[test]
    fn test_score_route_averages_points() {
        let engine = engine(Box::new(CrimeStub));
        let route = engine.score_route(&[[18.50, 73.80], [18.55, 73.85]]).unwrap();

        assert_eq!(route.segments.len(), 2);
        assert_eq!(route.segments[1].lat, 18.55);
        assert!((route.avg_score - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_safest_route_picks_highest_average() {
        let engine = engine(Box::new(CrimeStub));
        let routes = vec![
            vec![[18.50, 73.80], [18.55, 73.85]],
            vec![[18.60, 73.90], [18.61, 73.91], [18.59, 73.89]],
            vec![[18.55, 73.85]],
        ];

        let result = engine.safest_route(&routes).unwrap();
        assert_eq!(result.best_route_index, 1);
        assert!((result.safest_psi - 90.0).abs() < 1e-9);
        assert_eq!(result.heatmap_data.len(), 3);
        assert_eq!(result.heatmap_data[2].lng, 73.89);
        assert_eq!(result.route_scores.len(), 3);
        assert!((result.route_scores[0] - 30.0).abs() < 1e-9);
        assert!((result.route_scores[2] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_safest_route_first_wins_ties() {
        let engine = engine(Box::new(CrimeStub));
        let route = vec![[18.55, 73.85]];
        let result = engine.safest_route(&[route.clone(), route]).unwrap();
        assert_eq!(result.best_route_index, 0);
    }

    #[test]
    fn test_safest_route_validation() {
        let engine = engine(Box::new(CrimeStub));

        let err = engine.safest_route(&[]).unwrap_err();
        assert_eq!(err.to_string(), "No routes provided");

        let err = engine.safest_route(&[vec![[18.5, 73.8]], vec![]]).unwrap_err();
        assert_eq!(err.to_string(), "Route 1 has no points");
    }

    #[test]
    fn test_wrong_prediction_count_is_model_error() {
        let engine = engine(Box::new(ShortStub));
        let err = engine.score_route(&[[18.5, 73.8], [18.6, 73.9]]).unwrap_err();
        assert!(matches!(err, PsiError::Model(_)));
    }

    #[test]
    fn test_status_tracks_usage() {
        let engine = engine(Box::new(CrimeStub));
        engine.location_psi(18.5, 73.8).unwrap();
        engine.score_route(&[[18.5, 73.8], [18.6, 73.9]]).unwrap();

        let status = engine.status();
        assert_eq!(status.model.backend, "crime-stub");
        assert_eq!(status.dataset_rows, 3);
        assert_eq!(status.inference_count, 2);
        assert_eq!(status.rows_scored, 3);
    }
}
