//! Offline training: scaler fit, train/test split, ensemble fit, evaluation.

use std::path::Path;

use chrono::{DateTime, Utc};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PsiError, Result};
use crate::features::{FeatureVector, LayoutInfo, FEATURE_COUNT};
use crate::model::{checksum, GbdtRegressor, Regressor, StandardScaler};
use crate::spatial::HistoricalDataset;

/// Ensemble hyper-parameters and split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub trees: usize,
    pub max_depth: u32,
    pub shrinkage: f32,
    pub min_leaf_size: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            trees: 200,
            max_depth: 12,
            shrinkage: 0.1,
            min_leaf_size: 1,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trees == 0 {
            return Err(PsiError::Validation("trees must be at least 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(PsiError::Validation("max_depth must be at least 1".to_string()));
        }
        if !(self.shrinkage > 0.0 && self.shrinkage <= 1.0) {
            return Err(PsiError::Validation("shrinkage must be in (0, 1]".to_string()));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(PsiError::Validation("test_fraction must be in [0, 1)".to_string()));
        }
        Ok(())
    }
}

/// Summary written next to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// `None` when the test split is empty
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub config: TrainingConfig,
    pub layout: LayoutInfo,
    pub model_checksum: Option<String>,
    pub trained_at: DateTime<Utc>,
}

pub struct TrainedModel {
    pub regressor: GbdtRegressor,
    pub scaler: StandardScaler,
    pub report: TrainingReport,
}

impl TrainedModel {
    /// Write model, scaler and (optionally) the report
    pub fn save(
        &mut self,
        model_path: impl AsRef<Path>,
        scaler_path: impl AsRef<Path>,
        report_path: Option<&Path>,
    ) -> Result<()> {
        let model_path = model_path.as_ref();
        self.regressor.save(model_path)?;
        self.scaler.save(scaler_path)?;

        let bytes = std::fs::read(model_path).map_err(|e| PsiError::io(model_path, e))?;
        self.report.model_checksum = Some(checksum(&bytes));

        if let Some(path) = report_path {
            let json = serde_json::to_string_pretty(&self.report)?;
            std::fs::write(path, json).map_err(|e| PsiError::io(path, e))?;
        }
        Ok(())
    }
}

/// Fit scaler and ensemble on a historical dataset with `psi_score` targets
pub fn train(dataset: &HistoricalDataset, config: &TrainingConfig) -> Result<TrainedModel> {
    config.validate()?;

    let (features, targets) = training_matrix(dataset)?;

    let scaler = StandardScaler::fit(&features)?;
    let scaled = scaler.transform_batch(&features);

    let (train_idx, test_idx) = split_indices(scaled.len(), config.test_fraction, config.seed);
    log::info!(
        "Training on {} rows, evaluating on {} rows",
        train_idx.len(),
        test_idx.len()
    );

    let mut train_data: DataVec = train_idx
        .iter()
        .map(|&i| {
            Data::new_training_data(to_f32(&scaled[i]), 1.0, targets[i] as f32, None)
        })
        .collect();

    let mut cfg = Config::new();
    cfg.set_feature_size(FEATURE_COUNT);
    cfg.set_max_depth(config.max_depth);
    cfg.set_iterations(config.trees);
    cfg.set_shrinkage(config.shrinkage);
    cfg.set_min_leaf_size(config.min_leaf_size);
    cfg.set_loss("SquaredError");
    cfg.set_debug(false);

    let mut model = GBDT::new(&cfg);
    model.fit(&mut train_data);
    let regressor = GbdtRegressor::from_model(model);

    let (mae, r2) = if test_idx.is_empty() {
        (None, None)
    } else {
        let test_rows: Vec<FeatureVector> = test_idx.iter().map(|&i| scaled[i]).collect();
        let truth: Vec<f64> = test_idx.iter().map(|&i| targets[i]).collect();
        let predicted = regressor.predict(&test_rows)?;
        (
            Some(mean_absolute_error(&truth, &predicted)),
            Some(r2_score(&truth, &predicted)),
        )
    };

    let report = TrainingReport {
        rows: scaled.len(),
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        mae,
        r2,
        config: config.clone(),
        layout: LayoutInfo::current(),
        model_checksum: None,
        trained_at: Utc::now(),
    };

    Ok(TrainedModel { regressor, scaler, report })
}

/// Feature rows in layout order plus targets; every row needs `psi_score`
pub fn training_matrix(dataset: &HistoricalDataset) -> Result<(Vec<FeatureVector>, Vec<f64>)> {
    let mut features = Vec::with_capacity(dataset.len());
    let mut targets = Vec::with_capacity(dataset.len());

    for (i, record) in dataset.records().iter().enumerate() {
        let target = record
            .psi_score
            .filter(|t| t.is_finite())
            .ok_or_else(|| {
                PsiError::InvalidData(format!("row {} ({}): missing psi_score", i + 2, record.area))
            })?;
        features.push(record.feature_vector());
        targets.push(target);
    }

    Ok((features, targets))
}

/// Seeded shuffle, then the first `ceil(n * test_fraction)` indices are the
/// test split. Both splits are non-empty when `n >= 2` and the fraction is > 0.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test_count = (n as f64 * test_fraction).ceil() as usize;
    if n < 2 {
        test_count = 0;
    } else {
        test_count = test_count.min(n - 1);
    }

    let train = indices.split_off(test_count);
    (train, indices)
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / truth.len() as f64
}

/// Coefficient of determination. A constant truth scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_res: f64 = truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn to_f32(row: &FeatureVector) -> Vec<f32> {
    row.values.iter().map(|&v| v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PsiEngine;
    use crate::spatial::HistoricalRecord;

    fn synthetic_dataset(n: usize) -> HistoricalDataset {
        let records = (0..n)
            .map(|i| {
                let crime_rate = (i % 10) as f64 / 10.0;
                HistoricalRecord {
                    area: format!("zone-{}", i),
                    crime_rate,
                    light_level: 1.0 - crime_rate,
                    crowd_density: 0.5,
                    sos_count: (i % 4) as f64,
                    time_risk: 0.3,
                    user_rating: 3.0,
                    sentiment_score: 0.0,
                    lat: 18.4 + i as f64 * 0.001,
                    lng: 73.7 + i as f64 * 0.001,
                    feedback_text: None,
                    psi_score: Some(100.0 - 80.0 * crime_rate),
                }
            })
            .collect();
        HistoricalDataset::new(records).unwrap()
    }

    #[test]
    fn test_split_indices() {
        let (train, test) = split_indices(10, 0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(split_indices(10, 0.2, 42), (train, test));
    }

    #[test]
    fn test_split_edge_cases() {
        assert_eq!(split_indices(1, 0.2, 42), (vec![0], vec![]));

        let (train, test) = split_indices(3, 0.9, 7);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 2);

        let (train, test) = split_indices(5, 0.0, 7);
        assert_eq!(train.len(), 5);
        assert!(test.is_empty());
    }

    #[test]
    fn test_metrics() {
        let truth = [1.0, 2.0, 3.0];
        assert_eq!(mean_absolute_error(&truth, &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(mean_absolute_error(&truth, &[2.0, 2.0, 2.0]), 2.0 / 3.0);

        assert_eq!(r2_score(&truth, &truth), 1.0);
        assert_eq!(r2_score(&truth, &[2.0, 2.0, 2.0]), 0.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 5.0]), 0.0);
    }

    #[test]
    fn test_training_matrix_requires_target() {
        let mut records = synthetic_dataset(3).records().to_vec();
        records[1].psi_score = None;
        let dataset = HistoricalDataset::new(records).unwrap();

        let err = training_matrix(&dataset).unwrap_err();
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());

        let config = TrainingConfig { trees: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = TrainingConfig { test_fraction: 1.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_train_learns_crime_signal() {
        let dataset = synthetic_dataset(60);
        let config = TrainingConfig {
            trees: 30,
            max_depth: 4,
            shrinkage: 0.3,
            ..Default::default()
        };

        let trained = train(&dataset, &config).unwrap();
        assert_eq!(trained.report.rows, 60);
        assert_eq!(trained.report.test_rows, 12);
        assert!(trained.report.mae.is_some());

        let safe = dataset.record(0).unwrap().feature_vector();
        let risky = dataset.record(9).unwrap().feature_vector();
        let scaled = trained.scaler.transform_batch(&[safe, risky]);
        let scores = trained.regressor.predict(&scaled).unwrap();

        assert!(scores.iter().all(|s| s.is_finite()));
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_save_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");
        let report_path = dir.path().join("report.json");

        let config = TrainingConfig { trees: 5, max_depth: 3, ..Default::default() };
        let mut trained = train(&synthetic_dataset(20), &config).unwrap();
        trained
            .save(&model_path, &scaler_path, Some(report_path.as_path()))
            .unwrap();

        assert!(model_path.exists());
        assert_eq!(StandardScaler::load(&scaler_path).unwrap(), trained.scaler);

        let report: TrainingReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report.rows, 20);
        assert_eq!(report.model_checksum.map(|c| c.len()), Some(64));
    }

    #[test]
    fn test_saved_artifacts_serve_same_scores() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");
        let dataset_path = dir.path().join("dataset.csv");

        let dataset = synthetic_dataset(40);
        let mut writer = csv::Writer::from_path(&dataset_path).unwrap();
        for record in dataset.records() {
            writer.serialize(record).unwrap();
        }
        writer.flush().unwrap();

        let config = TrainingConfig { trees: 10, max_depth: 4, ..Default::default() };
        let mut trained = train(&dataset, &config).unwrap();
        trained.save(&model_path, &scaler_path, None).unwrap();

        let engine = PsiEngine::load(&model_path, &scaler_path, &dataset_path).unwrap();
        assert_eq!(engine.dataset().len(), 40);
        assert_eq!(engine.metadata().backend, "gbdt");
        assert_eq!(Some(&engine.metadata().checksum), trained.report.model_checksum.as_ref());

        for i in [0, 7, 23, 39] {
            let record = dataset.record(i).unwrap();
            let served = engine.location_psi(record.lat, record.lng).unwrap();
            assert_eq!(served.area, record.area);
            assert_eq!(served.nearest_distance, 0.0);

            let scaled = trained.scaler.transform(&record.feature_vector());
            let expected = trained.regressor.predict(&[scaled]).unwrap()[0];
            assert_eq!(served.psi_score, expected, "row {}", i);
        }
    }
}
