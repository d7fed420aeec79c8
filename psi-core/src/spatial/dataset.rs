//! Historical dataset - regional context rows keyed by coordinates

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PsiError, Result};
use crate::features::FeatureVector;

/// One row of the historical CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub area: String,
    pub crime_rate: f64,
    pub light_level: f64,
    pub crowd_density: f64,
    pub sos_count: f64,
    pub time_risk: f64,
    pub user_rating: f64,
    pub sentiment_score: f64,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub feedback_text: Option<String>,
    /// Training target, not used for serving
    #[serde(default)]
    pub psi_score: Option<f64>,
}

impl HistoricalRecord {
    /// All model inputs of this row, in layout order
    pub fn feature_vector(&self) -> FeatureVector {
        FeatureVector::from_values([
            self.crime_rate,
            self.light_level,
            self.crowd_density,
            self.sos_count,
            self.time_risk,
            self.user_rating,
            self.sentiment_score,
            self.lat,
            self.lng,
        ])
    }

    pub fn coordinates(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

/// Static, read-only collection of historical rows
#[derive(Debug, Clone)]
pub struct HistoricalDataset {
    records: Vec<HistoricalRecord>,
}

impl HistoricalDataset {
    pub fn new(records: Vec<HistoricalRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(PsiError::EmptyDataset);
        }
        for (i, record) in records.iter().enumerate() {
            check_record(i, record)?;
        }
        Ok(Self { records })
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| PsiError::io(path, e))?;
        let dataset = Self::from_reader(file)?;

        log::info!("Dataset loaded: {} rows from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// Parse CSV by header name; column order does not matter
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: HistoricalRecord = result?;
            records.push(record);
        }

        Self::new(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<&HistoricalRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.records.iter().map(HistoricalRecord::coordinates).collect()
    }
}

fn check_record(index: usize, record: &HistoricalRecord) -> Result<()> {
    // +2: header line and 1-based numbering
    let line = index + 2;
    if !record.lat.is_finite() || !record.lng.is_finite() {
        return Err(PsiError::InvalidData(format!(
            "row {} ({}): coordinates are not finite",
            line, record.area
        )));
    }
    if !record.feature_vector().is_finite() {
        return Err(PsiError::InvalidData(format!(
            "row {} ({}): feature values are not finite",
            line, record.area
        )));
    }
    Ok(())
}
