//! Spatial Module - historical dataset and nearest-neighbor index

pub mod dataset;
pub mod kdtree;

pub use dataset::{HistoricalDataset, HistoricalRecord};
pub use kdtree::{KdTree, Neighbor};
