//! Health and analytics response types

use serde::{Deserialize, Serialize};

/// Response of the gateway health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

/// One point of the dataset-completeness time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessPoint {
    pub date: String,
    pub completeness: f64,
}

/// One slice of the product-distribution breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSlice {
    pub category: String,
    pub count: u64,
    pub percentage: f64,
}

/// Product count per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}
