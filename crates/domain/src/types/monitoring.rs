//! Service health monitoring types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health classification reported for a backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Point-in-time status of a monitored service, as returned by the
/// monitoring endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

/// Push notification of a service health change, delivered over the
/// realtime channel as a `service_update` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub service_id: String,
    pub service_name: String,
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}
