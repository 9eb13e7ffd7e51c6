//! Analysis workspace types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Panel kind inside a workspace layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Map,
    Graph,
}

/// Grid placement of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPosition {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A single map or graph panel within a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PanelKind,
    pub position: PanelPosition,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

/// A saved analysis workspace as returned by the workspace endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub id: String,
    pub name: String,
    pub panels: Vec<PanelConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload: a workspace without its server-assigned fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkspace {
    pub name: String,
    pub panels: Vec<PanelConfig>,
}

/// Mutation kind carried by a `workspace_update` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceAction {
    Created,
    Updated,
    Deleted,
}

/// Push notification of a workspace mutation by another user, delivered
/// over the realtime channel as a `workspace_update` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceUpdate {
    pub workspace_id: String,
    pub action: WorkspaceAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
