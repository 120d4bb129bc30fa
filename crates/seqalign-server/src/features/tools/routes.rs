//! `GET /api/tools` - The aligners jobs can select

use axum::{routing::get, Json, Router};
use seqalign_common::types::ToolKind;
use serde::{Deserialize, Serialize};

use crate::features::FeatureState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Program family name, accepted as a tool selector
    pub name: String,
    /// Canonical tool selector
    pub kind: ToolKind,
    pub description: String,
}

impl From<ToolKind> for ToolInfo {
    fn from(kind: ToolKind) -> Self {
        Self {
            name: kind.program_name().to_string(),
            kind,
            description: kind.description().to_string(),
        }
    }
}

pub fn tools_routes() -> Router<FeatureState> {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/", get(list_tools))
}

async fn list_tools() -> Json<Vec<ToolInfo>> {
    Json(ToolKind::ALL.into_iter().map(ToolInfo::from).collect())
}
