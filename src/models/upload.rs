use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A non-blank cell. Blank cells are `None` in [`ColumnData::values`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ColumnData {
    pub header: String,
    /// One entry per data row; `null` marks a blank cell.
    pub values: Vec<Option<CellValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Pie,
    #[serde(rename = "3d_column", alias = "3d-column")]
    ThreeDColumn,
}

pub const DEFAULT_CHART_TITLE: &str = "Chart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChartConfig {
    pub x_axis: String,
    pub y_axis: String,
    pub chart_type: ChartType,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl ChartConfig {
    pub fn new(x_axis: String, y_axis: String, chart_type: ChartType, title: Option<String>) -> Self {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_CHART_TITLE.to_string());

        Self {
            x_axis,
            y_axis,
            chart_type,
            title,
            created_at: Utc::now(),
        }
    }
}

/// Stored JSON did not have the shape this service writes.
#[derive(Debug, thiserror::Error)]
#[error("stored {field} for upload is malformed: {source}")]
pub struct StoredShapeError {
    pub field: &'static str,
    #[source]
    pub source: serde_json::Error,
}

pub fn decode_columns(value: &serde_json::Value) -> Result<Vec<ColumnData>, StoredShapeError> {
    serde_json::from_value(value.clone()).map_err(|source| StoredShapeError {
        field: "columns",
        source,
    })
}

pub fn decode_chart_configs(
    value: &serde_json::Value,
) -> Result<Vec<ChartConfig>, StoredShapeError> {
    serde_json::from_value(value.clone()).map_err(|source| StoredShapeError {
        field: "chart_configs",
        source,
    })
}
