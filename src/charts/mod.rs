//! Chart configuration model
//!
//! A [`ChartConfig`] is a declarative description of one visualization: a
//! type plus the column bindings for its axes. The analysis engine produces
//! them, the manual builder produces them from a [`ChartDraft`], and the
//! [`registry`] functions order them inside a [`DashboardAnalysis`].

pub mod registry;
pub mod render;

use serde::{Deserialize, Serialize};

/// Color given to charts created through the manual builder.
pub const DEFAULT_CHART_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Area,
    Scatter,
    Pie,
}

impl ChartType {
    pub const ALL: [ChartType; 5] = [
        ChartType::Bar,
        ChartType::Line,
        ChartType::Area,
        ChartType::Scatter,
        ChartType::Pie,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Scatter => "scatter",
            ChartType::Pie => "pie",
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    /// Category axis, or the label key for pie charts.
    pub x_axis_key: String,
    /// Value axis, or the slice size key for pie charts.
    pub y_axis_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ChartConfig {
    /// Every column name this chart reads.
    pub fn referenced_columns(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [
            Some(("xAxisKey", self.x_axis_key.as_str())),
            Some(("yAxisKey", self.y_axis_key.as_str())),
            self.series_key.as_deref().map(|s| ("seriesKey", s)),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalysis {
    pub dataset_title: String,
    pub summary: String,
    pub charts: Vec<ChartConfig>,
}

/// A chart as entered in the manual builder. Missing fields get defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub chart_type: Option<ChartType>,
    #[serde(default)]
    pub x_axis_key: Option<String>,
    #[serde(default)]
    pub y_axis_key: Option<String>,
    #[serde(default)]
    pub series_key: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl ChartDraft {
    /// Fill in the builder defaults: "New Chart", bar, first column on x,
    /// second (or first) column on y, the default blue.
    pub fn into_config(self, id: impl Into<String>, columns: &[String]) -> ChartConfig {
        let first = columns.first().cloned().unwrap_or_default();
        let second = columns.get(1).cloned().unwrap_or_else(|| first.clone());

        ChartConfig {
            id: id.into(),
            title: non_blank(self.title).unwrap_or_else(|| "New Chart".to_string()),
            description: self.description.unwrap_or_default(),
            chart_type: self.chart_type.unwrap_or(ChartType::Bar),
            x_axis_key: non_blank(self.x_axis_key).unwrap_or(first),
            y_axis_key: non_blank(self.y_axis_key).unwrap_or(second),
            series_key: non_blank(self.series_key),
            color: Some(non_blank(self.color).unwrap_or_else(|| DEFAULT_CHART_COLOR.to_string())),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
