//! Response schemas and the validation boundary for engine output.
//!
//! The engine is asked for JSON conforming to [`analysis_schema`] or
//! [`chat_schema`]. Whatever comes back is checked here, once: structural
//! problems reject the response, while column references that do not exist
//! in the dataset and malformed colors only produce warnings.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::charts::{is_hex_color, ChartConfig, ChartType, DashboardAnalysis};

fn chart_properties() -> Value {
    let types: Vec<&str> = ChartType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "id": {"type": "string"},
        "title": {"type": "string"},
        "description": {"type": "string"},
        "type": {"type": "string", "enum": types},
        "xAxisKey": {
            "type": "string",
            "description": "Column used for the X axis (the category for pie charts)"
        },
        "yAxisKey": {
            "type": "string",
            "description": "Column used for the Y axis (the value for pie charts)"
        },
        "seriesKey": {
            "type": "string",
            "description": "Optional column that splits the data into series"
        },
        "color": {"type": "string", "description": "A hex color code for the chart"}
    })
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "datasetTitle": {"type": "string", "description": "A creative name for this dataset"},
            "summary": {"type": "string", "description": "A brief executive summary of the data"},
            "charts": {
                "type": "array",
                "description": "Recommended charts for this data",
                "items": {
                    "type": "object",
                    "properties": chart_properties(),
                    "required": ["id", "title", "type", "xAxisKey", "yAxisKey"]
                }
            }
        },
        "required": ["datasetTitle", "summary", "charts"]
    })
}

pub fn chat_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "textResponse": {"type": "string", "description": "The conversational answer"},
            "newChart": {
                "type": "object",
                "description": "Only when the user asks for a visualization or a chart answers the question best",
                "properties": chart_properties(),
                "required": ["title", "type", "xAxisKey", "yAxisKey"]
            }
        },
        "required": ["textResponse"]
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnalysis {
    dataset_title: String,
    summary: String,
    charts: Vec<WireChart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChat {
    text_response: String,
    #[serde(default)]
    new_chart: Option<WireChart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChart {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type")]
    chart_type: ChartType,
    x_axis_key: String,
    y_axis_key: String,
    #[serde(default)]
    series_key: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

impl WireChart {
    fn into_config(self, id: String) -> ChartConfig {
        ChartConfig {
            id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            chart_type: self.chart_type,
            x_axis_key: self.x_axis_key,
            y_axis_key: self.y_axis_key,
            series_key: self.series_key.filter(|s| !s.trim().is_empty()),
            color: self.color,
        }
    }
}

/// Validated engine output for the initial analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnalysis {
    pub analysis: DashboardAnalysis,
    pub warnings: Vec<String>,
}

/// Validated engine output for one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedChat {
    pub text: String,
    pub chart: Option<ChartConfig>,
    pub warnings: Vec<String>,
}

/// Unwrap a reply the engine wrapped in a Markdown code fence.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening line
    match body.split_once('\n') {
        Some((info, inner)) if !info.contains('{') => inner.trim(),
        _ => body.trim(),
    }
}

fn decode<'a, T: Deserialize<'a>>(content: &'a str) -> Result<T, String> {
    let body = strip_code_fence(content);
    if body.is_empty() {
        return Err("engine returned empty content".to_string());
    }
    serde_json::from_str(body).map_err(|e| format!("response does not match schema: {}", e))
}

pub fn validate_analysis(content: &str, columns: &[String]) -> Result<ValidatedAnalysis, String> {
    let wire: WireAnalysis = decode(content)?;
    let mut warnings = Vec::new();
    let mut charts = Vec::with_capacity(wire.charts.len());

    for (index, chart) in wire.charts.into_iter().enumerate() {
        let id = match chart.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(format!("chart {} is missing an id", index)),
        };
        let mut config = chart.into_config(id);
        check_chart(&mut config, columns, &mut warnings);
        charts.push(config);
    }

    Ok(ValidatedAnalysis {
        analysis: DashboardAnalysis {
            dataset_title: wire.dataset_title,
            summary: wire.summary,
            charts,
        },
        warnings,
    })
}

pub fn validate_chat(content: &str, columns: &[String]) -> Result<ValidatedChat, String> {
    let wire: WireChat = decode(content)?;
    let mut warnings = Vec::new();

    let chart = wire.new_chart.map(|chart| {
        let id = chart.id.clone().unwrap_or_default();
        let mut config = chart.into_config(id);
        check_chart(&mut config, columns, &mut warnings);
        config
    });

    Ok(ValidatedChat {
        text: wire.text_response,
        chart,
        warnings,
    })
}

/// Column and color checks shared by both responses. Never fails.
fn check_chart(chart: &mut ChartConfig, columns: &[String], warnings: &mut Vec<String>) {
    for (field, column) in chart.referenced_columns() {
        if !columns.iter().any(|c| c == column) {
            warnings.push(format!(
                "chart \"{}\": {} \"{}\" is not a dataset column",
                chart.title, field, column
            ));
        }
    }

    if let Some(color) = chart.color.as_deref() {
        if !is_hex_color(color) {
            warnings.push(format!(
                "chart \"{}\": dropped invalid color \"{}\"",
                chart.title, color
            ));
            chart.color = None;
        }
    }
}
