//! Renderer contract
//!
//! Drawing charts is left to whatever consumes a [`ChartConfig`] plus a
//! [`Dataset`]. The one rule every renderer follows: a binding that names a
//! column missing from a row renders nothing for that row instead of failing.
//! [`project`] applies that rule once so renderers don't have to.

use crate::ingest::{CellValue, Dataset};

use super::ChartConfig;

pub trait ChartRenderer {
    type Output;

    fn render(&self, chart: &ChartConfig, dataset: &Dataset) -> Self::Output;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub series: Option<String>,
    pub value: f64,
}

/// Extract the plottable points of a chart. Rows without the x key, or
/// without a numeric value under the y key, are skipped.
pub fn project(chart: &ChartConfig, dataset: &Dataset) -> Vec<SeriesPoint> {
    dataset
        .rows()
        .iter()
        .filter_map(|row| {
            let label = match row.get(&chart.x_axis_key)? {
                CellValue::Null => return None,
                other => other.to_string(),
            };
            let value = row.get(&chart.y_axis_key)?.as_f64()?;
            let series = chart
                .series_key
                .as_ref()
                .and_then(|key| row.get(key))
                .filter(|v| !v.is_null())
                .map(|v| v.to_string());
            Some(SeriesPoint {
                label,
                series,
                value,
            })
        })
        .collect()
}

/// Plain-text bar rendering, one line per point.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    pub width: usize,
    pub max_points: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            width: 30,
            max_points: 12,
        }
    }
}

impl ChartRenderer for TextRenderer {
    type Output = String;

    fn render(&self, chart: &ChartConfig, dataset: &Dataset) -> String {
        let mut out = format!("{} [{}]\n", chart.title, chart.chart_type);
        if !chart.description.is_empty() {
            out.push_str(&format!("  {}\n", chart.description));
        }

        let points = project(chart, dataset);
        if points.is_empty() {
            out.push_str(&format!(
                "  (no data for {} / {})\n",
                chart.x_axis_key, chart.y_axis_key
            ));
            return out;
        }

        let shown = &points[..points.len().min(self.max_points)];
        let labels: Vec<String> = shown
            .iter()
            .map(|p| match &p.series {
                Some(series) => format!("{} [{}]", p.label, series),
                None => p.label.clone(),
            })
            .collect();
        let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let peak = shown.iter().map(|p| p.value.abs()).fold(0.0_f64, f64::max);

        for (label, point) in labels.iter().zip(shown) {
            let len = if peak > 0.0 {
                ((point.value.abs() / peak) * self.width as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!(
                "  {:<lw$} | {} {}\n",
                label,
                "#".repeat(len),
                CellValue::Number(point.value),
                lw = label_width
            ));
        }
        if points.len() > shown.len() {
            out.push_str(&format!("  ... {} more\n", points.len() - shown.len()));
        }
        out
    }
}
