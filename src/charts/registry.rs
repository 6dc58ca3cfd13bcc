//! Chart registry operations.
//!
//! Every operation takes the current [`DashboardAnalysis`] by reference and
//! returns a new value. The previous value is never touched, so anyone still
//! holding it keeps a consistent view.

use tracing::debug;

use super::{ChartConfig, ChartType, DashboardAnalysis};

/// Add a chart at the end. Used by the manual chart builder.
pub fn append(analysis: &DashboardAnalysis, config: ChartConfig) -> DashboardAnalysis {
    let mut next = analysis.clone();
    next.charts.push(config);
    next
}

/// Add a chart at the front, so the newest chat-suggested chart shows first.
pub fn prepend(analysis: &DashboardAnalysis, config: ChartConfig) -> DashboardAnalysis {
    let mut charts = Vec::with_capacity(analysis.charts.len() + 1);
    charts.push(config);
    charts.extend(analysis.charts.iter().cloned());
    DashboardAnalysis {
        dataset_title: analysis.dataset_title.clone(),
        summary: analysis.summary.clone(),
        charts,
    }
}

/// Substitute the chart at `index`. An out-of-range index is a no-op.
pub fn replace_at(
    analysis: &DashboardAnalysis,
    index: usize,
    config: ChartConfig,
) -> DashboardAnalysis {
    let mut next = analysis.clone();
    match next.charts.get_mut(index) {
        Some(slot) => *slot = config,
        None => debug!(
            index,
            len = analysis.charts.len(),
            "replace_at index out of range, ignoring"
        ),
    }
    next
}

/// Change the visualization type of the chart at `index`, keeping its
/// bindings. An out-of-range index is a no-op.
pub fn retype(analysis: &DashboardAnalysis, index: usize, chart_type: ChartType) -> DashboardAnalysis {
    match analysis.charts.get(index) {
        Some(current) => {
            let updated = ChartConfig {
                chart_type,
                ..current.clone()
            };
            replace_at(analysis, index, updated)
        }
        None => analysis.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(id: &str) -> ChartConfig {
        ChartConfig {
            id: id.to_string(),
            title: format!("Chart {}", id),
            description: String::new(),
            chart_type: ChartType::Bar,
            x_axis_key: "x".to_string(),
            y_axis_key: "y".to_string(),
            series_key: None,
            color: None,
        }
    }

    fn analysis(ids: &[&str]) -> DashboardAnalysis {
        DashboardAnalysis {
            dataset_title: "Sales".to_string(),
            summary: "Monthly sales".to_string(),
            charts: ids.iter().map(|id| chart(id)).collect(),
        }
    }

    fn ids(analysis: &DashboardAnalysis) -> Vec<&str> {
        analysis.charts.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_prepend() {
        let before = analysis(&["C1", "C2"]);
        let after = prepend(&before, chart("C3"));
        assert_eq!(ids(&after), vec!["C3", "C1", "C2"]);
        assert_eq!(ids(&before), vec!["C1", "C2"]);
        assert_eq!(after.dataset_title, "Sales");
    }

    #[test]
    fn test_append() {
        let before = analysis(&["C1", "C2"]);
        let after = append(&before, chart("C3"));
        assert_eq!(ids(&after), vec!["C1", "C2", "C3"]);
        assert_eq!(ids(&before), vec!["C1", "C2"]);
    }

    #[test]
    fn test_replace_at() {
        let before = analysis(&["C1", "C2"]);
        let after = replace_at(&before, 1, chart("C3"));
        assert_eq!(ids(&after), vec!["C1", "C3"]);
        assert_eq!(ids(&before), vec!["C1", "C2"]);
    }

    #[test]
    fn test_replace_at_out_of_range_is_noop() {
        let before = analysis(&["C1", "C2"]);
        let after = replace_at(&before, 99, chart("C3"));
        assert_eq!(after, before);
    }

    #[test]
    fn test_duplicates_are_allowed() {
        let before = analysis(&["C1"]);
        let after = append(&before, chart("C1"));
        assert_eq!(ids(&after), vec!["C1", "C1"]);
    }

    #[test]
    fn test_retype_keeps_bindings() {
        let before = analysis(&["C1", "C2"]);
        let after = retype(&before, 0, ChartType::Pie);
        assert_eq!(after.charts[0].chart_type, ChartType::Pie);
        assert_eq!(after.charts[0].x_axis_key, "x");
        assert_eq!(after.charts[0].id, "C1");
        assert_eq!(before.charts[0].chart_type, ChartType::Bar);
        assert_eq!(retype(&before, 5, ChartType::Line), before);
    }
}
