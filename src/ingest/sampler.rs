//! Deterministic prefix sampling for analysis prompts.

use super::Dataset;

/// Re-serialize the first `limit` rows as a compact CSV block.
///
/// The header line lists the dataset's columns; each row emits its values in
/// that order with nulls as empty fields. An empty dataset yields an empty
/// string.
pub fn sample(dataset: &Dataset, limit: usize) -> String {
    if dataset.is_empty() {
        return String::new();
    }

    let columns = dataset.columns();
    let mut lines = Vec::with_capacity(limit.min(dataset.len()) + 1);
    lines.push(columns.join(","));

    for row in dataset.rows().iter().take(limit) {
        let values: Vec<String> = columns
            .iter()
            .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        lines.push(values.join(","));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse;

    fn ten_rows() -> Dataset {
        let mut raw = String::from("n,square,label");
        for i in 1..=10 {
            raw.push_str(&format!("\n{},{},row-{}", i, i * i, i));
        }
        parse(&raw)
    }

    #[test]
    fn test_header_plus_prefix() {
        let dataset = ten_rows();
        let text = sample(&dataset, 3);
        assert_eq!(text, "n,square,label\n1,1,row-1\n2,4,row-2\n3,9,row-3");
    }

    #[test]
    fn test_sampling_is_idempotent() {
        let dataset = ten_rows();
        let first = sample(&dataset, 3);
        let _ = sample(&dataset, 7);
        assert_eq!(sample(&dataset, 3), first);
    }

    #[test]
    fn test_limit_larger_than_dataset() {
        let dataset = ten_rows();
        assert_eq!(sample(&dataset, 100).lines().count(), 11);
        assert_eq!(sample(&dataset, 0), "n,square,label");
    }

    #[test]
    fn test_nulls_and_fractions() {
        let dataset = parse("Month,Revenue,Margin\nJan,100,0.25\nFeb,,");
        assert_eq!(sample(&dataset, 20), "Month,Revenue,Margin\nJan,100,0.25\nFeb,,");
    }

    #[test]
    fn test_empty_dataset() {
        assert_eq!(sample(&Dataset::default(), 20), "");
    }
}
