//! Tabular ingestion
//!
//! Turns raw comma-delimited text into a [`Dataset`] of typed rows.
//!
//! ```text
//! raw text ──► lines ──► header + fields ──► coerce cells ──► keep rows with a value
//! ```
//!
//! Two splitters are available. [`Splitter::Simple`] splits every line on
//! commas and strips one pair of surrounding quotes from each field; it does
//! not understand commas inside quoted fields. [`Splitter::QuoteAware`] uses a
//! real CSV reader for files that need it. Both apply the same field-count,
//! coercion and "at least one value" rules.

pub mod sampler;
pub mod synthetic;

pub use sampler::sample;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::AppError;

/// One typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // -0 prints as "0" so re-serialized samples match what was uploaded
            CellValue::Number(n) if *n == 0.0 => write!(f, "0"),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Null => Ok(()),
        }
    }
}

/// Column name to value, in header order.
pub type Row = IndexMap<String, CellValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    #[default]
    Simple,
    QuoteAware,
}

impl std::str::FromStr for Splitter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Splitter::Simple),
            "quoted" | "quote_aware" | "csv" => Ok(Splitter::QuoteAware),
            other => Err(AppError::Config(format!("Unknown CSV splitter: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    pub splitter: Splitter,
}

/// An immutable, ordered collection of rows sharing one header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    duplicate_columns: Vec<String>,
}

impl Dataset {
    /// Unique column names in first-occurrence order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header names that appeared more than once. Their cells collapse into
    /// one key per row and the right-most field wins.
    pub fn duplicate_columns(&self) -> &[String] {
        &self.duplicate_columns
    }
}

/// Parse with the default (simple) splitter.
pub fn parse(raw: &str) -> Dataset {
    parse_with(raw, &IngestOptions::default())
}

pub fn parse_with(raw: &str, options: &IngestOptions) -> Dataset {
    let dataset = match options.splitter {
        Splitter::Simple => parse_simple(raw),
        Splitter::QuoteAware => parse_quote_aware(raw),
    };
    debug!(
        rows = dataset.rows.len(),
        columns = dataset.columns.len(),
        splitter = ?options.splitter,
        "Parsed tabular input"
    );
    dataset
}

/// Like [`parse_with`], but an empty result is an ingestion failure.
pub fn ingest(raw: &str, options: &IngestOptions) -> Result<Dataset, AppError> {
    let dataset = parse_with(raw, options);
    if dataset.is_empty() {
        return Err(AppError::Ingestion(
            "Could not parse data or empty file".to_string(),
        ));
    }
    Ok(dataset)
}

fn parse_simple(raw: &str) -> Dataset {
    let lines: Vec<&str> = raw.trim().split('\n').collect();
    if lines.len() < 2 {
        return Dataset::default();
    }

    let headers: Vec<String> = lines[0]
        .split(',')
        .map(|h| strip_quotes(h.trim()).to_string())
        .collect();

    let rows: Vec<Row> = lines[1..]
        .iter()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            build_row(&headers, fields.iter().map(|f| strip_quotes(f.trim())))
        })
        .collect();

    assemble(headers, rows)
}

fn parse_quote_aware(raw: &str) -> Dataset {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.trim().as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(Ok(record)) => record.iter().map(|h| h.trim().to_string()).collect(),
        _ => return Dataset::default(),
    };

    let mut rows = Vec::new();
    let mut saw_data_line = false;
    for record in records {
        saw_data_line = true;
        match record {
            Ok(record) => {
                let fields: Vec<&str> = record.iter().map(str::trim).collect();
                if let Some(row) = build_row(&headers, fields.into_iter()) {
                    rows.push(row);
                }
            }
            Err(e) => debug!(error = %e, "Skipping unreadable CSV record"),
        }
    }

    if !saw_data_line {
        return Dataset::default();
    }
    assemble(headers, rows)
}

/// Build one row, or `None` when the field count is off or every cell is null.
fn build_row<'a, I>(headers: &[String], fields: I) -> Option<Row>
where
    I: ExactSizeIterator<Item = &'a str>,
{
    if fields.len() != headers.len() {
        return None;
    }

    let mut row = Row::with_capacity(headers.len());
    let mut has_value = false;
    for (header, field) in headers.iter().zip(fields) {
        let value = coerce(field);
        has_value |= !value.is_null();
        row.insert(header.clone(), value);
    }

    has_value.then_some(row)
}

fn assemble(headers: Vec<String>, rows: Vec<Row>) -> Dataset {
    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    let mut duplicate_columns: Vec<String> = Vec::new();
    for header in headers {
        if columns.contains(&header) {
            if !duplicate_columns.contains(&header) {
                duplicate_columns.push(header);
            }
        } else {
            columns.push(header);
        }
    }

    if !duplicate_columns.is_empty() {
        warn!(
            duplicates = ?duplicate_columns,
            "Header contains duplicate column names; last value wins"
        );
    }

    Dataset {
        columns,
        rows,
        duplicate_columns,
    }
}

/// Remove at most one leading and one trailing double quote.
fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}

/// Empty → null, numeric literal → number, anything else → text.
pub fn coerce(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Null;
    }
    match parse_number(field) {
        Some(n) => CellValue::Number(n),
        None => CellValue::Text(field.to_string()),
    }
}

fn parse_number(field: &str) -> Option<f64> {
    let literal = field.trim();
    if literal.is_empty() {
        return None;
    }

    let radix = match literal.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return literal
            .get(2..)
            .and_then(|digits| u64::from_str_radix(digits, radix).ok())
            .map(|n| n as f64);
    }

    // f64::from_str also takes "inf" and "NaN"; only plain decimal literals count
    let decimal = literal
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal {
        return None;
    }

    literal.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_rows_follow_header_order() {
        let dataset = parse("Name,Age,City\nAda,36,London\nAlan,41,Wilmslow\n");
        assert_eq!(dataset.columns(), &["Name", "Age", "City"]);
        assert_eq!(dataset.len(), 2);
        for row in dataset.rows() {
            let keys: Vec<&str> = row.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["Name", "Age", "City"]);
        }
        assert_eq!(dataset.rows()[1]["Age"], CellValue::Number(41.0));
    }

    #[test]
    fn test_all_empty_row_is_dropped() {
        let dataset = parse("A,B\n,");
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_partially_empty_row_is_kept() {
        let dataset = parse("Month,Revenue\nJan,100\nFeb,\n");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[0]["Month"], text("Jan"));
        assert_eq!(dataset.rows()[0]["Revenue"], CellValue::Number(100.0));
        assert_eq!(dataset.rows()[1]["Month"], text("Feb"));
        assert_eq!(dataset.rows()[1]["Revenue"], CellValue::Null);
    }

    #[test]
    fn test_field_count_mismatch_drops_row() {
        let dataset = parse("A,B\n1,2\n3\n4,5,6\n7,8");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[1]["A"], CellValue::Number(7.0));
    }

    #[test]
    fn test_needs_header_and_data_line() {
        assert!(parse("").is_empty());
        assert!(parse("A,B").is_empty());
        assert!(parse("A,B\n\n\n").is_empty());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce("42"), CellValue::Number(42.0));
        assert_eq!(coerce("4.5e1"), CellValue::Number(45.0));
        assert_eq!(coerce("-3.25"), CellValue::Number(-3.25));
        assert_eq!(coerce(".5"), CellValue::Number(0.5));
        assert_eq!(coerce("0x10"), CellValue::Number(16.0));
        assert_eq!(coerce("abc"), text("abc"));
        assert_eq!(coerce(""), CellValue::Null);
    }

    #[test]
    fn test_non_finite_and_words_stay_text() {
        assert_eq!(coerce("NaN"), text("NaN"));
        assert_eq!(coerce("inf"), text("inf"));
        assert_eq!(coerce("Infinity"), text("Infinity"));
        assert_eq!(coerce("1e400"), text("1e400"));
        assert_eq!(coerce("12abc"), text("12abc"));
        assert_eq!(coerce("-0x10"), text("-0x10"));
        assert_eq!(coerce("0x"), text("0x"));
        assert_eq!(coerce("0b2"), text("0b2"));
        assert_eq!(coerce(" "), text(" "));
    }

    #[test]
    fn test_quotes_and_whitespace_are_stripped() {
        let dataset = parse("\"Name\", \"Score\" \n \"Ada\" , \"9.5\"\r\n");
        assert_eq!(dataset.columns(), &["Name", "Score"]);
        assert_eq!(dataset.rows()[0]["Name"], text("Ada"));
        assert_eq!(dataset.rows()[0]["Score"], CellValue::Number(9.5));
    }

    #[test]
    fn test_simple_splitter_breaks_quoted_commas() {
        let dataset = parse("City,Pop\n\"Paris, FR\",2100000\nRome,2800000");
        // "Paris, FR" splits into three fields and the row is dropped
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows()[0]["City"], text("Rome"));
    }

    #[test]
    fn test_quote_aware_splitter_keeps_quoted_commas() {
        let options = IngestOptions {
            splitter: Splitter::QuoteAware,
        };
        let dataset = parse_with(
            "City,Pop,Note\n\"Paris, FR\",2100000,\"multi\nline\"\n,,\nRome,2800000,",
            &options,
        );
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[0]["City"], text("Paris, FR"));
        assert_eq!(dataset.rows()[0]["Note"], text("multi\nline"));
        assert_eq!(dataset.rows()[1]["Pop"], CellValue::Number(2_800_000.0));
        assert_eq!(dataset.rows()[1]["Note"], CellValue::Null);
    }

    #[test]
    fn test_duplicate_headers_last_value_wins() {
        let dataset = parse("id,value,value\n1,first,second");
        assert_eq!(dataset.columns(), &["id", "value"]);
        assert_eq!(dataset.duplicate_columns(), &["value"]);
        assert_eq!(dataset.rows()[0].len(), 2);
        assert_eq!(dataset.rows()[0]["value"], text("second"));
    }

    #[test]
    fn test_ingest_rejects_empty_result() {
        assert!(matches!(
            ingest("A,B\n,\n", &IngestOptions::default()),
            Err(AppError::Ingestion(_))
        ));
        assert!(ingest("A,B\n1,2", &IngestOptions::default()).is_ok());
    }

    #[test]
    fn test_serialize_then_parse_round_trip() {
        let original = parse("Label,Amount,Ratio\nalpha,10,0.25\nbeta,,1e-3\n,7,\n");
        let reparsed = parse(&sample(&original, original.len()));
        assert_eq!(reparsed.columns(), original.columns());
        assert_eq!(reparsed.rows(), original.rows());
    }

    #[test]
    fn test_cell_value_json_shape() {
        let dataset = parse("Month,Revenue\nJan,100\nFeb,");
        let json = serde_json::to_value(dataset.rows()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"Month": "Jan", "Revenue": 100.0},
                {"Month": "Feb", "Revenue": null}
            ])
        );
    }
}
