//! Parses captured stdout into ordered finding records.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ToolError;
use crate::spec::{LineExtractor, OutputFormat, TableLayout};

/// One tool-reported record.
pub type Finding = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// In order of emission.
    pub findings: Vec<Finding>,
    /// Lines that looked like records but did not parse.
    pub skipped_lines: usize,
}

pub struct OutputNormalizer;

impl OutputNormalizer {
    pub fn normalize(format: &OutputFormat, stdout: &str) -> Result<Normalized, ToolError> {
        let normalized = match format {
            OutputFormat::JsonLines => parse_json_lines(stdout)?,
            OutputFormat::PlainText(extractor) => parse_plain_text(extractor, stdout),
            OutputFormat::StructuredTable(layout) => parse_table(layout, stdout)?,
        };
        debug!(
            "Normalized {} output: {} finding(s), {} skipped",
            format.label(),
            normalized.findings.len(),
            normalized.skipped_lines
        );
        Ok(normalized)
    }
}

fn parse_json_lines(stdout: &str) -> Result<Normalized, ToolError> {
    let mut normalized = Normalized::default();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => normalized.findings.push(record),
            Ok(other) => {
                let mut record = Map::new();
                record.insert("value".to_string(), other);
                normalized.findings.push(record);
            }
            Err(_) => normalized.skipped_lines += 1,
        }
    }

    if normalized.findings.is_empty() && normalized.skipped_lines > 0 {
        return Err(ToolError::MalformedOutput(format!(
            "none of {} output line(s) parsed as JSON",
            normalized.skipped_lines
        )));
    }
    Ok(normalized)
}

fn parse_plain_text(extractor: &LineExtractor, stdout: &str) -> Normalized {
    let pattern = extractor.pattern();
    let clean = strip_ansi_escapes::strip_str(stdout);
    let findings = clean
        .lines()
        .map(str::trim_end)
        .filter_map(|line| pattern.captures(line))
        .map(|caps| {
            pattern
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), Value::String(m.as_str().trim().to_string())))
                })
                .collect::<Finding>()
        })
        .collect();

    Normalized {
        findings,
        skipped_lines: 0,
    }
}

fn parse_table(layout: &TableLayout, stdout: &str) -> Result<Normalized, ToolError> {
    let mut normalized = Normalized::default();
    let clean = strip_ansi_escapes::strip_str(stdout);
    let rows = clean
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .skip(usize::from(layout.skip_header));

    for row in rows {
        let cells: Vec<&str> = row.splitn(layout.columns.len(), layout.delimiter).collect();
        if cells.len() < layout.columns.len() {
            normalized.skipped_lines += 1;
            continue;
        }
        let record = layout
            .columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| (column.clone(), Value::String(cell.trim().to_string())))
            .collect();
        normalized.findings.push(record);
    }

    if normalized.findings.is_empty() && normalized.skipped_lines > 0 {
        return Err(ToolError::MalformedOutput(format!(
            "none of {} row(s) had {} '{}'-delimited columns",
            normalized.skipped_lines,
            layout.columns.len(),
            layout.delimiter
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_lines_keep_order_and_skip_garbage() {
        let stdout = "{\"url\":\"https://a.com\",\"status_code\":200}\n\nnot json\n{\"url\":\"http://b.com\"}\n";
        let normalized = OutputNormalizer::normalize(&OutputFormat::JsonLines, stdout).unwrap();
        assert_eq!(normalized.findings.len(), 2);
        assert_eq!(normalized.skipped_lines, 1);
        assert_eq!(normalized.findings[0]["url"], json!("https://a.com"));
        assert_eq!(normalized.findings[1]["url"], json!("http://b.com"));
    }

    #[test]
    fn test_json_lines_all_garbage_is_malformed() {
        let result = OutputNormalizer::normalize(&OutputFormat::JsonLines, "oops\n[INF] banner\n");
        assert!(matches!(result, Err(ToolError::MalformedOutput(_))));
    }

    #[test]
    fn test_json_lines_empty_output_is_zero_findings() {
        let normalized = OutputNormalizer::normalize(&OutputFormat::JsonLines, "\n  \n").unwrap();
        assert!(normalized.findings.is_empty());
        assert_eq!(normalized.skipped_lines, 0);
    }

    #[test]
    fn test_json_scalar_is_wrapped() {
        let normalized = OutputNormalizer::normalize(&OutputFormat::JsonLines, "42\n").unwrap();
        assert_eq!(normalized.findings[0]["value"], json!(42));
    }

    #[test]
    fn test_plain_text_extracts_named_groups() {
        let extractor = LineExtractor::new(
            "dirsearch",
            r"^\[[\d:]+\]\s+(?P<status>\d{3})\s+-\s+(?P<size>\S+)\s+-\s+(?P<path>\S+)",
        )
        .unwrap();
        let stdout = "banner line\n\x1b[32m[10:00:01] 200 -  1KB  - /admin\x1b[0m\n[10:00:02] 301 -  0B  - /login\n";
        let normalized =
            OutputNormalizer::normalize(&OutputFormat::PlainText(extractor), stdout).unwrap();
        assert_eq!(normalized.findings.len(), 2);
        assert_eq!(normalized.findings[0]["status"], json!("200"));
        assert_eq!(normalized.findings[0]["path"], json!("/admin"));
        assert_eq!(normalized.findings[1]["status"], json!("301"));
    }

    #[test]
    fn test_plain_text_optional_group_absent() {
        let extractor =
            LineExtractor::new("amass", r"^(?P<name>[\w.-]+\.\w+)(?:\s+(?P<addresses>\S+))?$").unwrap();
        let normalized =
            OutputNormalizer::normalize(&OutputFormat::PlainText(extractor), "a.example.com\n").unwrap();
        assert_eq!(normalized.findings[0].len(), 1);
    }

    #[test]
    fn test_table_splits_columns() {
        let layout = TableLayout::new(':', &["hash", "plaintext"]);
        let stdout = "5f4dcc3b5aa765d61d8327deb882cf99:password\n098f6bcd4621d373cade4e832627b4f6:te:st\n";
        let normalized =
            OutputNormalizer::normalize(&OutputFormat::StructuredTable(layout), stdout).unwrap();
        assert_eq!(normalized.findings.len(), 2);
        assert_eq!(normalized.findings[0]["plaintext"], json!("password"));
        assert_eq!(normalized.findings[1]["plaintext"], json!("te:st"));
    }

    #[test]
    fn test_table_without_delimiters_is_malformed() {
        let layout = TableLayout::new(':', &["hash", "plaintext"]);
        let result = OutputNormalizer::normalize(&OutputFormat::StructuredTable(layout), "garbage\n");
        assert!(matches!(result, Err(ToolError::MalformedOutput(_))));
    }

    #[test]
    fn test_table_header_skipped() {
        let mut layout = TableLayout::new(',', &["host", "port"]);
        layout.skip_header = true;
        let normalized =
            OutputNormalizer::normalize(&OutputFormat::StructuredTable(layout), "host,port\na,80\n")
                .unwrap();
        assert_eq!(normalized.findings.len(), 1);
        assert_eq!(normalized.findings[0]["port"], json!("80"));
    }
}
