//! Report writers.
//!
//! The CSV layout is fixed: 17 columns in the order of [`REPORT_COLUMNS`],
//! dates as `YYYY-MM-DD`, booleans as `true`/`false`, and an empty field
//! wherever a value is missing (absent registry side, unknown license,
//! uncomputable lag). Rows are written in the order given, so identical
//! inputs produce byte-identical files.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::ReconError;
use crate::model::{ReconResult, ReconciledRow};

pub const REPORT_COLUMNS: [&str; 17] = [
    "VS Code Publisher",
    "VS Code Name",
    "VS Code Installs",
    "VS Code Version",
    "VS Code Last-Updated",
    "Open VSX Namespace",
    "Open VSX Name",
    "MS Owned Namespace",
    "Open VSX Publisher",
    "Open VSX Version",
    "Open VSX Last-Updated",
    "Open VSX Downloads",
    "Open VSX Auto-Publish",
    "Publish Lag (Days)",
    "Open VSX Verified",
    "Open VSX License",
    "VS Code License",
];

fn opt_str(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

fn opt_num<T: ToString>(v: Option<T>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn opt_date(v: Option<NaiveDate>) -> String {
    v.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// Project a row onto the report columns.
pub fn csv_record(row: &ReconciledRow) -> [String; 17] {
    [
        opt_str(&row.primary_publisher),
        opt_str(&row.primary_name),
        opt_num(row.primary_installs),
        opt_str(&row.primary_version),
        opt_date(row.primary_last_updated),
        opt_str(&row.secondary_namespace),
        opt_str(&row.secondary_name),
        row.ms_owned_namespace.to_string(),
        opt_str(&row.secondary_publisher),
        opt_str(&row.secondary_version),
        opt_date(row.secondary_last_updated),
        opt_num(row.secondary_downloads),
        row.auto_publish.to_string(),
        opt_num(row.publish_lag_days),
        opt_num(row.secondary_verified),
        opt_str(&row.secondary_license),
        opt_str(&row.primary_license),
    ]
}

/// Write header + rows as CSV. The header is written even with zero rows.
pub fn write_csv<W: Write>(rows: &[ReconciledRow], writer: W) -> Result<(), ReconError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer
        .write_record(REPORT_COLUMNS)
        .map_err(|e| ReconError::ReportWrite(format!("CSV write error: {e}")))?;

    for row in rows {
        csv_writer
            .write_record(csv_record(row))
            .map_err(|e| ReconError::ReportWrite(format!("CSV write error: {e}")))?;
    }

    csv_writer
        .flush()
        .map_err(|e| ReconError::ReportWrite(format!("CSV flush error: {e}")))
}

pub fn write_csv_file(rows: &[ReconciledRow], path: &Path) -> Result<(), ReconError> {
    let file = std::fs::File::create(path)
        .map_err(|e| ReconError::ReportWrite(format!("cannot create {}: {e}", path.display())))?;
    write_csv(rows, std::io::BufWriter::new(file))
}

pub fn write_json_file(result: &ReconResult, path: &Path) -> Result<(), ReconError> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| ReconError::ReportWrite(format!("JSON serialization error: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| ReconError::ReportWrite(format!("cannot write {}: {e}", path.display())))
}

/// Plain-text table of the first `limit` rows, for terminal output.
pub fn render_top_rows(rows: &[ReconciledRow], limit: usize) -> String {
    let header = ["#", "Identity", "Installs", "Downloads", "Lag", "Auto", "License"];
    let body: Vec<[String; 7]> = rows
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, r)| {
            [
                i.to_string(),
                r.identity.clone(),
                opt_num(r.primary_installs),
                opt_num(r.secondary_downloads),
                opt_num(r.publish_lag_days),
                r.auto_publish.to_string(),
                opt_str(&r.primary_license),
            ]
        })
        .collect();

    let mut widths = header.map(|h| h.chars().count());
    for line in &body {
        for (w, cell) in widths.iter_mut().zip(line) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let format_line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format_line(&header.map(String::from));
    for line in &body {
        out.push('\n');
        out.push_str(&format_line(line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged_row() -> ReconciledRow {
        ReconciledRow {
            identity: "acme.linter".into(),
            primary_publisher: Some("acme".into()),
            primary_name: Some("linter".into()),
            primary_installs: Some(500),
            primary_version: Some("1.2.0".into()),
            primary_last_updated: NaiveDate::from_ymd_opt(2024, 1, 10),
            secondary_namespace: Some("acme".into()),
            secondary_name: Some("linter".into()),
            ms_owned_namespace: false,
            secondary_publisher: Some("acme-bot".into()),
            secondary_version: Some("1.1.0".into()),
            secondary_last_updated: NaiveDate::from_ymd_opt(2024, 1, 5),
            secondary_downloads: Some(200),
            auto_publish: true,
            publish_lag_days: Some(5),
            secondary_verified: Some(true),
            secondary_license: Some("MIT".into()),
            primary_license: Some("MIT".into()),
        }
    }

    fn secondary_only_row() -> ReconciledRow {
        ReconciledRow {
            identity: "solo.ext".into(),
            primary_publisher: None,
            primary_name: None,
            primary_installs: None,
            primary_version: None,
            primary_last_updated: None,
            secondary_namespace: Some("solo".into()),
            secondary_name: Some("ext".into()),
            ms_owned_namespace: false,
            secondary_publisher: None,
            secondary_version: Some("0.1.0".into()),
            secondary_last_updated: NaiveDate::from_ymd_opt(2023, 12, 1),
            secondary_downloads: Some(7),
            auto_publish: false,
            publish_lag_days: None,
            secondary_verified: Some(false),
            secondary_license: None,
            primary_license: None,
        }
    }

    #[test]
    fn csv_layout() {
        let mut buf = Vec::new();
        write_csv(&[merged_row(), secondary_only_row()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("VS Code Publisher,VS Code Name,VS Code Installs"));
        assert!(lines[0].ends_with("Open VSX License,VS Code License"));
        assert_eq!(
            lines[1],
            "acme,linter,500,1.2.0,2024-01-10,acme,linter,false,acme-bot,1.1.0,2024-01-05,200,true,5,true,MIT,MIT"
        );
        assert_eq!(
            lines[2],
            ",,,,,solo,ext,false,,0.1.0,2023-12-01,7,false,,false,,"
        );
    }

    #[test]
    fn csv_header_without_rows() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn csv_quotes_embedded_commas() {
        let mut row = merged_row();
        row.primary_license = Some("Other - Copyright (c) Acme, Inc.".into());
        let mut buf = Vec::new();
        write_csv(&[row], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"Other - Copyright (c) Acme, Inc.\""));
    }

    #[test]
    fn top_rows_table() {
        let table = render_top_rows(&[merged_row(), secondary_only_row()], 1);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#  Identity"));
        assert!(lines[1].contains("acme.linter"));
        assert!(!table.contains("solo.ext"));
    }
}
