use crate::model::{ReconSummary, ReconciledRow};

/// Compute summary statistics from reconciled rows.
pub fn compute_summary(rows: &[ReconciledRow]) -> ReconSummary {
    let mut summary = ReconSummary {
        total_rows: rows.len(),
        ..ReconSummary::default()
    };

    for row in rows {
        match (row.has_primary(), row.has_secondary()) {
            (true, true) => summary.in_both += 1,
            (true, false) => summary.primary_only += 1,
            (false, true) => summary.secondary_only += 1,
            (false, false) => {}
        }
        if row.auto_publish {
            summary.auto_published += 1;
        }
        if row.ms_owned_namespace {
            summary.ms_owned += 1;
        }
        if let Some(lag) = row.publish_lag_days {
            if lag > 0 {
                summary.lagging += 1;
            }
            summary.max_lag_days = Some(summary.max_lag_days.map_or(lag, |m| m.max(lag)));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(primary: bool, secondary: bool, auto: bool, lag: Option<i64>) -> ReconciledRow {
        ReconciledRow {
            identity: "x.y".into(),
            primary_publisher: primary.then(|| "x".into()),
            primary_name: primary.then(|| "y".into()),
            primary_installs: primary.then_some(1),
            primary_version: None,
            primary_last_updated: None,
            secondary_namespace: secondary.then(|| "x".into()),
            secondary_name: secondary.then(|| "y".into()),
            ms_owned_namespace: false,
            secondary_publisher: None,
            secondary_version: None,
            secondary_last_updated: None,
            secondary_downloads: secondary.then_some(1),
            auto_publish: auto,
            publish_lag_days: lag,
            secondary_verified: None,
            secondary_license: None,
            primary_license: None,
        }
    }

    #[test]
    fn summary_counts() {
        let rows = vec![
            row(true, true, true, Some(0)),
            row(true, true, false, Some(12)),
            row(true, false, false, None),
            row(false, true, true, None),
        ];
        let s = compute_summary(&rows);
        assert_eq!(s.total_rows, 4);
        assert_eq!(s.in_both, 2);
        assert_eq!(s.primary_only, 1);
        assert_eq!(s.secondary_only, 1);
        assert_eq!(s.auto_published, 2);
        assert_eq!(s.lagging, 1);
        assert_eq!(s.max_lag_days, Some(12));
    }

    #[test]
    fn summary_of_nothing() {
        let s = compute_summary(&[]);
        assert_eq!(s, ReconSummary::default());
    }
}
