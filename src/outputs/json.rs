//! JSON run report.
//!
//! One file per run, grouped by local date and named by local start time.
//! The report carries the target time and one [`RunSummary`] per feed.

use std::error::Error;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::RunSummary;

/// Everything written for one run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub target: NaiveDateTime,
    pub started_at: NaiveDateTime,
    /// Set when the run failed before or between feeds.
    pub error: Option<String>,
    pub feeds: &'a [RunSummary],
}

/// Write `report` under `{json_output_dir}/{date}/{HHMMSS}.json`.
///
/// Returns the path written.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_run_report(
    report: &RunReport<'_>,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    let dir = PathBuf::from(json_output_dir).join(report.started_at.format("%Y-%m-%d").to_string());
    info!(dir = %dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dir.join(format!("{}.json", report.started_at.format("%H%M%S")));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feed;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_write_run_report_layout_and_content() {
        let tmp = tempfile::tempdir().unwrap();
        let started = NaiveDate::from_ymd_opt(2025, 5, 6)
            .unwrap()
            .and_hms_opt(8, 30, 5)
            .unwrap();
        let mut market = RunSummary::for_feed(Feed::Market, Some("Market_News"));
        market.inserted = 4;
        market.stop_reason = Some("boundary_crossed".to_string());
        let feeds = vec![market, RunSummary::for_feed(Feed::Hot, None)];
        let report = RunReport {
            target: started,
            started_at: started,
            error: None,
            feeds: &feeds,
        };

        let path = write_run_report(&report, tmp.path().to_str().unwrap())
            .await
            .unwrap();

        assert!(path.ends_with("2025-05-06/083005.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["feeds"][0]["inserted"], 4);
        assert_eq!(value["feeds"][0]["stop_reason"], "boundary_crossed");
        assert_eq!(value["feeds"][1]["feed"], "hot");
        assert!(value["error"].is_null());
    }
}
