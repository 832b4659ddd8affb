//! Report Generation Module
//!
//! Renders the alerts of a scan as:
//! - JSON (machine-readable)
//! - Markdown (documentation-friendly)

pub mod formats;

use crate::scanner::{Alert, Risk};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Scanned site tree or target
    pub target: String,
    /// Policy the scan ran with
    pub policy: String,
    /// Scan start time
    pub start_time: DateTime<Utc>,
    /// Scan end time
    pub end_time: DateTime<Utc>,
    /// Scanner version
    pub scanner_version: String,
    /// Report generation time
    pub generated_at: DateTime<Utc>,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            title: "Active Scan Report".to_string(),
            target: String::new(),
            policy: "Standard".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            scanner_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of alerts
    pub total_alerts: usize,
    /// Alerts per risk name, every risk listed
    pub by_risk: BTreeMap<String, usize>,
    /// Alerts per alert name
    pub by_name: BTreeMap<String, usize>,
    /// Number of unique hosts
    pub unique_hosts: usize,
    /// Number of unique URLs
    pub unique_urls: usize,
    /// Scan duration in seconds
    pub duration_secs: u64,
    /// Risk score (0-100)
    pub risk_score: u8,
}

impl ReportSummary {
    /// Calculate summary from alerts
    pub fn from_alerts(alerts: &[Alert], metadata: &ReportMetadata) -> Self {
        let mut by_risk: BTreeMap<String, usize> = Risk::all_desc()
            .iter()
            .map(|r| (r.name().to_string(), 0))
            .collect();
        let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
        let mut hosts = HashSet::new();
        let mut urls = HashSet::new();

        for alert in alerts {
            *by_risk.entry(alert.risk.name().to_string()).or_insert(0) += 1;
            *by_name.entry(alert.name.clone()).or_insert(0) += 1;

            if let Ok(url) = url::Url::parse(&alert.uri) {
                if let Some(host) = url.host_str() {
                    hosts.insert(host.to_string());
                }
            }
            urls.insert(alert.uri.clone());
        }

        let duration = metadata.end_time.signed_duration_since(metadata.start_time);

        Self {
            total_alerts: alerts.len(),
            by_risk,
            by_name,
            unique_hosts: hosts.len(),
            unique_urls: urls.len(),
            duration_secs: duration.num_seconds().max(0) as u64,
            risk_score: Self::calculate_risk_score(alerts),
        }
    }

    pub fn count(&self, risk: Risk) -> usize {
        self.by_risk.get(risk.name()).copied().unwrap_or(0)
    }

    /// Calculate overall risk score (0-100)
    fn calculate_risk_score(alerts: &[Alert]) -> u8 {
        let score: u32 = alerts
            .iter()
            .map(|alert| match alert.risk {
                Risk::High => 15,
                Risk::Medium => 8,
                Risk::Low => 3,
                Risk::Info => 1,
            })
            .sum();
        score.min(100) as u8
    }
}

/// Complete scan report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: ReportSummary,
    /// Alerts, highest risk first
    pub alerts: Vec<Alert>,
}

impl ScanReport {
    /// Create a new report from alerts
    pub fn new(mut alerts: Vec<Alert>, metadata: ReportMetadata) -> Self {
        alerts.sort_by(|a, b| {
            b.risk
                .cmp(&a.risk)
                .then(b.confidence.cmp(&a.confidence))
                .then(a.plugin_id.cmp(&b.plugin_id))
                .then(a.uri.cmp(&b.uri))
        });
        let summary = ReportSummary::from_alerts(&alerts, &metadata);

        Self {
            metadata,
            summary,
            alerts,
        }
    }

    /// Export to JSON format
    pub fn to_json(&self) -> Result<String> {
        formats::json::generate(self)
    }

    /// Export to Markdown format
    pub fn to_markdown(&self) -> Result<String> {
        formats::markdown::generate(self)
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
        }
    }

    /// Save report to file
    pub fn save(&self, path: &Path, format: ReportFormat) -> Result<()> {
        let content = self.render(format)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        tracing::info!("Saved {} report to {:?}", format.extension(), path);
        Ok(())
    }
}

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Markdown => "text/markdown",
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scanner::Confidence;

    pub fn alert(plugin_id: u32, name: &str, risk: Risk, uri: &str) -> Alert {
        Alert::builder(plugin_id)
            .with_name(name)
            .with_risk(risk)
            .with_confidence(Confidence::Medium)
            .with_uri(uri)
            .with_param("q")
            .with_cwe_id(79)
            .build()
            .unwrap()
    }

    pub fn create_test_alerts() -> Vec<Alert> {
        vec![
            alert(6, "Path Traversal", Risk::Medium, "https://example.com/view?f=1"),
            alert(40018, "SQL Injection", Risk::High, "https://example.com/api?id=1"),
            alert(10, "Information Disclosure", Risk::Low, "https://other.example.com/debug"),
        ]
    }

    #[test]
    fn test_report_summary() {
        let report = ScanReport::new(create_test_alerts(), ReportMetadata::default());
        let summary = &report.summary;

        assert_eq!(summary.total_alerts, 3);
        assert_eq!(summary.count(Risk::High), 1);
        assert_eq!(summary.count(Risk::Info), 0);
        assert_eq!(summary.by_risk.len(), 4);
        assert_eq!(summary.unique_hosts, 2);
        assert_eq!(summary.unique_urls, 3);
        assert_eq!(summary.risk_score, 26);
    }

    #[test]
    fn test_alerts_sorted_by_risk() {
        let report = ScanReport::new(create_test_alerts(), ReportMetadata::default());
        let risks: Vec<Risk> = report.alerts.iter().map(|a| a.risk).collect();
        assert_eq!(risks, vec![Risk::High, Risk::Medium, Risk::Low]);
    }

    #[test]
    fn test_risk_score_is_capped() {
        let alerts: Vec<Alert> = (0..10)
            .map(|_| alert(1, "x", Risk::High, "https://example.com/"))
            .collect();
        assert_eq!(ReportSummary::calculate_risk_score(&alerts), 100);
    }

    #[test]
    fn test_save_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let report = ScanReport::new(create_test_alerts(), ReportMetadata::default());

        report.save(&path, ReportFormat::Markdown).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Active Scan Report"));
        assert_eq!(ReportFormat::Markdown.extension(), "md");
    }
}
