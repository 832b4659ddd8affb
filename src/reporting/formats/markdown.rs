//! Markdown Report Generator
//!
//! Generates documentation-friendly Markdown scan reports.

use anyhow::Result;

use crate::reporting::ScanReport;
use crate::scanner::{Alert, Risk};

fn risk_emoji(risk: Risk) -> &'static str {
    match risk {
        Risk::High => "🟠",
        Risk::Medium => "🟡",
        Risk::Low => "🟢",
        Risk::Info => "🔵",
    }
}

/// Generate Markdown report
pub fn generate(report: &ScanReport) -> Result<String> {
    let mut md = String::new();

    // Title
    md.push_str(&format!("# {}\n\n", report.metadata.title));

    // Metadata
    md.push_str("## Report Information\n\n");
    md.push_str(&format!("- **Target:** {}\n", report.metadata.target));
    md.push_str(&format!("- **Policy:** {}\n", report.metadata.policy));
    md.push_str(&format!(
        "- **Scan Period:** {} to {}\n",
        report.metadata.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
        report.metadata.end_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "- **Scanner Version:** {}\n\n",
        report.metadata.scanner_version
    ));

    // Summary
    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Total Alerts | {} |\n", report.summary.total_alerts));
    md.push_str(&format!("| Risk Score | {}/100 |\n", report.summary.risk_score));
    md.push_str(&format!("| Unique Hosts | {} |\n", report.summary.unique_hosts));
    md.push_str(&format!("| Unique URLs | {} |\n", report.summary.unique_urls));
    md.push_str(&format!(
        "| Scan Duration | {}s |\n\n",
        report.summary.duration_secs
    ));

    md.push_str("### Alerts by Risk\n\n");
    md.push_str("| Risk | Count |\n|------|-------|\n");
    for risk in Risk::all_desc() {
        md.push_str(&format!(
            "| {} {} | {} |\n",
            risk_emoji(risk),
            risk.name(),
            report.summary.count(risk)
        ));
    }
    md.push('\n');

    if report.alerts.is_empty() {
        md.push_str("No alerts were raised.\n");
        return Ok(md);
    }

    // Overview
    md.push_str("## Alerts Overview\n\n");
    md.push_str("| # | Risk | Confidence | Alert | URL | Parameter |\n");
    md.push_str("|---|------|------------|-------|-----|-----------|\n");
    for (idx, alert) in report.alerts.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {} {} | {} | {} | `{}` | {} |\n",
            idx + 1,
            risk_emoji(alert.risk),
            alert.risk.name(),
            alert.confidence.name(),
            md_escape(&alert.name),
            truncate(&alert.uri, 60),
            md_escape(&alert.param)
        ));
    }
    md.push('\n');

    // Details
    md.push_str("## Alert Details\n\n");
    for (idx, alert) in report.alerts.iter().enumerate() {
        write_alert(&mut md, idx + 1, alert);
    }

    md.push_str(&format!(
        "\n*Report generated by ascan v{} on {}*\n",
        report.metadata.scanner_version,
        report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    Ok(md)
}

fn write_alert(md: &mut String, number: usize, alert: &Alert) {
    md.push_str(&format!(
        "### {} Alert #{}: {}\n\n",
        risk_emoji(alert.risk),
        number,
        md_escape(&alert.name)
    ));
    md.push_str(&format!(
        "**Risk:** {} | **Confidence:** {} | **Plugin:** {}\n\n",
        alert.risk.name(),
        alert.confidence.name(),
        alert.plugin_id
    ));
    md.push_str(&format!("**URL:** `{} {}`\n\n", alert.method, alert.uri));

    if !alert.param.is_empty() {
        md.push_str(&format!("**Parameter:** `{}`\n\n", alert.param));
    }
    if !alert.description.is_empty() {
        md.push_str(&format!("**Description:**\n\n{}\n\n", alert.description));
    }
    for (label, value) in [
        ("Attack", &alert.attack),
        ("Evidence", &alert.evidence),
    ] {
        if !value.is_empty() {
            md.push_str(&format!("**{}:**\n\n```\n{}\n```\n\n", label, value));
        }
    }
    if !alert.other_info.is_empty() {
        md.push_str(&format!("**Other Info:** {}\n\n", alert.other_info));
    }
    if !alert.solution.is_empty() {
        md.push_str(&format!("**Solution:**\n\n{}\n\n", alert.solution));
    }

    let mut refs: Vec<String> = alert
        .tags
        .iter()
        .map(|(tag, link)| format!("[{}]({})", tag, link))
        .collect();
    if !alert.reference.is_empty() {
        refs.push(alert.reference.clone());
    }
    if !refs.is_empty() {
        md.push_str("**References:** ");
        md.push_str(&refs.join(" | "));
        md.push_str("\n\n");
    }

    md.push_str("---\n\n");
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max - 3).collect();
    format!("{}...", kept)
}

/// Escape special Markdown characters
fn md_escape(s: &str) -> String {
    s.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('*', "\\*")
        .replace('_', "\\_")
}
