//! JSON Report Generator
//!
//! Generates machine-readable JSON scan reports.

use anyhow::Result;

use crate::reporting::ScanReport;

/// Generate JSON report
pub fn generate(report: &ScanReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

/// Generate minified JSON report
pub fn generate_minified(report: &ScanReport) -> Result<String> {
    let json = serde_json::to_string(report)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::tests::create_test_alerts;
    use crate::reporting::ReportMetadata;

    #[test]
    fn test_generate_json_report() {
        let report = ScanReport::new(create_test_alerts(), ReportMetadata::default());

        let json = generate(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total_alerts"], 3);
        assert_eq!(value["summary"]["by_risk"]["High"], 1);
        assert_eq!(value["alerts"][0]["name"], "SQL Injection");
        assert_eq!(value["alerts"][0]["risk"], "high");
        assert_eq!(value["alerts"][0]["tags"]["CWE-79"], "https://cwe.mitre.org/data/definitions/79.html");
    }

    #[test]
    fn test_generate_minified_json() {
        let report = ScanReport::new(create_test_alerts(), ReportMetadata::default());

        let json = generate_minified(&report).unwrap();
        assert!(!json.contains('\n'));
    }
}
