//! SQL Injection testing (error based)

use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

use super::{inject, payload_budget};
use crate::http::HttpMessage;
use crate::model::{Tech, TechSet};
use crate::scanner::alert::{Confidence, Risk};
use crate::scanner::name_value_pair::NameValuePair;
use crate::scanner::plugin::{
    scan_variants, AppParamPlugin, Plugin, PluginCore, PluginInfo, PluginTarget, Status,
};
use crate::scanner::variant::Variant;

/// Knowledge base key holding the detected DBMS names
pub const KB_DBMS: &str = "sql/dbms";

/// SQL error patterns and the DBMS they give away
const SQL_ERROR_PATTERNS: &[(&str, &str)] = &[
    (r"SQL syntax.*MySQL", Tech::MYSQL),
    (r"Warning.*mysql_", Tech::MYSQL),
    (r"valid MySQL result", Tech::MYSQL),
    (r"MySqlClient\.", Tech::MYSQL),
    (r"PostgreSQL.*ERROR", Tech::POSTGRESQL),
    (r"Warning.*\Wpg_", Tech::POSTGRESQL),
    (r"valid PostgreSQL result", Tech::POSTGRESQL),
    (r"Npgsql\.", Tech::POSTGRESQL),
    (r"Driver.*SQL[\-\_\ ]*Server", Tech::MSSQL),
    (r"OLE DB.*SQL Server", Tech::MSSQL),
    (r"Warning.*mssql_", Tech::MSSQL),
    (r"(?s)Exception.*\bSystem\.Data\.SqlClient\.", Tech::MSSQL),
    (r"Unclosed quotation mark after", Tech::MSSQL),
    (r"ORA-\d{5}", Tech::ORACLE),
    (r"Oracle.*Driver", Tech::ORACLE),
    (r"Warning.*\Woci_", Tech::ORACLE),
    (r"SQLite/JDBCDriver", Tech::SQLITE),
    (r"SQLite\.Exception", Tech::SQLITE),
    (r"System\.Data\.SQLite\.SQLiteException", Tech::SQLITE),
    (r"Warning.*sqlite_", Tech::SQLITE),
    (r"\[SQLITE_ERROR\]", Tech::SQLITE),
    (r"(?i)quoted string not properly terminated", Tech::DB),
    (r"(?i)you have an error in your sql syntax", Tech::DB),
];

/// Payloads that break out of the surrounding SQL
const SQLI_PAYLOADS: &[&str] = &[
    "'",
    "\"",
    "')",
    "' OR '1'='1",
    "\" OR \"1\"=\"1",
    "1' OR 1=1 --",
    "' UNION SELECT NULL--",
    "1; SELECT 1--",
    "' AND 1=CONVERT(int,(SELECT TOP 1 table_name FROM information_schema.tables))--",
    "' UNION SELECT NULL,NULL--",
    "1' AND '1'='1",
    "\\",
];

fn error_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SQL_ERROR_PATTERNS
            .iter()
            .filter_map(|(pattern, db)| Regex::new(pattern).ok().map(|r| (r, *db)))
            .collect()
    })
}

static INFO: PluginInfo = PluginInfo {
    id: 40018,
    name: "SQL Injection",
    code_name: "TestSQLInjection",
    description: "SQL injection may be possible: the response contains a database error \
        triggered by the injected value.",
    solution: "Use parameterized queries or prepared statements. Never concatenate user input \
        into SQL queries.",
    reference: "https://cheatsheetseries.owasp.org/cheatsheets/SQL_Injection_Prevention_Cheat_Sheet.html",
    risk: Risk::High,
    cwe_id: 89,
    wasc_id: 19,
    status: Status::Release,
    target: PluginTarget::Node,
    dependencies: &[],
};

#[derive(Debug, Clone)]
pub struct SqlInjection {
    core: PluginCore,
}

impl SqlInjection {
    pub fn new() -> Self {
        Self {
            core: PluginCore::new(),
        }
    }
}

impl Default for SqlInjection {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SqlInjection {
    fn info(&self) -> &PluginInfo {
        &INFO
    }

    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    fn scan(&mut self) -> Result<()> {
        scan_variants(self)
    }

    fn targets_tech(&self, tech: &TechSet) -> bool {
        tech.includes_any(&[Tech::DB])
            || SQL_ERROR_PATTERNS.iter().any(|(_, db)| tech.includes(&Tech::new(*db)))
    }
}

impl AppParamPlugin for SqlInjection {
    fn scan_param(
        &mut self,
        msg: HttpMessage,
        variant: &dyn Variant,
        param: &NameValuePair,
    ) -> Result<()> {
        let name = param.name().unwrap_or_default();
        let original = self.base_message()?.response_body_str().into_owned();
        let budget = payload_budget(self.attack_strength(false), SQLI_PAYLOADS.len());
        let tech = self.core().tech_set().clone();

        for payload in &SQLI_PAYLOADS[..budget] {
            if self.is_stop() {
                break;
            }
            let mut attack = inject(&msg, variant, param, payload);
            self.send_and_receive(&mut attack)?;
            let body = attack.response_body_str();

            // Errors already on the untouched page prove nothing
            let hit = error_patterns().iter().find(|(pattern, db)| {
                tech.includes(&Tech::new(*db)) && pattern.is_match(&body) && !pattern.is_match(&original)
            });
            let (pattern, db) = match hit {
                Some(hit) => hit,
                None => continue,
            };
            let evidence = pattern
                .find(&body)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            if *db != Tech::DB {
                if let Some(kb) = self.kb() {
                    kb.add(KB_DBMS, *db);
                    kb.add_for(attack.uri(), KB_DBMS, *db);
                }
            }

            self.bingo_with_evidence(
                Risk::High,
                Confidence::Medium,
                "",
                name,
                payload,
                &format!("Database: {}", db),
                &evidence,
                &attack,
            )?;
            return Ok(());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::active::attacks::tests::{query_value, scan_with};

    fn mysql_app(msg: &mut HttpMessage) {
        msg.response_header.status_code = 200;
        msg.response_body = if query_value(msg, "id").contains('\'') {
            b"You have an error in your SQL syntax; check the manual that corresponds to your MySQL server version".to_vec()
        } else {
            b"<p>Item 1</p>".to_vec()
        };
    }

    #[test]
    fn test_error_based_detection() {
        let (alerts, sent) = scan_with(
            Box::new(SqlInjection::new()),
            "https://example.com/item?id=1",
            mysql_app,
        );

        assert_eq!(sent, 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].plugin_id, 40018);
        assert_eq!(alerts[0].param, "id");
        assert_eq!(alerts[0].attack, "'");
        assert_eq!(alerts[0].other_info, format!("Database: {}", Tech::MYSQL));
        assert!(alerts[0].evidence.contains("SQL syntax"));
        assert_eq!(alerts[0].tags.get("CWE-89").map(String::as_str), Some("https://cwe.mitre.org/data/definitions/89.html"));
    }

    #[test]
    fn test_clean_application_has_no_alert() {
        let (alerts, sent) = scan_with(
            Box::new(SqlInjection::new()),
            "https://example.com/item?id=1",
            |msg| {
                msg.response_header.status_code = 200;
                msg.response_body = b"<p>Item</p>".to_vec();
            },
        );
        assert!(alerts.is_empty());
        assert_eq!(sent, payload_budget(crate::scanner::plugin::AttackStrength::Medium, SQLI_PAYLOADS.len()));
    }

    #[test]
    fn test_targets_databases_only() {
        let plugin = SqlInjection::new();
        assert!(plugin.targets_tech(&TechSet::all()));

        let mut web_only = TechSet::new();
        web_only.include(Tech::new(Tech::NGINX));
        assert!(!plugin.targets_tech(&web_only));

        let mut sqlite = TechSet::new();
        sqlite.include(Tech::new(Tech::SQLITE));
        assert!(plugin.targets_tech(&sqlite));
    }

    #[test]
    fn test_patterns_compile() {
        assert_eq!(error_patterns().len(), SQL_ERROR_PATTERNS.len());
    }
}
