//! Target technologies
//!
//! Technologies are dotted names (`Db.MySQL`). Including a technology
//! includes everything below it unless a descendant is excluded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tech(String);

impl Tech {
    pub const DB: &'static str = "Db";
    pub const MYSQL: &'static str = "Db.MySQL";
    pub const POSTGRESQL: &'static str = "Db.PostgreSQL";
    pub const MSSQL: &'static str = "Db.Microsoft SQL Server";
    pub const ORACLE: &'static str = "Db.Oracle";
    pub const SQLITE: &'static str = "Db.SQLite";
    pub const LANG: &'static str = "Language";
    pub const PHP: &'static str = "Language.PHP";
    pub const JAVA: &'static str = "Language.Java";
    pub const ASP: &'static str = "Language.ASP";
    pub const OS: &'static str = "OS";
    pub const LINUX: &'static str = "OS.Linux";
    pub const WINDOWS: &'static str = "OS.Windows";
    pub const WS: &'static str = "WS";
    pub const APACHE: &'static str = "WS.Apache";
    pub const IIS: &'static str = "WS.IIS";
    pub const NGINX: &'static str = "WS.Nginx";

    /// Top-level technologies included by [`TechSet::all`]
    pub const TOP_LEVEL: &'static [&'static str] = &[Self::DB, Self::LANG, Self::OS, Self::WS];

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn parent(&self) -> Option<Tech> {
        self.0.rsplit_once('.').map(|(parent, _)| Tech(parent.to_string()))
    }

    /// True when `self` is `other` or lies below it
    pub fn is(&self, other: &Tech) -> bool {
        self.0 == other.0
            || self
                .0
                .strip_prefix(other.0.as_str())
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
    }
}

impl fmt::Display for Tech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tech {
    fn from(name: &str) -> Self {
        Tech::new(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechSet {
    include: BTreeSet<Tech>,
    exclude: BTreeSet<Tech>,
}

impl TechSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything
    pub fn all() -> Self {
        let mut set = Self::new();
        for name in Tech::TOP_LEVEL {
            set.include(Tech::new(*name));
        }
        set
    }

    pub fn include(&mut self, tech: Tech) {
        self.exclude.remove(&tech);
        self.include.insert(tech);
    }

    pub fn exclude(&mut self, tech: Tech) {
        self.include.remove(&tech);
        self.exclude.insert(tech);
    }

    /// Walks up the hierarchy; the nearest explicit decision wins
    pub fn includes(&self, tech: &Tech) -> bool {
        let mut current = Some(tech.clone());
        while let Some(t) = current {
            if self.exclude.contains(&t) {
                return false;
            }
            if self.include.contains(&t) {
                return true;
            }
            current = t.parent();
        }
        false
    }

    pub fn includes_any(&self, techs: &[&str]) -> bool {
        techs.iter().any(|t| self.includes(&Tech::new(*t)))
    }

    pub fn included(&self) -> impl Iterator<Item = &Tech> {
        self.include.iter()
    }

    pub fn excluded(&self) -> impl Iterator<Item = &Tech> {
        self.exclude.iter()
    }
}
