//! Plugin sensitivity and intensity knobs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How readily a plugin reports a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertThreshold {
    Off,
    Default,
    Low,
    Medium,
    High,
}

/// How many requests a plugin is allowed to spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttackStrength {
    Default,
    Low,
    Medium,
    High,
    Insane,
}

impl AlertThreshold {
    pub fn name(&self) -> &'static str {
        match self {
            AlertThreshold::Off => "OFF",
            AlertThreshold::Default => "DEFAULT",
            AlertThreshold::Low => "LOW",
            AlertThreshold::Medium => "MEDIUM",
            AlertThreshold::High => "HIGH",
        }
    }
}

impl AttackStrength {
    pub fn name(&self) -> &'static str {
        match self {
            AttackStrength::Default => "DEFAULT",
            AttackStrength::Low => "LOW",
            AttackStrength::Medium => "MEDIUM",
            AttackStrength::High => "HIGH",
            AttackStrength::Insane => "INSANE",
        }
    }
}

impl fmt::Display for AlertThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for AttackStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlertThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => Ok(AlertThreshold::Off),
            "DEFAULT" => Ok(AlertThreshold::Default),
            "LOW" => Ok(AlertThreshold::Low),
            "MEDIUM" => Ok(AlertThreshold::Medium),
            "HIGH" => Ok(AlertThreshold::High),
            other => Err(format!("unknown alert threshold: {}", other)),
        }
    }
}

impl FromStr for AttackStrength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(AttackStrength::Default),
            "LOW" => Ok(AttackStrength::Low),
            "MEDIUM" => Ok(AttackStrength::Medium),
            "HIGH" => Ok(AttackStrength::High),
            "INSANE" => Ok(AttackStrength::Insane),
            other => Err(format!("unknown attack strength: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for t in [
            AlertThreshold::Off,
            AlertThreshold::Default,
            AlertThreshold::Low,
            AlertThreshold::Medium,
            AlertThreshold::High,
        ] {
            assert_eq!(t.name().parse::<AlertThreshold>(), Ok(t));
        }
        assert_eq!("insane".parse::<AttackStrength>(), Ok(AttackStrength::Insane));
        assert!("extreme".parse::<AttackStrength>().is_err());
    }
}
