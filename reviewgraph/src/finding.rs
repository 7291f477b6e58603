use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a finding, ordered from most to least severe.
///
/// The derived `Ord` follows declaration order, so `Critical < Info` in the
/// Rust sense. Use [`Severity::rank`] or [`Severity::is_at_least`] when the
/// intent is "how severe", not the raw ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Priority rank: critical = 0 .. info = 4.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// True when `self` is at least as severe as `min`.
    pub fn is_at_least(self, min: Severity) -> bool {
        self.rank() <= min.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => bail!("unknown severity: {other} (valid: critical, high, medium, low, info)"),
        }
    }
}

/// One discrete analysis result. Immutable once created; the synthesis
/// stage only copies and reorders findings, it never edits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub column: Option<usize>,
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub impact: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub recommendation: String,
    pub auto_fixable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cwe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cvss_score: Option<f64>,
}

impl Finding {
    /// Create a finding with a fresh id and empty auxiliary fields.
    /// Callers fill the rest via struct update syntax.
    pub fn new(
        file: impl Into<String>,
        line: usize,
        severity: Severity,
        category: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file: file.into(),
            line,
            column: None,
            severity,
            category: category.into(),
            title: title.into(),
            description: String::new(),
            impact: String::new(),
            recommendation: String::new(),
            auto_fixable: false,
            references: vec![],
            cwe_id: None,
            cvss_score: None,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}:{})",
            self.severity, self.title, self.file, self.line
        )
    }
}

/// A proposed fix for an auto-fixable finding, produced by the
/// fix-generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFix {
    pub finding_id: Uuid,
    pub fix_code: String,
    pub status: String,
}
