//! Output records of an analysis run. Field names serialize in camelCase
//! so the JSON matches what report consumers expect.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
/// Severity attached to a security sink or dangerous pattern.
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" | "warning" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<ir::Span> for Location {
    fn from(span: ir::Span) -> Self {
        Location {
            line: span.line,
            column: span.column,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
    Header,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub location: ParamLocation,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub spread: bool,
}

/// A recovered network request shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallSite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub params: Vec<ParamDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueConstraint {
    pub variable: String,
    pub values: Vec<JsonValue>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtoEnum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtoFieldMap {
    pub message: String,
    /// Field number rendered as a string, mapped to the accessor name.
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySink {
    #[serde(rename = "type")]
    pub kind: String,
    pub sink: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub sanitized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DangerousPattern {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Everything one `analyze` call produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub fetch_call_sites: Vec<CallSite>,
    pub value_constraints: Vec<ValueConstraint>,
    pub proto_enums: Vec<ProtoEnum>,
    pub proto_field_maps: Vec<ProtoFieldMap>,
    pub security_sinks: Vec<SecuritySink>,
    pub dangerous_patterns: Vec<DangerousPattern>,
    pub source_map_url: Option<String>,
}

impl AnalysisResult {
    /// Highest severity among security sinks and dangerous patterns.
    pub fn max_severity(&self) -> Option<Severity> {
        self.security_sinks
            .iter()
            .map(|s| s.severity)
            .chain(self.dangerous_patterns.iter().map(|p| p.severity))
            .max()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub code: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub force_script: bool,
}

/// Per-item batch outcome; carries only the security findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub success: bool,
    pub security_sinks: Vec<SecuritySink>,
    pub dangerous_patterns: Vec<DangerousPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
