use super::slots::RouteValue;
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_STATUS: u16 = 302;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteType {
    #[default]
    Prefix,
    Exact,
    Proxy,
}

impl RouteType {
    /// Unrecognized or missing types fall back to `Prefix`
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("exact") => RouteType::Exact,
            Some("proxy") => RouteType::Proxy,
            _ => RouteType::Prefix,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Prefix => "prefix",
            RouteType::Exact => "exact",
            RouteType::Proxy => "proxy",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical rule record every declared shape is normalized into
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRule {
    pub route_type: RouteType,
    /// Destination URL or template; empty means the rule never matches
    pub target: String,
    pub append_path: bool,
    pub status: u16,
    /// Lower sorts first among rules sharing a base path; fractions keep their order
    pub priority: f64,
}

impl RouteRule {
    pub fn prefix(target: impl Into<String>, position: i64) -> Self {
        Self {
            route_type: RouteType::Prefix,
            target: target.into(),
            append_path: true,
            status: DEFAULT_STATUS,
            priority: position as f64,
        }
    }

    /// Normalize a declared rule. `position` is the 1-based ordinal of the rule
    /// within its base path's list and serves as the default priority.
    pub fn normalize(value: &RouteValue, position: i64) -> Self {
        match value {
            RouteValue::Target(target) => Self::prefix(target.clone(), position),
            RouteValue::Config(config) => Self::from_object(config, position),
        }
    }

    fn from_object(config: &Map<String, Value>, position: i64) -> Self {
        let target = ["target", "to", "url"]
            .iter()
            .find_map(|key| config.get(*key).filter(|v| !v.is_null()))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let append_path = config
            .get("appendPath")
            .map(is_truthy)
            .unwrap_or(true);

        let status = config
            .get("status")
            .and_then(to_number)
            .and_then(status_from_number)
            .unwrap_or(DEFAULT_STATUS);

        let priority = config
            .get("priority")
            .and_then(to_number)
            .unwrap_or(position as f64);

        Self {
            route_type: RouteType::from_value(config.get("type")),
            target,
            append_path,
            status,
            priority,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.target.is_empty()
    }
}

fn status_from_number(n: f64) -> Option<u16> {
    (n.fract() == 0.0 && (100.0..=599.0).contains(&n)).then_some(n as u16)
}

/// Loose numeric reading: numbers, numeric strings and booleans.
/// Non-finite results count as "not a number".
fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
