use super::path::static_prefix;
use super::pattern::CompiledPattern;
use super::rule::{RouteRule, RouteType};

/// One rule bound to its base path and compiled pattern
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    pub base: String,
    pub rule: RouteRule,
    pub pattern: CompiledPattern,
    /// Position in declaration order across the whole rule set
    pub sequence_number: usize,
}

/// A matcher that accepted a request path, with its fully resolved target
#[derive(Debug, Clone)]
pub struct RouteMatch<'r> {
    pub matcher: &'r CompiledMatcher,
    pub target: String,
}

impl CompiledMatcher {
    /// Resolved target URL for `path`, or `None` if this matcher does not apply.
    ///
    /// A pattern match fills the target template from the captures. Failing
    /// that, a static prefix rule matches structurally and carries the path
    /// remainder over when `append_path` is set.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<String> {
        if self.rule.is_inert() {
            return None;
        }

        let resolved = if let Some(captures) = self.pattern.captures(path) {
            self.pattern.apply_template(&self.rule.target, &captures)
        } else if self.rule.route_type == RouteType::Prefix && !self.pattern.has_dynamic_segment {
            self.resolve_prefix(path)?
        } else {
            return None;
        };

        Some(append_original_query(resolved, query))
    }

    fn resolve_prefix(&self, path: &str) -> Option<String> {
        let rest = if self.base == "/" {
            if path == "/" { "" } else { path }
        } else if path == self.base {
            ""
        } else {
            path.strip_prefix(self.base.as_str())
                .filter(|rest| rest.starts_with('/'))?
        };

        let target = self
            .rule
            .target
            .strip_suffix('/')
            .unwrap_or(&self.rule.target);

        if self.rule.append_path {
            Some(format!("{}{}", target, rest))
        } else {
            Some(target.to_string())
        }
    }

    /// Path prefix the rule is mounted under, ignoring dynamic segments
    pub fn mount_base(&self) -> &str {
        static_prefix(&self.base)
    }
}

/// Append the request query unless the target already carries one
pub fn append_original_query(target: String, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() && !target.contains('?') => {
            format!("{}?{}", target, query)
        }
        _ => target,
    }
}
