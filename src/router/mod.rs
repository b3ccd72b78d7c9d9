mod matcher;
pub mod path;
mod pattern;
mod rule;
mod slots;

pub use matcher::{CompiledMatcher, RouteMatch, append_original_query};
pub use pattern::{CompiledPattern, PatternError};
pub use rule::{DEFAULT_STATUS, RouteRule, RouteType};
pub use slots::{FlatSlots, RedirectsConfig, RouteValue, flatten_slots};

use path::{is_under, normalize_path, static_prefix};

/// Ordered matcher list compiled from a rule document
#[derive(Debug, Clone, Default)]
pub struct Router {
    matchers: Vec<CompiledMatcher>,
}

impl Router {
    /// Compile the slot tree of `config`. `None` when the document has no slot tree.
    pub fn from_config(config: &RedirectsConfig) -> Option<Self> {
        let slots = config.slots()?;
        Some(Self::compile(&flatten_slots(slots)))
    }

    /// Compile flattened slots into matchers ordered by base length (longest
    /// first), then priority, then declaration order.
    pub fn compile(flat: &FlatSlots) -> Self {
        let mut sequence_number = 0;
        let mut matchers = Vec::new();

        for (key, rules) in flat.iter() {
            let base = base_from_key(key);
            let pattern = match CompiledPattern::compile(&base) {
                Ok(pattern) => pattern,
                Err(e) => {
                    tracing::error!("Skipping rules for '{}': {}", key, e);
                    continue;
                }
            };

            for (index, value) in rules.iter().enumerate() {
                matchers.push(CompiledMatcher {
                    base: base.clone(),
                    rule: RouteRule::normalize(value, index as i64 + 1),
                    pattern: pattern.clone(),
                    sequence_number,
                });
                sequence_number += 1;
            }
        }

        matchers.sort_by(|a, b| {
            b.base
                .chars()
                .count()
                .cmp(&a.base.chars().count())
                .then(a.rule.priority.total_cmp(&b.rule.priority))
                .then(a.sequence_number.cmp(&b.sequence_number))
        });

        Self { matchers }
    }

    pub fn matchers(&self) -> &[CompiledMatcher] {
        &self.matchers
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Every matcher that accepts `path`, in evaluation order
    pub fn candidates<'r>(
        &'r self,
        path: &'r str,
        query: Option<&'r str>,
    ) -> impl Iterator<Item = RouteMatch<'r>> + 'r {
        self.matchers.iter().filter_map(move |matcher| {
            matcher
                .resolve(path, query)
                .map(|target| RouteMatch { matcher, target })
        })
    }

    pub fn match_request<'r>(
        &'r self,
        path: &'r str,
        query: Option<&'r str>,
    ) -> Option<RouteMatch<'r>> {
        self.candidates(path, query).next()
    }

    /// Rewrite a root-relative framework asset request (`/_next/...`,
    /// `/_nuxt/...`) onto the proxy mount its referring page lives under.
    /// Any other path is returned unchanged.
    pub fn effective_path(&self, path: &str, referer: Option<&str>) -> String {
        if !path::is_root_framework_asset(path) {
            return path.to_string();
        }
        let Some(referer_path) = referer
            .and_then(|r| url::Url::parse(r).ok())
            .map(|u| normalize_path(u.path()))
        else {
            return path.to_string();
        };

        let mount = self
            .matchers
            .iter()
            .filter(|m| m.rule.route_type == RouteType::Proxy && !m.rule.is_inert())
            .map(|m| m.mount_base())
            .filter(|mount| *mount != "/" && is_under(&referer_path, mount))
            .max_by_key(|mount| mount.len());

        match mount {
            Some(mount) => format!("{}{}", mount, path),
            None => path.to_string(),
        }
    }

    /// Distinct literal base paths in evaluation order
    pub fn static_bases(&self) -> Vec<&str> {
        let mut bases: Vec<&str> = Vec::new();
        for matcher in &self.matchers {
            if matcher.pattern.has_dynamic_segment || matcher.rule.is_inert() {
                continue;
            }
            if !bases.contains(&matcher.base.as_str()) {
                bases.push(&matcher.base);
            }
        }
        bases
    }
}

/// Slot key to base path: leading slash ensured, one trailing slash dropped
fn base_from_key(key: &str) -> String {
    let mut base = if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{}", key)
    };
    if base.len() > 1 && base.ends_with('/') {
        base.pop();
    }
    base
}

/// Mount prefix for a matched rule, `None` at the site root
pub fn mount_prefix(matcher: &CompiledMatcher) -> Option<&str> {
    Some(static_prefix(&matcher.base)).filter(|mount| *mount != "/")
}
