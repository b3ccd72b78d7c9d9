use super::RedirectsSource;
use std::collections::HashMap;

pub const DEFAULT_CONFIG_REPO: &str = "IGCyukira/i0c.cc";
pub const DEFAULT_CONFIG_BRANCH: &str = "data";
pub const DEFAULT_CONFIG_PATH: &str = "redirects.json";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Deployment variables, looked up in priority order:
/// the explicit binding map first, then the process environment.
/// Empty values are treated as unset.
pub struct Bindings {
    explicit: HashMap<String, String>,
    env: EnvLookup,
}

impl Bindings {
    pub fn new(explicit: HashMap<String, String>) -> Self {
        Self {
            explicit,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Bindings that never consult the process environment
    pub fn isolated(explicit: HashMap<String, String>) -> Self {
        Self {
            explicit,
            env: Box::new(|_| None),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.explicit.get(key).filter(|v| !v.is_empty()) {
            return Some(value.clone());
        }
        (self.env)(key).filter(|v| !v.is_empty())
    }

    /// First non-empty value among `keys`
    pub fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("explicit", &self.explicit.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub fn build_config_url(repo: &str, branch: &str, path: &str) -> String {
    format!("https://raw.githubusercontent.com/{}/{}/{}", repo, branch, path)
}

/// Resolve the rule document URL.
///
/// A direct URL (`REDIRECTS_CONFIG_URL` / `CONFIG_URL`, then `redirects.url`) wins.
/// Otherwise the URL is assembled from repo, branch and path, each falling back
/// to its default independently.
pub fn resolve_config_url(bindings: &Bindings, source: &RedirectsSource) -> String {
    if let Some(direct) = bindings
        .first(&["REDIRECTS_CONFIG_URL", "CONFIG_URL"])
        .or_else(|| source.url.clone().filter(|u| !u.is_empty()))
    {
        return direct;
    }

    let repo = bindings
        .first(&["REDIRECTS_CONFIG_REPO", "CONFIG_REPO"])
        .or_else(|| source.repo.clone())
        .unwrap_or_else(|| DEFAULT_CONFIG_REPO.to_string());
    let branch = bindings
        .first(&["REDIRECTS_CONFIG_BRANCH", "CONFIG_BRANCH"])
        .or_else(|| source.branch.clone())
        .unwrap_or_else(|| DEFAULT_CONFIG_BRANCH.to_string());
    let path = bindings
        .first(&["REDIRECTS_CONFIG_PATH", "CONFIG_PATH"])
        .or_else(|| source.path.clone())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    build_config_url(&repo, &branch, &path)
}
