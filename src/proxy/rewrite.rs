use crate::router::path::is_under;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

static ROOT_RELATIVE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(href|src|action)="/([^"]*)""#).expect("static pattern"));

/// Drop every `Domain=` attribute from a `Set-Cookie` value so the cookie
/// binds to the host the client actually talked to
pub fn strip_cookie_domain(cookie: &str) -> String {
    let mut parts = cookie.split(';');
    let mut out = parts.next().unwrap_or_default().to_string();
    for attribute in parts {
        let trimmed = attribute.trim_start();
        let is_domain = trimmed
            .get(..7)
            .is_some_and(|name| name.eq_ignore_ascii_case("domain="))
            && trimmed.len() > 7;
        if !is_domain {
            out.push(';');
            out.push_str(attribute);
        }
    }
    out
}

/// Rewrite a `Location` from upstream so the client stays on this host.
///
/// `current` is the URL that produced the response, `origin_target` the
/// first URL proxied to, and `inbound_href` the URL the client requested.
pub fn rewrite_location(
    location: &str,
    current: &Url,
    origin_target: &Url,
    host: Option<&str>,
    inbound_href: &str,
    mount: Option<&str>,
) -> String {
    let mut rewritten = match current.join(location) {
        Ok(resolved) => match host.filter(|h| !h.is_empty()) {
            Some(host) if resolved.origin() == origin_target.origin() => {
                let path = match mount {
                    Some(mount) if !is_under(resolved.path(), mount) => {
                        format!("{}{}", mount, resolved.path())
                    }
                    _ => resolved.path().to_string(),
                };
                let query = resolved
                    .query()
                    .filter(|q| !q.is_empty())
                    .map(|q| format!("?{}", q))
                    .unwrap_or_default();
                let local = format!("https://{}{}{}", host, path, query);
                if local != inbound_href {
                    local
                } else {
                    resolved.to_string()
                }
            }
            _ => resolved.to_string(),
        },
        Err(_) => location.to_string(),
    };

    if let Some(mount) = mount {
        if rewritten.starts_with('/') && !rewritten.starts_with("//") {
            rewritten = format!("{}{}", mount, rewritten);
        }
    }
    rewritten
}

/// Prefix root-relative `href`/`src`/`action` attributes with `mount`.
/// A root `<base href="/">` is caught by the same rule.
pub fn rewrite_html(html: &str, mount: &str) -> String {
    ROOT_RELATIVE_ATTR
        .replace_all(html, |caps: &Captures<'_>| {
            let rest = &caps[2];
            if rest.starts_with('/')
                || rest.starts_with('#')
                || rest.starts_with("./")
                || rest.starts_with("../")
            {
                caps[0].to_string()
            } else {
                format!("{}=\"{}/{}\"", &caps[1], mount, rest)
            }
        })
        .into_owned()
}
