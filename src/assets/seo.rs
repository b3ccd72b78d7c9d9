use crate::config::Bindings;
use crate::router::Router;

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Crawling is denied unless `ROBOTS_POLICY` is `allow` (any case)
pub fn robots_allowed(bindings: &Bindings) -> bool {
    bindings
        .get("ROBOTS_POLICY")
        .is_some_and(|policy| policy.eq_ignore_ascii_case("allow"))
}

pub fn robots_txt(origin: &str, allow: bool) -> String {
    let origin = origin.strip_suffix('/').unwrap_or(origin);
    let mut body = String::from("User-agent: *\n");
    if allow {
        body.push_str("Allow: /\n");
        body.push_str(&format!("Sitemap: {}/sitemap.xml\n", origin));
    } else {
        body.push_str("Disallow: /\n");
    }
    body
}

/// One `<url>` per distinct literal base path of the compiled rules
pub fn sitemap_xml(origin: &str, router: &Router) -> String {
    let origin = origin.strip_suffix('/').unwrap_or(origin);
    let entries: Vec<String> = router
        .static_bases()
        .into_iter()
        .map(|base| {
            format!(
                "  <url>\n    <loc>{}</loc>\n  </url>",
                escape_xml(&format!("{}{}", origin, base))
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}\n</urlset>",
        entries.join("\n")
    )
}
