/// Collapse repeated slashes and strip one trailing slash; empty becomes `/`
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(c);
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Percent-decode `input`. Malformed escapes or non-UTF-8 results leave the
/// input untouched.
pub fn safe_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3).and_then(|pair| {
                let hi = (pair[0] as char).to_digit(16)?;
                let lo = (pair[1] as char).to_digit(16)?;
                Some((hi * 16 + lo) as u8)
            });
            match hex {
                Some(byte) => {
                    decoded.push(byte);
                    i += 3;
                }
                None => return input.to_string(),
            }
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).unwrap_or_else(|_| input.to_string())
}

/// Longest leading run of literal segments of a base path.
/// `/app/*` and `/app/:id` yield `/app`; `/:slug` yields `/`.
pub fn static_prefix(base: &str) -> &str {
    let mut end = 0;
    for segment in base.split('/').skip(1) {
        if segment == "*" || segment.starts_with(':') {
            break;
        }
        end += 1 + segment.len();
    }
    if end == 0 { "/" } else { &base[..end] }
}

/// Front-end framework bundles requested from the site root
pub fn is_root_framework_asset(path: &str) -> bool {
    ["/_next", "/_nuxt"].iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// True if `path` is `base` itself or lies below it
pub fn is_under(path: &str, base: &str) -> bool {
    base == "/"
        || path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}
