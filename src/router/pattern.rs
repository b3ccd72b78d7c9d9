use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Invalid base path pattern '{base}': {source}")]
    InvalidRegex {
        base: String,
        #[source]
        source: regex::Error,
    },
}

/// Matcher compiled from a base path.
///
/// `*` segments capture everything (slashes included), `:name` segments
/// capture up to the next slash, and all other segments match literally.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub match_expression: Regex,
    pub parameter_names: Vec<String>,
    pub has_dynamic_segment: bool,
    /// Capture group index of each entry in `parameter_names`
    name_groups: Vec<usize>,
}

impl CompiledPattern {
    pub fn compile(base: &str) -> Result<Self, PatternError> {
        let mut expression = String::from("^");
        let mut parameter_names = Vec::new();
        let mut name_groups = Vec::new();
        let mut has_dynamic_segment = false;
        let mut group = 0;

        if base == "/" {
            expression.push('/');
        } else {
            for segment in base.split('/').skip(1) {
                expression.push('/');
                if segment == "*" {
                    group += 1;
                    expression.push_str("(.*)");
                    has_dynamic_segment = true;
                } else if let Some(name) = segment.strip_prefix(':') {
                    group += 1;
                    parameter_names.push(name.to_string());
                    name_groups.push(group);
                    expression.push_str("([^/]+)");
                    has_dynamic_segment = true;
                } else {
                    expression.push_str(&regex::escape(segment));
                }
            }
        }
        expression.push('$');

        let match_expression =
            Regex::new(&expression).map_err(|source| PatternError::InvalidRegex {
                base: base.to_string(),
                source,
            })?;

        Ok(Self {
            match_expression,
            parameter_names,
            has_dynamic_segment,
            name_groups,
        })
    }

    pub fn captures<'p>(&self, path: &'p str) -> Option<Captures<'p>> {
        self.match_expression.captures(path)
    }

    /// Fill `$N` (1-based positional) and `:name` references in `template`
    /// from `captures`. Unresolvable references become empty strings.
    /// Substituted text is never rescanned.
    pub fn apply_template(&self, template: &str, captures: &Captures<'_>) -> String {
        let bytes = template.as_bytes();
        let mut output = String::with_capacity(template.len());
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            let marker = bytes[i];
            if marker != b'$' && marker != b':' {
                i += 1;
                continue;
            }

            let reference_len = bytes[i + 1..]
                .iter()
                .take_while(|b| {
                    if marker == b'$' {
                        b.is_ascii_digit()
                    } else {
                        b.is_ascii_alphanumeric() || **b == b'_'
                    }
                })
                .count();

            if reference_len == 0 {
                i += 1;
                continue;
            }

            let reference = &template[i + 1..i + 1 + reference_len];
            output.push_str(&template[literal_start..i]);

            let value = if marker == b'$' {
                reference
                    .parse::<usize>()
                    .map(|index| group_text(captures, index))
                    .unwrap_or("")
            } else {
                self.parameter_names
                    .iter()
                    .position(|name| name == reference)
                    .map(|pos| group_text(captures, self.name_groups[pos]))
                    .unwrap_or("")
            };
            output.push_str(value);

            i += 1 + reference_len;
            literal_start = i;
        }

        output.push_str(&template[literal_start..]);
        output
    }
}

fn group_text<'t>(captures: &Captures<'t>, index: usize) -> &'t str {
    if index == 0 {
        return "";
    }
    captures.get(index).map(|m| m.as_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(base: &str, template: &str, path: &str) -> Option<String> {
        let pattern = CompiledPattern::compile(base).unwrap();
        let captures = pattern.captures(path)?;
        Some(pattern.apply_template(template, &captures))
    }

    #[test]
    fn test_root_pattern() {
        let pattern = CompiledPattern::compile("/").unwrap();
        assert!(pattern.match_expression.is_match("/"));
        assert!(!pattern.match_expression.is_match("/a"));
        assert!(pattern.parameter_names.is_empty());
        assert!(!pattern.has_dynamic_segment);
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let pattern = CompiledPattern::compile("/v1.0/a+b").unwrap();
        assert!(pattern.match_expression.is_match("/v1.0/a+b"));
        assert!(!pattern.match_expression.is_match("/v1x0/aab"));
        assert!(!pattern.has_dynamic_segment);
    }

    #[test]
    fn test_named_parameter() {
        assert_eq!(
            resolve("/blog/:slug", "https://x/$1", "/blog/hello-world").unwrap(),
            "https://x/hello-world"
        );
        assert_eq!(
            resolve("/blog/:slug", "https://x/p/:slug", "/blog/hello-world").unwrap(),
            "https://x/p/hello-world"
        );
        assert!(resolve("/blog/:slug", "https://x/$1", "/blog/a/b").is_none());
    }

    #[test]
    fn test_wildcard_spans_slashes() {
        let pattern = CompiledPattern::compile("/files/*").unwrap();
        assert!(pattern.has_dynamic_segment);
        assert_eq!(
            resolve("/files/*", "https://cdn/$1", "/files/a/b/c.txt").unwrap(),
            "https://cdn/a/b/c.txt"
        );
    }

    #[test]
    fn test_named_after_wildcard_uses_its_own_group() {
        assert_eq!(
            resolve("/u/*/:id", "https://x/:id?rest=$1", "/u/a/b/42").unwrap(),
            "https://x/42?rest=a/b"
        );
    }

    #[test]
    fn test_unresolved_references_are_empty() {
        assert_eq!(
            resolve("/p/:id", "https://x/$2/:missing/$0/:id", "/p/7").unwrap(),
            "https://x////7"
        );
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        assert_eq!(
            resolve("/p/:id", "https://x/:id", "/p/a:id").unwrap(),
            "https://x/a:id"
        );
    }

    #[test]
    fn test_scheme_separator_untouched() {
        assert_eq!(resolve("/p/:id", "https://x/$", "/p/1").unwrap(), "https://x/$");
    }
}
