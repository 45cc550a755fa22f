use crate::UrlError;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How a rule's domain pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The pattern must equal the domain (case-insensitive)
    #[default]
    Exact,
    /// Shell-style glob: `*`, `?` and `[...]` classes
    Glob,
    /// Regular expression searched anywhere in the domain
    Regex,
}

impl FromStr for MatchMode {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "glob" => Ok(Self::Glob),
            "regex" => Ok(Self::Regex),
            other => Err(UrlError::InvalidPattern {
                pattern: other.to_string(),
                reason: "match mode must be one of exact, glob, regex".to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Glob => write!(f, "glob"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

/// A compiled domain pattern
#[derive(Debug, Clone)]
pub struct DomainPattern {
    source: String,
    mode: MatchMode,
    regex: Option<Regex>,
}

impl DomainPattern {
    /// Compiles a pattern in the given mode
    ///
    /// Fails on an unterminated glob class or an invalid regular expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_spider::url::{DomainPattern, MatchMode};
    ///
    /// let pattern = DomainPattern::compile("*.example.com", MatchMode::Glob).unwrap();
    /// assert!(pattern.matches("blog.example.com"));
    /// assert!(pattern.matches("example.com"));
    /// assert!(!pattern.matches("example.org"));
    /// ```
    pub fn compile(pattern: &str, mode: MatchMode) -> Result<Self, UrlError> {
        let regex = match mode {
            MatchMode::Exact => None,
            MatchMode::Glob => {
                let translated = glob_to_regex(pattern)?;
                Some(build_regex(pattern, &translated)?)
            }
            MatchMode::Regex => Some(build_regex(pattern, pattern)?),
        };

        Ok(Self {
            source: pattern.to_string(),
            mode,
            regex,
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Checks a (lowercase) domain against the pattern
    pub fn matches(&self, domain: &str) -> bool {
        match (&self.mode, &self.regex) {
            (MatchMode::Glob, Some(regex)) => {
                regex.is_match(domain) || matches_wildcard(&self.source.to_lowercase(), domain)
            }
            (MatchMode::Regex, Some(regex)) => regex.is_match(domain),
            _ => self.source.eq_ignore_ascii_case(domain),
        }
    }
}

fn build_regex(pattern: &str, source: &str) -> Result<Regex, UrlError> {
    Regex::new(source).map_err(|e| UrlError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Translates a glob into an anchored, case-insensitive regular expression
fn glob_to_regex(glob: &str) -> Result<String, UrlError> {
    let mut out = String::from("(?i)^");
    let mut chars = glob.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for (i, inner) in chars.by_ref().enumerate() {
                    match inner {
                        ']' if i > 0 => {
                            closed = true;
                            break;
                        }
                        '!' if i == 0 => class.push('^'),
                        '\\' | '[' => {
                            class.push('\\');
                            class.push(inner);
                        }
                        _ => class.push(inner),
                    }
                }
                if !closed {
                    return Err(UrlError::InvalidPattern {
                        pattern: glob.to_string(),
                        reason: "unterminated character class".to_string(),
                    });
                }
                out.push('[');
                out.push_str(&class);
                out.push(']');
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}

/// Checks if a domain matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// # Examples
///
/// ```
/// use sumi_spider::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "blog.example.com"));
    }

    #[test]
    fn test_wildcard_no_match_partial() {
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
    }

    #[test]
    fn test_exact_pattern_ignores_case() {
        let pattern = DomainPattern::compile("Example.com", MatchMode::Exact).unwrap();
        assert!(pattern.matches("example.com"));
        assert!(!pattern.matches("sub.example.com"));
    }

    #[test]
    fn test_glob_star_and_question() {
        let pattern = DomainPattern::compile("shop?.example.*", MatchMode::Glob).unwrap();
        assert!(pattern.matches("shop1.example.com"));
        assert!(pattern.matches("shopx.example.org"));
        assert!(!pattern.matches("shop.example.com"));
        assert!(!pattern.matches("shop12.example.com"));
    }

    #[test]
    fn test_glob_subdomain_wildcard_matches_bare_domain() {
        let pattern = DomainPattern::compile("*.github.io", MatchMode::Glob).unwrap();
        assert!(pattern.matches("github.io"));
        assert!(pattern.matches("user.github.io"));
        assert!(!pattern.matches("github.com"));
    }

    #[test]
    fn test_glob_character_class() {
        let pattern = DomainPattern::compile("node[0-9].example.com", MatchMode::Glob).unwrap();
        assert!(pattern.matches("node3.example.com"));
        assert!(!pattern.matches("nodex.example.com"));

        let negated = DomainPattern::compile("node[!0-9].example.com", MatchMode::Glob).unwrap();
        assert!(negated.matches("nodex.example.com"));
        assert!(!negated.matches("node3.example.com"));
    }

    #[test]
    fn test_glob_escapes_dots() {
        let pattern = DomainPattern::compile("a.test", MatchMode::Glob).unwrap();
        assert!(pattern.matches("a.test"));
        assert!(!pattern.matches("abtest"));
    }

    #[test]
    fn test_invalid_glob() {
        let result = DomainPattern::compile("node[0-9.example.com", MatchMode::Glob);
        assert!(matches!(result, Err(UrlError::InvalidPattern { .. })));
    }

    #[test]
    fn test_regex_is_unanchored() {
        let pattern = DomainPattern::compile(r"news\.", MatchMode::Regex).unwrap();
        assert!(pattern.matches("news.example.com"));
        assert!(pattern.matches("uk.news.example.com"));
        assert!(!pattern.matches("example.com"));
    }

    #[test]
    fn test_invalid_regex() {
        let result = DomainPattern::compile("(unclosed", MatchMode::Regex);
        assert!(matches!(result, Err(UrlError::InvalidPattern { .. })));
    }

    #[test]
    fn test_match_mode_from_str() {
        assert_eq!("GLOB".parse::<MatchMode>().unwrap(), MatchMode::Glob);
        assert_eq!("regex".parse::<MatchMode>().unwrap(), MatchMode::Regex);
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }
}
