//! Glob-pattern path matching for include/exclude filtering.
//!
//! Dialect: `**` matches any path fragment including `/`, `*` matches
//! within a single segment, `?` matches one character. Patterns are
//! compiled once per config and matched against `/`-separated paths
//! relative to the workspace root; a pattern may match at any directory
//! boundary.

use regex::Regex;
use std::path::Path;

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};

/// Translate one glob pattern into an anchored regex fragment.
fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            other => regex.push(other),
        }
    }
    regex
}

/// Compiled exclude-pattern set.
pub struct PathMatcher {
    regexes: Vec<Regex>,
}

impl PathMatcher {
    pub fn new(patterns: &[String]) -> IndexResult<Self> {
        let mut regexes = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            // `(^|/)` lets `node_modules/**` match at any depth.
            let full = format!("(^|/){}$", glob_to_regex(pattern));
            let regex = Regex::new(&full).map_err(|e| IndexError::InvalidConfig {
                reason: format!("invalid exclude pattern '{pattern}': {e}"),
            })?;
            regexes.push(regex);
        }
        Ok(Self { regexes })
    }

    /// Whether a `/`-separated relative path matches any pattern.
    pub fn matches(&self, relative_path: &str) -> bool {
        self.regexes.iter().any(|r| r.is_match(relative_path))
    }
}

/// Render a path relative to `root` with `/` separators, falling back to
/// the path itself when it is not under `root`.
pub fn relative_path_string(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in relative.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Discovery filter: extension membership plus exclude-pattern check.
pub fn should_index_file(path: &Path, config: &IndexConfig, matcher: &PathMatcher) -> bool {
    let extension = super::file_info::extension_of(path);
    if !config
        .include_extensions
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(&extension))
    {
        return false;
    }
    let relative = relative_path_string(path, &config.workspace_path);
    !matcher.matches(&relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn matcher(patterns: &[&str]) -> PathMatcher {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        PathMatcher::new(&owned).unwrap()
    }

    #[test]
    fn test_double_star_crosses_separators() {
        let m = matcher(&["node_modules/**"]);
        assert!(m.matches("node_modules/react/index.js"));
        assert!(m.matches("packages/app/node_modules/lib/x.ts"));
        assert!(!m.matches("src/node_modules_like.ts"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let m = matcher(&["dist/*.js"]);
        assert!(m.matches("dist/bundle.js"));
        assert!(!m.matches("dist/sub/bundle.js"));
    }

    #[test]
    fn test_question_mark_single_char() {
        let m = matcher(&["build-?/**"]);
        assert!(m.matches("build-1/out.ts"));
        assert!(m.matches("build-x/out.ts"));
        assert!(!m.matches("build-10/out.ts"));
    }

    #[test]
    fn test_literal_dots_are_escaped() {
        let m = matcher(&["*.generated.ts"]);
        assert!(m.matches("api.generated.ts"));
        assert!(m.matches("src/api.generated.ts"));
        assert!(!m.matches("api_generated_ts"));
    }

    #[test]
    fn test_relative_path_string() {
        let root = PathBuf::from("/ws");
        assert_eq!(
            relative_path_string(Path::new("/ws/src/a.ts"), &root),
            "src/a.ts"
        );
        assert_eq!(
            relative_path_string(Path::new("/elsewhere/a.ts"), &root),
            "elsewhere/a.ts"
        );
    }

    #[test]
    fn test_should_index_file() {
        let config = IndexConfig::new("/ws");
        let m = matcher(&["node_modules/**", ".git/**", "dist/**"]);

        assert!(should_index_file(Path::new("/ws/src/a.ts"), &config, &m));
        assert!(should_index_file(Path::new("/ws/b.jsx"), &config, &m));
        assert!(!should_index_file(Path::new("/ws/a.py"), &config, &m));
        assert!(!should_index_file(
            Path::new("/ws/node_modules/lib/a.ts"),
            &config,
            &m
        ));
        assert!(!should_index_file(Path::new("/ws/dist/a.js"), &config, &m));
    }
}
