// ABOUTME: Tokenizes path components for the lexical fallback matcher.
// ABOUTME: Splits on underscores and case boundaries, folds case, and filters stopwords.
use std::collections::HashSet;
use std::path::Path;

use testscope_core::TokenConfig;

/// Extracts path tokens used by the fallback matcher.
pub struct TokenCollector<'a> {
    root: &'a Path,
    minimum_length: usize,
    stopwords: HashSet<&'a str>,
}

impl<'a> TokenCollector<'a> {
    pub fn new(root: &'a Path, config: &'a TokenConfig) -> Self {
        Self {
            root,
            minimum_length: config.minimum_length,
            stopwords: config.stopwords.iter().map(String::as_str).collect(),
        }
    }

    fn split_token(&self, token: &str) -> HashSet<String> {
        let normalized = token.replace('-', "_");
        let mut parts: Vec<String> = Vec::new();

        for raw in normalized.split('_') {
            if raw.is_empty() {
                continue;
            }
            let chars: Vec<char> = raw.chars().collect();
            let mut start = 0;
            for idx in 1..chars.len() {
                let boundary = chars[idx].is_uppercase()
                    && (chars[idx - 1].is_lowercase()
                        || (idx + 1 < chars.len() && chars[idx + 1].is_lowercase()));
                if boundary {
                    parts.push(chars[start..idx].iter().collect::<String>().to_lowercase());
                    start = idx;
                }
            }
            parts.push(chars[start..].iter().collect::<String>().to_lowercase());
        }

        let mut tokens: HashSet<String> = parts.iter().cloned().collect();
        tokens.insert(normalized.to_lowercase());
        for part in &parts {
            // Longer plural tokens also match their singular form.
            if part.len() > 4 && part.ends_with('s') {
                tokens.insert(part[..part.len() - 1].to_string());
            }
        }

        tokens.retain(|t| t.len() >= self.minimum_length && !self.stopwords.contains(t.as_str()));
        tokens
    }

    fn component_tokens(&self, path: &Path, skip_filename: bool) -> HashSet<String> {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        let mut components: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if skip_filename {
            components.pop();
        }

        let mut tokens = HashSet::new();
        for component in components {
            let base = component.split('.').next().unwrap_or("");
            tokens.extend(self.split_token(base));
        }
        tokens
    }

    /// Tokens from every path component, extension stripped.
    pub fn path_tokens(&self, path: &Path) -> HashSet<String> {
        self.component_tokens(path, false)
    }

    /// Tokens from the directory components only.
    pub fn directory_tokens(&self, path: &Path) -> HashSet<String> {
        self.component_tokens(path, true)
    }
}
