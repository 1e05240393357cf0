// ABOUTME: Builds configured Tree-sitter parsers for the module system under analysis.
// ABOUTME: Python is the only grammar; the registry keeps parser construction in one place.
use tree_sitter::Parser;

pub struct LanguageRegistry {
    language: tree_sitter::Language,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    pub fn create_parser(&self) -> Option<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).ok()?;
        Some(parser)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

    #[test]
    fn registered_grammar_uses_supported_version() {
        let registry = LanguageRegistry::new();
        let version = registry.language.abi_version();
        assert!(
            (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version),
            "grammar uses incompatible Tree-sitter version {} (supported {}..={})",
            version,
            MIN_COMPATIBLE_LANGUAGE_VERSION,
            LANGUAGE_VERSION
        );
    }

    #[test]
    fn create_parser_accepts_python_source() {
        let registry = LanguageRegistry::new();
        let mut parser = registry.create_parser().unwrap();
        let tree = parser.parse("def ping():\n    return 1\n", None).unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }
}
