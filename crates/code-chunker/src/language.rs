use std::path::Path;

/// Grammar used to parse a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    /// Detect grammar from file extension.
    ///
    /// Unknown extensions get TypeScript: it accepts plain JavaScript plus
    /// optional type annotations and every module import/export form.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "tsx" => Language::Tsx,
            _ => Language::TypeScript,
        }
    }

    /// Detect grammar from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Language::TypeScript, Self::from_extension)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
        }
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("CJS"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::Tsx);
        assert_eq!(Language::from_extension("txt"), Language::TypeScript);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/routes/user.js"), Language::JavaScript);
        assert_eq!(Language::from_path("index.ts"), Language::TypeScript);
        assert_eq!(Language::from_path("no_extension"), Language::TypeScript);
    }

    #[test]
    fn grammars_load() {
        for language in [Language::JavaScript, Language::TypeScript, Language::Tsx] {
            let mut parser = tree_sitter::Parser::new();
            assert!(parser.set_language(&language.tree_sitter_language()).is_ok());
        }
    }
}
