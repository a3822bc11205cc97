//! Language detection and enumeration.
//!
//! Maps file extensions to stable language tags. The tags are observable
//! through stats and per-file queries, so they never change spelling.

use serde::{Deserialize, Serialize};

/// Languages the extension map knows about.
///
/// Having a language here does not imply a parser exists for it; parsers
/// arrive through the plugin registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Java,
    Cpp,
    C,
    CSharp,
    Php,
    Ruby,
    Go,
    Rust,
    Swift,
}

impl Language {
    /// Detect language from a file extension, with or without the leading
    /// dot. Unknown extensions yield `None`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "ts" | "tsx" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cpp" => Some(Language::Cpp),
            "c" => Some(Language::C),
            "cs" => Some(Language::CSharp),
            "php" => Some(Language::Php),
            "rb" => Some(Language::Ruby),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "swift" => Some(Language::Swift),
            _ => None,
        }
    }

    /// Detect language from a file path.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Stable lowercase tag, e.g. `"typescript"`.
    pub fn id(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Swift => "swift",
        }
    }

    /// Default dot-prefixed extensions for this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => &[".ts", ".tsx"],
            Language::JavaScript => &[".js", ".jsx", ".mjs", ".cjs"],
            Language::Python => &[".py"],
            Language::Java => &[".java"],
            Language::Cpp => &[".cpp"],
            Language::C => &[".c"],
            Language::CSharp => &[".cs"],
            Language::Php => &[".php"],
            Language::Ruby => &[".rb"],
            Language::Go => &[".go"],
            Language::Rust => &[".rs"],
            Language::Swift => &[".swift"],
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::Cpp => "C++",
            Language::C => "C",
            Language::CSharp => "C#",
            Language::Php => "PHP",
            Language::Ruby => "Ruby",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Swift => "Swift",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
