use std::path::Path;

pub const PLAINTEXT: &str = "plaintext";

pub fn language_from_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "cs" => "csharp",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "go" => "go",
        "php" => "php",
        "rb" => "ruby",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "xml" => "xml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        _ => PLAINTEXT,
    }
}

pub fn language_from_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(language_from_extension)
        .unwrap_or(PLAINTEXT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(language_from_path(Path::new("src/main.rs")), "rust");
        assert_eq!(language_from_path(Path::new("App.TSX")), "typescript");
        assert_eq!(language_from_path(Path::new("ci.yml")), "yaml");
        assert_eq!(language_from_path(Path::new("Makefile")), PLAINTEXT);
        assert_eq!(language_from_path(Path::new("notes.unknown")), PLAINTEXT);
    }
}
