//! Doc comment normalisation.

use std::sync::OnceLock;

use regex::Regex;

fn markers() -> &'static Regex {
    static MARKERS: OnceLock<Regex> = OnceLock::new();
    MARKERS.get_or_init(|| {
        Regex::new(r"^\s*(?:/\*\*|/\*|\*/|//+|\*)?").expect("comment marker regex is valid")
    })
}

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex is valid"))
}

/// Strip comment markers from every line, join the lines, and collapse runs
/// of whitespace.
pub fn normalize(raw: &str) -> String {
    let joined = raw
        .lines()
        .map(|line| {
            let line = markers().replace(line, "");
            line.trim_end().trim_end_matches("*/").to_string()
        })
        .collect::<Vec<_>>()
        .join(" ");

    whitespace().replace_all(joined.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_javadoc_markers() {
        let raw = "/**\n * Returns the user.\n *   With   details.\n */";
        assert_eq!(normalize(raw), "Returns the user. With details.");
    }

    #[test]
    fn test_strips_line_comments() {
        assert_eq!(normalize("// first\n// second"), "first second");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(normalize("Plain text"), "Plain text");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_single_line_block() {
        assert_eq!(normalize("/* inline */"), "inline");
    }
}
