//! Apple `.strings` files: one `"key" = "value";` pair per line

use crate::error::CodecError;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

const HEADER: &str = "/* Generated Translations */";

static PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"((?:[^"\\]|\\.)*)"\s*=\s*"((?:[^"\\]|\\.)*)"\s*;$"#)
        .expect("strings pair pattern is valid")
});

/// Render a key → text mapping as a `.strings` file
pub fn to_strings_file<'a, I>(strings: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut out = String::from(HEADER);
    out.push_str("\n\n");
    for (key, value) in strings {
        out.push_str(&format!("\"{}\" = \"{}\";\n", escape(key), escape(value)));
    }
    out
}

/// Parse a `.strings` file written in the one-pair-per-line layout
///
/// Blank lines, `//` line comments and single-line `/* ... */` comments are skipped.
pub fn parse_strings_file(content: &str) -> Result<IndexMap<String, String>, CodecError> {
    let mut strings = IndexMap::new();
    let mut in_comment = false;

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if in_comment {
            in_comment = !line.contains("*/");
            continue;
        }
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line.starts_with("/*") {
            in_comment = !line.contains("*/");
            continue;
        }

        let captures = PAIR.captures(line).ok_or_else(|| CodecError::StringsSyntax {
            line: number + 1,
            content: line.to_string(),
        })?;
        strings.insert(unescape(&captures[1]), unescape(&captures[2]));
    }

    Ok(strings)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
