//! Extraction of `(param, body)` from the function literal passed to
//! `forEach` / `map`.
//!
//! The body is kept as source text; nothing here evaluates JavaScript.

use std::sync::LazyLock;

use regex::Regex;

use super::descriptor::CursorFunction;
use super::scanner::{find_closing, read_identifier, skip_whitespace};

static FUNCTION_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*function\s*[A-Za-z_$]?[\w$]*\s*\(\s*([A-Za-z_$][\w$]*)?\s*(?:,[^)]*)?\)\s*\{([\s\S]*)\}\s*$")
        .expect("valid function literal pattern")
});

/// Extract the first parameter name and the body of a function literal.
///
/// Tries a strict `function name?(param) { body }` match first, then falls
/// back to brace matching, which also accepts trailing text after the body
/// and arrow functions (`doc => expr`, `(doc) => { ... }`).
pub fn extract_function(args_text: &str) -> Option<CursorFunction> {
    if let Some(caps) = FUNCTION_LITERAL.captures(args_text) {
        return Some(CursorFunction {
            param: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
            body: caps.get(2).map(|m| m.as_str()).unwrap_or_default().trim().to_string(),
        });
    }

    extract_lenient(args_text.trim())
}

/// Brace-matching fallback
fn extract_lenient(text: &str) -> Option<CursorFunction> {
    if let Some(arrow) = text.find("=>") {
        if !text.starts_with("function") {
            return extract_arrow(text, arrow);
        }
    }

    let open = text.find('(')?;
    let close = find_closing(text, open, '(', ')')?;
    let param = first_param(&text[open + 1..close]);

    let brace = close + text[close..].find('{')?;
    let end = find_closing(text, brace, '{', '}')?;

    Some(CursorFunction {
        param,
        body: text[brace + 1..end].trim().to_string(),
    })
}

fn extract_arrow(text: &str, arrow: usize) -> Option<CursorFunction> {
    let params = text[..arrow].trim();
    let params = params
        .strip_prefix('(')
        .and_then(|p| p.strip_suffix(')'))
        .unwrap_or(params);
    let param = first_param(params);

    let rest_start = skip_whitespace(text, arrow + 2);
    let rest = &text[rest_start..];
    let body = if rest.starts_with('{') {
        let end = find_closing(rest, 0, '{', '}')?;
        rest[1..end].trim().to_string()
    } else {
        rest.trim().to_string()
    };

    Some(CursorFunction { param, body })
}

/// First identifier in a parameter list, or an empty string
fn first_param(params: &str) -> String {
    let start = skip_whitespace(params, 0);
    read_identifier(params, start)
        .map(|(ident, _)| ident.to_string())
        .unwrap_or_default()
}
