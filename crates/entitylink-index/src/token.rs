//! Per-property analysis (§4.4): tokenization, lowercasing, and the escaping
//! of reserved query-string characters.

/// Characters reserved by the query grammar; each must be backslash-escaped
/// before a token is embedded in a query string.
const RESERVED: &[char] = &['*', '?', '!', '&', '(', ')', '-', '+', ':', '"', '[', ']', '~', '{', '}', '^', '|'];

/// Escape reserved characters in `token` with a leading backslash.
#[must_use]
pub fn escape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split `value` into lowercased word tokens using a standard
/// whitespace/punctuation boundary tokenizer.
///
/// Identity fields bypass this: they are indexed as a single verbatim token
/// (see [`identity_token`]) so exact lookup succeeds regardless of content.
#[must_use]
pub fn analyze(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// The single verbatim token an identity field is stored/looked-up under.
#[must_use]
pub fn identity_token(value: &str) -> &str {
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(escape("a*b"), "a\\*b");
        assert_eq!(escape("\"quoted\""), "\\\"quoted\\\"");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn analyze_lowercases_and_splits_on_punctuation() {
        assert_eq!(analyze("John Smith-Jones"), vec!["john", "smith", "jones"]);
        assert_eq!(analyze(""), Vec::<String>::new());
    }
}
