// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL detection: ANSI stripping, regex extraction, and validity rules.

use std::sync::LazyLock;

use regex::Regex;

/// Strip ANSI escape sequences (CSI and OSC forms) from `content`.
pub fn strip_ansi(content: &str) -> String {
    static ANSI: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\x1b(\[[0-9;?]*[ -/]*[@-~]|\][^\x07]*\x07)").expect("static ansi regex")
    });
    ANSI.replace_all(content, "").into_owned()
}

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s<>\x22\x27]+").expect("static url regex")
});

/// Characters trimmed off the end of a detected match that are almost never
/// part of the URL itself (sentence punctuation, closing brackets).
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\''];

/// Extract and validate every URL occurring in `content`.
///
/// ANSI escapes are stripped first so a color-coded "Server running at
/// <url>" line still yields a clean URL. Trailing sentence punctuation is
/// trimmed; candidates that are left with an empty host, or a bare
/// trailing colon (`http://` with nothing after it, or a truncated
/// `http://host:`), are rejected.
pub fn detect(content: &str) -> Vec<String> {
    let clean = strip_ansi(content);
    URL_RE
        .find_iter(&clean)
        .filter_map(|m| {
            let trimmed = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            is_valid(trimmed).then(|| trimmed.to_string())
        })
        .collect()
}

/// Whether a candidate URL (already trimmed of sentence punctuation) is
/// acceptable: it must have a non-empty host and must not end in a bare
/// colon (an empty or truncated port).
pub fn is_valid(candidate: &str) -> bool {
    let Some(rest) = candidate.strip_prefix("http://").or_else(|| candidate.strip_prefix("https://")) else {
        return false;
    };
    if rest.is_empty() || rest.ends_with(':') {
        return false;
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_only = host.split(':').next().unwrap_or("");
    !host_only.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_color_codes() {
        let raw = "\x1b[32mServer running at http://localhost:3000\x1b[0m.";
        let clean = strip_ansi(raw);
        assert_eq!(clean, "Server running at http://localhost:3000.");
    }

    #[test]
    fn detect_finds_exactly_one_url_with_ansi_and_trailing_period() {
        let raw = "\x1b[32mServer running at http://localhost:3000\x1b[0m.";
        assert_eq!(detect(raw), vec!["http://localhost:3000".to_string()]);
    }

    #[test]
    fn detect_surrounded_by_prefix_and_suffix_text() {
        let urls = detect("prefix http://example.com/path suffix.");
        assert_eq!(urls, vec!["http://example.com/path".to_string()]);
    }

    #[yare::parameterized(
        plain = { "http://localhost:3000", true },
        with_path = { "https://example.com/a/b?c=1", true },
        empty_host = { "http://", false },
        bare_colon = { "http://host:", false },
        no_scheme = { "ftp://host", false },
    )]
    fn validity_rules(candidate: &str, expected: bool) {
        assert_eq!(is_valid(candidate), expected);
    }

    #[test]
    fn multiple_urls_in_one_line() {
        let urls = detect("see http://a.test and http://b.test:8080/x");
        assert_eq!(urls, vec!["http://a.test".to_string(), "http://b.test:8080/x".to_string()]);
    }
}
