//! SKU extraction: find the catalog identifier that follows a keyword in
//! free text, e.g. `"... شناسه محصول: 127"`.
//!
//! Extraction is an ordered list of pattern strategies tried in sequence:
//! the general character-class pattern first, then a permissive digits-only
//! fallback for non-Latin digit scripts the general class rejects. Absence
//! of a match is a normal `None`, never an error.

use regex::Regex;

/// The recognized keyword/SKU delimiters, tried together as one class.
const DELIMITER_CLASS: &str = "[:：\\-_=]";

fn strategies(keyword: &str) -> [String; 2] {
    let kw = regex::escape(keyword);
    [
        // General: letters, digits, '_' or '-'.
        format!(r"(?i){kw}\s*{DELIMITER_CLASS}\s*([A-Za-z0-9_\-]+)"),
        // Permissive: any Unicode decimal digits (Arabic-Indic etc.).
        format!(r"(?i){kw}\s*{DELIMITER_CLASS}\s*(\d+)"),
    ]
}

/// Extract the SKU appearing after `keyword`, leftmost match, one per call.
pub fn extract_sku(text: &str, keyword: &str) -> Option<String> {
    if keyword.trim().is_empty() {
        return None;
    }
    for pattern in strategies(keyword) {
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(text) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Try each keyword in list order against `text`; the first one for which
/// SKU extraction succeeds wins, and later keywords are not attempted.
/// The list order IS the priority, not an iteration artifact.
pub fn match_keywords(text: &str, keywords: &[String]) -> Option<(String, String)> {
    let lower = text.to_lowercase();
    for keyword in keywords {
        if !lower.contains(&keyword.to_lowercase()) {
            continue;
        }
        if let Some(sku) = extract_sku(text, keyword) {
            return Some((keyword.clone(), sku));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_with_every_delimiter() {
        for delim in [":", "：", "-", "_", "="] {
            let text = format!("new stock! SKU {delim} ABC-12_3 available");
            assert_eq!(
                extract_sku(&text, "SKU").as_deref(),
                Some("ABC-12_3"),
                "delimiter {delim:?}"
            );
        }
    }

    #[test]
    fn whitespace_around_delimiter_is_optional() {
        assert_eq!(extract_sku("SKU:42", "SKU").as_deref(), Some("42"));
        assert_eq!(extract_sku("SKU   :   42", "SKU").as_deref(), Some("42"));
        assert_eq!(extract_sku("SKU:\t42", "SKU").as_deref(), Some("42"));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert_eq!(extract_sku("sku: X9", "SKU").as_deref(), Some("X9"));
        assert_eq!(extract_sku("SKU: X9", "sku").as_deref(), Some("X9"));
    }

    #[test]
    fn persian_keyword_with_ascii_digits() {
        let text = "شناسه محصول: 127 — great product";
        assert_eq!(extract_sku(text, "شناسه محصول").as_deref(), Some("127"));
    }

    #[test]
    fn fallback_accepts_arabic_indic_digits() {
        // The general class rejects these; the digits-only strategy catches them.
        let text = "شناسه محصول: ۱۲۷";
        assert_eq!(extract_sku(text, "شناسه محصول").as_deref(), Some("۱۲۷"));
    }

    #[test]
    fn leftmost_match_wins() {
        assert_eq!(
            extract_sku("SKU: first and SKU: second", "SKU").as_deref(),
            Some("first")
        );
    }

    #[test]
    fn missing_keyword_or_sku_is_none() {
        assert_eq!(extract_sku("no identifiers here", "SKU"), None);
        assert_eq!(extract_sku("SKU mentioned without value", "SKU"), None);
        assert_eq!(extract_sku("SKU: !!!", "SKU"), None);
        assert_eq!(extract_sku("whatever", ""), None);
    }

    #[test]
    fn keyword_list_order_defines_priority() {
        let keywords = vec!["code".to_string(), "sku".to_string()];
        let got = match_keywords("code: AAA sku: BBB", &keywords);
        assert_eq!(got, Some(("code".to_string(), "AAA".to_string())));
    }

    #[test]
    fn keyword_without_sku_falls_through_to_next() {
        let keywords = vec!["code".to_string(), "sku".to_string()];
        // "code" appears but has no extractable value; "sku" does.
        let got = match_keywords("discount code soon, sku: BBB", &keywords);
        assert_eq!(got, Some(("sku".to_string(), "BBB".to_string())));
    }

    #[test]
    fn no_keyword_matches() {
        let keywords = vec!["code".to_string()];
        assert_eq!(match_keywords("nothing relevant", &keywords), None);
    }
}
