/// Canonicalizes a metric label: trim, lowercase, then title-case so that
/// superficial casing/whitespace variants collapse into one label.
pub fn normalize_metric(raw: &str) -> String {
    title_case(&raw.trim().to_lowercase())
}

/// Title-cases a string the way Python's `str.title()` does: a letter is
/// uppercased whenever the preceding character is non-alphabetic, so
/// "non-controlling interests" becomes "Non-Controlling Interests" and
/// "(aed)" becomes "(Aed)".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }

    out
}

/// Parses a raw value cell: thousands separators stripped, then `f64`.
/// Returns `None` when the remaining text is not numeric; the caller decides
/// whether that is a reportable data-quality problem.
pub fn parse_value(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_matches_python_semantics() {
        assert_eq!(title_case("total assets"), "Total Assets");
        assert_eq!(
            title_case("non-controlling interests"),
            "Non-Controlling Interests"
        );
        assert_eq!(
            title_case("basic and diluted earnings per share (aed)"),
            "Basic And Diluted Earnings Per Share (Aed)"
        );
    }

    #[test]
    fn test_normalize_metric_collapses_variants() {
        assert_eq!(normalize_metric("  TOTAL ASSETS  "), "Total Assets");
        assert_eq!(normalize_metric("Total assets"), "Total Assets");
        assert_eq!(normalize_metric("total Assets"), "Total Assets");
    }

    #[test]
    fn test_parse_value_strips_thousands_separators() {
        assert_eq!(parse_value("1,234,567.89"), Some(1234567.89));
        assert_eq!(parse_value(" -2,500 "), Some(-2500.0));
        assert_eq!(parse_value("(n/a)"), None);
        assert_eq!(parse_value(""), None);
    }
}
