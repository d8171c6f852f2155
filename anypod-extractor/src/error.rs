use anypod_core::ExtractorErrorKind;

/// Maps the extractor subprocess's stderr text to a classified error kind.
/// Pattern matching against known phrases is brittle by nature — this is a
/// best-effort classifier, not a guarantee; unmatched failures fall back to
/// `ExtractorFailed` with the captured text.
pub fn classify_stderr(stderr: &str) -> ExtractorErrorKind {
    let lower = stderr.to_lowercase();
    if lower.contains("sign in to confirm") || lower.contains("cookies") {
        ExtractorErrorKind::CookiesRequired
    } else if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate") {
        ExtractorErrorKind::RateLimited
    } else if lower.contains("private video") || lower.contains("403") || lower.contains("forbidden") {
        ExtractorErrorKind::Forbidden
    } else if lower.contains("video unavailable") || lower.contains("404") || lower.contains("not found") {
        ExtractorErrorKind::NotFound
    } else if lower.contains("requested format not available") || lower.contains("no video formats") {
        ExtractorErrorKind::ItemFiltered
    } else {
        ExtractorErrorKind::ExtractorFailed(stderr.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_phrases() {
        assert!(matches!(classify_stderr("ERROR: Sign in to confirm you're not a bot"), ExtractorErrorKind::CookiesRequired));
        assert!(matches!(classify_stderr("HTTP Error 429: Too Many Requests"), ExtractorErrorKind::RateLimited));
        assert!(matches!(classify_stderr("HTTP Error 403: Forbidden"), ExtractorErrorKind::Forbidden));
        assert!(matches!(classify_stderr("ERROR: Video unavailable"), ExtractorErrorKind::NotFound));
        assert!(matches!(classify_stderr("no video formats found"), ExtractorErrorKind::ItemFiltered));
    }

    #[test]
    fn falls_back_to_generic_failure() {
        match classify_stderr("some unrecognized stderr blob") {
            ExtractorErrorKind::ExtractorFailed(msg) => assert_eq!(msg, "some unrecognized stderr blob"),
            other => panic!("expected ExtractorFailed, got {other:?}"),
        }
    }
}
