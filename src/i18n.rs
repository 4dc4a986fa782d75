//! Locale detection.
//!
//! Messages live in `locales/*.yml` and are looked up with `t!`. The
//! terminal picks its locale once at startup; the leaderboard server picks
//! one per request.
//!
//! Supported languages: en, fr.

use actix_web::HttpRequest;

/// All locales with a message file.
pub const SUPPORTED_LOCALES: &[&str] = &["en", "fr"];

/// Detects the best locale from the system environment.
///
/// Priority:
/// 1. `CHECKRANK_LANG` environment variable
/// 2. System locale (via `sys-locale` crate)
/// 3. Fallback to `"en"`
pub fn detect_system_locale() -> String {
    if let Ok(lang) = std::env::var("CHECKRANK_LANG")
        && let Some(locale) = normalize_locale(&lang)
    {
        return locale;
    }

    if let Some(locale_str) = sys_locale::get_locale()
        && let Some(locale) = normalize_locale(&locale_str)
    {
        return locale;
    }

    "en".to_string()
}

/// Extracts the locale from an HTTP request: `?lang=xx` first, then the
/// first supported `Accept-Language` tag, then `"en"`.
pub fn extract_locale_from_request(req: &HttpRequest) -> String {
    let from_query = req.query_string().split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "lang" { normalize_locale(value) } else { None }
    });
    if let Some(lang) = from_query {
        return lang;
    }

    if let Some(accept_lang) = req.headers().get("Accept-Language")
        && let Ok(value) = accept_lang.to_str()
    {
        for entry in value.split(',') {
            let tag = entry.split(';').next().unwrap_or("").trim();
            if let Some(locale) = normalize_locale(tag) {
                return locale;
            }
        }
    }

    "en".to_string()
}

/// Normalizes a locale string ("fr-CA", "en_US.UTF-8") to a supported
/// locale, or `None` if the language has no message file.
pub fn normalize_locale(input: &str) -> Option<String> {
    let lower = input.trim().to_lowercase();
    let tag = lower.split('.').next().unwrap_or(&lower).replace('_', "-");
    let language = tag.split('-').next().unwrap_or("");

    SUPPORTED_LOCALES
        .iter()
        .find(|supported| **supported == language)
        .map(|supported| supported.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("fr_FR.UTF-8").as_deref(), Some("fr"));
        assert_eq!(normalize_locale("en-US").as_deref(), Some("en"));
        assert_eq!(normalize_locale("FR").as_deref(), Some("fr"));
        assert_eq!(normalize_locale("de-DE"), None);
        assert_eq!(normalize_locale("french"), None);
        assert_eq!(normalize_locale(""), None);
    }

    #[test]
    fn test_request_locale() {
        let req = TestRequest::default()
            .uri("/api/leaderboard?lang=fr")
            .to_http_request();
        assert_eq!(extract_locale_from_request(&req), "fr");

        let req = TestRequest::default()
            .insert_header(("Accept-Language", "de-DE,fr;q=0.8,en;q=0.5"))
            .to_http_request();
        assert_eq!(extract_locale_from_request(&req), "fr");

        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_locale_from_request(&req), "en");
    }
}
