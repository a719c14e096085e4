//! Parsing of `Cookie` header strings and rendering of `Set-Cookie` strings.
//!
//! Names are written verbatim so that namespaced names like `app:id_token`
//! stay readable on the wire. Values are percent-encoded with the URI
//! component set on write and decoded on read.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use time::OffsetDateTime;
use tracing::debug;

use crate::config::{CookieSettings, SameSite};

/// Characters left untouched when encoding a cookie value, matching
/// `encodeURIComponent`.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Attributes attached to a single `Set-Cookie` string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<Duration>,
}

impl CookieOptions {
    /// Session cookie: no expiry attributes
    pub fn session(settings: &CookieSettings) -> Self {
        Self {
            path: Some(settings.path.clone()),
            domain: settings.domain.clone(),
            secure: settings.secure,
            same_site: settings.same_site,
            expires: None,
            max_age: None,
        }
    }

    /// Cookie that survives the browser session until `now + lifetime`.
    /// `Expires` is left off when that instant is out of range; `Max-Age`
    /// still bounds the cookie.
    pub fn persistent(settings: &CookieSettings, now: DateTime<Utc>) -> Self {
        let lifetime = settings.persist_duration();
        Self {
            expires: now.checked_add_signed(lifetime),
            max_age: Some(lifetime),
            ..Self::session(settings)
        }
    }

    /// Cookie the browser drops immediately: expiry at the Unix epoch
    pub fn expired(settings: &CookieSettings) -> Self {
        Self {
            expires: Some(DateTime::<Utc>::UNIX_EPOCH),
            ..Self::session(settings)
        }
    }
}

/// Parse a `Cookie` header string into name/value pairs.
///
/// Pairs without `=` are skipped. The first occurrence of a name wins, the
/// way browsers list the most specific cookie first.
pub fn parse(cookie_string: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for parsed in Cookie::split_parse(cookie_string) {
        let cookie = match parsed {
            Ok(cookie) => cookie,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable cookie pair");
                continue;
            }
        };
        cookies
            .entry(cookie.name().to_string())
            .or_insert_with(|| decode_value(cookie.value()));
    }
    cookies
}

/// Render a `Set-Cookie` string for `name=value` with the given attributes.
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> String {
    let encoded = utf8_percent_encode(value, VALUE_ENCODE_SET).to_string();
    let mut builder = Cookie::build((name.to_string(), encoded)).secure(options.secure);

    if let Some(ref path) = options.path {
        builder = builder.path(path.clone());
    }
    if let Some(ref domain) = options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(same_site) = options.same_site {
        builder = builder.same_site(same_site.into());
    }
    match options.expires.map(to_offset) {
        Some(Some(expires)) => builder = builder.expires(expires),
        Some(None) => debug!(cookie = %name, "Expiry out of range, omitting Expires"),
        None => {}
    }
    if let Some(max_age) = options.max_age {
        builder = builder.max_age(time::Duration::seconds(max_age.num_seconds()));
    }

    builder.build().to_string()
}

fn decode_value(raw: &str) -> String {
    // Undecodable sequences are kept as-is rather than dropping the cookie
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

pub(crate) fn to_offset(at: DateTime<Utc>) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()
}

pub(crate) fn from_offset(at: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_basic() {
        let cookies = parse("app:id_token=abc; app:keep=true; other=1");
        assert_eq!(cookies.get("app:id_token").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("app:keep").map(String::as_str), Some("true"));
        assert_eq!(cookies.get("other").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(parse("").is_empty());
        assert!(parse("no pairs here").is_empty());
        assert!(parse(";;;").is_empty());
    }

    #[test]
    fn test_parse_skips_bad_pairs() {
        let cookies = parse("garbage; a=1");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let cookies = parse("a=first; a=second");
        assert_eq!(cookies.get("a").map(String::as_str), Some("first"));
    }

    #[test]
    fn test_parse_decodes_values() {
        let cookies = parse("a=hello%20world%3B");
        assert_eq!(cookies.get("a").map(String::as_str), Some("hello world;"));
    }

    #[test]
    fn test_serialize_session_cookie() {
        let header = serialize("app:access_token", "a", &CookieOptions::session(&CookieSettings::default()));
        assert_eq!(header, "app:access_token=a; Path=/");
    }

    #[test]
    fn test_serialize_encodes_value() {
        let header = serialize("n", "a b;c=d", &CookieOptions::default());
        assert_eq!(header, "n=a%20b%3Bc%3Dd");
    }

    #[test]
    fn test_serialize_persistent_cookie() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let options = CookieOptions::persistent(&CookieSettings::default(), now);
        let header = serialize("app:keep", "true", &options);

        let parsed = Cookie::parse(header.as_str()).expect("Set-Cookie should parse");
        assert_eq!(parsed.name(), "app:keep");
        assert_eq!(parsed.value(), "true");
        assert_eq!(parsed.path(), Some("/"));
        assert_eq!(parsed.max_age().map(|d| d.whole_seconds()), Some(31_536_000));
        let expires = parsed.expires_datetime().expect("persistent cookie has Expires");
        assert_eq!(
            from_offset(expires),
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_serialize_huge_persist_days() {
        let settings = CookieSettings {
            persist_days: i64::MAX,
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let header = serialize("app:keep", "true", &CookieOptions::persistent(&settings, now));
        assert!(header.contains("Max-Age=3153600000"), "bad Max-Age: {}", header);
        assert!(header.contains("Expires="));

        // Past the last representable Expires date the attribute is dropped
        let late = Utc.with_ymd_and_hms(9990, 1, 1, 0, 0, 0).unwrap();
        let header = serialize("app:keep", "true", &CookieOptions::persistent(&settings, late));
        assert!(header.contains("Max-Age=3153600000"));
        assert!(!header.contains("Expires"));
    }

    #[test]
    fn test_serialize_expired_cookie() {
        let header = serialize("app:id_token", "", &CookieOptions::expired(&CookieSettings::default()));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(!header.contains("Max-Age"));
    }

    #[test]
    fn test_serialize_settings_attributes() {
        let settings = CookieSettings {
            domain: Some("example.com".to_string()),
            secure: true,
            same_site: Some(SameSite::Strict),
            ..Default::default()
        };
        let header = serialize("n", "v", &CookieOptions::session(&settings));
        let parsed = Cookie::parse(header.as_str()).expect("Set-Cookie should parse");
        assert_eq!(parsed.domain(), Some("example.com"));
        assert_eq!(parsed.secure(), Some(true));
        assert_eq!(parsed.same_site(), Some(cookie::SameSite::Strict));
    }
}
