//! Claims carried in the identity token payload.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Claims the application did not model explicitly
pub type ExtraClaims = Map<String, Value>;

/// Audience claim can be string or array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

/// Read a standard claim, keeping `None` when the issuer sent another JSON type.
fn lenient<'de, D, V>(deserializer: D) -> Result<Option<V>, D::Error>
where
    D: Deserializer<'de>,
    V: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decoded identity token claims.
///
/// The standard fields are modeled directly; everything else lands in `extra`,
/// whose shape the application chooses. The default keeps the remaining
/// claims as a JSON object. A standard claim of an unexpected type reads as
/// `None` without affecting the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims<T = ExtraClaims> {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
    /// Issued-at in seconds since the Unix epoch, possibly fractional
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,
    /// Expiry in seconds since the Unix epoch, possibly fractional
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        rename = "cognito:username",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub cognito_username: Option<String>,

    #[serde(flatten)]
    pub extra: T,
}

impl<T: Default + PartialEq> Claims<T> {
    /// True for the value left behind by a failed decode
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn seconds_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((seconds * 1000.0) as i64)
}

impl<T> Claims<T> {
    /// `username`, falling back to `cognito:username`
    pub fn user_name(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.cognito_username.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(seconds_to_datetime)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(seconds_to_datetime)
    }

    /// Strictly after `exp`, compared in milliseconds. No `exp` is never expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp_millis() as f64 > exp * 1000.0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_parse_standard_claims() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "user-1",
            "email": "a@example.com",
            "iss": "https://issuer.example.com",
            "aud": "client-1",
            "token_use": "id",
            "iat": 900,
            "exp": 1000,
            "cognito:username": "alice",
            "custom:role": "admin"
        }))
        .expect("Failed to parse claims");

        assert_eq!(claims.sub.as_deref(), Some("user-1"));
        assert_eq!(claims.user_name(), Some("alice"));
        assert_eq!(claims.exp, Some(1000.0));
        assert_eq!(claims.issued_at(), Some(at(900_000)));
        assert_eq!(claims.aud, Some(Audience::Single("client-1".to_string())));
        assert_eq!(claims.extra.get("custom:role"), Some(&json!("admin")));
        assert_eq!(claims.extra.len(), 1);
    }

    #[test]
    fn test_audience_list() {
        let claims: Claims = serde_json::from_value(json!({"aud": ["a", "b"]}))
            .expect("Failed to parse claims");
        assert_eq!(
            claims.aud,
            Some(Audience::Multiple(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_typed_extra() {
        #[derive(Debug, Default, PartialEq, Deserialize)]
        struct Profile {
            #[serde(default)]
            plan: Option<String>,
        }

        let claims: Claims<Profile> = serde_json::from_value(json!({"sub": "u", "plan": "pro"}))
            .expect("Failed to parse claims");
        assert_eq!(claims.extra.plan.as_deref(), Some("pro"));
    }

    #[test]
    fn test_empty_claims() {
        assert!(Claims::<ExtraClaims>::default().is_empty());
        let claims: Claims = serde_json::from_value(json!({"sub": "u"})).unwrap();
        assert!(!claims.is_empty());
    }

    #[test]
    fn test_fractional_exp() {
        let claims: Claims = serde_json::from_value(json!({"exp": 1000.5, "sub": "u"}))
            .expect("fractional exp parses");
        assert_eq!(claims.exp, Some(1000.5));
        assert_eq!(claims.sub.as_deref(), Some("u"));
        assert!(!claims.is_expired_at(at(1_000_500)));
        assert!(claims.is_expired_at(at(1_000_501)));
        assert_eq!(claims.expires_at(), Some(at(1_000_500)));
    }

    #[test]
    fn test_mistyped_claim_only_drops_that_field() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": 42,
            "exp": 1000,
            "aud": [1, 2],
            "email": "a@example.com"
        }))
        .expect("mistyped claims still parse");
        assert!(claims.sub.is_none());
        assert!(claims.aud.is_none());
        assert_eq!(claims.exp, Some(1000.0));
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_both_username_keys() {
        let claims: Claims = serde_json::from_value(json!({
            "username": "plain",
            "cognito:username": "pool"
        }))
        .expect("both username keys parse");
        assert_eq!(claims.username.as_deref(), Some("plain"));
        assert_eq!(claims.cognito_username.as_deref(), Some("pool"));
        assert_eq!(claims.user_name(), Some("plain"));
    }

    #[test]
    fn test_is_expired_at_boundary() {
        let claims: Claims = serde_json::from_value(json!({"exp": 1000})).unwrap();

        assert!(!claims.is_expired_at(at(500)));
        assert!(!claims.is_expired_at(at(1_000_000)));
        assert!(claims.is_expired_at(at(1_000_001)));
        assert!(claims.is_expired_at(at(2_000_000)));
    }

    #[test]
    fn test_no_exp_never_expired() {
        let claims = Claims::<ExtraClaims>::default();
        assert!(!claims.is_expired_at(Utc::now()));
        assert!(claims.expires_at().is_none());
    }
}
