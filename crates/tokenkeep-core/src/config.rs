//! Cookie attribute settings applied to every cookie the store writes.
//!
//! Settings deserialize from JSON with every field optional, so an
//! application config only needs to name what it changes:
//!
//! ```json
//! { "domain": "example.com", "secure": true, "same_site": "lax" }
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Cookie path written on set and clear
const DEFAULT_PATH: &str = "/";

/// Lifetime of persisted ("remember me") cookies in days
pub const DEFAULT_PERSIST_DAYS: i64 = 365;

/// Upper bound on `persist_days`; larger values are clamped
pub const MAX_PERSIST_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct CookieSettings {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    pub persist_days: i64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            domain: None,
            secure: false,
            same_site: None,
            persist_days: DEFAULT_PERSIST_DAYS,
        }
    }
}

impl CookieSettings {
    /// How long persisted cookies live, clamped to `0..=MAX_PERSIST_DAYS` days
    pub fn persist_duration(&self) -> Duration {
        Duration::days(self.persist_days.clamp(0, MAX_PERSIST_DAYS))
    }
}
