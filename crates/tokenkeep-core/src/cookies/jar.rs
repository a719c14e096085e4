//! Cookie jar capability and an in-memory implementation.
//!
//! A jar is the write side of the cookie transport: it accepts rendered
//! `Set-Cookie` strings and reports the current `Cookie` header string, the
//! way `document.cookie` does in a browser. A store without a jar runs in a
//! context where cookies cannot be written (e.g. server-side rendering).

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use tracing::debug;

use super::codec::from_offset;
use crate::clock::{Clock, SystemClock};
use crate::error::JarError;

pub trait CookieJar: Send + Sync {
    /// The current `Cookie` header string (`name=value; name2=value2`).
    fn cookie_string(&self) -> String;

    /// Apply one `Set-Cookie` string.
    fn set_cookie(&self, set_cookie: &str) -> Result<(), JarError>;
}

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    /// Raw value as written, still percent-encoded
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct JarState {
    cookies: Vec<StoredCookie>,
    headers: Vec<String>,
}

/// Browser-like jar held in memory.
///
/// Expiry is judged against the jar's clock: a cookie whose `Expires` is not
/// after now, or whose `Max-Age` is zero or negative, is removed. Every
/// `Set-Cookie` string received is also recorded in order.
pub struct MemoryCookieJar {
    state: RwLock<JarState>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(JarState::default()),
            clock,
        }
    }

    /// Raw (still encoded) value of a live cookie
    pub fn get(&self, name: &str) -> Option<String> {
        let now = self.clock.now();
        let state = self.state.read().ok()?;
        state
            .cookies
            .iter()
            .find(|c| c.name == name && is_live(c, now))
            .map(|c| c.value.clone())
    }

    /// Every `Set-Cookie` string received, oldest first
    pub fn headers(&self) -> Vec<String> {
        self.state
            .read()
            .map(|state| state.headers.clone())
            .unwrap_or_default()
    }

    /// Forget the recorded headers, keeping the cookies
    pub fn take_headers(&self) -> Vec<String> {
        self.state
            .write()
            .map(|mut state| std::mem::take(&mut state.headers))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.state
            .read()
            .map(|state| state.cookies.iter().filter(|c| is_live(c, now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deadline for a `Max-Age` of `seconds`. Lifetimes past the representable
/// range never expire.
fn max_age_deadline(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        return Some(now);
    }
    Duration::try_seconds(seconds).and_then(|lifetime| now.checked_add_signed(lifetime))
}

fn is_live(cookie: &StoredCookie, now: DateTime<Utc>) -> bool {
    cookie.expires_at.map(|at| at > now).unwrap_or(true)
}

impl CookieJar for MemoryCookieJar {
    fn cookie_string(&self) -> String {
        let now = self.clock.now();
        let state = match self.state.read() {
            Ok(state) => state,
            Err(_) => return String::new(),
        };
        state
            .cookies
            .iter()
            .filter(|c| is_live(c, now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, set_cookie: &str) -> Result<(), JarError> {
        let parsed = Cookie::parse(set_cookie)?;
        let now = self.clock.now();

        // Max-Age takes precedence over Expires
        let expires_at = match parsed.max_age() {
            Some(max_age) => max_age_deadline(now, max_age.whole_seconds()),
            None => parsed.expires_datetime().map(from_offset),
        };

        let mut state = self
            .state
            .write()
            .map_err(|e| JarError::Unavailable(e.to_string()))?;
        state.headers.push(set_cookie.to_string());
        state.cookies.retain(|c| c.name != parsed.name());

        let cookie = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            expires_at,
        };
        if is_live(&cookie, now) {
            debug!(cookie = %cookie.name, "Stored cookie");
            state.cookies.push(cookie);
        } else {
            debug!(cookie = %cookie.name, "Removed expired cookie");
        }
        Ok(())
    }
}
