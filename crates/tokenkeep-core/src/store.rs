//! Cookie-backed store for the identity/access/refresh token triplet.
//!
//! All four cookies live under one namespace, `{prefix}:{key}`:
//!
//! | key             | value                                   |
//! |-----------------|-----------------------------------------|
//! | `id_token`      | identity token (JWT, decoded for claims) |
//! | `access_token`  | opaque, stored verbatim                  |
//! | `refresh_token` | opaque, stored verbatim                  |
//! | `keep`          | `true` while the tokens are persisted    |
//!
//! The jar performs one write per cookie, so a failure part way through can
//! leave the namespace inconsistent. Writes are not retried.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::claims::{Claims, ExtraClaims};
use crate::clock::{Clock, SystemClock};
use crate::config::CookieSettings;
use crate::cookies::{self, CookieJar, CookieOptions};
use crate::decoder::{ClaimsDecoder, UnverifiedJwtDecoder};
use crate::error::{DecodeError, StoreError};

pub const ID_TOKEN: &str = "id_token";
pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const KEEP: &str = "keep";

/// Every key the store writes, in write order
pub const COOKIE_KEYS: [&str; 4] = [ID_TOKEN, ACCESS_TOKEN, REFRESH_TOKEN, KEEP];

/// Value of the keep marker while tokens are persisted
const KEEP_VALUE: &str = "true";

/// Maximum length of a token fragment echoed back in log messages
const MAX_TOKEN_PREVIEW_LENGTH: usize = 12;

/// Tokens to write.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Keep the tokens past the end of the browser session
    pub persist: bool,
}

/// Tokens as last read from (or written to) the cookie jar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct StoredTokens {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub persist: bool,
}

impl StoredTokens {
    /// All three tokens are present
    pub fn is_complete(&self) -> bool {
        self.id_token.is_some() && self.access_token.is_some() && self.refresh_token.is_some()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Shorten a token so logs never carry a full credential
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(MAX_TOKEN_PREVIEW_LENGTH) {
        Some((idx, _)) => format!("{}... ({} bytes)", &token[..idx], token.len()),
        None => token.to_string(),
    }
}

pub struct TokenCookieStore<T = ExtraClaims> {
    prefix: String,
    tokens: StoredTokens,
    cookie_string: Option<String>,
    claims: Claims<T>,
    jar: Option<Arc<dyn CookieJar>>,
    decoder: Arc<dyn ClaimsDecoder>,
    clock: Arc<dyn Clock>,
    settings: CookieSettings,
}

impl<T> TokenCookieStore<T>
where
    T: DeserializeOwned + Default,
{
    /// Create a store for `prefix`, reading tokens from `cookie_string` if given.
    ///
    /// The store starts without a cookie jar; attach one with
    /// [`with_jar`](Self::with_jar) where cookies can be written.
    pub fn new(prefix: impl Into<String>, cookie_string: Option<&str>) -> Result<Self, StoreError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(StoreError::EmptyPrefix);
        }

        let mut store = Self {
            prefix,
            tokens: StoredTokens::default(),
            cookie_string: None,
            claims: Claims::default(),
            jar: None,
            decoder: Arc::new(UnverifiedJwtDecoder),
            clock: Arc::new(SystemClock),
            settings: CookieSettings::default(),
        };
        if cookie_string.is_some() {
            store.get_tokens(cookie_string);
        }
        Ok(store)
    }

    pub fn with_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.jar = Some(jar);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ClaimsDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_settings(mut self, settings: CookieSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tokens(&self) -> &StoredTokens {
        &self.tokens
    }

    /// Claims from the last [`decode`](Self::decode). Not refreshed when the
    /// tokens change; decode again to recompute.
    pub fn claims(&self) -> &Claims<T> {
        &self.claims
    }

    pub fn settings(&self) -> &CookieSettings {
        &self.settings
    }

    /// Whether cookies can be written from here
    pub fn has_cookie_jar(&self) -> bool {
        self.jar.is_some()
    }

    pub fn has_tokens(&self) -> bool {
        self.tokens.is_complete()
    }

    /// Namespaced cookie name for `key`
    pub fn cookie_name(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Load tokens from `cookie_string`, or from the last cookie string seen.
    ///
    /// With neither available this does nothing.
    pub fn get_tokens(&mut self, cookie_string: Option<&str>) -> &mut Self {
        let source = match cookie_string {
            Some(s) => s.to_string(),
            None => match self.cookie_string.take() {
                Some(cached) => cached,
                None => {
                    debug!(prefix = %self.prefix, "No cookie string available, skipping read");
                    return self;
                }
            },
        };

        let cookies = cookies::parse(&source);
        let read = |key: &str| {
            cookies
                .get(&self.cookie_name(key))
                .and_then(|value| non_empty(value))
        };
        let tokens = StoredTokens {
            id_token: read(ID_TOKEN),
            access_token: read(ACCESS_TOKEN),
            refresh_token: read(REFRESH_TOKEN),
            persist: read(KEEP).is_some(),
        };

        self.tokens = tokens;
        debug!(
            prefix = %self.prefix,
            complete = self.tokens.is_complete(),
            persist = self.tokens.persist,
            "Tokens read from cookies"
        );

        self.cookie_string = Some(source);
        self
    }

    /// Re-read tokens from the jar's current cookies.
    pub fn sync(&mut self) -> &mut Self {
        match self.jar.clone() {
            Some(jar) => {
                let current = jar.cookie_string();
                self.get_tokens(Some(&current))
            }
            None => {
                debug!(prefix = %self.prefix, "No cookie jar, nothing to sync");
                self
            }
        }
    }

    /// Write the token triplet.
    ///
    /// Persisted tokens get a `keep=true` marker and expire after
    /// [`CookieSettings::persist_days`]; otherwise they are session cookies and
    /// any earlier keep marker is expired. Individual write failures are
    /// logged; the in-memory tokens are updated regardless.
    pub fn set_tokens(&mut self, tokens: TokenSet) -> Result<&mut Self, StoreError> {
        let jar = self.jar.clone().ok_or(StoreError::Environment)?;

        let options = if tokens.persist {
            CookieOptions::persistent(&self.settings, self.clock.now())
        } else {
            CookieOptions::session(&self.settings)
        };

        self.write_cookie(jar.as_ref(), ID_TOKEN, &tokens.id_token, &options);
        self.write_cookie(jar.as_ref(), ACCESS_TOKEN, &tokens.access_token, &options);
        self.write_cookie(jar.as_ref(), REFRESH_TOKEN, &tokens.refresh_token, &options);
        if tokens.persist {
            self.write_cookie(jar.as_ref(), KEEP, KEEP_VALUE, &options);
        } else {
            let expired = CookieOptions::expired(&self.settings);
            self.write_cookie(jar.as_ref(), KEEP, "", &expired);
        }

        debug!(
            prefix = %self.prefix,
            persist = tokens.persist,
            id_token = %token_preview(&tokens.id_token),
            "Tokens written to cookies"
        );

        self.tokens = StoredTokens {
            id_token: non_empty(&tokens.id_token),
            access_token: non_empty(&tokens.access_token),
            refresh_token: non_empty(&tokens.refresh_token),
            persist: tokens.persist,
        };
        self.claims = Claims::default();
        self.cookie_string = Some(jar.cookie_string());
        Ok(self)
    }

    /// Expire all four cookies and forget the loaded tokens and claims.
    ///
    /// Without a cookie jar this logs and does nothing.
    pub fn clear_tokens(&mut self) -> &mut Self {
        let Some(jar) = self.jar.clone() else {
            error!(prefix = %self.prefix, error = %StoreError::Environment, "Cannot clear tokens");
            return self;
        };

        let expired = CookieOptions::expired(&self.settings);
        for key in COOKIE_KEYS {
            self.write_cookie(jar.as_ref(), key, "", &expired);
        }
        debug!(prefix = %self.prefix, "Tokens cleared");

        self.tokens = StoredTokens::default();
        self.claims = Claims::default();
        self.cookie_string = Some(jar.cookie_string());
        self
    }

    /// Recompute claims from the current identity token.
    ///
    /// A missing or malformed token yields empty claims.
    pub fn decode(&mut self) -> &mut Self {
        self.claims = self.decoded_claims();
        self
    }

    /// Claims of the current identity token, without caching them
    pub fn decoded_claims(&self) -> Claims<T> {
        let token = self.tokens.id_token.as_deref().unwrap_or_default();
        let decoded = self.decoder.decode(token).and_then(|payload| {
            serde_json::from_value(Value::Object(payload)).map_err(DecodeError::from)
        });

        match decoded {
            Ok(claims) => claims,
            Err(e) => {
                debug!(prefix = %self.prefix, error = %e, "Identity token not decodable, using empty claims");
                Claims::default()
            }
        }
    }

    /// Whether the identity token's `exp` has passed.
    ///
    /// A token without `exp`, or one that does not decode, is reported as not
    /// expired. Not expired does not mean valid.
    pub fn is_expired(&mut self) -> bool {
        let now = self.clock.now();
        self.decode().claims.is_expired_at(now)
    }

    /// Expiry of the identity token, if it carries one
    pub fn expires_at(&mut self) -> Option<DateTime<Utc>> {
        self.decode().claims.expires_at()
    }

    pub fn time_until_expiry(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        self.expires_at().map(|at| at - now)
    }

    /// Whether the identity token expires within `buffer`. Tokens without
    /// `exp` never need a refresh.
    pub fn needs_refresh(&mut self, buffer: Duration) -> bool {
        let now = self.clock.now();
        self.expires_at().map(|at| now + buffer > at).unwrap_or(false)
    }

    fn write_cookie(&self, jar: &dyn CookieJar, key: &str, value: &str, options: &CookieOptions) {
        let name = self.cookie_name(key);
        let header = cookies::serialize(&name, value, options);
        if let Err(e) = jar.set_cookie(&header) {
            warn!(cookie = %name, error = %e, "Failed to write cookie");
        }
    }
}
