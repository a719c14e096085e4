//! Cookie-backed storage for an identity/access/refresh token triplet.
//!
//! This crate provides:
//! - `TokenCookieStore`: reads, writes and clears the namespaced token
//!   cookies, decodes the identity token's claims and checks expiry
//! - `cookies`: `Cookie` header parsing, `Set-Cookie` rendering and the
//!   `CookieJar` capability (with an in-memory jar)
//! - `Claims`: standard identity claims plus an application-defined payload
//! - `Clock`: injectable time source
//!
//! Tokens persisted with "remember me" live for a year; otherwise they are
//! session cookies. Claims are decoded without signature verification.

pub mod claims;
pub mod clock;
pub mod config;
pub mod cookies;
pub mod decoder;
pub mod error;
pub mod store;

pub use claims::{Audience, Claims, ExtraClaims};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CookieSettings, SameSite};
pub use cookies::{CookieJar, CookieOptions, MemoryCookieJar};
pub use decoder::{ClaimsDecoder, UnverifiedJwtDecoder};
pub use error::{DecodeError, JarError, StoreError};
pub use store::{token_preview, StoredTokens, TokenCookieStore, TokenSet};
