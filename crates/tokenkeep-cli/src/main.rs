//! tokenkeep - inspect token cookies and render their Set-Cookie headers.
//!
//! ```text
//! tokenkeep [--prefix <p>] inspect [cookie-string]
//! tokenkeep [--prefix <p>] issue <id-token> <access-token> <refresh-token> [--persist]
//! tokenkeep [--prefix <p>] clear
//! ```
//!
//! `inspect` reads `TOKENKEEP_COOKIE` when no cookie string is given.

mod config;

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokenkeep_core::{token_preview, Claims, MemoryCookieJar, TokenCookieStore, TokenSet};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;

/// Environment variable holding the cookie string for `inspect`
const COOKIE_ENV: &str = "TOKENKEEP_COOKIE";

const USAGE: &str = "usage: tokenkeep [--prefix <p>] <inspect [cookie-string] | issue <id> <access> <refresh> [--persist] | clear>";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Inspect(Option<String>),
    Issue(TokenSet),
    Clear,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    prefix: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut prefix = None;
    let mut persist = false;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--prefix" => {
                let value = iter.next().context("--prefix requires a value")?;
                prefix = Some(value.clone());
            }
            "--persist" => persist = true,
            _ => positional.push(arg.clone()),
        }
    }

    let command = match positional.split_first() {
        Some((cmd, rest)) if cmd == "inspect" => match rest {
            [] => Command::Inspect(None),
            [cookie_string] => Command::Inspect(Some(cookie_string.clone())),
            _ => bail!(USAGE),
        },
        Some((cmd, rest)) if cmd == "issue" => match rest {
            [id_token, access_token, refresh_token] => Command::Issue(TokenSet {
                id_token: id_token.clone(),
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
                persist,
            }),
            _ => bail!(USAGE),
        },
        Some((cmd, [])) if cmd == "clear" => Command::Clear,
        _ => bail!(USAGE),
    };

    Ok(Args { prefix, command })
}

#[derive(Debug, Serialize)]
struct TokenPreviews {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    persist: bool,
}

#[derive(Debug, Serialize)]
struct Inspection {
    prefix: String,
    tokens: TokenPreviews,
    claims: Claims,
    expired: bool,
    issued_at: Option<String>,
    expires_at: Option<String>,
    seconds_until_expiry: Option<i64>,
}

fn inspect(store: &mut TokenCookieStore, cookie_string: &str) -> Inspection {
    store.get_tokens(Some(cookie_string));
    let expired = store.is_expired();
    let issued_at = store.claims().issued_at().map(|at| at.to_rfc3339());
    let expires_at = store.claims().expires_at().map(|at| at.to_rfc3339());
    let seconds_until_expiry = store.time_until_expiry().map(|d| d.num_seconds());

    let tokens = store.tokens();
    let preview = |token: &Option<String>| token.as_deref().map(token_preview);
    Inspection {
        prefix: store.prefix().to_string(),
        tokens: TokenPreviews {
            id_token: preview(&tokens.id_token),
            access_token: preview(&tokens.access_token),
            refresh_token: preview(&tokens.refresh_token),
            persist: tokens.persist,
        },
        claims: store.claims().clone(),
        expired,
        issued_at,
        expires_at,
        seconds_until_expiry,
    }
}

fn run(args: Args, config: &Config) -> Result<Vec<String>> {
    let prefix = config.resolve_prefix(args.prefix.as_deref());
    debug!(%prefix, "Prefix resolved");

    let jar = Arc::new(MemoryCookieJar::new());
    let mut store: TokenCookieStore = TokenCookieStore::new(prefix, None)?
        .with_jar(jar.clone())
        .with_settings(config.cookies.clone());

    match args.command {
        Command::Inspect(cookie_string) => {
            let cookie_string = match cookie_string {
                Some(s) => s,
                None => std::env::var(COOKIE_ENV)
                    .with_context(|| format!("No cookie string given and {} is not set", COOKIE_ENV))?,
            };
            let inspection = inspect(&mut store, &cookie_string);
            Ok(vec![serde_json::to_string_pretty(&inspection)?])
        }
        Command::Issue(tokens) => {
            let persist = tokens.persist;
            store.set_tokens(tokens)?;
            info!(persist, "Rendered token cookies");
            Ok(jar.take_headers())
        }
        Command::Clear => {
            store.clear_tokens();
            info!("Rendered clearing cookies");
            Ok(jar.take_headers())
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    for line in run(args, &config)? {
        println!("{}", line);
    }
    Ok(())
}
