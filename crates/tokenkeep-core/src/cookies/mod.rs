//! Cookie transport: the codec that parses and renders cookie strings, and
//! the jar capability that stores them.

pub mod codec;
pub mod jar;

pub use codec::{parse, serialize, CookieOptions};
pub use jar::{CookieJar, MemoryCookieJar};
