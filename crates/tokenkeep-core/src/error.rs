use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot set cookies outside a client context")]
    Environment,

    #[error("cookie prefix must not be empty")]
    EmptyPrefix,
}

/// Failure to turn an identity token into claims. Never leaves the store;
/// decode failures collapse into empty claims.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no identity token loaded")]
    Missing,

    #[error("malformed token: expected 3 segments, found {0}")]
    Segments(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum JarError {
    #[error("invalid Set-Cookie string: {0}")]
    Parse(#[from] cookie::ParseError),

    #[error("cookie jar is unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_message() {
        assert_eq!(
            StoreError::Environment.to_string(),
            "cannot set cookies outside a client context"
        );
    }
}
