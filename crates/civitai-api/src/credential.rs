use std::fmt;

/// Environment variable the API token is read from when none is given explicitly.
pub const TOKEN_ENV_VAR: &str = "CIVITAI_API_TOKEN";

/// An opaque API token authorizing a single generation request.
///
/// The token is never validated locally and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps the given token.
    pub fn new<S>(token: S) -> Self
    where
        S: Into<String>,
    {
        Self(token.into())
    }

    /// Reads the token from the `CIVITAI_API_TOKEN` environment variable.
    ///
    /// Returns `None` if the variable is unset or not valid unicode.
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV_VAR).ok().map(Self)
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}
