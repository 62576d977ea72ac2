use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, normalized identifier (an email address) naming one record to provision.
///
/// Values are trimmed and lowercased so `A@X.com` and `a@x.com` refer to the same account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Parse a single raw token. Returns `None` for empty tokens and tokens without `@`.
    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        if trimmed.is_empty() || !Self::has_email_shape(trimmed) {
            return None;
        }
        Some(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn has_email_shape(token: &str) -> bool {
        match token.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !token.chars().any(char::is_whitespace)
            }
            None => false,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
