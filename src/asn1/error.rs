use std::fmt::Display;

use thiserror::Error;

/// A read did not find what it expected: wrong tag, bad length, truncated
/// content, or content that does not decode as the requested type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed ASN.1 encoding: expected {expected}, found {actual}")]
pub struct MalformedEncoding {
    pub expected: String,
    pub actual: String,
}

impl MalformedEncoding {
    pub(crate) fn new(expected: impl Display, actual: impl Display) -> Self {
        Self {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
