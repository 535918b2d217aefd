use thiserror::Error;

/// Coarse grouping of [`SignedDataError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The input could not be parsed (token structure, receipt structure,
    /// payload schema).
    MalformedInput,
    /// The input parsed, but failed the trust or signature checks.
    Untrusted,
    /// The input was authentic, but was issued for another app or
    /// environment.
    BusinessRule,
    /// The verifier itself was constructed with invalid settings.
    Configuration,
}

#[derive(Debug, Error)]
pub enum SignedDataError {
    #[error("Malformed signed data: {0}.")]
    MalformedToken(String),

    #[error("Unrecognized JWT algorithm attribute: {0}.")]
    UnsupportedAlgorithm(String),

    #[error("x5c claim must contain exactly 3 certificates (found {0}).")]
    InvalidCertificateCount(usize),

    #[error("Certificate chain validation failed: {0}.")]
    ChainValidationFailed(String),

    #[error("Payload signature could not be verified: {0}.")]
    SignatureInvalid(String),

    #[error("Failed to parse {what} payload: {source}.")]
    PayloadDecode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment in payload does not match expected environment (expected {expected}, actual {actual}).")]
    EnvironmentMismatch { expected: String, actual: String },

    #[error("Bundle ID in payload does not match expected bundle ID (expected {expected}, actual {actual}).")]
    BundleIdMismatch { expected: String, actual: String },

    #[error("App Apple ID in payload does not match expected app Apple ID (expected {expected}, actual {actual}).")]
    AppAppleIdMismatch { expected: u64, actual: String },

    #[error("Invalid app receipt ({step}): {detail}.")]
    Format { step: &'static str, detail: String },

    #[error("Invalid verifier configuration: {0}.")]
    Configuration(String),
}

impl SignedDataError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SignedDataError::MalformedToken(_)
            | SignedDataError::PayloadDecode { .. }
            | SignedDataError::Format { .. } => ErrorCategory::MalformedInput,
            SignedDataError::UnsupportedAlgorithm(_)
            | SignedDataError::InvalidCertificateCount(_)
            | SignedDataError::ChainValidationFailed(_)
            | SignedDataError::SignatureInvalid(_) => ErrorCategory::Untrusted,
            SignedDataError::EnvironmentMismatch { .. }
            | SignedDataError::BundleIdMismatch { .. }
            | SignedDataError::AppAppleIdMismatch { .. } => ErrorCategory::BusinessRule,
            SignedDataError::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}
