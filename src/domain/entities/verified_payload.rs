use serde::de::DeserializeOwned;

use crate::{data::datasources::utils::decode_json, errors::SignedDataError};

/// How a [`VerifiedPayload`] got past the trust gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// Certificate chain and signature were checked.
    Verified,
    /// The verifier is configured for an environment whose data is not signed
    /// by the App Store (Xcode, local testing); checks were skipped.
    Skipped,
}

/// Decoded JSON payload bytes of a signed token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    json: Vec<u8>,
    mode: VerificationMode,
}

impl VerifiedPayload {
    pub(crate) fn new(json: Vec<u8>, mode: VerificationMode) -> Self {
        Self { json, mode }
    }

    pub fn json(&self) -> &[u8] {
        &self.json
    }

    pub fn mode(&self) -> VerificationMode {
        self.mode
    }

    /// Deserializes the payload into `T`; `what` names the payload in errors.
    pub fn decode<T: DeserializeOwned>(&self, what: &'static str) -> Result<T, SignedDataError> {
        decode_json(&self.json, what)
    }
}
