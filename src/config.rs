use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::{data::models::app_store_server_api::common::Environment, errors::SignedDataError};

const DEFAULT_REVOCATION_CHECK_TIMEOUT_SECS: u64 = 30;

/// The environment a verifier accepts signed data for.
///
/// `Xcode` and `LocalTesting` data is not signed by the App Store, so chain and
/// signature verification is skipped for them. This must always be chosen
/// explicitly; nothing is inferred from the process environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TrustEnvironment {
    Production,
    Sandbox,
    Xcode,
    LocalTesting,
}

impl TrustEnvironment {
    pub fn skips_signature_verification(&self) -> bool {
        matches!(self, TrustEnvironment::Xcode | TrustEnvironment::LocalTesting)
    }

    /// The `environment` value payloads must declare.
    pub fn expected_environment(&self) -> Environment {
        match self {
            TrustEnvironment::Production => Environment::Production,
            TrustEnvironment::Sandbox => Environment::Sandbox,
            TrustEnvironment::Xcode => Environment::Xcode,
            TrustEnvironment::LocalTesting => Environment::LocalTesting,
        }
    }
}

/// A trusted root certificate, either as raw DER bytes or as base64-encoded
/// DER text (as found in config files).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RootCertificate {
    Base64(String),
    Der(Vec<u8>),
}

impl RootCertificate {
    pub(crate) fn to_der(&self) -> Result<Vec<u8>, SignedDataError> {
        match self {
            RootCertificate::Der(der) => Ok(der.clone()),
            RootCertificate::Base64(text) => {
                let compact: String = text.split_whitespace().collect();
                STANDARD.decode(compact).map_err(|e| {
                    SignedDataError::Configuration(format!(
                        "root certificate is not valid base64 ({e})"
                    ))
                })
            }
        }
    }
}

/// Settings supplied once, at verifier construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDataVerifierConfig {
    /// The bundle identifier of the app.
    pub bundle_id: String,
    /// The environment signed data is expected to come from.
    pub environment: TrustEnvironment,
    /// The unique identifier of the app in the App Store. Checked against
    /// notifications in the Production environment when set.
    #[serde(default)]
    pub app_apple_id: Option<u64>,
    /// Roots the certificate chain must lead to. Required unless the
    /// environment skips signature verification.
    #[serde(default)]
    pub root_certificates: Vec<RootCertificate>,
    /// Whether to check revocation status of the chain over OCSP. This makes
    /// verification perform blocking network calls.
    pub enable_online_revocation_check: bool,
    /// Per-request timeout for OCSP calls.
    #[serde(default = "default_revocation_check_timeout_secs")]
    pub revocation_check_timeout_secs: u64,
}

fn default_revocation_check_timeout_secs() -> u64 {
    DEFAULT_REVOCATION_CHECK_TIMEOUT_SECS
}

impl SignedDataVerifierConfig {
    pub fn new(
        bundle_id: impl Into<String>,
        environment: TrustEnvironment,
        root_certificates: Vec<RootCertificate>,
        enable_online_revocation_check: bool,
    ) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            environment,
            app_apple_id: None,
            root_certificates,
            enable_online_revocation_check,
            revocation_check_timeout_secs: DEFAULT_REVOCATION_CHECK_TIMEOUT_SECS,
        }
    }

    pub fn with_app_apple_id(mut self, app_apple_id: u64) -> Self {
        self.app_apple_id = Some(app_apple_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_config_with_base64_roots() {
        let config: SignedDataVerifierConfig = serde_json::from_str(
            r#"{
                "bundleId": "com.example",
                "environment": "Sandbox",
                "rootCertificates": ["AAEC\nAw=="],
                "enableOnlineRevocationCheck": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.bundle_id, "com.example");
        assert_eq!(config.environment, TrustEnvironment::Sandbox);
        assert_eq!(config.app_apple_id, None);
        assert_eq!(config.revocation_check_timeout_secs, 30);
        assert_eq!(
            config.root_certificates[0].to_der().unwrap(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn online_revocation_flag_is_required() {
        let result = serde_json::from_str::<SignedDataVerifierConfig>(
            r#"{ "bundleId": "com.example", "environment": "Production" }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn der_roots_pass_through() {
        let root = RootCertificate::Der(vec![0x30, 0x00]);
        assert_eq!(root.to_der().unwrap(), vec![0x30, 0x00]);
        assert!(RootCertificate::Base64("not base64!".into())
            .to_der()
            .is_err());
    }

    #[test]
    fn only_local_environments_skip_verification() {
        assert!(!TrustEnvironment::Production.skips_signature_verification());
        assert!(!TrustEnvironment::Sandbox.skips_signature_verification());
        assert!(TrustEnvironment::Xcode.skips_signature_verification());
        assert!(TrustEnvironment::LocalTesting.skips_signature_verification());
        assert_eq!(
            TrustEnvironment::LocalTesting.expected_environment(),
            Environment::LocalTesting
        );
    }
}
