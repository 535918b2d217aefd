use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::{SignedDataVerifierConfig, TrustEnvironment},
    data::{
        datasources::{
            app_receipt_datasource::{AppReceiptDatasource, AppReceiptDatasourceImpl},
            app_store_server_notification_datasource::{
                AppStoreServerNotificationDatasource, AppStoreServerNotificationDatasourceImpl,
            },
            certificate_chain_verifier::CertificateChainVerifier,
            compact_jws_parser::CompactJws,
            signature_verifier::verify_es256_signature,
            utils::parse_x5c_certificate,
        },
        models::{
            app_store_server_api::{
                common::Environment,
                jws_renewal_info_decoded_payload_model::JwsRenewalInfoDecodedPayloadModel,
                jws_transaction_decoded_payload_model::JwsTransactionDecodedPayloadModel,
            },
            app_store_server_notifications::response_body_v2_decoded_payload_model::ResponseBodyV2DecodedPayloadModel,
        },
    },
    domain::{
        entities::{
            decoded_notification::DecodedNotification,
            trust_configuration::TrustConfiguration,
            verified_payload::{VerificationMode, VerifiedPayload},
        },
        repositories::signed_data_repository::SignedDataRepository,
    },
    errors::SignedDataError,
};

const EXPECTED_ALGORITHM: &str = "ES256";
const EXPECTED_CERTIFICATE_COUNT: usize = 3;
const MISSING: &str = "<missing>";

pub(crate) struct SignedDataRepositoryImpl<
    N: AppStoreServerNotificationDatasource,
    R: AppReceiptDatasource,
> {
    app_store_server_notification_datasource: N,
    app_receipt_datasource: R,
    /// `None` when the environment skips chain and signature verification.
    chain_verifier: Option<CertificateChainVerifier>,
    environment: TrustEnvironment,
    bundle_id: String,
    app_apple_id: Option<u64>,
}

fn rejected(err: SignedDataError) -> SignedDataError {
    warn!(category = ?err.category(), error = %err, "signed data rejected");
    err
}

impl<N: AppStoreServerNotificationDatasource, R: AppReceiptDatasource>
    SignedDataRepositoryImpl<N, R>
{
    /// Split -> HeaderDecoded -> ChainChecked -> SignatureChecked. Payload
    /// decoding and business rules are left to the caller.
    fn run_trust_gates(&self, signed_data: &str) -> Result<VerifiedPayload, SignedDataError> {
        let jws = CompactJws::parse(signed_data)?;

        if self.environment.skips_signature_verification() {
            debug!(
                environment = ?self.environment,
                "skipping chain and signature verification"
            );
            return Ok(VerifiedPayload::new(jws.payload, VerificationMode::Skipped));
        }
        let verifier = self.chain_verifier.as_ref().ok_or_else(|| {
            SignedDataError::Configuration("no trusted roots configured".to_string())
        })?;

        if jws.header.algorithm() != Some(EXPECTED_ALGORITHM) {
            let actual = match &jws.header.alg {
                Some(Value::String(alg)) => alg.clone(),
                Some(other) => other.to_string(),
                None => MISSING.to_string(),
            };
            return Err(SignedDataError::UnsupportedAlgorithm(actual));
        }
        if jws.header.x5c.len() != EXPECTED_CERTIFICATE_COUNT {
            return Err(SignedDataError::InvalidCertificateCount(
                jws.header.x5c.len(),
            ));
        }
        // x5c[2] is the sender's claimed root; only configured roots are anchors.
        let leaf = parse_x5c_certificate(&jws.header.x5c[0], "leaf")?;
        let intermediate = parse_x5c_certificate(&jws.header.x5c[1], "intermediate")?;
        verifier.verify(&leaf, &intermediate)?;

        verify_es256_signature(&jws.signing_input(), jws.signature_segment(), &leaf)?;
        debug!("signed data verified");
        Ok(VerifiedPayload::new(jws.payload, VerificationMode::Verified))
    }

    fn check_notification(
        &self,
        notification: &ResponseBodyV2DecodedPayloadModel,
        environment: &Environment,
        bundle_id: &str,
    ) -> Result<(), SignedDataError> {
        let actual_environment = notification.environment();
        if actual_environment.as_ref() != Some(environment) {
            return Err(SignedDataError::EnvironmentMismatch {
                expected: environment.to_string(),
                actual: actual_environment
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| MISSING.to_string()),
            });
        }

        let actual_bundle_id = notification.bundle_id();
        if actual_bundle_id != Some(bundle_id) {
            return Err(SignedDataError::BundleIdMismatch {
                expected: bundle_id.to_string(),
                actual: actual_bundle_id.unwrap_or(MISSING).to_string(),
            });
        }

        // The App Apple ID is only assigned to apps live on the App Store.
        if let (Environment::Production, Some(expected)) = (environment, self.app_apple_id) {
            let actual = notification.app_apple_id();
            if actual != Some(expected) {
                return Err(SignedDataError::AppAppleIdMismatch {
                    expected,
                    actual: actual
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| MISSING.to_string()),
                });
            }
        }
        Ok(())
    }
}

impl<N: AppStoreServerNotificationDatasource, R: AppReceiptDatasource> SignedDataRepository
    for SignedDataRepositoryImpl<N, R>
{
    fn verify_signed_data(&self, signed_data: &str) -> Result<VerifiedPayload, SignedDataError> {
        self.run_trust_gates(signed_data).map_err(rejected)
    }

    fn verify_and_decode_notification(
        &self,
        signed_payload: &str,
        environment: &Environment,
        bundle_id: &str,
    ) -> Result<ResponseBodyV2DecodedPayloadModel, SignedDataError> {
        let notification: ResponseBodyV2DecodedPayloadModel = self
            .verify_signed_data(signed_payload)?
            .decode("notification")
            .map_err(rejected)?;
        self.check_notification(&notification, environment, bundle_id)
            .map_err(rejected)?;
        debug!(
            notification_uuid = %notification.notification_uuid,
            notification_type = ?notification.notification_type,
            "notification verified"
        );
        Ok(notification)
    }

    fn verify_and_decode_transaction(
        &self,
        signed_transaction: &str,
    ) -> Result<JwsTransactionDecodedPayloadModel, SignedDataError> {
        self.verify_signed_data(signed_transaction)?
            .decode("transaction")
            .map_err(rejected)
    }

    fn verify_and_decode_renewal_info(
        &self,
        signed_renewal_info: &str,
    ) -> Result<JwsRenewalInfoDecodedPayloadModel, SignedDataError> {
        self.verify_signed_data(signed_renewal_info)?
            .decode("renewal info")
            .map_err(rejected)
    }

    fn parse_notification(&self, body: &str) -> Result<DecodedNotification, SignedDataError> {
        let signed_payload = self
            .app_store_server_notification_datasource
            .parse_notification_body(body)
            .map_err(rejected)?;
        let payload = self.verify_and_decode_notification(
            &signed_payload,
            &self.environment.expected_environment(),
            &self.bundle_id,
        )?;
        let transaction_info = payload
            .data
            .as_ref()
            .and_then(|data| data.signed_transaction_info.as_deref())
            .map(|signed| self.verify_and_decode_transaction(signed))
            .transpose()?;
        let renewal_info = payload
            .data
            .as_ref()
            .and_then(|data| data.signed_renewal_info.as_deref())
            .map(|signed| self.verify_and_decode_renewal_info(signed))
            .transpose()?;
        Ok(DecodedNotification {
            payload,
            transaction_info,
            renewal_info,
        })
    }

    fn extract_transaction_id_from_app_receipt(
        &self,
        app_receipt: &str,
    ) -> Result<String, SignedDataError> {
        self.app_receipt_datasource
            .extract_transaction_id(app_receipt)
            .map_err(rejected)
    }
}

impl SignedDataRepositoryImpl<AppStoreServerNotificationDatasourceImpl, AppReceiptDatasourceImpl> {
    pub(crate) fn new(config: &SignedDataVerifierConfig) -> Result<Self, SignedDataError> {
        let chain_verifier = if config.environment.skips_signature_verification() {
            debug!(
                environment = ?config.environment,
                "verifier constructed without chain verification"
            );
            None
        } else {
            let roots = config
                .root_certificates
                .iter()
                .map(|root| root.to_der())
                .collect::<Result<Vec<_>, _>>()?;
            let trust =
                TrustConfiguration::new(&roots, config.enable_online_revocation_check)?;
            let verifier = CertificateChainVerifier::new(
                trust,
                Duration::from_secs(config.revocation_check_timeout_secs),
            )?;
            debug!(
                roots = verifier.trust().trusted_roots().len(),
                online_revocation_check = verifier.trust().allow_online_revocation_check(),
                "trust store built"
            );
            Some(verifier)
        };

        Ok(Self {
            app_store_server_notification_datasource:
                AppStoreServerNotificationDatasourceImpl::new(),
            app_receipt_datasource: AppReceiptDatasourceImpl::new(),
            chain_verifier,
            environment: config.environment,
            bundle_id: config.bundle_id.clone(),
            app_apple_id: config.app_apple_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        config::RootCertificate,
        test_support::{
            der,
            pki::{sign_token, sign_with_pki, unsigned_token, TestPki},
        },
    };

    const BUNDLE_ID: &str = "com.example";

    fn config(pki: &TestPki, environment: TrustEnvironment) -> SignedDataVerifierConfig {
        SignedDataVerifierConfig::new(
            BUNDLE_ID,
            environment,
            vec![RootCertificate::Der(pki.root_der())],
            false,
        )
    }

    fn repository(pki: &TestPki, environment: TrustEnvironment) -> SignedDataRepositoryImpl<
        AppStoreServerNotificationDatasourceImpl,
        AppReceiptDatasourceImpl,
    > {
        SignedDataRepositoryImpl::new(&config(pki, environment)).unwrap()
    }

    fn notification_json(environment: &str, bundle_id: &str) -> Value {
        json!({
            "notificationType": "SUBSCRIBED",
            "subtype": "INITIAL_BUY",
            "notificationUUID": "002e14d5-51f5-4503-b5a8-c3a1af68eb20",
            "version": "2.0",
            "signedDate": 1698148900000i64,
            "data": {
                "appAppleId": 41234,
                "bundleId": bundle_id,
                "bundleVersion": "1.2.3",
                "environment": environment,
                "status": 1
            }
        })
    }

    fn transaction_json() -> Value {
        json!({
            "bundleId": BUNDLE_ID,
            "environment": "Sandbox",
            "originalTransactionId": "1000000000000001",
            "productId": "com.example.product",
            "purchaseDate": 1698148900000i64,
            "quantity": 1,
            "signedDate": 1698148950000i64,
            "transactionId": "1000000123456789",
            "type": "Auto-Renewable Subscription"
        })
    }

    fn payload_value(payload: &VerifiedPayload) -> Value {
        serde_json::from_slice(payload.json()).unwrap()
    }

    #[test]
    fn verification_returns_original_payload_and_is_repeatable() {
        let pki = TestPki::new();
        let repository = repository(&pki, TrustEnvironment::Sandbox);
        let original = json!({ "bundleId": BUNDLE_ID, "nested": { "n": [1, 2, 3] } });
        let token = sign_with_pki(&pki, &original);

        let first = repository.verify_signed_data(&token).unwrap();
        let second = repository.verify_signed_data(&token).unwrap();
        assert_eq!(first.mode(), VerificationMode::Verified);
        assert_eq!(payload_value(&first), original);
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_unsupported_algorithm_even_when_signed() {
        let pki = TestPki::new();
        let header = json!({ "alg": "ES384", "x5c": pki.x5c() });
        let token = sign_token(&header, &json!({}), &pki.leaf.key);
        let err = repository(&pki, TrustEnvironment::Production)
            .verify_signed_data(&token)
            .unwrap_err();
        assert!(
            matches!(&err, SignedDataError::UnsupportedAlgorithm(alg) if alg == "ES384"),
            "{err:?}"
        );
        assert_eq!(
            err.category(),
            crate::errors::ErrorCategory::Untrusted
        );
    }

    #[test]
    fn algorithm_comparison_is_case_sensitive() {
        let pki = TestPki::new();
        let header = json!({ "alg": "es256", "x5c": pki.x5c() });
        let token = sign_token(&header, &json!({}), &pki.leaf.key);
        assert!(matches!(
            repository(&pki, TrustEnvironment::Production).verify_signed_data(&token),
            Err(SignedDataError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn missing_or_non_string_algorithm_is_unsupported() {
        let pki = TestPki::new();
        let repository = repository(&pki, TrustEnvironment::Production);

        let header = json!({ "x5c": pki.x5c() });
        let token = sign_token(&header, &json!({}), &pki.leaf.key);
        let err = repository.verify_signed_data(&token).unwrap_err();
        assert!(
            matches!(&err, SignedDataError::UnsupportedAlgorithm(alg) if alg == "<missing>"),
            "{err:?}"
        );

        let header = json!({ "alg": 256, "x5c": pki.x5c() });
        let token = sign_token(&header, &json!({}), &pki.leaf.key);
        let err = repository.verify_signed_data(&token).unwrap_err();
        assert!(
            matches!(&err, SignedDataError::UnsupportedAlgorithm(alg) if alg == "256"),
            "{err:?}"
        );
    }

    #[test]
    fn rejects_wrong_certificate_count_before_crypto() {
        let pki = TestPki::new();
        let repository = repository(&pki, TrustEnvironment::Production);
        let mut x5c = pki.x5c();
        x5c.pop();
        // Unsigned, so reaching a cryptographic check would fail differently.
        let short = unsigned_token(&json!({ "alg": "ES256", "x5c": x5c }), &json!({}));
        assert!(matches!(
            repository.verify_signed_data(&short),
            Err(SignedDataError::InvalidCertificateCount(2))
        ));

        let mut x5c = pki.x5c();
        x5c.push(x5c[2].clone());
        let long = unsigned_token(&json!({ "alg": "ES256", "x5c": x5c }), &json!({}));
        assert!(matches!(
            repository.verify_signed_data(&long),
            Err(SignedDataError::InvalidCertificateCount(4))
        ));

        let missing = unsigned_token(&json!({ "alg": "ES256" }), &json!({}));
        assert!(matches!(
            repository.verify_signed_data(&missing),
            Err(SignedDataError::InvalidCertificateCount(0))
        ));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let pki = TestPki::new();
        let repository = repository(&pki, TrustEnvironment::Production);
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(
                matches!(
                    repository.verify_signed_data(token),
                    Err(SignedDataError::MalformedToken(_))
                ),
                "{token}"
            );
        }
    }

    #[test]
    fn swapped_leaf_and_intermediate_never_verify() {
        let pki = TestPki::new();
        let mut x5c = pki.x5c();
        x5c.swap(0, 1);
        let header = json!({ "alg": "ES256", "x5c": x5c });
        let token = sign_token(&header, &json!({}), &pki.leaf.key);
        let err = repository(&pki, TrustEnvironment::Production)
            .verify_signed_data(&token)
            .unwrap_err();
        assert!(
            matches!(
                err,
                SignedDataError::ChainValidationFailed(_) | SignedDataError::SignatureInvalid(_)
            ),
            "{err:?}"
        );
    }

    #[test]
    fn rejects_chain_to_foreign_root_even_if_x5c_carries_it() {
        let trusted = TestPki::new();
        let attacker = TestPki::new();
        let token = sign_with_pki(&attacker, &json!({}));
        assert!(matches!(
            repository(&trusted, TrustEnvironment::Production).verify_signed_data(&token),
            Err(SignedDataError::ChainValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_signature_from_key_outside_the_chain() {
        let pki = TestPki::new();
        let header = json!({ "alg": "ES256", "x5c": pki.x5c() });
        let token = sign_token(&header, &json!({}), &pki.intermediate.key);
        assert!(matches!(
            repository(&pki, TrustEnvironment::Production).verify_signed_data(&token),
            Err(SignedDataError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn local_testing_bypasses_chain_and_signature() {
        let config = SignedDataVerifierConfig::new(
            BUNDLE_ID,
            TrustEnvironment::LocalTesting,
            Vec::new(),
            false,
        );
        let repository = SignedDataRepositoryImpl::new(&config).unwrap();
        let token = unsigned_token(
            &json!({ "alg": "none" }),
            &notification_json("LocalTesting", BUNDLE_ID),
        );

        let payload = repository.verify_signed_data(&token).unwrap();
        assert_eq!(payload.mode(), VerificationMode::Skipped);

        let notification = repository
            .verify_and_decode_notification(&token, &Environment::LocalTesting, BUNDLE_ID)
            .unwrap();
        assert_eq!(notification.bundle_id(), Some(BUNDLE_ID));

        // The token structure is still enforced.
        assert!(matches!(
            repository.verify_signed_data("not-a-token"),
            Err(SignedDataError::MalformedToken(_))
        ));
    }

    #[test]
    fn environment_mismatch_after_successful_verification() {
        let pki = TestPki::new();
        let token = sign_with_pki(&pki, &notification_json("Sandbox", BUNDLE_ID));
        let err = repository(&pki, TrustEnvironment::Production)
            .verify_and_decode_notification(&token, &Environment::Production, BUNDLE_ID)
            .unwrap_err();
        let SignedDataError::EnvironmentMismatch { expected, actual } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(expected, "Production");
        assert_eq!(actual, "Sandbox");
        assert_eq!(
            err.category(),
            crate::errors::ErrorCategory::BusinessRule
        );
    }

    #[test]
    fn bundle_id_mismatch_is_reported_separately() {
        let pki = TestPki::new();
        let token = sign_with_pki(&pki, &notification_json("Sandbox", "com.other"));
        assert!(matches!(
            repository(&pki, TrustEnvironment::Sandbox).verify_and_decode_notification(
                &token,
                &Environment::Sandbox,
                BUNDLE_ID
            ),
            Err(SignedDataError::BundleIdMismatch { .. })
        ));
    }

    #[test]
    fn app_apple_id_is_checked_in_production_only() {
        let pki = TestPki::new();
        let production = SignedDataRepositoryImpl::new(
            &config(&pki, TrustEnvironment::Production).with_app_apple_id(99),
        )
        .unwrap();
        let token = sign_with_pki(&pki, &notification_json("Production", BUNDLE_ID));
        assert!(matches!(
            production.verify_and_decode_notification(&token, &Environment::Production, BUNDLE_ID),
            Err(SignedDataError::AppAppleIdMismatch { expected: 99, .. })
        ));

        let sandbox = SignedDataRepositoryImpl::new(
            &config(&pki, TrustEnvironment::Sandbox).with_app_apple_id(99),
        )
        .unwrap();
        let token = sign_with_pki(&pki, &notification_json("Sandbox", BUNDLE_ID));
        sandbox
            .verify_and_decode_notification(&token, &Environment::Sandbox, BUNDLE_ID)
            .unwrap();
    }

    #[test]
    fn transaction_and_renewal_info_skip_business_rules() {
        let pki = TestPki::new();
        let repository = repository(&pki, TrustEnvironment::Production);
        let transaction = repository
            .verify_and_decode_transaction(&sign_with_pki(&pki, &transaction_json()))
            .unwrap();
        assert_eq!(transaction.transaction_id, "1000000123456789");
        assert_eq!(transaction.environment, Environment::Sandbox);

        let renewal = repository
            .verify_and_decode_renewal_info(&sign_with_pki(
                &pki,
                &json!({ "environment": "Sandbox", "signedDate": 1698148950000i64 }),
            ))
            .unwrap();
        assert_eq!(renewal.environment, Environment::Sandbox);
    }

    #[test]
    fn payload_schema_mismatch_is_a_decode_error() {
        let pki = TestPki::new();
        let token = sign_with_pki(&pki, &json!({ "transactionId": 5 }));
        let err = repository(&pki, TrustEnvironment::Sandbox)
            .verify_and_decode_transaction(&token)
            .unwrap_err();
        assert!(
            matches!(err, SignedDataError::PayloadDecode { what: "transaction", .. }),
            "{err:?}"
        );
    }

    #[test]
    fn parses_notification_body_with_nested_signed_data() {
        let pki = TestPki::new();
        let mut notification = notification_json("Sandbox", BUNDLE_ID);
        notification["data"]["signedTransactionInfo"] =
            Value::String(sign_with_pki(&pki, &transaction_json()));
        notification["data"]["signedRenewalInfo"] = Value::String(sign_with_pki(
            &pki,
            &json!({
                "autoRenewProductId": "com.example.product",
                "autoRenewStatus": 1,
                "environment": "Sandbox",
                "originalTransactionId": "1000000000000001",
                "productId": "com.example.product",
                "signedDate": 1698148950000i64
            }),
        ));
        let body = json!({ "signedPayload": sign_with_pki(&pki, &notification) }).to_string();

        let decoded = repository(&pki, TrustEnvironment::Sandbox)
            .parse_notification(&body)
            .unwrap();
        assert_eq!(
            decoded.payload.notification_uuid,
            "002e14d5-51f5-4503-b5a8-c3a1af68eb20"
        );
        assert_eq!(
            decoded.transaction_info.map(|t| t.transaction_id).as_deref(),
            Some("1000000123456789")
        );
        assert_eq!(
            decoded.renewal_info.and_then(|r| r.product_id).as_deref(),
            Some("com.example.product")
        );
    }

    #[test]
    fn nested_signed_data_is_verified_too() {
        let trusted = TestPki::new();
        let attacker = TestPki::new();
        let mut notification = notification_json("Sandbox", BUNDLE_ID);
        notification["data"]["signedTransactionInfo"] =
            Value::String(sign_with_pki(&attacker, &transaction_json()));
        let body = json!({ "signedPayload": sign_with_pki(&trusted, &notification) }).to_string();
        assert!(matches!(
            repository(&trusted, TrustEnvironment::Sandbox).parse_notification(&body),
            Err(SignedDataError::ChainValidationFailed(_))
        ));
    }

    #[test]
    fn extracts_transaction_id_from_receipt() {
        let pki = TestPki::new();
        let purchase = der::set(&[der::receipt_attribute(
            1703,
            &der::utf8_string("1000000123456789"),
        )]);
        let receipt = der::pkcs7_receipt(&der::set(&[der::receipt_attribute(17, &purchase)]));
        let transaction_id = repository(&pki, TrustEnvironment::Production)
            .extract_transaction_id_from_app_receipt(&STANDARD.encode(receipt))
            .unwrap();
        assert_eq!(transaction_id, "1000000123456789");
    }

    #[test]
    fn signed_environments_require_roots() {
        let config =
            SignedDataVerifierConfig::new(BUNDLE_ID, TrustEnvironment::Production, Vec::new(), false);
        assert!(matches!(
            SignedDataRepositoryImpl::new(&config),
            Err(SignedDataError::Configuration(_))
        ));
        let config = SignedDataVerifierConfig::new(
            BUNDLE_ID,
            TrustEnvironment::Sandbox,
            vec![RootCertificate::Base64("AAAA".to_string())],
            false,
        );
        assert!(matches!(
            SignedDataRepositoryImpl::new(&config),
            Err(SignedDataError::Configuration(_))
        ));
    }
}
