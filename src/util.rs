use crate::{
    config::SignedDataVerifierConfig,
    data::{
        datasources::{
            app_receipt_datasource::AppReceiptDatasourceImpl,
            app_store_server_notification_datasource::AppStoreServerNotificationDatasourceImpl,
        },
        models::{
            app_store_server_api::{
                common::Environment,
                jws_renewal_info_decoded_payload_model::JwsRenewalInfoDecodedPayloadModel,
                jws_transaction_decoded_payload_model::JwsTransactionDecodedPayloadModel,
            },
            app_store_server_notifications::response_body_v2_decoded_payload_model::ResponseBodyV2DecodedPayloadModel,
        },
        repositories::signed_data_repository_impl::SignedDataRepositoryImpl,
    },
    domain::{
        entities::{decoded_notification::DecodedNotification, verified_payload::VerifiedPayload},
        repositories::signed_data_repository::SignedDataRepository,
    },
    errors::SignedDataError,
};

/// Verifies and decodes App Store signed data (JWS transactions, renewal info
/// and server notifications) and reads legacy app receipts.
///
/// All checks are synchronous. With online revocation checking enabled,
/// verification performs blocking HTTP calls; run it off async executor
/// threads (e.g. `tokio::task::spawn_blocking`).
pub struct SignedDataUtil<R: SignedDataRepository> {
    signed_data_repository: R,
    environment: Environment,
    bundle_id: String,
}

impl<R: SignedDataRepository> SignedDataUtil<R> {
    /// Verifies a signed notification payload against the configured
    /// environment and bundle ID.
    pub fn verify_and_decode_notification(
        &self,
        signed_payload: &str,
    ) -> Result<ResponseBodyV2DecodedPayloadModel, SignedDataError> {
        self.signed_data_repository.verify_and_decode_notification(
            signed_payload,
            &self.environment,
            &self.bundle_id,
        )
    }

    /// Verifies a signed notification payload against an explicit environment
    /// and bundle ID instead of the configured ones.
    pub fn verify_and_decode_notification_for(
        &self,
        environment: &Environment,
        bundle_id: &str,
        signed_payload: &str,
    ) -> Result<ResponseBodyV2DecodedPayloadModel, SignedDataError> {
        self.signed_data_repository
            .verify_and_decode_notification(signed_payload, environment, bundle_id)
    }

    pub fn verify_and_decode_transaction(
        &self,
        signed_transaction: &str,
    ) -> Result<JwsTransactionDecodedPayloadModel, SignedDataError> {
        self.signed_data_repository
            .verify_and_decode_transaction(signed_transaction)
    }

    pub fn verify_and_decode_renewal_info(
        &self,
        signed_renewal_info: &str,
    ) -> Result<JwsRenewalInfoDecodedPayloadModel, SignedDataError> {
        self.signed_data_repository
            .verify_and_decode_renewal_info(signed_renewal_info)
    }

    /// Verifies any compact JWS issued by the App Store and returns its raw
    /// JSON payload.
    pub fn verify_signed_data(&self, signed_data: &str) -> Result<VerifiedPayload, SignedDataError> {
        self.signed_data_repository.verify_signed_data(signed_data)
    }

    /// Parses the raw POST body of an App Store Server Notification.
    pub fn parse_notification(&self, body: &str) -> Result<DecodedNotification, SignedDataError> {
        self.signed_data_repository.parse_notification(body)
    }

    pub fn extract_transaction_id_from_app_receipt(
        &self,
        app_receipt: &str,
    ) -> Result<String, SignedDataError> {
        self.signed_data_repository
            .extract_transaction_id_from_app_receipt(app_receipt)
    }
}

impl
    SignedDataUtil<
        SignedDataRepositoryImpl<AppStoreServerNotificationDatasourceImpl, AppReceiptDatasourceImpl>,
    >
{
    pub fn new(config: &SignedDataVerifierConfig) -> Result<Self, SignedDataError> {
        Ok(Self {
            signed_data_repository: SignedDataRepositoryImpl::new(config)?,
            environment: config.environment.expected_environment(),
            bundle_id: config.bundle_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::{RootCertificate, TrustEnvironment},
        test_support::pki::{sign_with_pki, TestPki},
    };

    type DefaultUtil = SignedDataUtil<
        SignedDataRepositoryImpl<AppStoreServerNotificationDatasourceImpl, AppReceiptDatasourceImpl>,
    >;

    fn util(pki: &TestPki) -> DefaultUtil {
        SignedDataUtil::new(&SignedDataVerifierConfig::new(
            "com.example",
            TrustEnvironment::Sandbox,
            vec![RootCertificate::Der(pki.root_der())],
            false,
        ))
        .unwrap()
    }

    fn notification(bundle_id: &str) -> serde_json::Value {
        json!({
            "notificationType": "TEST",
            "notificationUUID": "9ad56bd2-0bc6-42e0-af24-fd996d87a1e6",
            "signedDate": 1681314324000i64,
            "data": { "environment": "Sandbox", "bundleId": bundle_id }
        })
    }

    #[test]
    fn checks_notifications_against_configured_values() {
        let pki = TestPki::new();
        let util = util(&pki);
        util.verify_and_decode_notification(&sign_with_pki(&pki, &notification("com.example")))
            .unwrap();
        assert!(matches!(
            util.verify_and_decode_notification(&sign_with_pki(&pki, &notification("com.other"))),
            Err(SignedDataError::BundleIdMismatch { .. })
        ));
    }

    #[test]
    fn explicit_expectations_override_configured_values() {
        let pki = TestPki::new();
        let util = util(&pki);
        let token = sign_with_pki(&pki, &notification("com.other"));
        util.verify_and_decode_notification_for(&Environment::Sandbox, "com.other", &token)
            .unwrap();
        assert!(matches!(
            util.verify_and_decode_notification_for(&Environment::Production, "com.other", &token),
            Err(SignedDataError::EnvironmentMismatch { .. })
        ));
    }

    #[test]
    fn util_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DefaultUtil>();
    }
}
