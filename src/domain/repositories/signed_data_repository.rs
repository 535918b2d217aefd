use crate::{
    data::models::{
        app_store_server_api::{
            common::Environment,
            jws_renewal_info_decoded_payload_model::JwsRenewalInfoDecodedPayloadModel,
            jws_transaction_decoded_payload_model::JwsTransactionDecodedPayloadModel,
        },
        app_store_server_notifications::response_body_v2_decoded_payload_model::ResponseBodyV2DecodedPayloadModel,
    },
    domain::entities::{decoded_notification::DecodedNotification, verified_payload::VerifiedPayload},
    errors::SignedDataError,
};

pub trait SignedDataRepository: Send + Sync {
    /// Runs the token and trust gates on a compact JWS and returns its
    /// payload, without interpreting it.
    fn verify_signed_data(&self, signed_data: &str) -> Result<VerifiedPayload, SignedDataError>;

    /// Verifies a signed notification payload and checks that it was issued
    /// for `environment` and `bundle_id`.
    fn verify_and_decode_notification(
        &self,
        signed_payload: &str,
        environment: &Environment,
        bundle_id: &str,
    ) -> Result<ResponseBodyV2DecodedPayloadModel, SignedDataError>;

    fn verify_and_decode_transaction(
        &self,
        signed_transaction: &str,
    ) -> Result<JwsTransactionDecodedPayloadModel, SignedDataError>;

    fn verify_and_decode_renewal_info(
        &self,
        signed_renewal_info: &str,
    ) -> Result<JwsRenewalInfoDecodedPayloadModel, SignedDataError>;

    /// Parses a raw notification POST body and verifies the notification and
    /// any signed transaction or renewal info it carries.
    fn parse_notification(&self, body: &str) -> Result<DecodedNotification, SignedDataError>;

    /// Reads the transaction identifier of the first in-app purchase from a
    /// base64-encoded app receipt.
    fn extract_transaction_id_from_app_receipt(
        &self,
        app_receipt: &str,
    ) -> Result<String, SignedDataError>;
}
