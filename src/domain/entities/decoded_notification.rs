use crate::data::models::{
    app_store_server_api::{
        jws_renewal_info_decoded_payload_model::JwsRenewalInfoDecodedPayloadModel,
        jws_transaction_decoded_payload_model::JwsTransactionDecodedPayloadModel,
    },
    app_store_server_notifications::response_body_v2_decoded_payload_model::ResponseBodyV2DecodedPayloadModel,
};

/// A verified App Store Server Notification, with its nested signed
/// transaction and renewal info verified and decoded as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedNotification {
    pub payload: ResponseBodyV2DecodedPayloadModel,
    pub transaction_info: Option<JwsTransactionDecodedPayloadModel>,
    pub renewal_info: Option<JwsRenewalInfoDecodedPayloadModel>,
}
