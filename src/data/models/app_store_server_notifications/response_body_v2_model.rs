use serde::Deserialize;

type SignedPayload = String;

/// Data structure sent by the App Store Server Notifications.
///
/// https://developer.apple.com/documentation/appstoreservernotifications/responsebodyv2
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBodyV2Model {
    /// The payload in JSON Web Signature (JWS) format, signed by the App Store.
    pub signed_payload: SignedPayload,
}
