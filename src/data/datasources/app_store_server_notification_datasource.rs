use tracing::debug;

use crate::{
    data::{
        datasources::utils::decode_json,
        models::app_store_server_notifications::response_body_v2_model::ResponseBodyV2Model,
    },
    errors::SignedDataError,
};

pub(crate) trait AppStoreServerNotificationDatasource: Send + Sync {
    /// Parse App Store Server Notification body:
    /// https://developer.apple.com/documentation/appstoreservernotifications/responsebodyv2
    ///
    /// notification:
    ///   The raw POST body of the notification.
    ///
    /// Returns the signed payload, still to be verified.
    fn parse_notification_body(&self, notification: &str) -> Result<String, SignedDataError>;
}

pub(crate) struct AppStoreServerNotificationDatasourceImpl;

impl AppStoreServerNotificationDatasource for AppStoreServerNotificationDatasourceImpl {
    fn parse_notification_body(&self, notification: &str) -> Result<String, SignedDataError> {
        let wrapper: ResponseBodyV2Model =
            decode_json(notification.as_bytes(), "notification body")?;
        debug!(
            length = wrapper.signed_payload.len(),
            "received notification body"
        );
        Ok(wrapper.signed_payload)
    }
}

impl AppStoreServerNotificationDatasourceImpl {
    pub(crate) fn new() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_signed_payload() {
        let signed = AppStoreServerNotificationDatasourceImpl::new()
            .parse_notification_body(r#"{"signedPayload":"a.b.c"}"#)
            .unwrap();
        assert_eq!(signed, "a.b.c");
    }

    #[test]
    fn rejects_body_without_signed_payload() {
        let err = AppStoreServerNotificationDatasourceImpl::new()
            .parse_notification_body(r#"{"payload":"a.b.c"}"#)
            .unwrap_err();
        assert!(
            matches!(
                err,
                SignedDataError::PayloadDecode {
                    what: "notification body",
                    ..
                }
            ),
            "{err:?}"
        );
    }
}
