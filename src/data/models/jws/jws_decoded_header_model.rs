use serde::Deserialize;
use serde_json::Value;

/// A decoded JSON Web Signature header.
///
/// https://developer.apple.com/documentation/appstoreservernotifications/jwsdecodedheader
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwsDecodedHeaderModel {
    /// The algorithm used for signing the JWS. Kept as raw JSON so that a
    /// missing or non-string value still reaches the algorithm check.
    #[serde(default)]
    pub alg: Option<Value>,
    /// The certificate chain, as base64-encoded DER, in the following order:
    /// the certificate whose key signed the JWS, an Apple intermediate
    /// ("Worldwide Developer Relations"), and an Apple root.
    #[serde(default)]
    pub x5c: Vec<String>,
}

impl JwsDecodedHeaderModel {
    /// The `alg` value, if it is a string.
    pub fn algorithm(&self) -> Option<&str> {
        self.alg.as_ref().and_then(Value::as_str)
    }
}
