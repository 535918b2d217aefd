use jsonwebtoken::{Algorithm, DecodingKey};
use openssl::{
    bn::BigNumContext,
    ec::PointConversionForm,
    nid::Nid,
    x509::X509Ref,
};

use crate::errors::SignedDataError;

/// Verifies an ES256 (ECDSA P-256 / SHA-256) JWS signature with the public key
/// of `leaf`.
///
/// `signing_input` must be `<header-segment>.<payload-segment>` exactly as
/// received, and `signature` the base64url signature segment. No claims
/// (expiry, issuer, audience) are checked.
pub(crate) fn verify_es256_signature(
    signing_input: &str,
    signature: &str,
    leaf: &X509Ref,
) -> Result<(), SignedDataError> {
    let invalid = SignedDataError::SignatureInvalid;

    let public_key = leaf
        .public_key()
        .map_err(|e| invalid(format!("leaf certificate has no usable public key ({e})")))?;
    let ec_key = public_key
        .ec_key()
        .map_err(|_| invalid("leaf certificate key is not an EC key".to_string()))?;
    if ec_key.group().curve_name() != Some(Nid::X9_62_PRIME256V1) {
        return Err(invalid("leaf certificate key is not on P-256".to_string()));
    }
    let mut context = BigNumContext::new().map_err(|e| invalid(e.to_string()))?;
    let point = ec_key
        .public_key()
        .to_bytes(ec_key.group(), PointConversionForm::UNCOMPRESSED, &mut context)
        .map_err(|e| invalid(e.to_string()))?;

    let decoding_key = DecodingKey::from_ec_der(&point);
    match jsonwebtoken::crypto::verify(
        signature,
        signing_input.as_bytes(),
        &decoding_key,
        Algorithm::ES256,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(invalid("signature does not match leaf public key".to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}
