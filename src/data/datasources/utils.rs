use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use openssl::x509::X509;
use serde::de::DeserializeOwned;

use crate::errors::SignedDataError;

/// base64url as used by JWS segments. Padding is tolerated on input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn decode_base64_url(segment: &str, what: &str) -> Result<Vec<u8>, SignedDataError> {
    BASE64_URL
        .decode(segment)
        .map_err(|e| SignedDataError::MalformedToken(format!("{what} is not valid base64url ({e})")))
}

/// Decodes base64 text that may be wrapped across lines.
pub(crate) fn decode_base64_lenient(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.split_whitespace().collect();
    STANDARD.decode(compact)
}

/// Decodes a JSON document into `T`, reporting `what` on failure.
pub(crate) fn decode_json<T: DeserializeOwned>(
    bytes: &[u8],
    what: &'static str,
) -> Result<T, SignedDataError> {
    serde_json::from_slice(bytes).map_err(|source| SignedDataError::PayloadDecode { what, source })
}

/// Parses one base64-encoded DER entry of an x5c claim.
pub(crate) fn parse_x5c_certificate(entry: &str, position: &str) -> Result<X509, SignedDataError> {
    let der = STANDARD.decode(entry).map_err(|e| {
        SignedDataError::ChainValidationFailed(format!(
            "{position} certificate is not valid base64 ({e})"
        ))
    })?;
    X509::from_der(&der).map_err(|e| {
        SignedDataError::ChainValidationFailed(format!(
            "{position} certificate could not be parsed ({e})"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_url_accepts_padded_and_unpadded_segments() {
        assert_eq!(decode_base64_url("e30", "header").unwrap(), b"{}");
        assert_eq!(decode_base64_url("e30=", "header").unwrap(), b"{}");
        assert!(matches!(
            decode_base64_url("e3+/", "header"),
            Err(SignedDataError::MalformedToken(_))
        ));
    }

    #[test]
    fn lenient_base64_ignores_line_breaks() {
        assert_eq!(decode_base64_lenient("AAEC\r\nAw==\n").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn unparseable_certificates_fail_chain_validation() {
        assert!(matches!(
            parse_x5c_certificate("AAEC", "leaf"),
            Err(SignedDataError::ChainValidationFailed(_))
        ));
    }
}
