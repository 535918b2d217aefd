use crate::{
    data::{
        datasources::utils::decode_base64_url,
        models::jws::jws_decoded_header_model::JwsDecodedHeaderModel,
    },
    errors::SignedDataError,
};

/// A compact JWS split into its segments.
///
/// The raw segments are kept alongside the decoded header and payload:
/// signature verification runs over `header.payload` exactly as transmitted,
/// since re-serializing the decoded JSON is not guaranteed to reproduce the
/// same bytes.
#[derive(Debug, Clone)]
pub(crate) struct CompactJws<'a> {
    header_segment: &'a str,
    payload_segment: &'a str,
    signature_segment: &'a str,
    pub(crate) header: JwsDecodedHeaderModel,
    pub(crate) payload: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    pub(crate) fn parse(token: &'a str) -> Result<Self, SignedDataError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        let [header_segment, payload_segment, signature_segment] = segments[..] else {
            return Err(SignedDataError::MalformedToken(format!(
                "expected 3 dot-separated segments, found {}",
                segments.len()
            )));
        };
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(SignedDataError::MalformedToken(
                "token contains an empty segment".to_string(),
            ));
        }

        let header_bytes = decode_base64_url(header_segment, "header")?;
        let header: JwsDecodedHeaderModel = serde_json::from_slice(&header_bytes).map_err(|e| {
            SignedDataError::MalformedToken(format!("header is not a valid JWS header ({e})"))
        })?;
        let payload = decode_base64_url(payload_segment, "payload")?;

        Ok(Self {
            header_segment,
            payload_segment,
            signature_segment,
            header,
            payload,
        })
    }

    /// `<header-segment>.<payload-segment>`, as received.
    pub(crate) fn signing_input(&self) -> String {
        format!("{}.{}", self.header_segment, self.payload_segment)
    }

    /// The base64url signature segment, as received.
    pub(crate) fn signature_segment(&self) -> &'a str {
        self.signature_segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pki::unsigned_token;
    use serde_json::json;

    #[test]
    fn splits_and_decodes_segments() {
        let token = unsigned_token(
            &json!({ "alg": "ES256", "x5c": ["a", "b", "c"] }),
            &json!({ "hello": "world" }),
        );
        let jws = CompactJws::parse(&token).unwrap();
        assert_eq!(jws.header.algorithm(), Some("ES256"));
        assert_eq!(jws.header.x5c, vec!["a", "b", "c"]);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&jws.payload).unwrap(),
            json!({ "hello": "world" })
        );
        let (signing_input, _) = token.rsplit_once('.').unwrap();
        assert_eq!(jws.signing_input(), signing_input);
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(
                matches!(CompactJws::parse(token), Err(SignedDataError::MalformedToken(_))),
                "{token}"
            );
        }
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(matches!(
            CompactJws::parse("e30..c2ln"),
            Err(SignedDataError::MalformedToken(_))
        ));
    }

    #[test]
    fn rejects_header_that_is_not_json() {
        // "bm90IGpzb24" = "not json"
        assert!(matches!(
            CompactJws::parse("bm90IGpzb24.e30.c2ln"),
            Err(SignedDataError::MalformedToken(_))
        ));
    }

    #[test]
    fn header_without_alg_still_parses() {
        // {"x5c":[]}
        let jws = CompactJws::parse("eyJ4NWMiOltdfQ.e30.c2ln").unwrap();
        assert_eq!(jws.header.alg, None);
        assert_eq!(jws.header.algorithm(), None);
    }

    #[test]
    fn header_without_x5c_decodes_to_empty_chain() {
        // {"alg":"ES256"}
        let jws = CompactJws::parse("eyJhbGciOiJFUzI1NiJ9.e30.c2ln").unwrap();
        assert!(jws.header.x5c.is_empty());
    }
}
