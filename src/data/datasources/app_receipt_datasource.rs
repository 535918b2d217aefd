use num_bigint::BigInt;
use tracing::debug;

use crate::{
    asn1::{
        reader::{Asn1Reader, EncodingRules},
        tag::universal,
        MalformedEncoding,
    },
    data::{
        datasources::utils::decode_base64_lenient,
        models::app_receipt::receipt_field_model::ReceiptFieldModel,
    },
    errors::SignedDataError,
};

pub(crate) const PKCS7_SIGNED_DATA_OID: &str = "1.2.840.113549.1.7.2";
/// Receipt attribute holding one in-app purchase receipt.
pub(crate) const IN_APP_PURCHASES_TYPE_ID: i64 = 17;
/// In-app purchase attribute holding the transaction identifier.
pub(crate) const TRANSACTION_IDENTIFIER_TYPE_ID: i64 = 1703;

pub(crate) trait AppReceiptDatasource: Send + Sync {
    /// Returns the raw content of attribute `inner_type_id` inside the first
    /// `outer_type_id` attribute of a DER/BER app receipt.
    ///
    /// https://developer.apple.com/documentation/appstorereceipts/validating_receipts_on_the_device
    fn extract_field(
        &self,
        receipt: &[u8],
        outer_type_id: i64,
        inner_type_id: i64,
    ) -> Result<Vec<u8>, SignedDataError>;

    /// Extracts the transaction identifier of the first in-app purchase from a
    /// base64-encoded app receipt.
    fn extract_transaction_id(&self, app_receipt: &str) -> Result<String, SignedDataError>;
}

pub(crate) struct AppReceiptDatasourceImpl;

fn format_error(step: &'static str) -> impl Fn(MalformedEncoding) -> SignedDataError {
    move |e| SignedDataError::Format {
        step,
        detail: e.to_string(),
    }
}

/// Walks the PKCS#7 envelope down to the signed receipt payload:
///
/// ```text
/// SEQUENCE
///   OBJECT IDENTIFIER 1.2.840.113549.1.7.2
///   [0] SEQUENCE
///     INTEGER (version)
///     SET (digest algorithms)
///     SEQUENCE
///       OBJECT IDENTIFIER 1.2.840.113549.1.7.1
///       [0] OCTET STRING   <- payload
///     ...
/// ```
fn receipt_payload(receipt: &[u8]) -> Result<Vec<u8>, SignedDataError> {
    const STEP: &str = "receipt envelope";
    let mut reader = Asn1Reader::new(receipt, EncodingRules::Ber);
    let mut content_info = reader.read_sequence().map_err(format_error(STEP))?;

    let content_type = content_info
        .read_object_identifier()
        .map_err(format_error(STEP))?;
    if content_type != PKCS7_SIGNED_DATA_OID {
        return Err(SignedDataError::Format {
            step: STEP,
            detail: format!(
                "expected PKCS#7 signed data ({PKCS7_SIGNED_DATA_OID}), found {content_type}"
            ),
        });
    }

    let mut signed_data = content_info
        .read_tagged(0)
        .and_then(|mut wrapper| wrapper.read_sequence())
        .map_err(format_error(STEP))?;
    signed_data.read_integer().map_err(format_error(STEP))?;
    signed_data.read_set_of().map_err(format_error(STEP))?;

    let mut encapsulated = signed_data.read_sequence().map_err(format_error(STEP))?;
    encapsulated
        .read_object_identifier()
        .map_err(format_error(STEP))?;
    let payload = encapsulated
        .read_tagged(0)
        .and_then(|mut wrapper| wrapper.read_octet_string().map(|bytes| bytes.into_owned()))
        .map_err(format_error(STEP))?;
    Ok(payload)
}

fn read_field(set: &mut Asn1Reader<'_>) -> Result<ReceiptFieldModel, MalformedEncoding> {
    let mut attribute = set.read_sequence()?;
    let type_id = attribute.read_integer()?;
    let version = attribute.read_integer()?;
    let content = attribute.read_octet_string()?.into_owned();
    Ok(ReceiptFieldModel {
        type_id,
        version,
        content,
    })
}

/// Finds attribute `type_id` in a SET OF receipt attributes.
fn find_field(
    payload: &[u8],
    type_id: i64,
    step: &'static str,
) -> Result<ReceiptFieldModel, SignedDataError> {
    let mut reader = Asn1Reader::new(payload, EncodingRules::Ber);
    if !reader.has_data() {
        return Err(SignedDataError::Format {
            step,
            detail: "payload is empty".to_string(),
        });
    }
    let mut attributes = reader.read_set_of().map_err(format_error(step))?;
    if !attributes.has_data() {
        return Err(SignedDataError::Format {
            step,
            detail: "attribute set is empty".to_string(),
        });
    }

    let target = BigInt::from(type_id);
    let mut visited = 0usize;
    while attributes.has_data() {
        let field = read_field(&mut attributes).map_err(format_error(step))?;
        visited += 1;
        if field.type_id == target {
            debug!(type_id, visited, "receipt attribute found");
            return Ok(field);
        }
    }
    Err(SignedDataError::Format {
        step,
        detail: format!("attribute {type_id} not found among {visited} attributes"),
    })
}

impl AppReceiptDatasource for AppReceiptDatasourceImpl {
    fn extract_field(
        &self,
        receipt: &[u8],
        outer_type_id: i64,
        inner_type_id: i64,
    ) -> Result<Vec<u8>, SignedDataError> {
        let payload = receipt_payload(receipt)?;
        let outer = find_field(&payload, outer_type_id, "receipt attributes")?;
        let inner = find_field(&outer.content, inner_type_id, "in-app purchase attributes")?;
        Ok(inner.content)
    }

    fn extract_transaction_id(&self, app_receipt: &str) -> Result<String, SignedDataError> {
        let receipt = decode_base64_lenient(app_receipt).map_err(|e| SignedDataError::Format {
            step: "base64",
            detail: e.to_string(),
        })?;
        let content = self.extract_field(
            &receipt,
            IN_APP_PURCHASES_TYPE_ID,
            TRANSACTION_IDENTIFIER_TYPE_ID,
        )?;
        Asn1Reader::new(&content, EncodingRules::Ber)
            .read_character_string(universal::UTF8_STRING)
            .map_err(format_error("transaction identifier"))
    }
}

impl AppReceiptDatasourceImpl {
    pub(crate) fn new() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    use super::*;
    use crate::test_support::der;

    fn in_app_purchase(transaction_id: &str) -> Vec<u8> {
        der::set(&[
            der::receipt_attribute(1701, &der::integer(1)),
            der::receipt_attribute(1702, &der::utf8_string("com.example.product")),
            der::receipt_attribute(1703, &der::utf8_string(transaction_id)),
            der::receipt_attribute(1705, &der::utf8_string("1000000000000001")),
        ])
    }

    fn receipt_with(attributes: &[Vec<u8>]) -> Vec<u8> {
        der::pkcs7_receipt(&der::set(attributes))
    }

    fn standard_receipt() -> Vec<u8> {
        receipt_with(&[
            der::receipt_attribute(2, &der::utf8_string("com.example")),
            der::receipt_attribute(19, &der::utf8_string("1.0")),
            der::receipt_attribute(17, &in_app_purchase("1000000123456789")),
        ])
    }

    #[test]
    fn extracts_transaction_id() {
        let receipt = STANDARD.encode(standard_receipt());
        let transaction_id = AppReceiptDatasourceImpl::new()
            .extract_transaction_id(&receipt)
            .unwrap();
        assert_eq!(transaction_id, "1000000123456789");
    }

    #[test]
    fn tolerates_line_wrapped_base64() {
        let encoded = STANDARD.encode(standard_receipt());
        let wrapped = encoded
            .as_bytes()
            .chunks(64)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(
            AppReceiptDatasourceImpl::new()
                .extract_transaction_id(&wrapped)
                .unwrap(),
            "1000000123456789"
        );
    }

    #[test]
    fn extracts_arbitrary_inner_fields() {
        let content = AppReceiptDatasourceImpl::new()
            .extract_field(&standard_receipt(), 17, 1705)
            .unwrap();
        assert_eq!(content, der::utf8_string("1000000000000001"));
    }

    #[test]
    fn empty_in_app_purchase_set_is_an_error() {
        let receipt = STANDARD.encode(receipt_with(&[
            der::receipt_attribute(2, &der::utf8_string("com.example")),
            der::receipt_attribute(17, &der::set(&[])),
        ]));
        let err = AppReceiptDatasourceImpl::new()
            .extract_transaction_id(&receipt)
            .unwrap_err();
        assert!(
            matches!(
                err,
                SignedDataError::Format {
                    step: "in-app purchase attributes",
                    ..
                }
            ),
            "{err:?}"
        );
    }

    #[test]
    fn missing_in_app_purchase_attribute_is_an_error() {
        let receipt = STANDARD.encode(receipt_with(&[der::receipt_attribute(
            2,
            &der::utf8_string("com.example"),
        )]));
        let err = AppReceiptDatasourceImpl::new()
            .extract_transaction_id(&receipt)
            .unwrap_err();
        assert!(
            matches!(
                err,
                SignedDataError::Format {
                    step: "receipt attributes",
                    ..
                }
            ),
            "{err:?}"
        );
    }

    #[test]
    fn missing_transaction_identifier_is_an_error() {
        let purchase = der::set(&[der::receipt_attribute(1701, &der::integer(1))]);
        let receipt = receipt_with(&[der::receipt_attribute(17, &purchase)]);
        assert!(matches!(
            AppReceiptDatasourceImpl::new().extract_field(&receipt, 17, 1703),
            Err(SignedDataError::Format {
                step: "in-app purchase attributes",
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_pkcs7_content_type() {
        let receipt = der::sequence(&[
            der::object_identifier(&[1, 2, 840, 113549, 1, 7, 1]),
            der::context(0, &[der::sequence(&[])]),
        ]);
        let err = AppReceiptDatasourceImpl::new()
            .extract_field(&receipt, 17, 1703)
            .unwrap_err();
        let SignedDataError::Format { step, detail } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(*step, "receipt envelope");
        assert!(detail.contains("1.2.840.113549.1.7.1"), "{detail}");
    }

    #[test]
    fn rejects_structural_mismatches() {
        let not_a_sequence = der::integer(1);
        assert!(matches!(
            AppReceiptDatasourceImpl::new().extract_field(&not_a_sequence, 17, 1703),
            Err(SignedDataError::Format {
                step: "receipt envelope",
                ..
            })
        ));
        assert!(matches!(
            AppReceiptDatasourceImpl::new().extract_transaction_id("%%%"),
            Err(SignedDataError::Format { step: "base64", .. })
        ));
    }

    #[test]
    fn deeply_segmented_payload_is_a_format_error() {
        let mut payload = der::octet_string(b"A");
        for _ in 0..1_000 {
            payload = der::tlv(0x24, &payload);
        }
        let receipt = der::sequence(&[
            der::object_identifier(&[1, 2, 840, 113549, 1, 7, 2]),
            der::context(
                0,
                &[der::sequence(&[
                    der::integer(1),
                    der::set(&[]),
                    der::sequence(&[
                        der::object_identifier(&[1, 2, 840, 113549, 1, 7, 1]),
                        der::context(0, &[payload]),
                    ]),
                ])],
            ),
        ]);
        assert!(matches!(
            AppReceiptDatasourceImpl::new().extract_field(&receipt, 17, 1703),
            Err(SignedDataError::Format {
                step: "receipt envelope",
                ..
            })
        ));
    }

    #[test]
    fn reads_ber_indefinite_length_envelopes() {
        let payload = der::set(&[der::receipt_attribute(17, &in_app_purchase("42"))]);
        let receipt = der::indefinite(
            0x30,
            &[
                der::object_identifier(&[1, 2, 840, 113549, 1, 7, 2]),
                der::indefinite(
                    0xa0,
                    &[der::indefinite(
                        0x30,
                        &[
                            der::integer(1),
                            der::set(&[]),
                            der::indefinite(
                                0x30,
                                &[
                                    der::object_identifier(&[1, 2, 840, 113549, 1, 7, 1]),
                                    der::indefinite(
                                        0xa0,
                                        &[der::indefinite(
                                            0x24,
                                            &[
                                                der::octet_string(&payload[..10]),
                                                der::octet_string(&payload[10..]),
                                            ],
                                        )],
                                    ),
                                ],
                            ),
                        ],
                    )],
                ),
            ],
        );
        let content = AppReceiptDatasourceImpl::new()
            .extract_field(&receipt, 17, 1703)
            .unwrap();
        assert_eq!(content, der::utf8_string("42"));
    }
}
