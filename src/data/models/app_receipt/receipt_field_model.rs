use num_bigint::BigInt;

/// One `{type, version, value}` attribute of an app receipt payload.
///
/// Receipt payloads (both the outer receipt and each in-app purchase record)
/// are a SET OF these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFieldModel {
    pub type_id: BigInt,
    pub version: BigInt,
    pub content: Vec<u8>,
}
