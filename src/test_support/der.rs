//! Minimal DER writer for building synthetic receipts in tests.

fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend(bytes);
    out
}

pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend(encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

fn constructed(tag: u8, children: &[Vec<u8>]) -> Vec<u8> {
    tlv(tag, &children.concat())
}

pub(crate) fn sequence(children: &[Vec<u8>]) -> Vec<u8> {
    constructed(0x30, children)
}

pub(crate) fn set(children: &[Vec<u8>]) -> Vec<u8> {
    constructed(0x31, children)
}

/// Explicit `[n]` wrapper, n < 31.
pub(crate) fn context(number: u8, children: &[Vec<u8>]) -> Vec<u8> {
    constructed(0xa0 | number, children)
}

pub(crate) fn primitive_context(number: u8, content: &[u8]) -> Vec<u8> {
    tlv(0x80 | number, content)
}

pub(crate) fn integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    // Drop redundant leading sign octets.
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (current, next) = (bytes[start], bytes[start + 1]);
        if (current == 0x00 && next & 0x80 == 0) || (current == 0xff && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    tlv(0x02, &bytes[start..])
}

pub(crate) fn octet_string(content: &[u8]) -> Vec<u8> {
    tlv(0x04, content)
}

pub(crate) fn utf8_string(value: &str) -> Vec<u8> {
    tlv(0x0c, value.as_bytes())
}

pub(crate) fn null() -> Vec<u8> {
    vec![0x05, 0x00]
}

pub(crate) fn object_identifier(arcs: &[u64]) -> Vec<u8> {
    let mut content = Vec::new();
    let mut subidentifiers = vec![arcs[0] * 40 + arcs[1]];
    subidentifiers.extend_from_slice(&arcs[2..]);
    for value in subidentifiers {
        let mut groups = vec![(value & 0x7f) as u8];
        let mut rest = value >> 7;
        while rest > 0 {
            groups.push(0x80 | (rest & 0x7f) as u8);
            rest >>= 7;
        }
        groups.reverse();
        content.extend(groups);
    }
    tlv(0x06, &content)
}

/// One `{typeId, version, content}` receipt attribute.
pub(crate) fn receipt_attribute(type_id: i64, content: &[u8]) -> Vec<u8> {
    sequence(&[integer(type_id), integer(1), octet_string(content)])
}

/// Wraps an attribute set payload in a PKCS#7 SignedData envelope shaped like
/// an App Store receipt.
pub(crate) fn pkcs7_receipt(payload: &[u8]) -> Vec<u8> {
    sequence(&[
        object_identifier(&[1, 2, 840, 113549, 1, 7, 2]),
        context(
            0,
            &[sequence(&[
                integer(1),
                set(&[sequence(&[
                    object_identifier(&[2, 16, 840, 1, 101, 3, 4, 2, 1]),
                    null(),
                ])]),
                sequence(&[
                    object_identifier(&[1, 2, 840, 113549, 1, 7, 1]),
                    context(0, &[octet_string(payload)]),
                ]),
            ])],
        ),
    ])
}

/// BER indefinite-length constructed element.
pub(crate) fn indefinite(tag: u8, children: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![tag, 0x80];
    out.extend(children.concat());
    out.extend([0x00, 0x00]);
    out
}
