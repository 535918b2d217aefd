//! Throwaway P-256 PKI (root -> intermediate -> leaf) and an ES256 compact
//! token signer.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use jsonwebtoken::{Algorithm, EncodingKey};
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
    x509::{
        extension::{BasicConstraints, KeyUsage},
        X509Builder, X509NameBuilder, X509,
    },
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_PKI_ID: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct Identity {
    pub(crate) key: PKey<Private>,
    pub(crate) cert: X509,
}

pub(crate) struct TestPki {
    pub(crate) root: Identity,
    pub(crate) intermediate: Identity,
    pub(crate) leaf: Identity,
}

fn p256_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn issue(common_name: &str, serial: u32, issuer: Option<&Identity>, is_ca: bool) -> Identity {
    let key = p256_key();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some(issuer) => builder.set_issuer_name(issuer.cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        builder
            .append_extension(KeyUsage::new().critical().digital_signature().build().unwrap())
            .unwrap();
    }
    let signing_key = issuer.map(|issuer| &issuer.key).unwrap_or(&key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    let cert = builder.build();
    Identity { key, cert }
}

impl TestPki {
    pub(crate) fn new() -> Self {
        // Distinct names per PKI so issuer lookup never picks another PKI's CA.
        let id = NEXT_PKI_ID.fetch_add(1, Ordering::Relaxed);
        let root = issue(&format!("Test Root CA {id}"), 1, None, true);
        let intermediate = issue(&format!("Test Intermediate CA {id}"), 2, Some(&root), true);
        let leaf = issue(&format!("Test Signing Leaf {id}"), 3, Some(&intermediate), false);
        Self {
            root,
            intermediate,
            leaf,
        }
    }

    pub(crate) fn root_der(&self) -> Vec<u8> {
        self.root.cert.to_der().unwrap()
    }

    /// x5c in the usual order: leaf, intermediate, root.
    pub(crate) fn x5c(&self) -> Vec<String> {
        [&self.leaf, &self.intermediate, &self.root]
            .iter()
            .map(|identity| STANDARD.encode(identity.cert.to_der().unwrap()))
            .collect()
    }
}

/// Builds `header.payload.signature`, signing with `key` over the exact
/// encoded segments.
pub(crate) fn sign_token(header: &Value, payload: &Value, key: &PKey<Private>) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap())
    );
    let pem = key.private_key_to_pem_pkcs8().unwrap();
    let encoding_key = EncodingKey::from_ec_pem(&pem).unwrap();
    let signature =
        jsonwebtoken::crypto::sign(signing_input.as_bytes(), &encoding_key, Algorithm::ES256)
            .unwrap();
    format!("{signing_input}.{signature}")
}

/// Standard ES256 header for `pki`, signed by its leaf.
pub(crate) fn sign_with_pki(pki: &TestPki, payload: &Value) -> String {
    let header = serde_json::json!({ "alg": "ES256", "x5c": pki.x5c() });
    sign_token(&header, payload, &pki.leaf.key)
}

/// A token whose signature segment is not a real signature.
pub(crate) fn unsigned_token(header: &Value, payload: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature")
    )
}
