use std::{cmp::Ordering, time::Duration};

use openssl::{
    asn1::Asn1Time,
    error::ErrorStack,
    hash::MessageDigest,
    nid::Nid,
    ocsp::{OcspCertId, OcspCertStatus, OcspFlag, OcspRequest, OcspResponse, OcspResponseStatus},
    stack::Stack,
    x509::{
        store::{X509Store, X509StoreBuilder},
        verify::X509VerifyFlags,
        X509Ref, X509StoreContext, X509StoreContextRef, X509VerifyResult, X509,
    },
};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::{domain::entities::trust_configuration::TrustConfiguration, errors::SignedDataError};

/// Accepted clock skew on OCSP `thisUpdate` / `nextUpdate`.
const OCSP_VALIDITY_LEEWAY_SECS: u32 = 300;

/// Builds and validates `leaf -> intermediate -> trusted root` paths.
///
/// Only the roots of the [`TrustConfiguration`] act as trust anchors; the host
/// trust store is never consulted. Each configured root is an anchor in its
/// own right, whether or not it is self-signed.
pub(crate) struct CertificateChainVerifier {
    trust: TrustConfiguration,
    store: X509Store,
    ocsp_client: Option<reqwest::blocking::Client>,
}

fn openssl_failure(e: ErrorStack) -> SignedDataError {
    SignedDataError::ChainValidationFailed(format!("OpenSSL error ({e})"))
}

fn common_name(cert: &X509Ref) -> String {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .unwrap_or_else(|| "<no common name>".to_string())
}

fn describe_failure(context: &X509StoreContextRef) -> String {
    let subject = context
        .current_cert()
        .map(common_name)
        .unwrap_or_else(|| "<unknown certificate>".to_string());
    format!(
        "{} at depth {} ({subject})",
        context.error().error_string(),
        context.error_depth()
    )
}

impl CertificateChainVerifier {
    pub(crate) fn new(
        trust: TrustConfiguration,
        revocation_check_timeout: Duration,
    ) -> Result<Self, SignedDataError> {
        let to_config_error = |e: ErrorStack| {
            SignedDataError::Configuration(format!("failed to build trust store ({e})"))
        };
        let mut builder = X509StoreBuilder::new().map_err(to_config_error)?;
        for root in trust.trusted_roots() {
            builder.add_cert(root.clone()).map_err(to_config_error)?;
        }
        builder
            .set_flags(X509VerifyFlags::PARTIAL_CHAIN)
            .map_err(to_config_error)?;
        let store = builder.build();

        let ocsp_client = if trust.allow_online_revocation_check() {
            Some(
                reqwest::blocking::Client::builder()
                    .timeout(revocation_check_timeout)
                    .build()
                    .map_err(|e| {
                        SignedDataError::Configuration(format!(
                            "failed to build OCSP client ({e})"
                        ))
                    })?,
            )
        } else {
            None
        };

        Ok(Self {
            trust,
            store,
            ocsp_client,
        })
    }

    pub(crate) fn trust(&self) -> &TrustConfiguration {
        &self.trust
    }

    /// Validates the path from `leaf` through `intermediate` to a trusted
    /// root, then, if enabled, the revocation status of every certificate
    /// below the anchor.
    pub(crate) fn verify(&self, leaf: &X509, intermediate: &X509) -> Result<(), SignedDataError> {
        let mut untrusted = Stack::new().map_err(openssl_failure)?;
        untrusted
            .push(intermediate.clone())
            .map_err(openssl_failure)?;

        let mut context = X509StoreContext::new().map_err(openssl_failure)?;
        let outcome = context
            .init(&self.store, leaf, &untrusted, |context| {
                if context.verify_cert()? {
                    let chain = context
                        .chain()
                        .map(|chain| chain.iter().map(|cert| cert.to_owned()).collect::<Vec<X509>>())
                        .unwrap_or_default();
                    Ok(Ok(chain))
                } else {
                    Ok(Err(describe_failure(context)))
                }
            })
            .map_err(openssl_failure)?;
        let chain: Vec<X509> = match outcome {
            Ok(chain) => chain,
            Err(diagnostic) => {
                let failures = self.element_failures(leaf, intermediate);
                let diagnostic = if failures.is_empty() {
                    diagnostic
                } else {
                    format!("{diagnostic}; {}", failures.join("; "))
                };
                warn!(diagnostic = %diagnostic, "certificate chain rejected");
                return Err(SignedDataError::ChainValidationFailed(diagnostic));
            }
        };
        debug!(length = chain.len(), "certificate chain built");

        if let Some(client) = &self.ocsp_client {
            for pair in chain.windows(2) {
                self.check_ocsp(client, &pair[0], &pair[1])?;
            }
        }
        Ok(())
    }

    /// Checks every element of `leaf -> intermediate -> root` on its own.
    /// OpenSSL stops at the first failure; this lists all of them.
    fn element_failures(&self, leaf: &X509Ref, intermediate: &X509Ref) -> Vec<String> {
        let mut failures = Vec::new();

        if let Ok(now) = Asn1Time::days_from_now(0) {
            for cert in [leaf, intermediate] {
                let name = common_name(cert);
                if cert.not_before().compare(&now).ok() == Some(Ordering::Greater) {
                    failures.push(format!("{name} is not yet valid"));
                }
                if cert.not_after().compare(&now).ok() == Some(Ordering::Less) {
                    failures.push(format!("{name} has expired"));
                }
            }
        }

        let signed_by_intermediate = intermediate
            .public_key()
            .and_then(|key| leaf.verify(&key))
            .unwrap_or(false);
        if !signed_by_intermediate {
            failures.push(format!(
                "{} is not signed by {}",
                common_name(leaf),
                common_name(intermediate)
            ));
        }

        let intermediate_der = intermediate.to_der().ok();
        let anchored = self.trust.trusted_roots().iter().any(|root| {
            let is_root = intermediate_der.is_some() && root.to_der().ok() == intermediate_der;
            let issued_by_root = root.issued(intermediate) == X509VerifyResult::OK
                && root
                    .public_key()
                    .and_then(|key| intermediate.verify(&key))
                    .unwrap_or(false);
            is_root || issued_by_root
        });
        if !anchored {
            failures.push(format!(
                "{} is not issued by a configured root",
                common_name(intermediate)
            ));
        }
        failures
    }

    /// Queries the OCSP responder named in `subject`'s AIA extension.
    fn check_ocsp(
        &self,
        client: &reqwest::blocking::Client,
        subject: &X509,
        issuer: &X509,
    ) -> Result<(), SignedDataError> {
        let name = common_name(subject);
        // Without an AIA extension OpenSSL reports an error, not an empty list.
        let url = subject
            .ocsp_responders()
            .ok()
            .and_then(|responders| responders.iter().next().map(|url| url.to_string()))
            .ok_or_else(|| {
                SignedDataError::ChainValidationFailed(format!(
                    "no OCSP responder for {name}"
                ))
            })?;

        let mut request = OcspRequest::new().map_err(openssl_failure)?;
        request
            .add_id(
                OcspCertId::from_cert(MessageDigest::sha1(), subject, issuer)
                    .map_err(openssl_failure)?,
            )
            .map_err(openssl_failure)?;
        let request_der = request.to_der().map_err(openssl_failure)?;

        debug!(url = %url, subject = %name, "checking revocation status");
        let ocsp_failure = |detail: String| {
            SignedDataError::ChainValidationFailed(format!(
                "OCSP check for {name} failed: {detail}"
            ))
        };
        let response = client
            .post(&url)
            .header(CONTENT_TYPE, "application/ocsp-request")
            .body(request_der)
            .send()
            .map_err(|e| ocsp_failure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ocsp_failure(format!(
                "responder returned {}",
                response.status()
            )));
        }
        let body = response.bytes().map_err(|e| ocsp_failure(e.to_string()))?;

        let response = OcspResponse::from_der(&body).map_err(|e| ocsp_failure(e.to_string()))?;
        if response.status() != OcspResponseStatus::SUCCESSFUL {
            return Err(ocsp_failure(format!(
                "responder status {}",
                response.status().as_raw()
            )));
        }
        let basic = response.basic().map_err(|e| ocsp_failure(e.to_string()))?;
        let mut issuers = Stack::new().map_err(openssl_failure)?;
        issuers.push(issuer.clone()).map_err(openssl_failure)?;
        basic
            .verify(&issuers, &self.store, OcspFlag::empty())
            .map_err(|e| ocsp_failure(format!("response signature invalid ({e})")))?;

        let id = OcspCertId::from_cert(MessageDigest::sha1(), subject, issuer)
            .map_err(openssl_failure)?;
        let status = basic
            .find_status(&id)
            .ok_or_else(|| ocsp_failure("response does not cover the certificate".to_string()))?;
        status
            .check_validity(OCSP_VALIDITY_LEEWAY_SECS, None)
            .map_err(|e| ocsp_failure(format!("response is stale ({e})")))?;

        if status.status == OcspCertStatus::GOOD {
            Ok(())
        } else if status.status == OcspCertStatus::REVOKED {
            warn!(subject = %name, "certificate revoked");
            Err(ocsp_failure("certificate is revoked".to_string()))
        } else {
            Err(ocsp_failure("certificate status is unknown".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pki::TestPki;

    fn verifier_for(pki: &TestPki) -> CertificateChainVerifier {
        let trust = TrustConfiguration::new(&[pki.root_der()], false).unwrap();
        CertificateChainVerifier::new(trust, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn accepts_chain_to_configured_root() {
        let pki = TestPki::new();
        let verifier = verifier_for(&pki);
        verifier
            .verify(&pki.leaf.cert, &pki.intermediate.cert)
            .unwrap();
        assert!(!verifier.trust().allow_online_revocation_check());
    }

    #[test]
    fn rejects_chain_to_unconfigured_root() {
        let trusted = TestPki::new();
        let other = TestPki::new();
        let verifier = verifier_for(&trusted);
        let err = verifier
            .verify(&other.leaf.cert, &other.intermediate.cert)
            .unwrap_err();
        let SignedDataError::ChainValidationFailed(diagnostic) = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(diagnostic.contains("depth"), "{diagnostic}");
    }

    #[test]
    fn rejects_leaf_with_foreign_intermediate() {
        let trusted = TestPki::new();
        let other = TestPki::new();
        let verifier = verifier_for(&trusted);
        assert!(matches!(
            verifier.verify(&other.leaf.cert, &trusted.intermediate.cert),
            Err(SignedDataError::ChainValidationFailed(_))
        ));
    }

    #[test]
    fn reports_every_failing_chain_element() {
        let trusted = TestPki::new();
        let first = TestPki::new();
        let second = TestPki::new();
        let verifier = verifier_for(&trusted);
        let err = verifier
            .verify(&first.leaf.cert, &second.intermediate.cert)
            .unwrap_err();
        let SignedDataError::ChainValidationFailed(diagnostic) = &err else {
            panic!("unexpected error: {err:?}");
        };
        let leaf_name = common_name(&first.leaf.cert);
        let intermediate_name = common_name(&second.intermediate.cert);
        assert!(
            diagnostic.contains(&format!("{leaf_name} is not signed by {intermediate_name}")),
            "{diagnostic}"
        );
        assert!(
            diagnostic.contains(&format!("{intermediate_name} is not issued by a configured root")),
            "{diagnostic}"
        );
    }

    #[test]
    fn valid_chain_has_no_element_failures() {
        let pki = TestPki::new();
        let verifier = verifier_for(&pki);
        assert!(verifier
            .element_failures(&pki.leaf.cert, &pki.intermediate.cert)
            .is_empty());
    }

    #[test]
    fn online_revocation_requires_an_ocsp_responder() {
        let pki = TestPki::new();
        let trust = TrustConfiguration::new(&[pki.root_der()], true).unwrap();
        let verifier = CertificateChainVerifier::new(trust, Duration::from_secs(5)).unwrap();
        let err = verifier
            .verify(&pki.leaf.cert, &pki.intermediate.cert)
            .unwrap_err();
        let SignedDataError::ChainValidationFailed(diagnostic) = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(
            diagnostic,
            &format!("no OCSP responder for {}", common_name(&pki.leaf.cert))
        );
    }

    #[test]
    fn any_configured_root_can_anchor_the_chain() {
        let first = TestPki::new();
        let second = TestPki::new();
        let trust =
            TrustConfiguration::new(&[first.root_der(), second.root_der()], false).unwrap();
        let verifier = CertificateChainVerifier::new(trust, Duration::from_secs(5)).unwrap();
        verifier
            .verify(&second.leaf.cert, &second.intermediate.cert)
            .unwrap();
        verifier
            .verify(&first.leaf.cert, &first.intermediate.cert)
            .unwrap();
    }
}
