use openssl::x509::X509;

use crate::errors::SignedDataError;

/// Roots trusted for chain validation, plus the revocation policy. Built once
/// per verifier and only read afterwards.
#[derive(Debug, Clone)]
pub struct TrustConfiguration {
    trusted_roots: Vec<X509>,
    allow_online_revocation_check: bool,
}

impl TrustConfiguration {
    pub fn new(
        trusted_roots_der: &[Vec<u8>],
        allow_online_revocation_check: bool,
    ) -> Result<Self, SignedDataError> {
        if trusted_roots_der.is_empty() {
            return Err(SignedDataError::Configuration(
                "at least one trusted root certificate is required".to_string(),
            ));
        }
        let trusted_roots = trusted_roots_der
            .iter()
            .enumerate()
            .map(|(i, der)| {
                X509::from_der(der).map_err(|e| {
                    SignedDataError::Configuration(format!(
                        "root certificate #{i} is not valid DER ({e})"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            trusted_roots,
            allow_online_revocation_check,
        })
    }

    pub fn trusted_roots(&self) -> &[X509] {
        &self.trusted_roots
    }

    pub fn allow_online_revocation_check(&self) -> bool {
        self.allow_online_revocation_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pki::TestPki;

    #[test]
    fn parses_der_roots() {
        let pki = TestPki::new();
        let trust = TrustConfiguration::new(&[pki.root_der()], false).unwrap();
        assert_eq!(trust.trusted_roots().len(), 1);
        assert!(!trust.allow_online_revocation_check());
    }

    #[test]
    fn rejects_empty_and_invalid_roots() {
        assert!(matches!(
            TrustConfiguration::new(&[], false),
            Err(SignedDataError::Configuration(_))
        ));
        assert!(matches!(
            TrustConfiguration::new(&[vec![0x30, 0x03, 0x02, 0x01, 0x01]], true),
            Err(SignedDataError::Configuration(_))
        ));
    }
}
