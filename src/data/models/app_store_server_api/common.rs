use std::fmt;

use serde::Deserialize;
use serde_repr::Deserialize_repr;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum Environment {
    /// Indicates that the data applies to testing in the sandbox environment.
    Sandbox,
    /// Indicates that the data applies to the production environment.
    Production,
    /// Indicates that the data applies to StoreKit testing in Xcode.
    Xcode,
    /// Indicates that the data was produced for local unit testing.
    LocalTesting,

    #[serde(untagged)]
    Unknown(String),
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => f.write_str("Sandbox"),
            Environment::Production => f.write_str("Production"),
            Environment::Xcode => f.write_str("Xcode"),
            Environment::LocalTesting => f.write_str("LocalTesting"),
            Environment::Unknown(other) => f.write_str(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferDiscountType {
    /// A payment mode of a product discount that indicates a free trial.
    FreeTrial,
    /// A payment mode of a product discount that customers pay over a single or
    /// multiple billing periods.
    PayAsYouGo,
    /// A payment mode of a product discount that customers pay up front.
    PayUpFront,

    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr)]
#[repr(u8)]
pub enum OfferType {
    /// An introductory offer.
    Introductory = 1,
    /// A promotional offer.
    Promotional = 2,
    /// An offer with a subscription offer code.
    OfferCode = 3,
    /// A win-back offer.
    WinBack = 4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_environments_are_preserved() {
        let env: Environment = serde_json::from_str(r#""Staging""#).unwrap();
        assert_eq!(env, Environment::Unknown("Staging".to_string()));
        assert_eq!(env.to_string(), "Staging");
        let env: Environment = serde_json::from_str(r#""LocalTesting""#).unwrap();
        assert_eq!(env, Environment::LocalTesting);
    }
}
