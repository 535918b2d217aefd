pub mod asn1 {
    mod error;
    pub mod node;
    pub mod reader;
    pub mod tag;

    pub use error::MalformedEncoding;
}

pub(crate) mod data {
    pub(crate) mod datasources {
        pub(crate) mod app_receipt_datasource;
        pub(crate) mod app_store_server_notification_datasource;
        pub(crate) mod certificate_chain_verifier;
        pub(crate) mod compact_jws_parser;
        pub(crate) mod signature_verifier;
        pub(crate) mod utils;
    }
    pub mod models {
        pub mod app_receipt {
            pub mod receipt_field_model;
        }
        pub mod app_store_server_api {
            pub mod common;
            pub mod jws_renewal_info_decoded_payload_model;
            pub mod jws_transaction_decoded_payload_model;
        }
        pub mod app_store_server_notifications {
            pub mod response_body_v2_decoded_payload_model;
            pub mod response_body_v2_model;
        }
        pub mod jws {
            pub mod jws_decoded_header_model;
        }
    }
    pub(crate) mod repositories {
        pub(crate) mod signed_data_repository_impl;
    }
}

pub use data::models;

pub mod domain {
    pub mod entities {
        pub mod decoded_notification;
        pub mod trust_configuration;
        pub mod verified_payload;
    }
    pub mod repositories {
        pub mod signed_data_repository;
    }
}

pub mod config;
pub mod errors;
pub mod util;
