// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Brieftrack.
//!
//! Holds the error taxonomy, the order lifecycle rules, the event types that
//! cross the transport and classifier boundaries, and the adapter traits
//! those collaborators implement.

pub mod error;
pub mod lifecycle;
pub mod traits;
pub mod types;

pub use error::{BriefError, ClassifyError};
pub use lifecycle::{LifecycleStamps, LogKind, OrderStatus, Platform, Priority};
pub use types::{
    ActionButton, AdapterType, BriefFields, CallbackEvent, Classification, HealthStatus,
    InboundEvent, InboundMessage, OrderAction, OutboundNotification, parse_callback_data,
};

pub use traits::{Classifier, Notifier, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brief_error_variants_construct() {
        let _config = BriefError::Config("test".into());
        let _storage = BriefError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = BriefError::Channel {
            message: "test".into(),
            source: None,
        };
        let _not_found = BriefError::OrderNotFound(1);
        let _not_ready = BriefError::NotReady {
            blockers: vec!["bot_token_missing".into()],
        };
        let _timeout = BriefError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = BriefError::Internal("test".into());
    }

    #[test]
    fn classify_error_kinds() {
        assert!(ClassifyError::transient("429").is_transient());
        assert!(!ClassifyError::permanent("bad json").is_transient());
    }

    #[test]
    fn adapter_type_round_trip() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Channel,
            AdapterType::Classifier,
            AdapterType::Storage,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn trait_objects_are_usable() {
        fn _assert_classifier(_: &dyn Classifier) {}
        fn _assert_notifier(_: &dyn Notifier) {}
        fn _assert_storage(_: &dyn StorageAdapter) {}
    }
}
