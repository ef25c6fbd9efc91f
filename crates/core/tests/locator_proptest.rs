//! Property-based tests for locator parsing.
//!
//! - Round-trip: `raw` always equals the input
//! - Reconstruction: `scheme + "://" + payload` rebuilds lowercase input
//! - Rejection: strings without a separator never parse

use clirack_core::{Error, ResourceLocator};
use proptest::prelude::*;

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Valid schemes, mixed case.
fn scheme_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9+.-]{0,10}".prop_map(String::from)
}

/// Arbitrary payloads, including further separators and unicode.
fn payload_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9-]{1,12}/[a-z0-9._-]{1,12}(@[a-z0-9.]{1,8})?".prop_map(String::from),
        "/[a-z/]{0,20}".prop_map(String::from),
        ".{0,30}".prop_map(String::from),
    ]
}

proptest! {
    #[test]
    fn prop_raw_round_trips(scheme in scheme_strategy(), payload in payload_strategy()) {
        let input = format!("{scheme}://{payload}");
        let locator = ResourceLocator::parse(&input).unwrap();

        prop_assert_eq!(locator.raw(), input.as_str());
        prop_assert_eq!(locator.to_string(), input.clone());
        prop_assert_eq!(locator.scheme(), scheme.to_ascii_lowercase());
        prop_assert!(!locator.scheme().is_empty());
    }

    #[test]
    fn prop_lowercase_reconstructs(scheme in scheme_strategy(), payload in payload_strategy()) {
        let input = format!("{}://{payload}", scheme.to_ascii_lowercase());
        let locator = ResourceLocator::parse(&input).unwrap();

        prop_assert_eq!(format!("{}://{}", locator.scheme(), locator.payload()), input);
    }

    #[test]
    fn prop_missing_separator_is_malformed(input in "[^:]{0,30}") {
        let err = ResourceLocator::parse(&input).unwrap_err();
        let is_malformed = matches!(err, Error::MalformedLocator { .. });
        prop_assert!(is_malformed);
        prop_assert_eq!(err.locator(), Some(input.as_str()));
    }

    #[test]
    fn prop_parse_is_pure(scheme in scheme_strategy(), payload in payload_strategy()) {
        let input = format!("{scheme}://{payload}");
        prop_assert_eq!(
            ResourceLocator::parse(&input).unwrap(),
            ResourceLocator::parse(&input).unwrap()
        );
    }
}
