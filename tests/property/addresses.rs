// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Address Generation and Parsing
//!
//! These properties must hold for every generated candidate address and for
//! every valid textual address form.

use proptest::prelude::*;
use std::collections::HashSet;

use macfix::generator::{self, LOCAL_PREFIX};
use macfix::MacAddress;

proptest! {
    /// Every candidate stays in the reserved locally-administered range:
    /// fixed vendor prefix, fourth octet in [0x00, 0x7f].
    #[test]
    fn prop_generated_addresses_stay_in_reserved_range(_seed in 0u32..256) {
        let mac = generator::generate();
        let octets = mac.octets();
        prop_assert_eq!(&octets[..3], &LOCAL_PREFIX[..]);
        prop_assert!(octets[3] <= 0x7f);
        prop_assert!(mac.is_locally_administered());
        prop_assert!(!mac.is_multicast());
    }

    /// generate_unique never returns a member of the exclusion set, for any
    /// finite exclusion set not covering the reachable space.
    #[test]
    fn prop_generate_unique_avoids_exclusions(seeds in proptest::collection::vec(any::<[u8; 3]>(), 0..128)) {
        let excluded: HashSet<MacAddress> = seeds
            .into_iter()
            .map(|[a, b, c]| {
                MacAddress::from_octets([
                    LOCAL_PREFIX[0], LOCAL_PREFIX[1], LOCAL_PREFIX[2],
                    a & 0x7f, b, c,
                ])
            })
            .collect();
        let mac = generator::generate_unique(|m| excluded.contains(m)).unwrap();
        prop_assert!(!excluded.contains(&mac));
    }

    /// Parsing the canonical form gives back the same octets, for all
    /// 48-bit values.
    #[test]
    fn prop_canonical_form_round_trips(octets in any::<[u8; 6]>()) {
        let mac = MacAddress::from_octets(octets);
        let parsed = MacAddress::new(mac.to_string()).unwrap();
        prop_assert_eq!(parsed.octets(), octets);
    }

    /// All accepted textual forms of the same value parse to the same
    /// address.
    #[test]
    fn prop_textual_forms_agree(octets in any::<[u8; 6]>()) {
        let colon = octets
            .iter()
            .map(|o| format!("{o:02x}"))
            .collect::<Vec<_>>()
            .join(":");
        let hyphen = colon.replace(':', "-");
        let bare = colon.replace(':', "");
        let upper = colon.to_uppercase();

        let reference = MacAddress::new(&colon).unwrap();
        prop_assert_eq!(&MacAddress::new(&hyphen).unwrap(), &reference);
        prop_assert_eq!(&MacAddress::new(&bare).unwrap(), &reference);
        prop_assert_eq!(&MacAddress::new(&upper).unwrap(), &reference);
    }
}
