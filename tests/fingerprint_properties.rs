use proptest::prelude::*;

use forkrun::fingerprint::{Fingerprint, fingerprint};

proptest! {
    #[test]
    fn fingerprint_is_deterministic(
        source in proptest::collection::vec(any::<u8>(), 0..512),
        config in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        prop_assert_eq!(fingerprint(&source, &config), fingerprint(&source, &config));
    }

    #[test]
    fn fingerprint_parses_back(
        source in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let fp = fingerprint(&source, b"identity|fk");
        let parsed: Fingerprint = fp.as_str().parse().unwrap();
        prop_assert_eq!(parsed, fp);
    }

    #[test]
    fn moving_bytes_between_halves_changes_fingerprint(
        bytes in proptest::collection::vec(any::<u8>(), 1..128),
        split in any::<prop::sample::Index>(),
    ) {
        let at = split.index(bytes.len());
        let (config, source) = bytes.split_at(at);
        let shifted = fingerprint(&bytes, b"");
        prop_assume!(!config.is_empty());
        prop_assert_ne!(fingerprint(source, config), shifted);
    }
}
