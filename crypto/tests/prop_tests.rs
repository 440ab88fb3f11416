use proptest::prelude::*;

use drift_crypto::{combine_secret, decrypt_share, encrypt_share, split_secret};
use drift_types::ContactId;
use rand::rngs::OsRng;

proptest! {
    /// Splitting then combining all shares reproduces the secret exactly.
    #[test]
    fn shamir_roundtrip_all_shares(
        secret in prop::collection::vec(any::<u8>(), 1..128),
        shares in 2usize..10,
    ) {
        let threshold = 2 + shares % 2;
        prop_assume!(threshold <= shares);

        let split = split_secret(&secret, shares, threshold, &mut OsRng).unwrap();
        prop_assert_eq!(combine_secret(&split).unwrap(), secret);
    }

    /// The first `threshold` shares alone are sufficient.
    #[test]
    fn shamir_threshold_subset_sufficient(
        secret in prop::collection::vec(any::<u8>(), 1..64),
        extra in 0usize..5,
    ) {
        let threshold = 3;
        let shares = threshold + extra;

        let split = split_secret(&secret, shares, threshold, &mut OsRng).unwrap();
        let subset: Vec<_> = split[..threshold].to_vec();
        prop_assert_eq!(combine_secret(&subset).unwrap(), secret);
    }

    /// Every share is exactly one byte longer than the secret.
    #[test]
    fn shamir_share_length(secret in prop::collection::vec(any::<u8>(), 1..64)) {
        let split = split_secret(&secret, 4, 2, &mut OsRng).unwrap();
        for share in &split {
            prop_assert_eq!(share.len(), secret.len() + 1);
        }
    }

    /// AEAD share encryption roundtrips for arbitrary shares and contacts.
    #[test]
    fn share_encryption_roundtrip(
        share in prop::collection::vec(any::<u8>(), 1..256),
        contact in "[a-z0-9]{1,16}",
    ) {
        let contact = ContactId::new(contact);
        let sealed = encrypt_share(&share, &contact);
        prop_assert_eq!(decrypt_share(&sealed, &contact).unwrap(), share);
    }
}
