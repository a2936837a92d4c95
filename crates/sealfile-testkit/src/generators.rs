//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use sealfile_core::{FileId, Timestamp};
use sealfile_envelope::{
    create_seal_file, FileMeta, MetadataValue, RecipientKey, SealError, SealOptions, SealedFile,
};

use crate::fixtures::Party;

/// Generate file bytes of at most `max_len`.
pub fn file_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a lowercase email address.
pub fn email() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}@[a-z]{1,8}\\.(com|org|net)".prop_map(String::from)
}

/// Generate between 1 and `max` distinct emails.
pub fn recipient_emails(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(email(), 1..=max.max(1)).prop_map(|set| set.into_iter().collect())
}

/// Rewrite `email` with random letter case.
pub fn case_variant(email: String) -> impl Strategy<Value = String> {
    let len = email.chars().count();
    prop::collection::vec(any::<bool>(), len).prop_map(move |flips| {
        email
            .chars()
            .zip(flips)
            .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}

/// Generate a file name.
pub fn file_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,16}\\.(txt|pdf|png|bin)".prop_map(String::from)
}

/// Generate a MIME type.
pub fn file_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("text/plain".to_string()),
        Just("application/pdf".to_string()),
        Just("image/png".to_string()),
        Just("application/octet-stream".to_string()),
    ]
}

/// Generate an extension metadata value.
///
/// Floats are finite dyadic fractions, which print and parse back exactly.
pub fn metadata_value() -> impl Strategy<Value = MetadataValue> {
    prop_oneof![
        any::<bool>().prop_map(MetadataValue::from),
        any::<i64>().prop_map(MetadataValue::from),
        (any::<i32>(), 0i32..4).prop_map(|(n, shift)| MetadataValue::from(
            f64::from(n) / f64::from(1i32 << shift)
        )),
        "[ -~]{0,16}".prop_map(MetadataValue::from),
    ]
}

/// Generate up to three extension metadata fields.
pub fn extensions() -> impl Strategy<Value = BTreeMap<String, MetadataValue>> {
    prop::collection::btree_map("[a-z][a-z_]{0,7}", metadata_value(), 0..4)
}

/// Generate a creation timestamp.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    0i64..=4_000_000_000_000i64
}

/// Parameters for sealing a file.
#[derive(Debug, Clone)]
pub struct SealParams {
    pub data: Vec<u8>,
    pub file_name: String,
    pub file_type: String,
    /// Recipient emails with their key seeds.
    pub recipients: Vec<(String, [u8; 32])>,
    pub created_at: Timestamp,
    pub ttl_ms: Option<i64>,
    pub extensions: BTreeMap<String, MetadataValue>,
}

impl SealParams {
    /// The recipients as parties with their key pairs.
    pub fn parties(&self) -> Vec<Party> {
        self.recipients
            .iter()
            .map(|(email, seed)| Party::with_seed(email.clone(), *seed))
            .collect()
    }

    /// The expiry these parameters seal with.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.ttl_ms.map(|ttl| self.created_at + ttl)
    }
}

impl Arbitrary for SealParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            file_bytes(2048),
            file_name(),
            file_type(),
            recipient_emails(4),
            any::<[u8; 32]>(),
            timestamp(),
            prop::option::of(1i64..=86_400_000i64),
            extensions(),
        )
            .prop_map(|(data, name, mime, emails, base_seed, created_at, ttl_ms, extensions)| {
                let recipients = emails
                    .into_iter()
                    .enumerate()
                    .map(|(i, email)| {
                        let mut seed = base_seed;
                        seed[0] ^= i as u8;
                        (email, seed)
                    })
                    .collect();
                SealParams {
                    data,
                    file_name: name,
                    file_type: mime,
                    recipients,
                    created_at,
                    ttl_ms,
                    extensions,
                }
            })
            .boxed()
    }
}

/// Seal a file from parameters, returning it with the recipients' parties.
pub fn sealed_from_params(params: &SealParams) -> Result<(SealedFile, Vec<Party>), SealError> {
    let parties = params.parties();
    let keys: Vec<RecipientKey> = parties.iter().map(Party::recipient_key).collect();
    let options = SealOptions {
        created_at: Some(params.created_at),
        expires_at: params.expires_at(),
        extensions: params.extensions.clone(),
    };

    let sealed = create_seal_file(
        &params.data,
        FileMeta::for_bytes(params.file_name.clone(), params.file_type.clone(), &params.data),
        &keys,
        FileId::random(),
        options,
    )?;

    Ok((sealed, parties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealfile_core::{normalize_email, WRAPPED_KEY_LEN};
    use sealfile_envelope::validate;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    proptest! {
        #[test]
        fn test_one_entry_per_recipient(params: SealParams) {
            let (sealed, parties) = sealed_from_params(&params).unwrap();

            prop_assert_eq!(sealed.recipients.len(), parties.len());
            for (entry, party) in sealed.recipients.iter().zip(&parties) {
                prop_assert_eq!(&entry.email, &party.email);
            }
        }

        #[test]
        fn test_wrapped_keys_are_independent(params: SealParams) {
            let (sealed, _) = sealed_from_params(&params).unwrap();

            let wrapped: std::collections::BTreeSet<_> =
                sealed.recipients.iter().map(|r| r.wrapped_key.clone()).collect();
            prop_assert_eq!(wrapped.len(), sealed.recipients.len());

            for entry in &sealed.recipients {
                prop_assert_eq!(STANDARD.decode(&entry.wrapped_key).unwrap().len(), WRAPPED_KEY_LEN);
            }
        }

        #[test]
        fn test_extensions_are_carried(params: SealParams) {
            let (sealed, _) = sealed_from_params(&params).unwrap();
            prop_assert_eq!(&sealed.metadata.extensions, &params.extensions);
        }

        #[test]
        fn test_sealed_files_validate_for_case_variants(
            (params, caller) in any::<SealParams>().prop_flat_map(|params| {
                let email = params.recipients[0].0.clone();
                (Just(params), case_variant(email))
            })
        ) {
            let (sealed, _) = sealed_from_params(&params).unwrap();

            prop_assert_eq!(normalize_email(&caller), params.recipients[0].0.clone());
            prop_assert!(validate(&sealed, &caller, params.created_at).is_ok());
        }
    }
}
