//! Envelope validation: structure, expiry, and authorization.
//!
//! [`validate`] runs the three checks strictly in this order and stops at
//! the first failure:
//!
//! 1. Structure - version, required fields, nonce length, tag length
//! 2. Expiry - `now > expiresAt` fails; the expiry instant is still valid
//! 3. Authorization - the caller must appear among the recipients
//!
//! Expiry comes before authorization so that an expired file reports as
//! expired to everyone. Wrapped keys are never decoded here; the only
//! recipient data touched before authorization is the email list.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use sealfile_core::{FileIv, Timestamp, TAG_LEN};

use crate::envelope::{Metadata, RecipientEntry, SealedFile, SEALED_FILE_VERSION};
use crate::error::OpenError;

/// An envelope that passed all checks for one caller.
#[derive(Debug, Clone)]
pub struct ValidatedEnvelope<'a> {
    envelope: &'a SealedFile,
    entry: &'a RecipientEntry,
    iv: FileIv,
    ciphertext: Vec<u8>,
}

impl<'a> ValidatedEnvelope<'a> {
    /// The envelope that was validated.
    pub fn envelope(&self) -> &'a SealedFile {
        self.envelope
    }

    /// The caller's recipient entry.
    pub fn entry(&self) -> &'a RecipientEntry {
        self.entry
    }

    /// The decoded nonce.
    pub fn iv(&self) -> &FileIv {
        &self.iv
    }

    /// The decoded ciphertext, tag included.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Outcome of [`validate`].
pub type ValidationResult<'a> = Result<ValidatedEnvelope<'a>, OpenError>;

/// Validate `envelope` for `caller_email` at time `now` (Unix ms).
pub fn validate<'a>(
    envelope: &'a SealedFile,
    caller_email: &str,
    now: Timestamp,
) -> ValidationResult<'a> {
    // 1. Structure
    let (iv, ciphertext) = check_structure(envelope)?;

    // 2. Expiry
    check_expiry(&envelope.metadata, now)?;

    // 3. Authorization
    let entry = authorize(envelope, caller_email)?;

    Ok(ValidatedEnvelope {
        envelope,
        entry,
        iv,
        ciphertext,
    })
}

/// Check that the envelope is well formed, returning the decoded nonce and
/// ciphertext.
pub fn check_structure(envelope: &SealedFile) -> Result<(FileIv, Vec<u8>), OpenError> {
    if envelope.version != SEALED_FILE_VERSION {
        return Err(OpenError::Malformed(format!(
            "unsupported envelope version: {}",
            envelope.version
        )));
    }

    if envelope.file_id.is_blank() {
        return Err(OpenError::Malformed("missing fileId".into()));
    }

    if envelope.file_name.trim().is_empty() {
        return Err(OpenError::Malformed("missing fileName".into()));
    }

    if envelope.recipients.is_empty() {
        return Err(OpenError::Malformed("no recipients".into()));
    }

    for (i, entry) in envelope.recipients.iter().enumerate() {
        if entry.email.trim().is_empty() {
            return Err(OpenError::Malformed(format!("recipient {} has no email", i)));
        }
        if entry.wrapped_key.is_empty() {
            return Err(OpenError::Malformed(format!(
                "recipient {} has no wrapped key",
                i
            )));
        }
    }

    let iv_bytes = STANDARD
        .decode(&envelope.iv)
        .map_err(|e| OpenError::Malformed(format!("iv is not base64: {}", e)))?;
    let iv = FileIv::from_slice(&iv_bytes).ok_or_else(|| {
        OpenError::Malformed(format!("iv must be 12 bytes, got {}", iv_bytes.len()))
    })?;

    let ciphertext = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|e| OpenError::Malformed(format!("ciphertext is not base64: {}", e)))?;
    if ciphertext.len() < TAG_LEN {
        return Err(OpenError::Malformed(
            "ciphertext is shorter than the authentication tag".into(),
        ));
    }

    Ok((iv, ciphertext))
}

/// Fail with [`OpenError::Expired`] if `now` is past the expiry.
pub fn check_expiry(metadata: &Metadata, now: Timestamp) -> Result<(), OpenError> {
    match metadata.expires_at {
        Some(expires_at) if metadata.is_expired_at(now) => Err(OpenError::Expired { expires_at }),
        _ => Ok(()),
    }
}

/// Find the caller's entry, or fail with [`OpenError::Unauthorized`].
pub fn authorize<'a>(
    envelope: &'a SealedFile,
    caller_email: &str,
) -> Result<&'a RecipientEntry, OpenError> {
    if caller_email.trim().is_empty() {
        return Err(OpenError::Unauthorized);
    }
    envelope
        .find_recipient(caller_email)
        .ok_or(OpenError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use sealfile_core::FileId;

    const NOW: Timestamp = 1_700_000_000_000;

    fn envelope() -> SealedFile {
        SealedFile {
            version: SEALED_FILE_VERSION,
            file_id: FileId::new("file-1"),
            file_name: "a.txt".into(),
            file_type: "text/plain".into(),
            file_size: 4,
            ciphertext: STANDARD.encode([0u8; 20]),
            iv: STANDARD.encode([1u8; 12]),
            recipients: vec![
                RecipientEntry {
                    email: "a@x.com".into(),
                    wrapped_key: "AAAA".into(),
                },
                RecipientEntry {
                    email: "b@x.com".into(),
                    wrapped_key: "BBBB".into(),
                },
            ],
            metadata: Metadata::new(NOW - 1000),
        }
    }

    #[test]
    fn test_valid_envelope_passes() {
        let env = envelope();
        let validated = validate(&env, "b@x.com", NOW).unwrap();
        assert_eq!(validated.entry().email, "b@x.com");
        assert_eq!(validated.ciphertext().len(), 20);
        assert_eq!(validated.iv().as_bytes(), &[1u8; 12]);
    }

    #[test]
    fn test_caller_match_is_case_insensitive() {
        let env = envelope();
        assert!(validate(&env, "A@X.com", NOW).is_ok());
    }

    #[test]
    fn test_non_recipient_unauthorized() {
        let env = envelope();
        let result = validate(&env, "c@x.com", NOW);
        assert!(matches!(result, Err(OpenError::Unauthorized)));
    }

    #[test]
    fn test_blank_caller_unauthorized() {
        let env = envelope();
        assert!(matches!(validate(&env, "  ", NOW), Err(OpenError::Unauthorized)));
    }

    #[test]
    fn test_unknown_version_malformed() {
        let mut env = envelope();
        env.version = 7;
        let err = validate(&env, "a@x.com", NOW).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEnvelope);
    }

    #[test]
    fn test_empty_recipients_malformed() {
        let mut env = envelope();
        env.recipients.clear();
        assert!(matches!(
            validate(&env, "a@x.com", NOW),
            Err(OpenError::Malformed(_))
        ));
    }

    #[test]
    fn test_short_iv_malformed() {
        let mut env = envelope();
        env.iv = STANDARD.encode([1u8; 8]);
        assert!(matches!(
            validate(&env, "a@x.com", NOW),
            Err(OpenError::Malformed(_))
        ));
    }

    #[test]
    fn test_ciphertext_shorter_than_tag_malformed() {
        let mut env = envelope();
        env.ciphertext = STANDARD.encode([0u8; 15]);
        assert!(matches!(
            validate(&env, "a@x.com", NOW),
            Err(OpenError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_base64_malformed() {
        let mut env = envelope();
        env.ciphertext = "***".into();
        assert!(matches!(
            validate(&env, "a@x.com", NOW),
            Err(OpenError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrapped_keys_not_decoded_during_validation() {
        // "AAAA" and "BBBB" are not valid wrapped keys, yet validation passes.
        let mut env = envelope();
        env.recipients[1].wrapped_key = "%%%not-base64%%%".into();
        assert!(validate(&env, "a@x.com", NOW).is_ok());
    }

    #[test]
    fn test_expiry_boundary() {
        let mut env = envelope();
        env.metadata.expires_at = Some(NOW);

        assert!(validate(&env, "a@x.com", NOW - 1).is_ok());
        assert!(validate(&env, "a@x.com", NOW).is_ok());
        assert_eq!(
            validate(&env, "a@x.com", NOW + 1).unwrap_err(),
            OpenError::Expired { expires_at: NOW }
        );
    }

    #[test]
    fn test_expired_reported_before_unauthorized() {
        let mut env = envelope();
        env.metadata.expires_at = Some(NOW - 1);

        let err = validate(&env, "c@x.com", NOW).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expired);
    }

    #[test]
    fn test_malformed_reported_before_expired() {
        let mut env = envelope();
        env.metadata.expires_at = Some(NOW - 1);
        env.version = 0;

        let err = validate(&env, "a@x.com", NOW).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEnvelope);
    }
}
