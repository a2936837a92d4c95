//! The decryption pipeline.
//!
//! Opening a sealed file is a four-state machine:
//!
//! ```text
//! Validating ──► Decrypting ──► Done
//!      │              │
//!      └──────────────┴──► Failed
//! ```
//!
//! Each non-terminal state is its own type and each transition consumes it,
//! so a finished or failed open cannot be resumed; a retry starts again
//! from [`OpenState::start`]. The caller's private key is an explicit input
//! to [`Decrypting::decrypt`] and is never looked up or cached here. The
//! unwrapped file key is dropped (and zeroized) as soon as the payload is
//! decrypted.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use tracing::{debug, warn};

use sealfile_core::{FileId, PrivateKey, Timestamp};

use crate::envelope::SealedFile;
use crate::error::OpenError;
use crate::validation::{validate, ValidatedEnvelope};

/// A decrypted file, held in memory for the viewing session.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedFile {
    /// The plaintext.
    pub data: Bytes,
    /// Original file name.
    pub file_name: String,
    /// Original MIME type.
    pub file_type: String,
}

impl std::fmt::Debug for DecryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedFile")
            .field("len", &self.data.len())
            .field("file_name", &self.file_name)
            .field("file_type", &self.file_type)
            .finish()
    }
}

/// The phase an open is in, for rendering progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenPhase {
    /// Checking structure, expiry, and authorization.
    Validating,
    /// Unwrapping the file key and decrypting.
    Decrypting,
    /// Finished with a decrypted file.
    Done,
    /// Finished with an error.
    Failed,
}

impl OpenPhase {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, OpenPhase::Done | OpenPhase::Failed)
    }
}

/// An open in progress or finished.
#[derive(Debug)]
pub enum OpenState<'a> {
    /// Waiting to validate.
    Validating(Validating<'a>),
    /// Validated; waiting for the caller's private key.
    Decrypting(Decrypting<'a>),
    /// Decrypted.
    Done(DecryptedFile),
    /// Failed. Terminal.
    Failed(OpenError),
}

impl<'a> OpenState<'a> {
    /// Begin opening `envelope` as `caller_email` at time `now` (Unix ms).
    pub fn start(envelope: &'a SealedFile, caller_email: impl Into<String>, now: Timestamp) -> Self {
        OpenState::Validating(Validating {
            envelope,
            caller_email: caller_email.into(),
            now,
        })
    }

    /// The current phase.
    pub fn phase(&self) -> OpenPhase {
        match self {
            OpenState::Validating(_) => OpenPhase::Validating,
            OpenState::Decrypting(_) => OpenPhase::Decrypting,
            OpenState::Done(_) => OpenPhase::Done,
            OpenState::Failed(_) => OpenPhase::Failed,
        }
    }

    /// The outcome, if the open has finished.
    pub fn into_outcome(self) -> Option<Result<DecryptedFile, OpenError>> {
        match self {
            OpenState::Done(file) => Some(Ok(file)),
            OpenState::Failed(err) => Some(Err(err)),
            OpenState::Validating(_) | OpenState::Decrypting(_) => None,
        }
    }

    /// The error, if the open failed.
    pub fn error(&self) -> Option<&OpenError> {
        match self {
            OpenState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// First state: nothing has been checked yet.
#[derive(Debug)]
pub struct Validating<'a> {
    envelope: &'a SealedFile,
    caller_email: String,
    now: Timestamp,
}

impl<'a> Validating<'a> {
    /// Run structure, expiry, and authorization checks.
    ///
    /// Moves to [`OpenState::Decrypting`] on success, otherwise to
    /// [`OpenState::Failed`] with the matching error.
    pub fn validate(self) -> OpenState<'a> {
        let file_id = &self.envelope.file_id;
        match validate(self.envelope, &self.caller_email, self.now) {
            Ok(validated) => {
                debug!(file_id = %file_id, "envelope validated");
                OpenState::Decrypting(Decrypting { validated })
            }
            Err(err) => {
                warn!(file_id = %file_id, kind = ?err.kind(), "envelope rejected");
                OpenState::Failed(err)
            }
        }
    }
}

/// Second state: validated, the caller is a recipient.
#[derive(Debug)]
pub struct Decrypting<'a> {
    validated: ValidatedEnvelope<'a>,
}

impl<'a> Decrypting<'a> {
    /// The file being opened.
    pub fn file_id(&self) -> &FileId {
        &self.validated.envelope().file_id
    }

    /// Unwrap the file key with `private_key` and decrypt the payload.
    ///
    /// Every failure is reported as the same [`OpenError::Decryption`],
    /// whether the key was wrong or the envelope was tampered with.
    pub fn decrypt(self, private_key: &PrivateKey) -> OpenState<'a> {
        match self.try_decrypt(private_key) {
            Some(file) => {
                debug!(file_id = %self.file_id(), "envelope decrypted");
                OpenState::Done(file)
            }
            None => {
                warn!(file_id = %self.file_id(), "envelope decryption failed");
                OpenState::Failed(OpenError::Decryption)
            }
        }
    }

    /// Fail because no private key is available for the caller.
    pub fn missing_key(self) -> OpenState<'a> {
        warn!(file_id = %self.file_id(), "no private key available");
        OpenState::Failed(OpenError::Decryption)
    }

    fn try_decrypt(&self, private_key: &PrivateKey) -> Option<DecryptedFile> {
        let envelope = self.validated.envelope();
        let wrapped = STANDARD.decode(&self.validated.entry().wrapped_key).ok()?;

        let file_key = private_key
            .unwrap(&wrapped, envelope.file_id.as_str().as_bytes())
            .ok()?;
        let data = file_key
            .decrypt(self.validated.ciphertext(), self.validated.iv())
            .ok()?;
        drop(file_key);

        if data.len() as u64 != envelope.file_size {
            warn!(
                file_id = %envelope.file_id,
                declared = envelope.file_size,
                actual = data.len(),
                "decrypted size differs from declared fileSize"
            );
        }

        Some(DecryptedFile {
            data: Bytes::from(data),
            file_name: envelope.file_name.clone(),
            file_type: envelope.file_type.clone(),
        })
    }
}

/// Run the whole pipeline: validate, then decrypt with `private_key`.
pub fn open_sealed_file(
    envelope: &SealedFile,
    caller_email: &str,
    private_key: &PrivateKey,
    now: Timestamp,
) -> Result<DecryptedFile, OpenError> {
    let state = match OpenState::start(envelope, caller_email, now) {
        OpenState::Validating(validating) => validating.validate(),
        other => other,
    };
    let state = match state {
        OpenState::Decrypting(decrypting) => decrypting.decrypt(private_key),
        other => other,
    };

    match state.into_outcome() {
        Some(outcome) => outcome,
        None => Err(OpenError::Decryption),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{create_seal_file, FileMeta, RecipientKey, SealOptions};
    use crate::error::ErrorKind;
    use sealfile_core::{export_public_key, KeyPair};

    const NOW: Timestamp = 1_700_000_000_000;

    fn seal_for(pairs: &[(&str, &KeyPair)], data: &[u8]) -> SealedFile {
        let recipients: Vec<_> = pairs
            .iter()
            .map(|(email, pair)| RecipientKey::new(*email, export_public_key(pair.public_key())))
            .collect();
        create_seal_file(
            data,
            FileMeta::for_bytes("f.bin", "application/octet-stream", data),
            &recipients,
            FileId::new("file-1"),
            SealOptions {
                created_at: Some(NOW - 10),
                ..SealOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let alice = KeyPair::generate();
        let envelope = seal_for(&[("a@x.com", &alice)], b"payload");

        let state = OpenState::start(&envelope, "a@x.com", NOW);
        assert_eq!(state.phase(), OpenPhase::Validating);

        let OpenState::Validating(validating) = state else {
            panic!("expected validating");
        };
        let state = validating.validate();
        assert_eq!(state.phase(), OpenPhase::Decrypting);

        let OpenState::Decrypting(decrypting) = state else {
            panic!("expected decrypting");
        };
        assert_eq!(decrypting.file_id(), &FileId::new("file-1"));
        let state = decrypting.decrypt(alice.private_key());
        assert_eq!(state.phase(), OpenPhase::Done);
        assert!(state.phase().is_terminal());

        let file = state.into_outcome().unwrap().unwrap();
        assert_eq!(&file.data[..], b"payload");
        assert_eq!(file.file_name, "f.bin");
    }

    #[test]
    fn test_validation_failure_is_terminal() {
        let alice = KeyPair::generate();
        let envelope = seal_for(&[("a@x.com", &alice)], b"payload");

        let OpenState::Validating(validating) = OpenState::start(&envelope, "c@x.com", NOW) else {
            panic!("expected validating");
        };
        let state = validating.validate();

        assert_eq!(state.phase(), OpenPhase::Failed);
        assert_eq!(state.error(), Some(&OpenError::Unauthorized));
    }

    #[test]
    fn test_wrong_private_key_fails_generically() {
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        let envelope = seal_for(&[("a@x.com", &alice)], b"payload");

        let result = open_sealed_file(&envelope, "a@x.com", mallory.private_key(), NOW);
        assert_eq!(result.unwrap_err(), OpenError::Decryption);
    }

    #[test]
    fn test_missing_key_fails_with_decryption_error() {
        let alice = KeyPair::generate();
        let envelope = seal_for(&[("a@x.com", &alice)], b"payload");

        let OpenState::Validating(validating) = OpenState::start(&envelope, "a@x.com", NOW) else {
            panic!("expected validating");
        };
        let OpenState::Decrypting(decrypting) = validating.validate() else {
            panic!("expected decrypting");
        };
        let state = decrypting.missing_key();
        assert_eq!(state.error().map(OpenError::kind), Some(ErrorKind::Decryption));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let alice = KeyPair::generate();
        let mut envelope = seal_for(&[("a@x.com", &alice)], b"payload");

        let mut ciphertext = STANDARD.decode(&envelope.ciphertext).unwrap();
        ciphertext[0] ^= 0x01;
        envelope.ciphertext = STANDARD.encode(ciphertext);

        let result = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW);
        assert_eq!(result.unwrap_err(), OpenError::Decryption);
    }

    #[test]
    fn test_tampered_iv_fails() {
        let alice = KeyPair::generate();
        let mut envelope = seal_for(&[("a@x.com", &alice)], b"payload");

        let mut iv = STANDARD.decode(&envelope.iv).unwrap();
        iv[11] ^= 0x80;
        envelope.iv = STANDARD.encode(iv);

        let result = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW);
        assert_eq!(result.unwrap_err(), OpenError::Decryption);
    }

    #[test]
    fn test_tampered_file_id_fails() {
        let alice = KeyPair::generate();
        let mut envelope = seal_for(&[("a@x.com", &alice)], b"payload");
        envelope.file_id = FileId::new("file-2");

        let result = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW);
        assert_eq!(result.unwrap_err(), OpenError::Decryption);
    }

    #[test]
    fn test_cross_recipient_unwrap_fails() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let mut envelope = seal_for(&[("a@x.com", &alice), ("b@x.com", &bob)], b"payload");

        // Give alice's entry bob's wrapped key: alice's private key cannot open it.
        envelope.recipients[0].wrapped_key = envelope.recipients[1].wrapped_key.clone();
        let result = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW);
        assert_eq!(result.unwrap_err(), OpenError::Decryption);
    }

    #[test]
    fn test_corrupt_wrapped_key_fails() {
        let alice = KeyPair::generate();
        let mut envelope = seal_for(&[("a@x.com", &alice)], b"payload");
        envelope.recipients[0].wrapped_key = "!!!".into();

        let result = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW);
        assert_eq!(result.unwrap_err(), OpenError::Decryption);
    }

    #[test]
    fn test_open_does_not_mutate_envelope() {
        let alice = KeyPair::generate();
        let envelope = seal_for(&[("a@x.com", &alice)], b"payload");
        let before = envelope.clone();

        let _ = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW);
        let _ = open_sealed_file(&envelope, "c@x.com", alice.private_key(), NOW);
        assert_eq!(envelope, before);
    }

    #[test]
    fn test_file_size_mismatch_still_opens() {
        let alice = KeyPair::generate();
        let mut envelope = seal_for(&[("a@x.com", &alice)], b"payload");
        envelope.file_size = 999;

        let file = open_sealed_file(&envelope, "a@x.com", alice.private_key(), NOW).unwrap();
        assert_eq!(&file.data[..], b"payload");
    }

    #[test]
    fn test_debug_hides_plaintext() {
        let file = DecryptedFile {
            data: Bytes::from_static(b"secret"),
            file_name: "s.txt".into(),
            file_type: "text/plain".into(),
        };
        assert!(!format!("{:?}", file).contains("secret"));
    }
}
