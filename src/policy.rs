//! Commit policy: decides whether an accumulated entry may be written
//!
//! The decision depends on four facts:
//!
//! | hasher | checksum | matches | verify | commit? |
//! |--------|----------|---------|--------|---------|
//! | no     | -        | -       | no     | yes |
//! | no     | -        | -       | yes    | no, configuration error |
//! | yes    | no       | -       | no     | yes |
//! | yes    | no       | -       | yes    | no, missing checksum |
//! | yes    | yes      | no      | no     | yes, mismatch logged |
//! | yes    | yes      | no      | yes    | no, checksum mismatch |
//! | yes    | yes      | yes     | any    | yes |

use crate::checksum::ContentHasher;
use crate::error::{ChecksumError, Error, Result};
use tracing::warn;

/// How an accepted entry was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Digest computed and equal to the stored checksum
    Verified,
    /// Nothing to compare: no hasher or no checksum
    Unchecked,
    /// Digest differed, but verification was not required
    MismatchIgnored,
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::Verified => f.write_str("verified"),
            Verification::Unchecked => f.write_str("unchecked"),
            Verification::MismatchIgnored => f.write_str("mismatch-ignored"),
        }
    }
}

/// Why an entry was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Verification requested without any hasher
    NoHasher,
    /// Verification requested but the entry has no checksum
    MissingChecksum,
    /// Digest differs and verification is required
    Mismatch,
}

/// The four policy inputs. `checksum_matches` is only meaningful when a
/// hasher and a checksum are both present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyInputs {
    pub hasher_available: bool,
    pub checksum_present: bool,
    pub checksum_matches: bool,
    pub verify: bool,
}

/// Pure decision table
pub fn decide(inputs: PolicyInputs) -> Result<Verification, Rejection> {
    let PolicyInputs {
        hasher_available,
        checksum_present,
        checksum_matches,
        verify,
    } = inputs;

    match (hasher_available, checksum_present, checksum_matches, verify) {
        (false, _, _, false) => Ok(Verification::Unchecked),
        (false, _, _, true) => Err(Rejection::NoHasher),
        (true, false, _, false) => Ok(Verification::Unchecked),
        (true, false, _, true) => Err(Rejection::MissingChecksum),
        (true, true, false, false) => Ok(Verification::MismatchIgnored),
        (true, true, false, true) => Err(Rejection::Mismatch),
        (true, true, true, _) => Ok(Verification::Verified),
    }
}

/// Applies the decision table to a concrete entry.
pub struct CommitPolicy<'a> {
    hasher: Option<&'a dyn ContentHasher>,
    verify: bool,
}

impl<'a> CommitPolicy<'a> {
    pub fn new(hasher: Option<&'a dyn ContentHasher>, verify: bool) -> Self {
        Self { hasher, verify }
    }

    /// Evaluate one entry. The digest is only computed when there is both a
    /// hasher and a stored checksum to compare it to.
    pub fn evaluate(&self, filename: &str, checksum: Option<&str>, content: &[u8]) -> Result<Verification> {
        let computed = match (self.hasher, checksum) {
            (Some(hasher), Some(_)) => Some(hasher.hex_digest(content)),
            _ => None,
        };

        let inputs = PolicyInputs {
            hasher_available: self.hasher.is_some(),
            checksum_present: checksum.is_some(),
            checksum_matches: match (&computed, checksum) {
                (Some(actual), Some(expected)) => actual.eq_ignore_ascii_case(expected),
                _ => false,
            },
            verify: self.verify,
        };

        match decide(inputs) {
            Ok(Verification::MismatchIgnored) => {
                warn!(
                    filename,
                    expected = checksum.unwrap_or_default(),
                    actual = computed.as_deref().unwrap_or_default(),
                    "checksum mismatch ignored, verification disabled"
                );
                Ok(Verification::MismatchIgnored)
            }
            Ok(verification) => Ok(verification),
            Err(Rejection::NoHasher) => Err(Error::config(
                "verification requested but no hasher is configured",
            )),
            Err(Rejection::MissingChecksum) => Err(ChecksumError::Missing {
                filename: filename.to_string(),
            }
            .into()),
            Err(Rejection::Mismatch) => Err(ChecksumError::Mismatch {
                filename: filename.to_string(),
                expected: checksum.unwrap_or_default().to_string(),
                actual: computed.unwrap_or_default(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{sha256_hex, Sha256Hasher};

    fn inputs(h: bool, c: bool, m: bool, v: bool) -> PolicyInputs {
        PolicyInputs {
            hasher_available: h,
            checksum_present: c,
            checksum_matches: m,
            verify: v,
        }
    }

    #[test]
    fn test_decide_table() {
        assert_eq!(decide(inputs(false, false, false, false)), Ok(Verification::Unchecked));
        assert_eq!(decide(inputs(false, true, false, false)), Ok(Verification::Unchecked));
        assert_eq!(decide(inputs(false, true, false, true)), Err(Rejection::NoHasher));
        assert_eq!(decide(inputs(true, false, false, false)), Ok(Verification::Unchecked));
        assert_eq!(decide(inputs(true, false, false, true)), Err(Rejection::MissingChecksum));
        assert_eq!(decide(inputs(true, true, false, false)), Ok(Verification::MismatchIgnored));
        assert_eq!(decide(inputs(true, true, false, true)), Err(Rejection::Mismatch));
        assert_eq!(decide(inputs(true, true, true, false)), Ok(Verification::Verified));
        assert_eq!(decide(inputs(true, true, true, true)), Ok(Verification::Verified));
    }

    #[test]
    fn test_evaluate_verified() {
        let hasher = Sha256Hasher;
        let policy = CommitPolicy::new(Some(&hasher), true);
        let digest = sha256_hex(b"x\n");
        assert_eq!(
            policy.evaluate("a.txt", Some(&digest), b"x\n").unwrap(),
            Verification::Verified
        );
    }

    #[test]
    fn test_evaluate_mismatch_rejected() {
        let hasher = Sha256Hasher;
        let policy = CommitPolicy::new(Some(&hasher), true);
        let zeros = "0".repeat(64);
        let err = policy.evaluate("a.txt", Some(&zeros), b"x\n").unwrap_err();
        match err {
            Error::Checksum(ChecksumError::Mismatch { filename, expected, actual }) => {
                assert_eq!(filename, "a.txt");
                assert_eq!(expected, zeros);
                assert_eq!(actual, sha256_hex(b"x\n"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_mismatch_ignored_without_verify() {
        let hasher = Sha256Hasher;
        let policy = CommitPolicy::new(Some(&hasher), false);
        let zeros = "0".repeat(64);
        assert_eq!(
            policy.evaluate("a.txt", Some(&zeros), b"x\n").unwrap(),
            Verification::MismatchIgnored
        );
    }

    #[test]
    fn test_evaluate_missing_checksum() {
        let hasher = Sha256Hasher;
        let policy = CommitPolicy::new(Some(&hasher), true);
        let err = policy.evaluate("a.txt", None, b"x\n").unwrap_err();
        assert!(matches!(err, Error::Checksum(ChecksumError::Missing { .. })));
    }

    #[test]
    fn test_evaluate_no_hasher() {
        let policy = CommitPolicy::new(None, true);
        let err = policy.evaluate("a.txt", None, b"x\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let policy = CommitPolicy::new(None, false);
        assert_eq!(
            policy.evaluate("a.txt", Some("bogus"), b"x\n").unwrap(),
            Verification::Unchecked
        );
    }
}
