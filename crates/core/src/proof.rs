//! Proof declarations and verification status.

use std::fmt;

/// Verification outcome of a single proof, in display order.
///
/// The numeric ordering is observable: rendering switches on the
/// discriminant, and a row only ever moves forward from `Checking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ProofStatus {
    #[default]
    Checking = 0,
    Error = 1,
    Invalid = 2,
    Verified = 3,
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProofStatus::Checking => "Checking",
            ProofStatus::Error => "Error",
            ProofStatus::Invalid => "Invalid",
            ProofStatus::Verified => "Verified",
        };
        f.write_str(s)
    }
}

/// A declared third-party account and its verification outcome.
#[derive(Debug, Clone)]
pub struct Proof {
    /// The original proof URI from the key's notation data.
    pub uri: String,
    /// Uppercase hex fingerprint the remote profile must contain.
    pub fingerprint: String,
    /// Icon class for rendering.
    pub icon: String,
    /// Human-readable service name (`Twitter`, `GitLab`, ...).
    pub service: String,
    /// Account name on the service.
    pub name: String,
    /// Profile link shown to the user.
    pub link: String,
    /// URL fetched to verify the proof.
    pub verify_url: String,
    pub status: ProofStatus,
}
