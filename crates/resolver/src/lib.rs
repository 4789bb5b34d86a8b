//! Resolvers: the network-facing side of KeyProofs.
//!
//! - [`entity`]: fetch a public key for an identity (WKD, keyserver) and
//!   parse it into a [`keyproofs_core::Entity`].
//! - [`opgp`]: OpenPGP keyring parsing and armoring.
//! - [`style`]: SRV-directed avatar/style derivation.
//! - [`proof`]: classify proof URIs into per-service verifiers.
//! - [`dns`]: the DNS seam (SRV/TXT) used by style and the `/dns`
//!   endpoint.

pub mod dns;
pub mod entity;
pub mod opgp;
pub mod proof;
pub mod style;
mod verify;

pub use dns::{DnsResolver, HickoryDns};
pub use entity::{HttpKeyLookup, KeyLookup};
pub use opgp::ParsedKey;
pub use proof::{classify, CheckKind, ProofCheck, ProofSettings};
