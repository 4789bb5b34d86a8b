//! Core domain types and shared logic for KeyProofs.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Typed task keys and values
//! - Parsed OpenPGP identity metadata (`Entity`)
//! - Proof declarations and verification status
//! - Style (avatar/cover/palette) derivation
//! - WKD and avatar hashing
//! - Application configuration

pub mod color;
pub mod config;
pub mod entity;
pub mod error;
pub mod hash;
pub mod key;
pub mod proof;
pub mod style;

pub use config::AppConfig;
pub use entity::{Entity, MailAddress, SelfSig};
pub use error::{Error, Result};
pub use key::{TaskKey, TaskValue};
pub use proof::{Proof, ProofStatus};
pub use style::Style;

/// Sentinel primary address for keys that carry no parseable identity.
pub const NOBODY: &str = "nobody@nodomain.xyz";

/// Notation name that carries proof URIs in a self-signature.
pub const PROOF_NOTATION: &str = "proof@metacode.biz";
