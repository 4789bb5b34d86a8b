//! HTTP handlers.

mod avatar;
mod dns;
mod home;
mod proofs;
mod qr;
mod vcard;
mod wkd;

pub use avatar::get_image;
pub use dns::get_dns;
pub use home::{favicon, get_home};
pub use proofs::get_proofs;
pub use qr::get_qr;
pub use vcard::get_vcard;
pub use wkd::{get_key_by_domain, get_key_by_hash, post_key};

/// Display name shown in page footers and logs.
pub(crate) fn app_name() -> String {
    format!("KeyProofs v{}", env!("CARGO_PKG_VERSION"))
}
