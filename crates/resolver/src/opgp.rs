//! OpenPGP keyring parsing.
//!
//! Reduces an armored or binary public key to the [`Entity`] the rest of
//! the system works with, keeping the parsed key around for the HKP
//! submission path (fingerprint/self-signature compare, binary re-write).

use keyproofs_core::entity::ParsedIdent;
use keyproofs_core::{Entity, Error, Result, PROOF_NOTATION};
use pgp::composed::{Deserializable, SignedPublicKey};
use pgp::packet::SubpacketData;
use pgp::types::KeyTrait;
use std::io::Cursor;

/// A parsed public key plus the derived entity.
pub struct ParsedKey {
    pub entity: Entity,
    pub key: SignedPublicKey,
}

impl ParsedKey {
    /// Binary serialization of the key, as stored in the WKD tree.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        use pgp::ser::Serialize;
        self.key
            .to_bytes()
            .map_err(|err| Error::Decode(err.to_string()))
    }
}

/// Parse a public key from `data`.
///
/// `armored` reflects the caller's expectation from the transport; the
/// armor text is preserved verbatim for armored input and re-encoded for
/// binary input so `Entity::armor_text` is always populated.
pub fn parse_key(data: &[u8], armored: bool) -> Result<ParsedKey> {
    let (key, armor_text) = if armored {
        let (key, _headers) = SignedPublicKey::from_armor_single(Cursor::new(data))
            .map_err(|err| Error::Decode(err.to_string()))?;
        (key, String::from_utf8_lossy(data).into_owned())
    } else {
        let key = SignedPublicKey::from_bytes(Cursor::new(data))
            .map_err(|err| Error::Decode(err.to_string()))?;
        let text = key
            .to_armored_string(None.into())
            .map_err(|err| Error::Decode(err.to_string()))?;
        (key, text)
    };

    let entity = entity_from_key(&key, armor_text)?;
    Ok(ParsedKey { entity, key })
}

/// Derive an [`Entity`] from a parsed key.
pub fn entity_from_key(key: &SignedPublicKey, armor_text: String) -> Result<Entity> {
    let fingerprint = hex::encode_upper(key.fingerprint());

    let idents: Vec<ParsedIdent> = key
        .details
        .users
        .iter()
        .map(|user| {
            let mut ident = ParsedIdent {
                name: String::from_utf8_lossy(user.id.id()).into_owned(),
                ..Default::default()
            };

            // The newest signature carried on the user id is treated as the
            // self-signature; older ones are superseded bindings.
            let sig = user
                .signatures
                .iter()
                .max_by_key(|sig| sig.created().cloned());

            if let Some(sig) = sig {
                ident.created = sig.created().cloned();
                for subpacket in &sig.config.hashed_subpackets {
                    match &subpacket.data {
                        SubpacketData::IsPrimary(true) => ident.is_primary = true,
                        SubpacketData::Notation(notation) => {
                            ident.has_notations = true;
                            let name: &[u8] = notation.name.as_ref();
                            if name == PROOF_NOTATION.as_bytes() {
                                let value: &[u8] = notation.value.as_ref();
                                ident
                                    .proofs
                                    .push(String::from_utf8_lossy(value).into_owned());
                            }
                        }
                        _ => {}
                    }
                }
            }

            ident
        })
        .collect();

    Entity::from_identities(fingerprint, &idents, armor_text)
}
