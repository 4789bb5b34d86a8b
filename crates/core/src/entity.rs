//! Parsed OpenPGP identity metadata.

use crate::error::{Error, Result};
use crate::NOBODY;
use chrono::{DateTime, Utc};
use std::fmt;

/// An RFC-5322-style mail address, optionally with a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl MailAddress {
    /// Parse `Name <local@domain>` or a bare `local@domain`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let (name, addr) = match s.rfind('<') {
            Some(start) => {
                let end = s[start..]
                    .find('>')
                    .map(|i| start + i)
                    .ok_or_else(|| Error::ParseAddress(format!("unclosed angle bracket: {s}")))?;
                let name = s[..start].trim().trim_matches('"').trim();
                let name = (!name.is_empty()).then(|| name.to_string());
                (name, &s[start + 1..end])
            }
            None => (None, s),
        };

        let addr = addr.trim();
        let (local, domain) = addr
            .split_once('@')
            .ok_or_else(|| Error::ParseAddress(format!("missing @ in {addr:?}")))?;
        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || addr.chars().any(char::is_whitespace)
        {
            return Err(Error::ParseAddress(format!("invalid address {addr:?}")));
        }

        Ok(Self {
            name,
            address: addr.to_string(),
        })
    }

    /// The part after `@`.
    pub fn domain(&self) -> &str {
        self.address.split_once('@').map(|(_, d)| d).unwrap_or("")
    }

    /// The part before `@`.
    pub fn local(&self) -> &str {
        self.address
            .split_once('@')
            .map(|(l, _)| l)
            .unwrap_or(&self.address)
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// The slice of a self-signature the rest of the system cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfSig {
    pub created: Option<DateTime<Utc>>,
}

/// A parsed public key plus derived identity metadata.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Primary identity. Falls back to [`NOBODY`] when the key carries no
    /// parseable identity.
    pub primary: MailAddress,
    /// All other identities; never contains `primary`'s address.
    pub emails: Vec<MailAddress>,
    /// Uppercase hex fingerprint of the primary key.
    pub fingerprint: String,
    /// Proof URIs carried in `proof@metacode.biz` notations.
    pub proofs: Vec<String>,
    /// ASCII-armored form of the key; always populated.
    pub armor_text: String,
    /// Self-signature metadata, used by the HKP submission path.
    pub self_signature: Option<SelfSig>,
}

/// One user ID as it comes out of the packet parser, reduced to what the
/// identity scan needs.
#[derive(Debug, Clone, Default)]
pub struct ParsedIdent {
    /// The full user ID string, e.g. `Jane <jane@example.org>`.
    pub name: String,
    /// Whether the self-signature sets the primary-user-ID flag.
    pub is_primary: bool,
    /// Values of `proof@metacode.biz` notations on the self-signature.
    pub proofs: Vec<String>,
    /// Whether the self-signature carried any notation data at all.
    pub has_notations: bool,
    /// Self-signature creation time.
    pub created: Option<DateTime<Utc>>,
}

impl Entity {
    /// Build an entity from the scanned identities of a single key.
    ///
    /// The first identity is the tentative primary; an identity whose
    /// self-signature sets the primary flag wins. Every other identity with
    /// a distinct address lands in `emails`. Proof URIs are collected from
    /// all self-signature notations named [`PROOF_NOTATION`].
    pub fn from_identities(
        fingerprint: String,
        idents: &[ParsedIdent],
        armor_text: String,
    ) -> Result<Self> {
        let mut primary: Option<MailAddress> = None;
        for (i, ident) in idents.iter().enumerate() {
            if ident.is_primary {
                primary = Some(MailAddress::parse(&ident.name)?);
                break;
            }
            if i == 0 {
                primary = Some(MailAddress::parse(&ident.name)?);
            }
        }

        let primary = match primary {
            Some(p) => p,
            None => MailAddress::parse(NOBODY)?,
        };

        let mut emails = Vec::new();
        let mut proofs = Vec::new();
        let mut self_signature = None;
        for ident in idents {
            let addr = MailAddress::parse(&ident.name)?;
            if addr.address != primary.address
                && !emails.iter().any(|e: &MailAddress| e.address == addr.address)
            {
                emails.push(addr.clone());
            }
            if ident.has_notations {
                proofs.extend(ident.proofs.iter().cloned());
                // The primary identity's signature wins for the HKP compare.
                if addr.address == primary.address || self_signature.is_none() {
                    self_signature = Some(SelfSig {
                        created: ident.created,
                    });
                }
            }
        }

        Ok(Self {
            primary,
            emails,
            fingerprint: fingerprint.to_uppercase(),
            proofs,
            armor_text,
            self_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ident(name: &str) -> ParsedIdent {
        ParsedIdent {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn parse_bare_address() {
        let a = MailAddress::parse("me@example.org").unwrap();
        assert_eq!(a.address, "me@example.org");
        assert_eq!(a.name, None);
        assert_eq!(a.local(), "me");
        assert_eq!(a.domain(), "example.org");
    }

    #[test]
    fn parse_named_address() {
        let a = MailAddress::parse("Jane Doe <jane@example.org>").unwrap();
        assert_eq!(a.address, "jane@example.org");
        assert_eq!(a.name.as_deref(), Some("Jane Doe"));
        assert_eq!(a.to_string(), "Jane Doe <jane@example.org>");
    }

    #[test]
    fn parse_quoted_name() {
        let a = MailAddress::parse("\"Jane\" <jane@example.org>").unwrap();
        assert_eq!(a.name.as_deref(), Some("Jane"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(MailAddress::parse("not-an-address").is_err());
        assert!(MailAddress::parse("a@").is_err());
        assert!(MailAddress::parse("@b").is_err());
        assert!(MailAddress::parse("Jane <jane@example.org").is_err());
    }

    #[test]
    fn first_identity_is_tentative_primary() {
        let e = Entity::from_identities(
            "abcd".into(),
            &[ident("a@x.org"), ident("b@x.org")],
            String::new(),
        )
        .unwrap();
        assert_eq!(e.primary.address, "a@x.org");
        assert_eq!(e.emails.len(), 1);
        assert_eq!(e.emails[0].address, "b@x.org");
    }

    #[test]
    fn primary_flag_overrides_first_seen() {
        let mut second = ident("b@x.org");
        second.is_primary = true;
        let e = Entity::from_identities(
            "abcd".into(),
            &[ident("a@x.org"), second],
            String::new(),
        )
        .unwrap();
        assert_eq!(e.primary.address, "b@x.org");
        assert!(e.emails.iter().all(|m| m.address != "b@x.org"));
        assert!(e.emails.iter().any(|m| m.address == "a@x.org"));
    }

    #[test]
    fn primary_never_in_emails() {
        let e = Entity::from_identities(
            "abcd".into(),
            &[ident("a@x.org"), ident("a@x.org"), ident("c@x.org")],
            String::new(),
        )
        .unwrap();
        assert!(e.emails.iter().all(|m| m.address != e.primary.address));
    }

    #[test]
    fn no_identities_falls_back_to_sentinel() {
        let e = Entity::from_identities("abcd".into(), &[], String::new()).unwrap();
        assert_eq!(e.primary.address, NOBODY);
        assert!(e.emails.is_empty());
    }

    #[test]
    fn fingerprint_is_uppercased() {
        let e = Entity::from_identities("ab12cd".into(), &[], String::new()).unwrap();
        assert_eq!(e.fingerprint, "AB12CD");
    }

    #[test]
    fn proofs_collected_from_notations() {
        let mut a = ident("a@x.org");
        a.has_notations = true;
        a.proofs = vec!["dns:x.org".into(), "https://x.org/u/a".into()];
        let e =
            Entity::from_identities("abcd".into(), &[a], String::new()).unwrap();
        assert_eq!(e.proofs, vec!["dns:x.org", "https://x.org/u/a"]);
    }

    #[test]
    fn primary_self_signature_wins() {
        let t1 = Utc.timestamp_opt(1_000, 0).unwrap();
        let t2 = Utc.timestamp_opt(2_000, 0).unwrap();
        let mut a = ident("a@x.org");
        a.has_notations = true;
        a.created = Some(t1);
        let mut b = ident("b@x.org");
        b.has_notations = true;
        b.created = Some(t2);
        let e = Entity::from_identities("abcd".into(), &[a, b], String::new()).unwrap();
        assert_eq!(e.self_signature.unwrap().created, Some(t1));
    }
}
