//! Typed task keys and values.
//!
//! Every unit of work the runner schedules is identified by a `TaskKey`.
//! Each variant carries its own namespace, so `Entity("a@b")` and
//! `Style("a@b")` never collide in the registry or the cache.

use crate::{Entity, Proof, Style};
use std::fmt;
use std::sync::Arc;

/// Key identifying a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// Identity lookup: email address or hex fingerprint.
    Entity(String),
    /// Style derivation for an email address.
    Style(String),
    /// Verification of a single proof URI.
    Proof(String),
}

impl TaskKey {
    /// Whether results under this key may be memoized.
    ///
    /// Every current namespace is cacheable; the match is total so a new
    /// variant forces a decision here.
    pub fn cacheable(&self) -> bool {
        match self {
            TaskKey::Entity(_) | TaskKey::Style(_) | TaskKey::Proof(_) => true,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Entity(id) => write!(f, "entity:{id}"),
            TaskKey::Style(email) => write!(f, "style:{email}"),
            TaskKey::Proof(uri) => write!(f, "proof:{uri}"),
        }
    }
}

/// Result of a finished task.
///
/// Values are `Arc`-shared: the same result is handed to every awaiter and
/// kept in the cache without copying.
#[derive(Debug, Clone)]
pub enum TaskValue {
    Entity(Arc<Entity>),
    Style(Arc<Style>),
    Proof(Arc<Proof>),
}

impl TaskValue {
    pub fn entity(&self) -> Option<Arc<Entity>> {
        match self {
            TaskValue::Entity(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn style(&self) -> Option<Arc<Style>> {
        match self {
            TaskValue::Style(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn proof(&self) -> Option<Arc<Proof>> {
        match self {
            TaskValue::Proof(p) => Some(p.clone()),
            _ => None,
        }
    }
}

impl From<Entity> for TaskValue {
    fn from(e: Entity) -> Self {
        TaskValue::Entity(Arc::new(e))
    }
}

impl From<Style> for TaskValue {
    fn from(s: Style) -> Self {
        TaskValue::Style(Arc::new(s))
    }
}

impl From<Proof> for TaskValue {
    fn from(p: Proof) -> Self {
        TaskValue::Proof(Arc::new(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn namespaces_do_not_collide() {
        let mut set = HashSet::new();
        set.insert(TaskKey::Entity("a@b".into()));
        set.insert(TaskKey::Style("a@b".into()));
        set.insert(TaskKey::Proof("a@b".into()));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn display_prefixes_namespace() {
        assert_eq!(TaskKey::Entity("x".into()).to_string(), "entity:x");
        assert_eq!(TaskKey::Style("x".into()).to_string(), "style:x");
        assert_eq!(TaskKey::Proof("x".into()).to_string(), "proof:x");
    }

    #[test]
    fn all_keys_cacheable() {
        assert!(TaskKey::Entity(String::new()).cacheable());
        assert!(TaskKey::Style(String::new()).cacheable());
        assert!(TaskKey::Proof(String::new()).cacheable());
    }
}
