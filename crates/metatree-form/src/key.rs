//! Hierarchical node identifiers.
//!
//! A key is the path of child indices leading from the root to a node. Each
//! step may carry the manual tag, which marks the manual-entry twin of a
//! multi-source field: `(i, parent)` and `(i, parent, M)` are twins.
//!
//! Keys order lexicographically on their steps, so iterating a
//! `BTreeMap<NodeKey, _>` visits a parent before its descendants (depth-first
//! pre-order), and a real key before its manual twin.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Step {
    pub index: usize,
    pub manual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeKey {
    steps: Vec<Step>,
}

impl NodeKey {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        self.push(Step {
            index,
            manual: false,
        })
    }

    pub fn manual_child(&self, index: usize) -> Self {
        self.push(Step {
            index,
            manual: true,
        })
    }

    fn push(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps from the root (the root is generation 0).
    pub fn generation(&self) -> usize {
        self.steps.len()
    }

    pub fn parent(&self) -> Option<NodeKey> {
        let (_, init) = self.steps.split_last()?;
        Some(Self {
            steps: init.to_vec(),
        })
    }

    pub fn index(&self) -> Option<usize> {
        self.steps.last().map(|s| s.index)
    }

    pub fn is_manual(&self) -> bool {
        self.steps.last().is_some_and(|s| s.manual)
    }

    /// The other half of a real/manual pair. The root has no twin.
    pub fn twin(&self) -> Option<NodeKey> {
        let mut steps = self.steps.clone();
        let last = steps.last_mut()?;
        last.manual = !last.manual;
        Some(Self { steps })
    }

    /// The non-manual half of the pair this key belongs to.
    pub fn real(&self) -> NodeKey {
        if self.is_manual() {
            self.twin().unwrap_or_default()
        } else {
            self.clone()
        }
    }

    /// Strict ancestry: a key is not its own ancestor, and a key is not an
    /// ancestor of its manual twin.
    pub fn is_ancestor_of(&self, other: &NodeKey) -> bool {
        self.steps.len() < other.steps.len() && other.steps.starts_with(&self.steps)
    }

    /// `self` belongs to an earlier generation than `other`.
    pub fn is_older_than(&self, other: &NodeKey) -> bool {
        self.generation() < other.generation()
    }

    /// Strict ancestors, nearest first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeKey> + '_ {
        (0..self.steps.len()).rev().map(|n| Self {
            steps: self.steps[..n].to_vec(),
        })
    }

    /// Rewrite the `old` prefix of this key into `new`.
    pub fn replace_ancestor(&self, old: &NodeKey, new: &NodeKey) -> Result<NodeKey, KeyError> {
        if !old.is_ancestor_of(self) {
            return Err(KeyError::InvalidAncestor {
                key: self.clone(),
                ancestor: old.clone(),
            });
        }
        if old.generation() != new.generation() || old.is_manual() != new.is_manual() {
            return Err(KeyError::GenerationMismatch {
                old: old.clone(),
                new: new.clone(),
            });
        }
        let mut steps = new.steps.clone();
        steps.extend_from_slice(&self.steps[old.steps.len()..]);
        Ok(Self { steps })
    }
}

pub fn is_root(key: &NodeKey) -> bool {
    key.is_root()
}

pub fn is_ancestor(a: &NodeKey, b: &NodeKey) -> bool {
    a.is_ancestor_of(b)
}

pub fn is_older(a: &NodeKey, b: &NodeKey) -> bool {
    a.is_older_than(b)
}

pub fn replace_ancestor(
    key: &NodeKey,
    old_ancestor: &NodeKey,
    new_ancestor: &NodeKey,
) -> Result<NodeKey, KeyError> {
    key.replace_ancestor(old_ancestor, new_ancestor)
}

// ============================================================================
// Text form: `/` for the root, `/0/3/1M` otherwise
// ============================================================================

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            write!(f, "/{}", step.index)?;
            if step.manual {
                f.write_str("M")?;
            }
        }
        Ok(())
    }
}

impl FromStr for NodeKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KeyError::Malformed(s.to_string());
        let rest = s.strip_prefix('/').ok_or_else(malformed)?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let steps = rest
            .split('/')
            .map(|part| {
                let (digits, manual) = match part.strip_suffix('M') {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };
                digits
                    .parse::<usize>()
                    .map(|index| Step { index, manual })
                    .map_err(|_| malformed())
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

impl Serialize for NodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> NodeKey {
        s.parse().expect("key")
    }

    #[test]
    fn ancestry_is_structural_prefix() {
        let root = NodeKey::root();
        let tab = root.child(0);
        let field = tab.child(3);
        assert!(is_ancestor(&root, &field));
        assert!(is_ancestor(&tab, &field));
        assert!(!is_ancestor(&field, &field));
        assert!(!is_ancestor(&field, &tab));
        // A key is not an ancestor of its own twin, nor of the twin's children.
        let twin = field.twin().expect("twin");
        assert!(!is_ancestor(&field, &twin));
        assert!(!is_ancestor(&field, &twin.child(0)));
        assert!(is_ancestor(&twin, &twin.child(0)));
    }

    #[test]
    fn older_means_earlier_generation() {
        assert!(is_older(&key("/0"), &key("/0/1")));
        assert!(!is_older(&key("/0/1"), &key("/0/2")));
        assert!(is_root(&NodeKey::root()));
    }

    #[test]
    fn replace_ancestor_rewrites_prefix() {
        let moved = replace_ancestor(&key("/0/2/5/1"), &key("/0/2"), &key("/0/7")).expect("ok");
        assert_eq!(moved, key("/0/7/5/1"));
        let manual = replace_ancestor(&key("/0/2M/1"), &key("/0/2M"), &key("/0/9M")).expect("ok");
        assert_eq!(manual, key("/0/9M/1"));
    }

    #[test]
    fn replace_ancestor_guards() {
        assert!(matches!(
            replace_ancestor(&key("/0/2/1"), &key("/0/3"), &key("/0/4")),
            Err(KeyError::InvalidAncestor { .. })
        ));
        assert!(matches!(
            replace_ancestor(&key("/0/2/1"), &key("/0/2"), &key("/0/4M")),
            Err(KeyError::GenerationMismatch { .. })
        ));
        assert!(matches!(
            replace_ancestor(&key("/0/2/1"), &key("/0/2"), &key("/0/4/4")),
            Err(KeyError::GenerationMismatch { .. })
        ));
    }

    #[test]
    fn ordering_is_depth_first_with_real_before_manual() {
        let mut keys = vec![key("/0/1M"), key("/0/1/0"), key("/0/2"), key("/0/1"), key("/0")];
        keys.sort();
        let shown: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["/0", "/0/1", "/0/1/0", "/0/1M", "/0/2"]);
    }

    #[test]
    fn text_form_round_trips() {
        for text in ["/", "/0", "/0/3/1M", "/1M/0"] {
            assert_eq!(key(text).to_string(), text);
        }
        assert!("0/1".parse::<NodeKey>().is_err());
        assert!("/x".parse::<NodeKey>().is_err());
    }

    #[test]
    fn twin_and_real_pair_up() {
        let real = key("/0/4");
        let manual = real.twin().expect("twin");
        assert!(manual.is_manual());
        assert_eq!(manual.real(), real);
        assert_eq!(real.real(), real);
        assert_eq!(NodeKey::root().twin(), None);
    }
}
