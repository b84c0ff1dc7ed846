//! Consistency checks over a whole [`FormModel`].
//!
//! Nothing in build, mutation or serialization calls these; they back the
//! property tests and are available to callers that want to audit a model.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::key::NodeKey;
use crate::model::FormModel;
use crate::node::{ObjectKind, Source, SourceState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{0} has no parent in the model")]
    Orphan(NodeKey),
    #[error("rows of {container} are not contiguous: expected row {expected}, found {found} at {key}")]
    RowGap {
        container: NodeKey,
        key: NodeKey,
        expected: usize,
        found: usize,
    },
    #[error("label row of {0} is not directly above its field")]
    LabelRow(NodeKey),
    #[error("{0} and its twin do not share a slot")]
    TwinSlot(NodeKey),
    #[error("manual twin {0} has no real counterpart carrying the source state")]
    TwinState(NodeKey),
    #[error("button {key} hidden={hidden} disagrees with what its group allows")]
    ButtonVisibility { key: NodeKey, hidden: bool },
    #[error("language {language:?} is held twice or unknown in {group}")]
    LanguagePartition { group: NodeKey, language: String },
    #[error("authorized languages of {0} are not its own language plus the free ones")]
    AuthorizedLanguages(NodeKey),
    #[error("property group {0} has no field below it")]
    Ghost(NodeKey),
}

impl FormModel {
    /// Check every structural invariant; the first violation found is
    /// returned.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for key in self.nodes.keys() {
            if let Some(parent) = key.parent() {
                if !self.nodes.contains_key(&parent) {
                    return Err(InvariantViolation::Orphan(key.clone()));
                }
            }
        }
        for (key, node) in &self.nodes {
            if node.kind.is_container() {
                self.check_rows(key)?;
            }
        }
        self.check_twins()?;
        self.check_buttons()?;
        self.check_languages()?;
        self.check_ghosts()
    }

    fn check_rows(&self, container: &NodeKey) -> Result<(), InvariantViolation> {
        let Some(owner) = self.nodes.get(container) else {
            return Ok(());
        };
        let mut slots = Vec::new();
        for key in self.children(container) {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.label_row.is_some_and(|l| l + 1 != node.row) {
                return Err(InvariantViolation::LabelRow(key.clone()));
            }
            if key.is_manual() {
                let real = key.real();
                if let Some(counterpart) = self.nodes.get(&real) {
                    if (counterpart.top_row(), counterpart.bottom_row())
                        != (node.top_row(), node.bottom_row())
                    {
                        return Err(InvariantViolation::TwinSlot(real));
                    }
                    continue;
                }
            }
            slots.push((node.top_row(), node.bottom_row(), key));
        }
        slots.sort();
        let mut expected = owner.first_child_row();
        for (top, bottom, key) in slots {
            if top != expected {
                return Err(InvariantViolation::RowGap {
                    container: container.clone(),
                    key: key.clone(),
                    expected,
                    found: top,
                });
            }
            expected = bottom;
        }
        Ok(())
    }

    fn check_twins(&self) -> Result<(), InvariantViolation> {
        for key in self.nodes.keys().filter(|k| k.is_manual()) {
            let real = key.real();
            let Some(node) = self.nodes.get(&real) else {
                return Err(InvariantViolation::TwinState(key.clone()));
            };
            if node.source_state.is_none() || !node.sources.contains(&Source::Manual) {
                return Err(InvariantViolation::TwinState(key.clone()));
            }
            // Exactly one side is hidden as a twin unless an ancestor already
            // hides both.
            let inherited = key.ancestors().any(|a| self.is_hidden_manual(&a));
            if !inherited && self.is_hidden_manual(key) == self.is_hidden_manual(&real) {
                return Err(InvariantViolation::TwinState(key.clone()));
            }
        }
        for (key, node) in &self.nodes {
            let manual = node.source_state == Some(SourceState::Manual);
            let has_twin = key.twin().is_some_and(|t| self.nodes.contains_key(&t));
            if manual && !has_twin {
                return Err(InvariantViolation::TwinState(key.clone()));
            }
        }
        Ok(())
    }

    fn check_buttons(&self) -> Result<(), InvariantViolation> {
        for (key, node) in &self.nodes {
            let Some(group) = key.parent() else {
                continue;
            };
            let expected = match node.kind {
                ObjectKind::AddButton => {
                    let count = self.value_children(&group).len();
                    let max = self.entry_for(key).and_then(|e| e.max_count);
                    max.is_some_and(|m| count >= m as usize)
                }
                ObjectKind::TranslationButton => self.free_languages(&group).is_empty(),
                _ => continue,
            };
            if node.hidden != expected {
                return Err(InvariantViolation::ButtonVisibility {
                    key: key.clone(),
                    hidden: node.hidden,
                });
            }
        }
        Ok(())
    }

    fn check_languages(&self) -> Result<(), InvariantViolation> {
        let groups = self
            .nodes
            .iter()
            .filter(|(_, n)| n.kind == ObjectKind::TranslationGroup)
            .map(|(k, _)| k);
        for group in groups {
            let mut held = BTreeSet::new();
            let values = self.value_children(group);
            for key in &values {
                let Some(language) = self.nodes.get(key).and_then(|n| n.language.clone()) else {
                    continue;
                };
                if !self.languages().contains(&language) || !held.insert(language.clone()) {
                    return Err(InvariantViolation::LanguagePartition {
                        group: group.clone(),
                        language,
                    });
                }
            }
            let free = self.free_languages(group);
            for key in &values {
                let Some(node) = self.nodes.get(key) else {
                    continue;
                };
                let mut expected: BTreeSet<&String> = free.iter().collect();
                expected.extend(node.language.as_ref());
                let actual: BTreeSet<&String> = node
                    .authorized_languages
                    .iter()
                    .flatten()
                    .collect();
                if expected != actual {
                    return Err(InvariantViolation::AuthorizedLanguages(key.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_ghosts(&self) -> Result<(), InvariantViolation> {
        for (key, node) in &self.nodes {
            if node.kind != ObjectKind::PropertyGroup {
                continue;
            }
            if !self
                .descendants(key)
                .any(|(_, n)| n.kind == ObjectKind::Field)
            {
                return Err(InvariantViolation::Ghost(key.clone()));
            }
        }
        Ok(())
    }
}
