//! The form model: an ordered arena of [`FormNode`]s addressed by [`NodeKey`].
//!
//! Visibility of the two halves of a real/manual pair is never stored. It is
//! derived from the [`SourceState`] kept on the real key, so the two can not
//! disagree.

use metatree_rdf::skos::concept_labels;
use metatree_rdf::{GraphRead, Node};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;

use crate::config::{BuildOptions, Mode};
use crate::key::NodeKey;
use crate::node::{FormNode, ObjectKind, Source, SourceState};
use crate::schema::{CategoryPath, ResolvedSchema, SchemaEntry};

#[derive(Debug, Clone)]
pub struct FormModel {
    pub(crate) nodes: BTreeMap<NodeKey, FormNode>,
    pub(crate) options: BuildOptions,
    pub(crate) schema: ResolvedSchema,
    /// The described resource.
    pub(crate) subject: Node,
    /// Blank node labels already taken, in the metagraph or by the model.
    pub(crate) blank_labels: BTreeSet<String>,
    pub(crate) blank_counter: usize,
}

/// A data-quality remark. Never raised by build, mutation or serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlistedReference {
    pub key: NodeKey,
    pub path: String,
    pub iri: String,
}

impl fmt::Display for UnlistedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): <{}> is not a concept of any configured vocabulary",
            self.path, self.key, self.iri
        )
    }
}

impl FormModel {
    pub(crate) fn new(schema: ResolvedSchema, options: BuildOptions, subject: Node) -> Self {
        Self {
            nodes: BTreeMap::new(),
            options,
            schema,
            subject,
            blank_labels: BTreeSet::new(),
            blank_counter: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    pub fn language(&self) -> &str {
        &self.options.language
    }

    /// Authorized languages, in preference order.
    pub fn languages(&self) -> &[String] {
        &self.options.languages
    }

    pub fn translation(&self) -> bool {
        self.options.translation
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn subject(&self) -> &Node {
        &self.subject
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn get(&self, key: &NodeKey) -> Option<&FormNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &FormNode)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Strict descendants in key order. A key's manual twin is not among them.
    pub fn descendants<'a>(
        &'a self,
        key: &'a NodeKey,
    ) -> impl Iterator<Item = (&'a NodeKey, &'a FormNode)> + 'a {
        self.nodes
            .range((Bound::Excluded(key.clone()), Bound::Unbounded))
            .take_while(move |(k, _)| key.is_ancestor_of(k))
    }

    /// Direct children in key order, both halves of pairs included.
    pub fn children<'a>(&'a self, key: &'a NodeKey) -> Vec<&'a NodeKey> {
        let generation = key.generation() + 1;
        self.descendants(key)
            .filter(|(k, _)| k.generation() == generation)
            .map(|(k, _)| k)
            .collect()
    }

    /// The values of a repeat or translation group: real keys, buttons
    /// excluded.
    pub fn value_children(&self, group: &NodeKey) -> Vec<NodeKey> {
        self.children(group)
            .into_iter()
            .filter(|k| !k.is_manual())
            .filter(|k| self.nodes.get(*k).is_some_and(|n| !n.kind.is_button()))
            .cloned()
            .collect()
    }

    pub(crate) fn button_of(&self, group: &NodeKey) -> Option<NodeKey> {
        self.children(group)
            .into_iter()
            .find(|k| self.nodes.get(*k).is_some_and(|n| n.kind.is_button()))
            .cloned()
    }

    /// Nodes presenting the category written `path` (`dcat:keyword`,
    /// `dcat:contactPoint / vcard:fn`), in key order.
    pub fn find(&self, path: &str) -> Vec<(&NodeKey, &FormNode)> {
        let Some(path) = CategoryPath::parse(path, &self.schema.prefixes) else {
            return Vec::new();
        };
        self.nodes
            .iter()
            .filter(|(_, n)| n.path.as_ref() == Some(&path))
            .collect()
    }

    pub fn entry_for(&self, key: &NodeKey) -> Option<&SchemaEntry> {
        let path = self.nodes.get(key)?.path.as_ref()?;
        self.schema.entry(path)
    }

    // ------------------------------------------------------------------------
    // Sources and visibility
    // ------------------------------------------------------------------------

    fn pair_state(&self, key: &NodeKey) -> Option<&SourceState> {
        self.nodes.get(&key.real())?.source_state.as_ref()
    }

    /// This very key is the inactive half of a pair.
    fn is_inactive_twin(&self, key: &NodeKey) -> bool {
        if key.is_root() {
            return false;
        }
        let manual_active = matches!(self.pair_state(key), Some(SourceState::Manual));
        if key.is_manual() {
            !manual_active
        } else {
            manual_active && key.twin().is_some_and(|t| self.nodes.contains_key(&t))
        }
    }

    /// The key, or one of its ancestors, is the inactive half of a pair.
    pub fn is_hidden_manual(&self, key: &NodeKey) -> bool {
        std::iter::once(key.clone())
            .chain(key.ancestors())
            .any(|k| self.is_inactive_twin(&k))
    }

    /// Hidden by its own flag or by an ancestor's.
    pub fn is_hidden(&self, key: &NodeKey) -> bool {
        std::iter::once(key.clone())
            .chain(key.ancestors())
            .any(|k| self.nodes.get(&k).is_some_and(|n| n.hidden))
    }

    pub fn is_visible(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key) && !self.is_hidden(key) && !self.is_hidden_manual(key)
    }

    /// Active source of the pair (or lone sourced field) `key` belongs to.
    pub fn current_source(&self, key: &NodeKey) -> Option<Source> {
        self.pair_state(key).map(SourceState::source)
    }

    pub fn sources(&self, key: &NodeKey) -> &[Source] {
        self.nodes
            .get(&key.real())
            .map(|n| n.sources.as_slice())
            .unwrap_or_default()
    }

    /// Whether a source menu is worth offering: more than one source.
    pub fn offers_source_menu(&self, key: &NodeKey) -> bool {
        self.sources(key).len() > 1
    }

    /// Choices of a choice-list field under its current source.
    pub fn choices(&self, key: &NodeKey, vocabulary: &dyn GraphRead) -> Vec<String> {
        match self.current_source(key) {
            Some(Source::Scheme(scheme)) => {
                concept_labels(vocabulary, &scheme, &self.options.language)
            }
            _ => Vec::new(),
        }
    }

    /// Stored IRIs that match none of the configured vocabularies.
    pub fn warnings(&self) -> Vec<UnlistedReference> {
        self.nodes
            .iter()
            .filter(|(k, n)| {
                n.kind == ObjectKind::Field
                    && !k.is_manual()
                    && n.has_value()
                    && n.source_state == Some(SourceState::Active(Source::Unlisted))
            })
            .map(|(k, n)| UnlistedReference {
                key: k.clone(),
                path: n
                    .path
                    .as_ref()
                    .map(|p| p.render(&self.schema.prefixes))
                    .unwrap_or_default(),
                iri: n.value.clone().unwrap_or_default(),
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Bookkeeping shared by the builder and the mutations
    // ------------------------------------------------------------------------

    pub(crate) fn node_mut(&mut self, key: &NodeKey) -> Option<&mut FormNode> {
        self.nodes.get_mut(key)
    }

    pub(crate) fn insert(&mut self, key: NodeKey, node: FormNode) {
        self.nodes.insert(key, node);
    }

    /// Remove a node with its descendants; returns the removed keys.
    pub(crate) fn remove_subtree(&mut self, key: &NodeKey) -> Vec<NodeKey> {
        let mut removed: Vec<NodeKey> = self.descendants(key).map(|(k, _)| k.clone()).collect();
        if self.nodes.contains_key(key) {
            removed.insert(0, key.clone());
        }
        for k in &removed {
            self.nodes.remove(k);
        }
        removed
    }

    /// Allocate the next child key of a container.
    pub(crate) fn next_child_key(&mut self, container: &NodeKey) -> Option<NodeKey> {
        let node = self.nodes.get_mut(container)?;
        let key = container.child(node.next_child);
        node.next_child += 1;
        Some(key)
    }

    pub(crate) fn fresh_blank(&mut self) -> Node {
        loop {
            let label = format!("form{}", self.blank_counter);
            self.blank_counter += 1;
            if self.blank_labels.insert(label.clone()) {
                return Node::blank(label);
            }
        }
    }

    /// Languages no value of the translation group holds, in preference
    /// order.
    pub(crate) fn free_languages(&self, group: &NodeKey) -> Vec<String> {
        let used: BTreeSet<String> = self
            .value_children(group)
            .iter()
            .filter_map(|k| self.nodes.get(k)?.language.clone())
            .collect();
        self.options
            .languages
            .iter()
            .filter(|l| !used.contains(*l))
            .cloned()
            .collect()
    }

    /// Recompute the authorized languages of every value of a translation
    /// group as its own language plus the free ones, and the visibility of
    /// its button. Returns the values whose language menu changed and the
    /// new button visibility when it flipped.
    pub(crate) fn refresh_translation_group(
        &mut self,
        group: &NodeKey,
    ) -> (Vec<NodeKey>, Option<(NodeKey, bool)>) {
        let free = self.free_languages(group);
        let order: Vec<String> = self.options.languages.clone();
        let rank = |l: &String| order.iter().position(|o| o == l).unwrap_or(usize::MAX);

        let mut changed = Vec::new();
        for key in self.value_children(group) {
            let Some(node) = self.nodes.get_mut(&key) else {
                continue;
            };
            let mut authorized = free.clone();
            if let Some(own) = &node.language {
                if !authorized.contains(own) {
                    authorized.push(own.clone());
                }
            }
            authorized.sort_by_key(|l| rank(l));
            if node.authorized_languages.as_ref() != Some(&authorized) {
                node.authorized_languages = Some(authorized);
                changed.push(key);
            }
        }

        let mut flipped = None;
        if let Some(button) = self.button_of(group) {
            if let Some(node) = self.nodes.get_mut(&button) {
                let hidden = free.is_empty();
                if node.hidden != hidden {
                    node.hidden = hidden;
                    flipped = Some((button, hidden));
                }
            }
        }
        (changed, flipped)
    }

    /// Show or hide the remove controls of a group's values: shown iff at
    /// least two values remain. Returns the keys whose control flipped, split
    /// into shown and hidden.
    pub(crate) fn refresh_remove_buttons(&mut self, group: &NodeKey) -> (Vec<NodeKey>, Vec<NodeKey>) {
        let values = self.value_children(group);
        let hide = values.len() < 2;
        let (mut shown, mut hidden) = (Vec::new(), Vec::new());
        for key in values {
            let Some(node) = self.nodes.get_mut(&key) else {
                continue;
            };
            if !node.has_remove_button {
                continue;
            }
            if node.remove_button_hidden != hide {
                node.remove_button_hidden = hide;
                if hide {
                    hidden.push(key);
                } else {
                    shown.push(key);
                }
            }
        }
        (shown, hidden)
    }
}
