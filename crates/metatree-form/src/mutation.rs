//! Mutation Engine.
//!
//! Every operation validates all of its preconditions before touching the
//! model, so a returned error always leaves the model as it was. On success
//! the returned [`ActionReport`] lists what the presentation layer has to
//! redo on its own controls.

use metatree_rdf::Node;
use serde::{Deserialize, Serialize};

use crate::builder::{sync_identifier, Placer, ValueSlot};
use crate::config::Mode;
use crate::error::MutationError;
use crate::key::NodeKey;
use crate::model::FormModel;
use crate::node::{ObjectKind, Source, SourceState};

/// Side effects of one mutation, for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub show_nodes: Vec<NodeKey>,
    pub hide_nodes: Vec<NodeKey>,
    /// Nodes whose slot moved, with their new row.
    pub move_nodes: Vec<(NodeKey, usize)>,
    /// Fields whose value was cleared.
    pub empty_nodes: Vec<NodeKey>,
    pub new_keys: Vec<NodeKey>,
    pub deleted_keys: Vec<NodeKey>,
    pub refresh_language_menu: Vec<NodeKey>,
    pub refresh_source_menu: Vec<NodeKey>,
    pub concepts_list_to_refresh: Vec<NodeKey>,
    pub remove_buttons_to_show: Vec<NodeKey>,
    pub remove_buttons_to_hide: Vec<NodeKey>,
    /// Fields whose value the engine rewrote.
    pub refresh_values: Vec<NodeKey>,
}

impl ActionReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn push_unique(list: &mut Vec<NodeKey>, key: NodeKey) {
    if !list.contains(&key) {
        list.push(key);
    }
}

impl FormModel {
    fn editable(&self, key: &NodeKey) -> Result<(), MutationError> {
        if self.mode() == Mode::Read {
            return Err(MutationError::ReadOnlyMode);
        }
        if !self.nodes.contains_key(key) {
            return Err(MutationError::UnknownKey(key.clone()));
        }
        Ok(())
    }

    /// Hidden by a flag, or inside the inactive half of a pair. Either half
    /// of a pair is still a valid handle on the pair itself.
    fn in_hidden_branch(&self, key: &NodeKey) -> bool {
        self.is_hidden(key) || key.parent().is_some_and(|p| self.is_hidden_manual(&p))
    }

    // ========================================================================
    // add / drop
    // ========================================================================

    /// Add a value to the group of the button `key`: an emptied copy of the
    /// group's first value. The new value takes the button's row and the
    /// button moves below it.
    pub fn add(&mut self, key: &NodeKey) -> Result<ActionReport, MutationError> {
        self.editable(key)?;
        if key.is_root() {
            return Err(MutationError::RootOperation);
        }
        let button = &self.nodes[key];
        if !button.kind.is_button() {
            return Err(MutationError::NotAButtonTarget(key.clone()));
        }
        if button.hidden {
            return Err(MutationError::ExhaustedButton(key.clone()));
        }
        let kind = button.kind;
        let button_row = button.row;
        let group = key
            .parent()
            .ok_or_else(|| MutationError::NotAButtonTarget(key.clone()))?;
        let entry = self
            .entry_for(&group)
            .cloned()
            .ok_or_else(|| MutationError::NotAButtonTarget(key.clone()))?;

        let language = match kind {
            ObjectKind::TranslationButton => Some(
                self.free_languages(&group)
                    .into_iter()
                    .next()
                    .ok_or_else(|| MutationError::ExhaustedButton(key.clone()))?,
            ),
            _ => None,
        };

        let mut placer = Placer::detached();
        placer.set_cursor(&group, button_row);
        let placed = match self.value_children(&group).first() {
            Some(sibling) => placer.place_empty_copy(self, sibling, &group),
            None => {
                let slot = ValueSlot {
                    labelled: false,
                    fresh: true,
                    with_default: false,
                    language: language.clone(),
                    in_group: true,
                };
                placer.place_value(self, &group, &entry, None, &slot)
            }
        };
        let new_key = placed.ok_or_else(|| MutationError::UnknownKey(group.clone()))?;
        if let (Some(language), Some(node)) = (language, self.node_mut(&new_key)) {
            node.language = Some(language);
        }
        let bottom = placer.cursor(&group).unwrap_or(button_row + 1);

        let mut report = ActionReport {
            new_keys: placer.new_keys,
            ..ActionReport::default()
        };
        if let Some(node) = self.node_mut(key) {
            node.row = bottom;
            report.move_nodes.push((key.clone(), bottom));
        }

        match kind {
            ObjectKind::TranslationButton => {
                let (changed, flipped) = self.refresh_translation_group(&group);
                report.refresh_language_menu = changed;
                push_unique(&mut report.refresh_language_menu, new_key.clone());
                if let Some((button, true)) = flipped {
                    report.hide_nodes.push(button);
                }
            }
            _ => {
                let count = self.value_children(&group).len();
                if entry.max_count.is_some_and(|m| count >= m as usize) {
                    if let Some(node) = self.node_mut(key) {
                        node.hidden = true;
                    }
                    report.hide_nodes.push(key.clone());
                }
            }
        }

        let (shown, _) = self.refresh_remove_buttons(&group);
        report.remove_buttons_to_show = shown;
        if self.get(&new_key).is_some_and(|n| !n.remove_button_hidden) {
            push_unique(&mut report.remove_buttons_to_show, new_key);
        }
        Ok(report)
    }

    /// Remove a value (with its twin and descendants) from its repeat or
    /// translation group and close the gap it leaves.
    pub fn drop(&mut self, key: &NodeKey) -> Result<ActionReport, MutationError> {
        if key.is_root() {
            return Err(MutationError::RootOperation);
        }
        self.editable(key)?;
        let real = key.real();
        let group = key
            .parent()
            .ok_or(MutationError::RootOperation)?;
        let in_group = self
            .nodes
            .get(&group)
            .is_some_and(|g| g.kind.is_value_group());
        let is_value = self
            .nodes
            .get(&real)
            .is_some_and(|n| !n.kind.is_button());
        if !in_group || !is_value {
            return Err(MutationError::OutsideGroup(key.clone()));
        }
        if self.value_children(&group).len() < 2 {
            return Err(MutationError::LastOfItsKind(key.clone()));
        }

        let (top, height) = {
            let node = &self.nodes[&real];
            (node.top_row(), node.height())
        };
        let mut report = ActionReport::default();
        report.deleted_keys = self.remove_subtree(&real);
        if let Some(twin) = real.twin() {
            report.deleted_keys.extend(self.remove_subtree(&twin));
        }

        let below: Vec<NodeKey> = self
            .children(&group)
            .into_iter()
            .filter(|k| self.nodes.get(*k).is_some_and(|n| n.top_row() > top))
            .cloned()
            .collect();
        for k in below {
            if let Some(node) = self.node_mut(&k) {
                node.shift_rows(-(height as isize));
                report.move_nodes.push((k, node.row));
            }
        }

        let button = self.button_of(&group);
        match self.nodes.get(&group).map(|g| g.kind) {
            Some(ObjectKind::TranslationGroup) => {
                let (changed, flipped) = self.refresh_translation_group(&group);
                report.refresh_language_menu = changed;
                if let Some((button, false)) = flipped {
                    report.show_nodes.push(button);
                }
            }
            _ => {
                let count = self.value_children(&group).len();
                let max = self.entry_for(&group).and_then(|e| e.max_count);
                let exhausted = max.is_some_and(|m| count >= m as usize);
                if let Some(button) = button {
                    if let Some(node) = self.node_mut(&button) {
                        if node.hidden && !exhausted {
                            node.hidden = false;
                            report.show_nodes.push(button);
                        }
                    }
                }
            }
        }

        let (_, hidden) = self.refresh_remove_buttons(&group);
        report.remove_buttons_to_hide = hidden;
        Ok(report)
    }

    // ========================================================================
    // Sources
    // ========================================================================

    /// Switch the source of a sourced field (or of the pair `key` belongs
    /// to). Entering a state clears the value of the state being left.
    pub fn change_source(&mut self, key: &NodeKey, source: Source) -> Result<ActionReport, MutationError> {
        self.editable(key)?;
        if self.in_hidden_branch(key) {
            return Err(MutationError::HiddenNode(key.clone()));
        }
        let real = key.real();
        let unknown = || MutationError::UnknownSource {
            key: key.clone(),
            requested: source.clone(),
        };
        let node = self.nodes.get(&real).ok_or_else(unknown)?;
        let state = node.source_state.clone().ok_or_else(unknown)?;
        if !node.sources.contains(&source) {
            return Err(unknown());
        }
        let current = state.source();
        if current == source {
            return Ok(ActionReport::default());
        }

        let mut report = ActionReport::default();
        let twin = real.twin().filter(|t| self.nodes.contains_key(t));

        // The side being left loses its value.
        match (&current, &twin) {
            (Source::Manual, Some(twin)) => {
                self.clear_fields(twin, &mut report);
                report.hide_nodes.push(twin.clone());
                report.show_nodes.push(real.clone());
            }
            (_, Some(twin)) if source == Source::Manual => {
                self.clear_fields(&real, &mut report);
                report.hide_nodes.push(real.clone());
                report.show_nodes.push(twin.clone());
            }
            _ => self.clear_fields(&real, &mut report),
        }

        if let Some(node) = self.node_mut(&real) {
            if current == Source::Unlisted {
                node.sources.retain(|s| *s != Source::Unlisted);
            }
            node.source_state = Some(SourceState::from_source(source.clone()));
        }
        push_unique(&mut report.refresh_source_menu, real.clone());
        if let Some(twin) = twin {
            push_unique(&mut report.refresh_source_menu, twin);
        }
        if source.has_concepts() {
            report.concepts_list_to_refresh.push(real);
        }
        Ok(report)
    }

    /// Empty the field `key`, or every field below it.
    fn clear_fields(&mut self, key: &NodeKey, report: &mut ActionReport) {
        let mut targets: Vec<NodeKey> = self
            .descendants(key)
            .filter(|(_, n)| n.kind == ObjectKind::Field)
            .map(|(k, _)| k.clone())
            .collect();
        targets.insert(0, key.clone());
        for k in targets {
            if let Some(node) = self.node_mut(&k) {
                if node.kind == ObjectKind::Field && node.value.take().is_some() {
                    report.empty_nodes.push(k);
                }
            }
        }
    }

    // ========================================================================
    // Languages and values
    // ========================================================================

    /// Give the field `key` another language. Inside a translation group the
    /// languages stay a partition of the group's values.
    pub fn change_language(&mut self, key: &NodeKey, language: &str) -> Result<ActionReport, MutationError> {
        self.editable(key)?;
        if self.in_hidden_branch(key) {
            return Err(MutationError::HiddenNode(key.clone()));
        }
        let taggable = self.entry_for(key).is_some_and(|e| e.language_taggable);
        let node = &self.nodes[key];
        if node.kind != ObjectKind::Field || !taggable {
            return Err(MutationError::NotLanguageTaggable(key.clone()));
        }
        if node.language.as_deref() == Some(language) {
            return Ok(ActionReport::default());
        }
        let authorized = node
            .authorized_languages
            .as_ref()
            .is_some_and(|langs| langs.iter().any(|l| l == language));
        if !authorized {
            return Err(MutationError::LanguageNotAuthorized {
                key: key.clone(),
                language: language.to_string(),
            });
        }

        if let Some(node) = self.node_mut(key) {
            node.language = Some(language.to_string());
        }
        let mut report = ActionReport::default();
        let group = key
            .parent()
            .filter(|g| self.get(g).is_some_and(|n| n.kind == ObjectKind::TranslationGroup));
        if let Some(group) = group {
            let (changed, flipped) = self.refresh_translation_group(&group);
            report.refresh_language_menu = changed;
            match flipped {
                Some((button, true)) => report.hide_nodes.push(button),
                Some((button, false)) => report.show_nodes.push(button),
                None => {}
            }
        }
        push_unique(&mut report.refresh_language_menu, key.clone());
        Ok(report)
    }

    /// Write (or clear, with `None` or an empty string) the value of a field.
    /// A hidden field can only be cleared.
    pub fn update_value(&mut self, key: &NodeKey, value: Option<&str>) -> Result<ActionReport, MutationError> {
        self.editable(key)?;
        if self.nodes[key].kind != ObjectKind::Field {
            return Err(MutationError::NotAField(key.clone()));
        }
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        if value.is_some() && (self.is_hidden(key) || self.is_hidden_manual(key)) {
            return Err(MutationError::HiddenNode(key.clone()));
        }
        if let Some(node) = self.node_mut(key) {
            node.value = value;
        }
        Ok(ActionReport::default())
    }

    /// Give the described resource another IRI.
    pub fn replace_identifier(&mut self, iri: &str) -> Result<ActionReport, MutationError> {
        if self.mode() == Mode::Read {
            return Err(MutationError::ReadOnlyMode);
        }
        let old = std::mem::replace(&mut self.subject, Node::iri(iri));
        for node in self.nodes.values_mut() {
            if node.subject.as_ref() == Some(&old) {
                node.subject = Some(self.subject.clone());
            }
        }
        Ok(ActionReport {
            refresh_values: sync_identifier(self),
            ..ActionReport::default()
        })
    }
}
