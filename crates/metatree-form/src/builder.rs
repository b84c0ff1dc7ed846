//! Tree Builder: projects a metagraph onto the resolved schema.
//!
//! Presentation order comes from the schema and template only; the order of
//! triples in the metagraph never leaks into it. Values the schema cannot
//! place (wrong node kind) are dropped with a warning and the build goes on.

use metatree_rdf::namespace::{DCAT_DATASET, DCT_IDENTIFIER, RDF_TYPE};
use metatree_rdf::skos::{label_of_concept, pick_translation};
use metatree_rdf::{metagraph_from_description, GraphRead, Literal, Node, Term};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::config::{BuildOptions, Mode};
use crate::error::BuildError;
use crate::key::NodeKey;
use crate::model::FormModel;
use crate::node::{FormNode, ObjectKind, Source, SourceState};
use crate::schema::{resolve, CategoryPath, FieldKind, NodeKind, SchemaEntry};
use crate::template::Template;

const UUID_SCHEME: &str = "urn:uuid:";

/// Build the form model of `metagraph`.
pub fn build(
    metagraph: &dyn GraphRead,
    schema: &dyn GraphRead,
    vocabulary: &dyn GraphRead,
    template: Option<&Template>,
    options: &BuildOptions,
) -> Result<FormModel, BuildError> {
    options.validate()?;
    let resolved = resolve(schema, vocabulary, template, options)?;

    let described = described_resource(metagraph);
    let subject = match &described {
        Some(node) if options.preserve_identifier => node.clone(),
        _ => mint_identifier(),
    };

    let mut model = FormModel::new(resolved, options.clone(), subject);
    model.blank_labels = metagraph
        .triples()
        .flat_map(|t| [Some(&t.subject), t.object.as_node()])
        .flatten()
        .filter_map(|n| match n {
            Node::Blank(label) => Some(label.clone()),
            Node::Iri(_) => None,
        })
        .collect();

    let fresh = metagraph.triples().next().is_none();
    let mut placer = Placer::new(Some(metagraph), Some(vocabulary));
    placer.populate(&mut model, described.as_ref(), fresh);

    prune_ghosts(&mut model);
    compact_rows(&mut model);
    sync_identifier(&mut model);

    tracing::debug!(
        nodes = model.len(),
        subject = %model.subject,
        mode = ?model.mode(),
        "form model built"
    );
    Ok(model)
}

/// Build from free text carrying a `<METADATA>` JSON-LD block.
pub fn build_from_description(
    description: &str,
    schema: &dyn GraphRead,
    vocabulary: &dyn GraphRead,
    template: Option<&Template>,
    options: &BuildOptions,
) -> Result<FormModel, BuildError> {
    let metagraph = metagraph_from_description(description)?;
    build(&metagraph, schema, vocabulary, template, options)
}

/// The subject typed `dcat:Dataset`, else a subject that is no one's object.
fn described_resource(metagraph: &dyn GraphRead) -> Option<Node> {
    if let Some(node) = metagraph
        .subjects(RDF_TYPE, &Term::iri(DCAT_DATASET))
        .into_iter()
        .next()
    {
        return Some(node.clone());
    }
    let objects: BTreeSet<&Node> = metagraph
        .triples()
        .filter_map(|t| t.object.as_node())
        .collect();
    metagraph
        .triples()
        .map(|t| &t.subject)
        .find(|s| !objects.contains(s))
        .cloned()
}

pub(crate) fn mint_identifier() -> Node {
    Node::iri(format!("{UUID_SCHEME}{}", Uuid::new_v4()))
}

/// Write the UUID of the described resource into its `dct:identifier`
/// fields. Returns the fields that changed.
pub(crate) fn sync_identifier(model: &mut FormModel) -> Vec<NodeKey> {
    let Some(uuid) = model
        .subject
        .as_iri()
        .and_then(|iri| iri.strip_prefix(UUID_SCHEME))
        .map(str::to_string)
    else {
        return Vec::new();
    };
    let path = CategoryPath::single(DCT_IDENTIFIER);
    let mut changed = Vec::new();
    for (key, node) in model.nodes.iter_mut() {
        if node.kind == ObjectKind::Field
            && node.path.as_ref() == Some(&path)
            && node.value.as_deref() != Some(uuid.as_str())
        {
            node.value = Some(uuid.clone());
            changed.push(key.clone());
        }
    }
    changed
}

// ============================================================================
// Placement
// ============================================================================

/// How one value is laid out in its container.
#[derive(Debug, Clone, Default)]
pub(crate) struct ValueSlot {
    /// Carries the category label (false inside repeat/translation groups).
    pub labelled: bool,
    /// The branch is new: nested categories receive their defaults.
    pub fresh: bool,
    /// This very value receives the default.
    pub with_default: bool,
    /// Language of a new language-tagged value.
    pub language: Option<String>,
    /// The value belongs to a repeat or translation group.
    pub in_group: bool,
}

/// Creates nodes below a container, tracking the next free row of every
/// container it touched. Used by the builder and by `add`.
pub(crate) struct Placer<'g> {
    metagraph: Option<&'g dyn GraphRead>,
    vocabulary: Option<&'g dyn GraphRead>,
    cursors: BTreeMap<NodeKey, usize>,
    pub(crate) new_keys: Vec<NodeKey>,
    other_tab: Option<NodeKey>,
}

impl<'g> Placer<'g> {
    pub(crate) fn new(
        metagraph: Option<&'g dyn GraphRead>,
        vocabulary: Option<&'g dyn GraphRead>,
    ) -> Self {
        Self {
            metagraph,
            vocabulary,
            cursors: BTreeMap::new(),
            new_keys: Vec::new(),
            other_tab: None,
        }
    }

    /// A placer for empty values, without data or vocabulary.
    pub(crate) fn detached() -> Self {
        Self::new(None, None)
    }

    pub(crate) fn set_cursor(&mut self, container: &NodeKey, row: usize) {
        self.cursors.insert(container.clone(), row);
    }

    pub(crate) fn cursor(&self, container: &NodeKey) -> Option<usize> {
        self.cursors.get(container).copied()
    }

    fn insert(&mut self, model: &mut FormModel, key: NodeKey, node: FormNode) {
        self.new_keys.push(key.clone());
        model.insert(key, node);
    }

    fn claim(&mut self, model: &FormModel, container: &NodeKey, node: &mut FormNode, label_row: bool) {
        let cursor = self.cursors.entry(container.clone()).or_insert_with(|| {
            model
                .get(container)
                .map(FormNode::first_child_row)
                .unwrap_or_default()
        });
        if label_row {
            node.label_row = Some(*cursor);
            node.row = *cursor + 1;
        } else {
            node.label_row = None;
            node.row = *cursor;
        }
        *cursor = node.row + node.row_span.max(1);
    }

    // ------------------------------------------------------------------------
    // Root, tabs and top-level categories
    // ------------------------------------------------------------------------

    fn populate(&mut self, model: &mut FormModel, data: Option<&Node>, fresh: bool) {
        let root = NodeKey::root();
        let mut root_node = FormNode::new(ObjectKind::Root);
        root_node.subject = Some(model.subject.clone());
        self.insert(model, root.clone(), root_node);

        let mut tabs: Vec<(String, NodeKey)> = Vec::new();
        for name in model.schema.tabs.clone() {
            if let Some(key) = self.open_tab(model, &name) {
                tabs.push((name, key));
            }
        }
        let Some((_, first_tab)) = tabs.first().cloned() else {
            return;
        };

        let edit = model.mode() == Mode::Edit;
        let entries = model.schema.entries.clone();
        for entry in &entries {
            let unlisted = model.schema.template_present && !entry.in_template;
            let tab = if unlisted {
                if !edit && model.options.read_hide_unlisted {
                    continue;
                }
                match self.other_tab(model) {
                    Some(key) => key,
                    None => continue,
                }
            } else {
                entry
                    .tab
                    .as_ref()
                    .and_then(|t| tabs.iter().find(|(name, _)| name == t))
                    .map(|(_, key)| key.clone())
                    .unwrap_or_else(|| first_tab.clone())
            };
            self.place_category(model, &tab, entry, data, fresh);
        }

        if let Some(subject) = data {
            self.place_unknown_predicates(model, subject, &entries);
        }
    }

    fn open_tab(&mut self, model: &mut FormModel, name: &str) -> Option<NodeKey> {
        let root = NodeKey::root();
        let key = model.next_child_key(&root)?;
        let mut node = FormNode::new(ObjectKind::Tab);
        node.label = Some(name.to_string());
        node.subject = Some(model.subject.clone());
        self.claim(model, &root, &mut node, false);
        self.insert(model, key.clone(), node);
        Some(key)
    }

    fn other_tab(&mut self, model: &mut FormModel) -> Option<NodeKey> {
        if self.other_tab.is_none() {
            let name = model.options.other_tab.clone();
            self.other_tab = self.open_tab(model, &name);
        }
        self.other_tab.clone()
    }

    /// Predicates of the described resource that neither schema nor template
    /// knows go to the extra tab, so that saving loses nothing.
    fn place_unknown_predicates(&mut self, model: &mut FormModel, subject: &Node, entries: &[SchemaEntry]) {
        let Some(graph) = self.metagraph else {
            return;
        };
        if model.mode() == Mode::Read && model.options.read_hide_unlisted {
            return;
        }
        let known: BTreeSet<&str> = entries.iter().map(SchemaEntry::predicate).collect();
        let mut unknown: BTreeMap<&str, &Term> = BTreeMap::new();
        for (predicate, object) in graph.predicate_objects(subject) {
            if predicate != RDF_TYPE && !known.contains(predicate) {
                unknown.entry(predicate).or_insert(object);
            }
        }
        for (predicate, object) in unknown {
            let entry = SchemaEntry::unlisted(predicate, object, &model.schema.prefixes);
            model.schema.extra.push(entry.clone());
            if let Some(tab) = self.other_tab(model) {
                self.place_category(model, &tab, &entry, Some(subject), false);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------------

    /// Values of `entry` on `subject`; terms of the wrong kind are dropped.
    fn values(&self, subject: Option<&Node>, entry: &SchemaEntry) -> Vec<Term> {
        let (Some(graph), Some(subject)) = (self.metagraph, subject) else {
            return Vec::new();
        };
        graph
            .objects(subject, entry.predicate())
            .into_iter()
            .filter(|term| {
                let fits = matches!(
                    (entry.node_kind, term),
                    (NodeKind::Literal, Term::Literal(_))
                        | (NodeKind::Iri, Term::Node(Node::Iri(_)))
                        | (NodeKind::BlankNode | NodeKind::BlankNodeOrIri, Term::Node(_))
                );
                if !fits {
                    tracing::warn!(
                        subject = %subject,
                        predicate = %entry.predicate(),
                        object = %term,
                        "dropping value of the wrong kind"
                    );
                }
                fits
            })
            .cloned()
            .collect()
    }

    pub(crate) fn place_category(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        subject: Option<&Node>,
        fresh: bool,
    ) {
        let edit = model.mode() == Mode::Edit;
        let mut values = self.values(subject, entry);

        if edit {
            if values.is_empty() && !entry.in_template && !entry.mandatory {
                return;
            }
        } else {
            if model.options.read_only_current_language && entry.language_taggable {
                values = current_translation(values, model.language());
            }
            if values.is_empty() && model.options.read_hide_blank {
                return;
            }
            if model.options.read_hide_unlisted && model.schema.template_present && !entry.in_template {
                return;
            }
        }

        let with_default = edit && fresh && values.is_empty();
        let translated = edit
            && model.translation()
            && entry.language_taggable
            && entry.unique_lang
            && distinct_languages(&values);

        if translated {
            self.place_translation_group(model, container, entry, &values, fresh);
        } else if (edit && entry.repeatable) || values.len() > 1 {
            self.place_repeat_group(model, container, entry, &values, fresh, with_default);
        } else {
            let slot = ValueSlot {
                labelled: true,
                fresh,
                with_default,
                language: None,
                in_group: false,
            };
            self.place_value(model, container, entry, values.first(), &slot);
        }
    }

    fn open_group(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        kind: ObjectKind,
    ) -> Option<NodeKey> {
        let key = model.next_child_key(container)?;
        let mut node = FormNode::new(kind);
        node.path = Some(entry.path.clone());
        node.label = Some(entry.label.clone());
        node.help = entry.help.clone();
        node.mandatory = entry.mandatory;
        self.claim(model, container, &mut node, false);
        self.insert(model, key.clone(), node);
        Some(key)
    }

    fn place_button(
        &mut self,
        model: &mut FormModel,
        group: &NodeKey,
        entry: &SchemaEntry,
        kind: ObjectKind,
        hidden: bool,
    ) -> Option<NodeKey> {
        let key = model.next_child_key(group)?;
        let mut node = FormNode::new(kind);
        node.path = Some(entry.path.clone());
        node.hidden = hidden;
        self.claim(model, group, &mut node, false);
        self.insert(model, key.clone(), node);
        Some(key)
    }

    fn place_repeat_group(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        values: &[Term],
        fresh: bool,
        with_default: bool,
    ) {
        let Some(group) = self.open_group(model, container, entry, ObjectKind::RepeatGroup) else {
            return;
        };
        let edit = model.mode() == Mode::Edit;
        let slot = ValueSlot {
            labelled: false,
            fresh,
            with_default,
            language: None,
            in_group: edit,
        };
        if values.is_empty() {
            self.place_value(model, &group, entry, None, &slot);
        }
        for value in values {
            self.place_value(model, &group, entry, Some(value), &slot);
        }
        if edit {
            let count = model.value_children(&group).len();
            let hidden = entry.max_count.is_some_and(|m| count >= m as usize);
            self.place_button(model, &group, entry, ObjectKind::AddButton, hidden);
            model.refresh_remove_buttons(&group);
        }
    }

    fn place_translation_group(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        values: &[Term],
        fresh: bool,
    ) {
        for language in values.iter().filter_map(|v| v.as_literal()?.language.clone()) {
            if !model.options.languages.contains(&language) {
                model.options.languages.push(language);
            }
        }
        let Some(group) = self.open_group(model, container, entry, ObjectKind::TranslationGroup) else {
            return;
        };
        let slot = ValueSlot {
            labelled: false,
            fresh,
            with_default: fresh && values.is_empty(),
            language: Some(model.language().to_string()),
            in_group: true,
        };
        if values.is_empty() {
            self.place_value(model, &group, entry, None, &slot);
        }
        for value in values {
            self.place_value(model, &group, entry, Some(value), &slot);
        }
        self.place_button(model, &group, entry, ObjectKind::TranslationButton, false);
        model.refresh_translation_group(&group);
        model.refresh_remove_buttons(&group);
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    pub(crate) fn place_value(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        value: Option<&Term>,
        slot: &ValueSlot,
    ) -> Option<NodeKey> {
        match entry.node_kind {
            NodeKind::Literal | NodeKind::Iri => self.place_field(model, container, entry, value, slot),
            NodeKind::BlankNode => {
                let key = model.next_child_key(container)?;
                let mut node = self.group_node(entry, slot);
                self.claim(model, container, &mut node, false);
                self.fill_property_group(model, key.clone(), node, entry, value.and_then(Term::as_node), slot.fresh);
                Some(key)
            }
            NodeKind::BlankNodeOrIri => self.place_pair(model, container, entry, value, slot),
        }
    }

    fn field_node(&self, entry: &SchemaEntry, slot: &ValueSlot) -> FormNode {
        let mut node = FormNode::new(ObjectKind::Field);
        node.path = Some(entry.path.clone());
        node.label = slot.labelled.then(|| entry.label.clone());
        node.help = entry.help.clone();
        node.field_kind = Some(entry.field_kind.unwrap_or(FieldKind::SingleLine));
        node.mandatory = entry.mandatory;
        node.read_only = entry.read_only;
        node.pattern = entry.pattern.clone();
        node.placeholder = entry.placeholder.clone();
        node.has_remove_button = slot.in_group;
        node
    }

    fn group_node(&self, entry: &SchemaEntry, slot: &ValueSlot) -> FormNode {
        let mut node = FormNode::new(ObjectKind::PropertyGroup);
        node.path = Some(entry.path.clone());
        node.label = slot.labelled.then(|| entry.label.clone());
        node.help = entry.help.clone();
        node.mandatory = entry.mandatory;
        node.has_remove_button = slot.in_group;
        node
    }

    /// Widen long values to multi-line and decide on a label row.
    fn layout_field(&self, model: &FormModel, entry: &SchemaEntry, node: &mut FormNode) -> bool {
        let options = &model.options;
        if node.field_kind == Some(FieldKind::SingleLine) && entry.node_kind == NodeKind::Literal {
            if let Some(value) = &node.value {
                if value.contains('\n') || value.chars().count() > options.value_length_limit {
                    node.field_kind = Some(FieldKind::MultiLine);
                }
            }
        }
        let multi_line = node.field_kind == Some(FieldKind::MultiLine);
        node.row_span = if multi_line {
            entry.row_span.unwrap_or(options.text_row_span).max(1)
        } else {
            1
        };
        node.label
            .as_ref()
            .is_some_and(|l| multi_line || l.chars().count() > options.label_length_limit)
    }

    fn place_field(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        value: Option<&Term>,
        slot: &ValueSlot,
    ) -> Option<NodeKey> {
        let mut node = self.field_node(entry, slot);
        match entry.node_kind {
            NodeKind::Literal => {
                match value.and_then(Term::as_literal) {
                    Some(lit) => {
                        node.value = Some(lit.lexical.clone());
                        if entry.language_taggable {
                            node.language = lit.language.clone();
                        }
                    }
                    None => {
                        if slot.with_default {
                            node.value = entry.default_value.clone();
                        }
                        if entry.language_taggable {
                            node.language = Some(
                                slot.language
                                    .clone()
                                    .unwrap_or_else(|| model.language().to_string()),
                            );
                        }
                    }
                }
                if entry.language_taggable && model.translation() {
                    let mut authorized = model.languages().to_vec();
                    if let Some(own) = &node.language {
                        if !authorized.contains(own) {
                            authorized.push(own.clone());
                        }
                    }
                    node.authorized_languages = Some(authorized);
                }
            }
            _ => {
                let resolved = self.resource_value(model, entry, value.and_then(Term::as_iri), slot, false);
                node.sources = entry.real_sources();
                if resolved.state == SourceState::Active(Source::Unlisted) {
                    node.sources.push(Source::Unlisted);
                }
                node.value = resolved.value;
                node.source_state = Some(resolved.state);
            }
        }
        let label_row = self.layout_field(model, entry, &mut node);
        let key = model.next_child_key(container)?;
        self.claim(model, container, &mut node, label_row);
        self.insert(model, key.clone(), node);
        Some(key)
    }

    /// Display value and source of a stored IRI (or of an empty field).
    fn resource_value(
        &self,
        model: &FormModel,
        entry: &SchemaEntry,
        iri: Option<&str>,
        slot: &ValueSlot,
        scalar_twin: bool,
    ) -> ResolvedValue {
        let first = entry
            .real_sources()
            .into_iter()
            .next()
            .unwrap_or(Source::FreeUri);
        let Some(iri) = iri else {
            if slot.with_default && entry.default_value.is_some() {
                return ResolvedValue {
                    value: entry.default_value.clone(),
                    state: SourceState::Active(entry.default_source.clone().unwrap_or(first)),
                    manual_value: None,
                };
            }
            return ResolvedValue {
                value: None,
                state: SourceState::Active(first),
                manual_value: None,
            };
        };

        if entry.has_schemes() {
            let schemes: Vec<&str> = entry.schemes().collect();
            let found = self
                .vocabulary
                .and_then(|v| label_of_concept(v, iri, &schemes, model.language()));
            if let Some(found) = found {
                return ResolvedValue {
                    value: Some(found.label),
                    state: SourceState::Active(Source::Scheme(found.scheme)),
                    manual_value: None,
                };
            }
        } else {
            let value = entry
                .transform
                .map(|t| t.strip(iri))
                .unwrap_or_else(|| iri.to_string());
            return ResolvedValue {
                value: Some(value),
                state: SourceState::Active(Source::FreeUri),
                manual_value: None,
            };
        }

        if scalar_twin {
            ResolvedValue {
                value: None,
                state: SourceState::Manual,
                manual_value: Some(iri.to_string()),
            }
        } else {
            tracing::debug!(path = %entry.path.render(&model.schema.prefixes), iri = %iri, "value matches no configured vocabulary");
            ResolvedValue {
                value: Some(iri.to_string()),
                state: SourceState::Active(Source::Unlisted),
                manual_value: None,
            }
        }
    }

    /// A real field and its manual twin, sharing one slot.
    fn place_pair(
        &mut self,
        model: &mut FormModel,
        container: &NodeKey,
        entry: &SchemaEntry,
        value: Option<&Term>,
        slot: &ValueSlot,
    ) -> Option<NodeKey> {
        let group_twin = entry.manual_is_group();
        let mut real = self.field_node(entry, slot);
        real.sources = entry.sources.clone();

        let mut manual_subject: Option<&Node> = None;
        let resolved = match value {
            Some(Term::Node(Node::Blank(_))) if group_twin => {
                manual_subject = value.and_then(Term::as_node);
                ResolvedValue {
                    value: None,
                    state: SourceState::Manual,
                    manual_value: None,
                }
            }
            Some(Term::Node(Node::Blank(label))) => {
                tracing::warn!(path = %entry.path.render(&model.schema.prefixes), blank = %label, "nested resource where only an IRI can be entered");
                self.resource_value(model, entry, None, slot, true)
            }
            _ => self.resource_value(model, entry, value.and_then(Term::as_iri), slot, !group_twin),
        };
        if resolved.state == SourceState::Active(Source::Unlisted) {
            let at = real
                .sources
                .iter()
                .position(|s| *s == Source::Manual)
                .unwrap_or(real.sources.len());
            real.sources.insert(at, Source::Unlisted);
        }
        real.value = resolved.value;
        real.source_state = Some(resolved.state);

        let label_row = self.layout_field(model, entry, &mut real);
        let key = model.next_child_key(container)?;
        self.claim(model, container, &mut real, label_row);
        let (row, row_span, label_row) = (real.row, real.row_span, real.label_row);
        self.insert(model, key.clone(), real);

        let twin_key = key.twin()?;
        let mut twin = if group_twin {
            self.group_node(entry, slot)
        } else {
            let mut node = self.field_node(entry, slot);
            node.field_kind = Some(FieldKind::SingleLine);
            node.value = resolved.manual_value;
            node
        };
        twin.row = row;
        twin.row_span = row_span;
        twin.label_row = label_row;
        if group_twin {
            let fresh = slot.fresh || manual_subject.is_none();
            self.fill_property_group(model, twin_key, twin, entry, manual_subject, fresh);
        } else {
            self.insert(model, twin_key, twin);
        }
        Some(key)
    }

    /// Copy the shape of `source` (with its twin) as a new child of
    /// `container`: values emptied, sources reset, fresh blank subjects.
    /// Inside value groups only the first value is copied.
    pub(crate) fn place_empty_copy(
        &mut self,
        model: &mut FormModel,
        source: &NodeKey,
        container: &NodeKey,
    ) -> Option<NodeKey> {
        let original = model.get(source)?.clone();
        let key = model.next_child_key(container)?;
        let mut node = self.emptied(model, &original);
        self.claim(model, container, &mut node, original.label_row.is_some());
        let (row, row_span, label_row) = (node.row, node.row_span, node.label_row);
        self.insert(model, key.clone(), node);
        self.copy_children(model, source, &key);

        if let (Some(source_twin), Some(twin_key)) = (source.twin(), key.twin()) {
            if let Some(twin) = model.get(&source_twin).cloned() {
                let mut twin = self.emptied(model, &twin);
                twin.row = row;
                twin.row_span = row_span;
                twin.label_row = label_row;
                self.insert(model, twin_key.clone(), twin);
                self.copy_children(model, &source_twin, &twin_key);
            }
        }
        Some(key)
    }

    fn copy_children(&mut self, model: &mut FormModel, source: &NodeKey, target: &NodeKey) {
        let Some(kind) = model.get(target).map(|n| n.kind) else {
            return;
        };
        let mut children: Vec<(usize, NodeKey)> = model
            .children(source)
            .into_iter()
            .filter(|k| !k.is_manual())
            .filter_map(|k| Some((model.get(k)?.top_row(), k.clone())))
            .collect();
        children.sort();

        let mut copied_value = false;
        for (_, child) in children {
            let is_button = model.get(&child).is_some_and(|n| n.kind.is_button());
            if kind.is_value_group() && !is_button {
                if copied_value {
                    continue;
                }
                copied_value = true;
            }
            self.place_empty_copy(model, &child, target);
        }

        match kind {
            ObjectKind::TranslationGroup => {
                model.refresh_translation_group(target);
            }
            ObjectKind::RepeatGroup => {
                if let Some(button) = model.button_of(target) {
                    let full = model
                        .entry_for(&button)
                        .and_then(|e| e.max_count)
                        .is_some_and(|m| m <= 1);
                    if let Some(node) = model.node_mut(&button) {
                        node.hidden = full;
                    }
                }
            }
            _ => {}
        }
        if kind.is_value_group() {
            model.refresh_remove_buttons(target);
        }
    }

    fn emptied(&self, model: &mut FormModel, original: &FormNode) -> FormNode {
        let mut node = original.clone();
        node.next_child = 0;
        node.value = None;
        if node.kind.is_button() {
            node.hidden = false;
        }
        if node.language.is_some() {
            node.language = Some(model.language().to_string());
        }
        if node.authorized_languages.is_some() {
            let mut authorized = model.languages().to_vec();
            if let Some(own) = &node.language {
                if !authorized.contains(own) {
                    authorized.push(own.clone());
                }
            }
            node.authorized_languages = Some(authorized);
        }
        if node.source_state.is_some() {
            node.sources.retain(|s| *s != Source::Unlisted);
            let first = node
                .sources
                .iter()
                .find(|s| **s != Source::Manual)
                .cloned()
                .unwrap_or(Source::FreeUri);
            node.source_state = Some(SourceState::Active(first));
        }
        if node.kind == ObjectKind::PropertyGroup {
            node.subject = Some(model.fresh_blank());
        }
        node
    }

    /// Insert a property group and place the categories of its resource.
    fn fill_property_group(
        &mut self,
        model: &mut FormModel,
        key: NodeKey,
        mut node: FormNode,
        entry: &SchemaEntry,
        subject: Option<&Node>,
        fresh: bool,
    ) {
        node.subject = Some(match subject {
            Some(subject) => subject.clone(),
            None => model.fresh_blank(),
        });
        self.insert(model, key.clone(), node);
        let fresh = fresh || subject.is_none();
        for child in &entry.children {
            self.place_category(model, &key, child, subject, fresh);
        }
    }
}

struct ResolvedValue {
    value: Option<String>,
    state: SourceState,
    /// IRI for the scalar manual twin.
    manual_value: Option<String>,
}

fn distinct_languages(values: &[Term]) -> bool {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .all(|v| seen.insert(v.as_literal().and_then(|l| l.language.clone())))
}

/// Keep only the values in the language `pick_translation` settles on.
fn current_translation(values: Vec<Term>, language: &str) -> Vec<Term> {
    let literals: Vec<&Literal> = values.iter().filter_map(Term::as_literal).collect();
    let Some(chosen) = pick_translation(&literals, language).map(|l| l.language.clone()) else {
        return values;
    };
    values
        .into_iter()
        .filter(|v| v.as_literal().map_or(true, |l| l.language == chosen))
        .collect()
}

// ============================================================================
// Post-passes
// ============================================================================

/// Remove containers with no field below them, tabs included. A pruned
/// manual twin takes manual entry out of its real counterpart's sources.
fn prune_ghosts(model: &mut FormModel) {
    let containers: Vec<NodeKey> = model
        .nodes
        .iter()
        .filter(|(k, n)| n.kind.is_container() && !k.is_root())
        .map(|(k, _)| k.clone())
        .collect();
    for key in containers.into_iter().rev() {
        if !model.contains(&key) {
            continue;
        }
        if model.descendants(&key).any(|(_, n)| n.kind == ObjectKind::Field) {
            continue;
        }
        let removed = model.remove_subtree(&key);
        tracing::debug!(key = %key, removed = removed.len(), "pruned container without fields");
        if key.is_manual() {
            release_manual(model, &key.real());
        }
    }
}

fn release_manual(model: &mut FormModel, real: &NodeKey) {
    let Some(node) = model.node_mut(real) else {
        return;
    };
    node.sources.retain(|s| *s != Source::Manual);
    if node.source_state == Some(SourceState::Manual) {
        let first = node.sources.first().cloned().unwrap_or(Source::FreeUri);
        node.source_state = Some(SourceState::Active(first));
    }
}

/// Renumber the rows of every container from its first free row, in row
/// order, giving each twin the slot of its real counterpart.
fn compact_rows(model: &mut FormModel) {
    let containers: Vec<NodeKey> = model
        .nodes
        .iter()
        .filter(|(_, n)| n.kind.is_container())
        .map(|(k, _)| k.clone())
        .collect();
    for container in containers {
        let Some(first) = model.get(&container).map(FormNode::first_child_row) else {
            continue;
        };
        let mut children: Vec<(usize, NodeKey)> = model
            .children(&container)
            .into_iter()
            .filter(|k| !k.is_manual() || !model.contains(&k.real()))
            .filter_map(|k| Some((model.get(k)?.top_row(), k.clone())))
            .collect();
        children.sort();

        let mut cursor = first;
        for (_, key) in children {
            let Some(node) = model.node_mut(&key) else {
                continue;
            };
            if node.label_row.is_some() {
                node.label_row = Some(cursor);
                node.row = cursor + 1;
            } else {
                node.row = cursor;
            }
            cursor = node.bottom_row();
            let (row, row_span, label_row) = (node.row, node.row_span, node.label_row);
            if let Some(twin) = key.twin().filter(|_| !key.is_manual()) {
                if let Some(twin) = model.node_mut(&twin) {
                    twin.row = row;
                    twin.row_span = row_span;
                    twin.label_row = label_row;
                }
            }
        }
    }
}
