//! Schema resolution.
//!
//! Reads the SHACL-like shape graph describing which categories a dataset
//! record may carry, layers the user template on top, and checks the
//! controlled-vocabulary sources against the SKOS graph. The result is one
//! [`SchemaEntry`] per category, nested along `sh:node`-style class links, in
//! presentation order.
//!
//! Shape predicates read here:
//! - `sh:path`, `sh:name`, `sh:description`, `sh:order`, `sh:nodeKind`,
//!   `sh:class`, `sh:datatype`, `sh:minCount`, `sh:maxCount`, `sh:uniqueLang`,
//!   `sh:pattern`, `sh:flags`, `sh:defaultValue`,
//! - presentation hints `snum:widget`, `snum:placeholder`, `snum:rowSpan`,
//!   `snum:transform`, and `snum:ontology` (one per admissible concept scheme).
//!
//! A template may tighten a schema category (make it mandatory or read-only)
//! but never loosen it, and cannot change its cardinality or datatype.

use metatree_rdf::namespace::{
    PrefixMap, DCAT_DATASET, RDF_LANG_STRING, SH, SNUM, XSD_BOOLEAN, XSD_DATE, XSD_DATE_TIME,
    XSD_STRING, XSD_TIME,
};
use metatree_rdf::skos::{has_concepts, label_of_concept, pick_translation, scheme_label};
use metatree_rdf::{local_name, GraphRead, Literal, Node, Term};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::BuildOptions;
use crate::error::TemplateError;
use crate::node::Source;
use crate::template::{Template, TemplateRecord, PATH_SEPARATOR};

/// Sort key of categories without any order number.
pub const UNORDERED: i64 = 9999;

// ============================================================================
// Category vocabulary
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A literal value.
    Literal,
    /// An identified resource (IRI).
    Iri,
    /// A nested resource described by its own properties.
    BlankNode,
    /// An IRI, or a nested resource entered by hand.
    BlankNodeOrIri,
}

impl NodeKind {
    fn from_iri(iri: &str) -> Option<Self> {
        match iri.strip_prefix(SH)? {
            "Literal" => Some(NodeKind::Literal),
            "IRI" => Some(NodeKind::Iri),
            "BlankNode" => Some(NodeKind::BlankNode),
            "BlankNodeOrIRI" => Some(NodeKind::BlankNodeOrIri),
            _ => None,
        }
    }

    pub fn is_resource(self) -> bool {
        !matches!(self, NodeKind::Literal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    SingleLine,
    MultiLine,
    ChoiceList,
    Checkbox,
    Date,
    DateTime,
    Time,
}

impl FieldKind {
    /// Widget hints as found in shape graphs.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "QLineEdit" | "single_line" => Some(FieldKind::SingleLine),
            "QTextEdit" | "multi_line" => Some(FieldKind::MultiLine),
            "QComboBox" | "choice_list" => Some(FieldKind::ChoiceList),
            "QCheckBox" | "checkbox" => Some(FieldKind::Checkbox),
            "QDateEdit" | "date" => Some(FieldKind::Date),
            "QDateTimeEdit" | "date_time" => Some(FieldKind::DateTime),
            "QTimeEdit" | "time" => Some(FieldKind::Time),
            _ => None,
        }
    }

    fn for_datatype(datatype: &str) -> Self {
        match datatype {
            XSD_BOOLEAN => FieldKind::Checkbox,
            XSD_DATE => FieldKind::Date,
            XSD_DATE_TIME => FieldKind::DateTime,
            XSD_TIME => FieldKind::Time,
            _ => FieldKind::SingleLine,
        }
    }
}

/// Value rewriting between stored IRIs and what the user types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// `mailto:` IRIs shown as bare addresses.
    Email,
    /// `tel:` IRIs shown as bare numbers.
    Phone,
}

impl Transform {
    fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "email" => Some(Transform::Email),
            "phone" => Some(Transform::Phone),
            _ => None,
        }
    }

    fn scheme(self) -> &'static str {
        match self {
            Transform::Email => "mailto:",
            Transform::Phone => "tel:",
        }
    }

    /// Stored IRI → displayed value.
    pub fn strip(self, iri: &str) -> String {
        iri.strip_prefix(self.scheme()).unwrap_or(iri).to_string()
    }

    /// Displayed value → IRI.
    pub fn apply(self, value: &str) -> String {
        let value = value.trim();
        if value.starts_with(self.scheme()) {
            return value.to_string();
        }
        match self {
            Transform::Email => format!("mailto:{value}"),
            Transform::Phone => {
                let digits: String = value
                    .chars()
                    .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
                    .collect();
                format!("tel:{digits}")
            }
        }
    }
}

/// Sequence of predicate IRIs leading from the described resource to a
/// category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    pub fn new(predicates: Vec<String>) -> Self {
        Self(predicates)
    }

    pub fn single(predicate: impl Into<String>) -> Self {
        Self(vec![predicate.into()])
    }

    pub fn join(&self, predicate: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(predicate.into());
        Self(steps)
    }

    pub fn predicates(&self) -> &[String] {
        &self.0
    }

    pub fn predicate(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<CategoryPath> {
        let (_, init) = self.0.split_last()?;
        (!init.is_empty()).then(|| Self(init.to_vec()))
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// `dcat:contactPoint / vcard:fn`.
    pub fn render(&self, prefixes: &PrefixMap) -> String {
        self.0
            .iter()
            .map(|p| prefixes.compact(p))
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    /// Inverse of [`CategoryPath::render`]; segments are `prefix:local` or
    /// `<iri>`.
    pub fn parse(text: &str, prefixes: &PrefixMap) -> Option<Self> {
        let steps = text
            .split(PATH_SEPARATOR)
            .map(|segment| {
                let segment = segment.trim();
                match segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                    Some(iri) if !iri.is_empty() => Some(iri.to_string()),
                    Some(_) => None,
                    None => prefixes.expand(segment),
                }
            })
            .collect::<Option<Vec<_>>>()?;
        (!steps.is_empty()).then_some(Self(steps))
    }
}

// ============================================================================
// Resolved entries
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub path: CategoryPath,
    pub node_kind: NodeKind,
    /// `None` for nested resources, which are presented as groups.
    pub field_kind: Option<FieldKind>,
    pub label: String,
    pub help: Option<String>,
    pub placeholder: Option<String>,
    pub pattern: Option<String>,
    pub min_count: Option<u32>,
    pub max_count: Option<u32>,
    pub repeatable: bool,
    pub mandatory: bool,
    pub read_only: bool,
    /// Display text of the default value.
    pub default_value: Option<String>,
    /// Source matching the default value of a vocabulary-backed category.
    pub default_source: Option<Source>,
    pub datatype: Option<String>,
    pub language_taggable: bool,
    pub unique_lang: bool,
    pub order: Option<i64>,
    pub tab: Option<String>,
    pub row_span: Option<usize>,
    pub class: Option<String>,
    pub transform: Option<Transform>,
    /// Admissible sources, with concept-less schemes already dropped.
    pub sources: Vec<Source>,
    /// The category has a manual-entry twin.
    pub manual_entry: bool,
    /// Absent from the schema, defined by the template alone.
    pub local: bool,
    /// Listed by the template (always true without a template).
    pub in_template: bool,
    /// Properties of the nested resource.
    pub children: Vec<SchemaEntry>,
}

impl SchemaEntry {
    pub fn predicate(&self) -> &str {
        self.path.predicate()
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().filter_map(Source::scheme)
    }

    pub fn has_schemes(&self) -> bool {
        self.sources.iter().any(Source::has_concepts)
    }

    /// Manual twin holding a nested resource rather than a free IRI.
    pub fn manual_is_group(&self) -> bool {
        self.manual_entry && !self.children.is_empty()
    }

    /// Sources offered on the real half of a pair.
    pub fn real_sources(&self) -> Vec<Source> {
        self.sources
            .iter()
            .filter(|s| **s != Source::Manual)
            .cloned()
            .collect()
    }

    /// Starting source of an empty field.
    pub fn initial_source(&self) -> Option<Source> {
        self.default_source
            .clone()
            .or_else(|| self.sources.first().cloned())
    }

    fn sort_key(&self) -> (i64, &CategoryPath) {
        (self.order.unwrap_or(UNORDERED), &self.path)
    }

    /// A synthesized entry for a predicate neither schema nor template knows.
    pub fn unlisted(predicate: &str, object: &Term, prefixes: &PrefixMap) -> Self {
        let (node_kind, datatype, sources) = match object {
            Term::Literal(lit) => (NodeKind::Literal, Some(lit.datatype_iri().to_string()), vec![]),
            Term::Node(_) => (NodeKind::Iri, None, vec![Source::FreeUri]),
        };
        let language_taggable = datatype.as_deref() == Some(RDF_LANG_STRING);
        let field_kind = datatype
            .as_deref()
            .map(FieldKind::for_datatype)
            .unwrap_or(FieldKind::SingleLine);
        Self {
            path: CategoryPath::single(predicate),
            node_kind,
            field_kind: Some(field_kind),
            label: prefixes.compact(predicate),
            help: None,
            placeholder: None,
            pattern: None,
            min_count: None,
            max_count: None,
            repeatable: false,
            mandatory: false,
            read_only: false,
            default_value: None,
            default_source: None,
            datatype,
            language_taggable,
            unique_lang: false,
            order: None,
            tab: None,
            row_span: None,
            class: None,
            transform: None,
            sources,
            manual_entry: false,
            local: false,
            in_template: false,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    /// Top-level categories in presentation order.
    pub entries: Vec<SchemaEntry>,
    /// Entries added while building (unlisted predicates found in the data).
    pub extra: Vec<SchemaEntry>,
    pub tabs: Vec<String>,
    pub template_present: bool,
    pub prefixes: PrefixMap,
    /// Display label of every admissible concept scheme.
    pub scheme_labels: BTreeMap<String, String>,
}

impl ResolvedSchema {
    pub fn entry(&self, path: &CategoryPath) -> Option<&SchemaEntry> {
        fn find<'a>(entries: &'a [SchemaEntry], path: &CategoryPath) -> Option<&'a SchemaEntry> {
            entries.iter().find_map(|e| {
                if &e.path == path {
                    Some(e)
                } else if e.path.depth() < path.depth()
                    && path.predicates().starts_with(e.path.predicates())
                {
                    find(&e.children, path)
                } else {
                    None
                }
            })
        }
        find(&self.entries, path).or_else(|| find(&self.extra, path))
    }

    pub fn source_label(&self, source: &Source) -> String {
        match source {
            Source::Scheme(iri) => self
                .scheme_labels
                .get(iri)
                .cloned()
                .unwrap_or_else(|| iri.clone()),
            Source::FreeUri => "< URI >".to_string(),
            Source::Manual => "< manual >".to_string(),
            Source::Unlisted => "< unlisted >".to_string(),
        }
    }

    /// Every entry, depth-first.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaEntry> {
        let mut stack: Vec<&SchemaEntry> = self.entries.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

// ============================================================================
// Resolution
// ============================================================================

const SH_TARGET_CLASS: &str = "http://www.w3.org/ns/shacl#targetClass";
const SH_PROPERTY: &str = "http://www.w3.org/ns/shacl#property";

fn sh(local: &str) -> String {
    format!("{SH}{local}")
}

fn snum(local: &str) -> String {
    format!("{SNUM}{local}")
}

struct ShapeReader<'g> {
    shapes: &'g dyn GraphRead,
    language: &'g str,
}

impl ShapeReader<'_> {
    fn term(&self, node: &Node, local: &str, ns: fn(&str) -> String) -> Option<&Term> {
        self.shapes.object(node, &ns(local))
    }

    fn text(&self, node: &Node, local: &str, ns: fn(&str) -> String) -> Option<String> {
        let literals: Vec<&Literal> = self
            .shapes
            .objects(node, &ns(local))
            .into_iter()
            .filter_map(Term::as_literal)
            .collect();
        pick_translation(&literals, self.language).map(|l| l.lexical.clone())
    }

    fn iri(&self, node: &Node, local: &str, ns: fn(&str) -> String) -> Option<String> {
        self.term(node, local, ns)
            .and_then(Term::as_iri)
            .map(str::to_string)
    }

    fn number(&self, node: &Node, local: &str, ns: fn(&str) -> String) -> Option<i64> {
        let text = self.term(node, local, ns)?.as_literal()?.lexical.trim().to_string();
        text.parse::<i64>()
            .ok()
            .or_else(|| text.parse::<f64>().ok().map(|f| f as i64))
    }

    fn flag(&self, node: &Node, local: &str, ns: fn(&str) -> String) -> bool {
        self.term(node, local, ns)
            .and_then(Term::as_literal)
            .is_some_and(|l| matches!(l.lexical.trim(), "true" | "1"))
    }

    fn shape_for_class(&self, class: &str) -> Option<Node> {
        self.shapes
            .subjects(SH_TARGET_CLASS, &Term::iri(class))
            .into_iter()
            .next()
            .cloned()
    }

    fn property_shapes(&self, shape: &Node) -> Vec<Node> {
        self.shapes
            .objects(shape, SH_PROPERTY)
            .into_iter()
            .filter_map(Term::as_node)
            .cloned()
            .collect()
    }
}

struct Resolver<'a> {
    reader: ShapeReader<'a>,
    vocabulary: &'a dyn GraphRead,
    template: Option<&'a Template>,
    /// Template records by parsed path.
    records: BTreeMap<CategoryPath, &'a TemplateRecord>,
    prefixes: PrefixMap,
    scheme_labels: BTreeMap<String, String>,
    language: &'a str,
}

/// Resolve the schema and template into presentation-ready entries.
pub fn resolve(
    schema: &dyn GraphRead,
    vocabulary: &dyn GraphRead,
    template: Option<&Template>,
    options: &BuildOptions,
) -> Result<ResolvedSchema, TemplateError> {
    if let Some(template) = template {
        template.validate()?;
    }

    let mut prefixes = PrefixMap::default();
    for (prefix, ns) in schema.prefixes().iter() {
        prefixes.insert(prefix, ns);
    }

    let mut records = BTreeMap::new();
    if let Some(template) = template {
        for (text, record) in &template.categories {
            match CategoryPath::parse(text, &prefixes) {
                Some(path) => {
                    records.insert(path, record);
                }
                None => tracing::warn!(path = %text, "ignoring template category with unresolvable path"),
            }
        }
    }

    let mut resolver = Resolver {
        reader: ShapeReader {
            shapes: schema,
            language: &options.language,
        },
        vocabulary,
        template,
        records,
        prefixes,
        scheme_labels: BTreeMap::new(),
        language: &options.language,
    };

    let mut entries = match resolver.reader.shape_for_class(DCAT_DATASET) {
        Some(shape) => {
            let mut visited = BTreeSet::from([DCAT_DATASET.to_string()]);
            resolver.shape_entries(&shape, None, &mut visited)
        }
        None => {
            tracing::warn!("schema has no shape targeting dcat:Dataset");
            Vec::new()
        }
    };
    resolver.add_local_categories(&mut entries);
    sort_entries(&mut entries);

    let tabs = match template {
        Some(t) if !t.tabs.is_empty() => t.tabs.clone(),
        _ => vec![options.default_tab.clone()],
    };

    Ok(ResolvedSchema {
        entries,
        extra: Vec::new(),
        tabs,
        template_present: template.is_some(),
        prefixes: resolver.prefixes,
        scheme_labels: resolver.scheme_labels,
    })
}

fn sort_entries(entries: &mut [SchemaEntry]) {
    entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    for entry in entries.iter_mut() {
        sort_entries(&mut entry.children);
    }
}

impl Resolver<'_> {
    fn shape_entries(
        &mut self,
        shape: &Node,
        parent: Option<&CategoryPath>,
        visited: &mut BTreeSet<String>,
    ) -> Vec<SchemaEntry> {
        let mut out = Vec::new();
        for property in self.reader.property_shapes(shape) {
            if let Some(entry) = self.property_entry(&property, parent, visited) {
                if out.iter().any(|e: &SchemaEntry| e.path == entry.path) {
                    tracing::warn!(path = %entry.path.render(&self.prefixes), "duplicate property shape ignored");
                    continue;
                }
                out.push(entry);
            }
        }
        out
    }

    fn property_entry(
        &mut self,
        property: &Node,
        parent: Option<&CategoryPath>,
        visited: &mut BTreeSet<String>,
    ) -> Option<SchemaEntry> {
        let reader = &self.reader;
        let Some(predicate) = reader.iri(property, "path", sh) else {
            tracing::warn!(shape = %property, "property shape without a simple sh:path");
            return None;
        };
        let path = match parent {
            Some(parent) => parent.join(predicate.clone()),
            None => CategoryPath::single(predicate.clone()),
        };

        let class = reader.iri(property, "class", sh);
        let datatype = reader.iri(property, "datatype", sh);
        let node_kind = reader
            .iri(property, "nodeKind", sh)
            .and_then(|iri| NodeKind::from_iri(&iri))
            .unwrap_or(if class.is_some() {
                NodeKind::BlankNode
            } else {
                NodeKind::Literal
            });
        let min_count = reader.number(property, "minCount", sh).map(|n| n.max(0) as u32);
        let max_count = reader.number(property, "maxCount", sh).map(|n| n.max(0) as u32);
        let unique_lang = reader.flag(property, "uniqueLang", sh);
        let language_taggable = datatype.as_deref() == Some(RDF_LANG_STRING);
        let pattern = reader.text(property, "pattern", sh).map(|p| {
            match reader.text(property, "flags", sh) {
                Some(flags) if !flags.is_empty() => format!("(?{flags}){p}"),
                _ => p,
            }
        });
        let widget = reader
            .text(property, "widget", snum)
            .and_then(|w| FieldKind::from_hint(&w));
        let transform = reader
            .text(property, "transform", snum)
            .and_then(|t| Transform::from_hint(&t));
        let default_term = reader.term(property, "defaultValue", sh).cloned();
        let label = reader
            .text(property, "name", sh)
            .unwrap_or_else(|| local_name(&predicate).to_string());
        let help = reader.text(property, "description", sh);
        let placeholder = reader.text(property, "placeholder", snum);
        let row_span = reader
            .number(property, "rowSpan", snum)
            .filter(|n| *n > 0)
            .map(|n| n as usize);
        let order = reader.number(property, "order", sh);
        let ontologies: Vec<String> = reader
            .shapes
            .objects(property, &snum("ontology"))
            .into_iter()
            .filter_map(Term::as_iri)
            .map(str::to_string)
            .collect();

        let mut sources: Vec<Source> = Vec::new();
        if node_kind.is_resource() && node_kind != NodeKind::BlankNode {
            for scheme in ontologies {
                if has_concepts(self.vocabulary, &scheme) {
                    self.scheme_labels
                        .entry(scheme.clone())
                        .or_insert_with(|| scheme_label(self.vocabulary, &scheme, self.language));
                    sources.push(Source::Scheme(scheme));
                } else {
                    tracing::warn!(scheme = %scheme, path = %path.render(&self.prefixes), "dropping concept scheme without concepts");
                }
            }
            if sources.is_empty() {
                sources.push(Source::FreeUri);
            }
            if node_kind == NodeKind::BlankNodeOrIri {
                sources.push(Source::Manual);
            }
        }

        let children = match (&class, node_kind) {
            (Some(class), NodeKind::BlankNode | NodeKind::BlankNodeOrIri) => {
                if visited.insert(class.clone()) {
                    let children = match self.reader.shape_for_class(class) {
                        Some(shape) => self.shape_entries(&shape, Some(&path), visited),
                        None => Vec::new(),
                    };
                    visited.remove(class);
                    children
                } else {
                    tracing::warn!(class = %class, "recursive shape reference cut");
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };

        let has_schemes = sources.iter().any(Source::has_concepts);
        let field_kind = match node_kind {
            NodeKind::BlankNode => None,
            NodeKind::Iri | NodeKind::BlankNodeOrIri if has_schemes => Some(FieldKind::ChoiceList),
            NodeKind::Iri | NodeKind::BlankNodeOrIri => Some(FieldKind::SingleLine),
            NodeKind::Literal => Some(
                widget
                    .filter(|w| *w != FieldKind::ChoiceList)
                    .unwrap_or_else(|| FieldKind::for_datatype(datatype.as_deref().unwrap_or(XSD_STRING))),
            ),
        };

        let repeatable = max_count.map_or(true, |m| m > 1) && !(unique_lang && language_taggable);
        let mut entry = SchemaEntry {
            path,
            node_kind,
            field_kind,
            label,
            help,
            placeholder,
            pattern,
            min_count,
            max_count,
            repeatable,
            mandatory: min_count.is_some_and(|m| m >= 1),
            read_only: false,
            default_value: None,
            default_source: None,
            datatype,
            language_taggable,
            unique_lang,
            order,
            tab: None,
            row_span,
            class,
            transform,
            sources,
            manual_entry: node_kind == NodeKind::BlankNodeOrIri,
            local: false,
            in_template: self.template.is_none(),
            children,
        };
        self.set_default(&mut entry, default_term.as_ref());
        self.apply_template(&mut entry);
        Some(entry)
    }

    fn set_default(&self, entry: &mut SchemaEntry, term: Option<&Term>) {
        let Some(term) = term else {
            return;
        };
        match term {
            Term::Node(Node::Iri(iri)) if entry.has_schemes() => {
                let schemes: Vec<&str> = entry.schemes().collect();
                if let Some(found) = label_of_concept(self.vocabulary, iri, &schemes, self.language) {
                    entry.default_value = Some(found.label);
                    entry.default_source = Some(Source::Scheme(found.scheme));
                }
            }
            Term::Node(Node::Iri(iri)) => {
                entry.default_value = Some(
                    entry
                        .transform
                        .map(|t| t.strip(iri))
                        .unwrap_or_else(|| iri.clone()),
                );
            }
            Term::Literal(lit) => entry.default_value = Some(lit.lexical.clone()),
            Term::Node(Node::Blank(_)) => {}
        }
    }

    fn apply_template(&self, entry: &mut SchemaEntry) {
        let Some(record) = self.records.get(&entry.path) else {
            return;
        };
        entry.in_template = true;
        if let Some(label) = &record.label {
            entry.label = label.clone();
        }
        if record.help.is_some() {
            entry.help = record.help.clone();
        }
        if record.placeholder.is_some() {
            entry.placeholder = record.placeholder.clone();
        }
        if record.pattern.is_some() {
            entry.pattern = record.pattern.clone();
        }
        if record.row_span.is_some() {
            entry.row_span = record.row_span;
        }
        if record.order.is_some() {
            entry.order = record.order;
        }
        if entry.path.depth() == 1 {
            entry.tab = record.tab.clone();
        }
        // Tighten only.
        if record.mandatory == Some(true) {
            entry.mandatory = true;
        }
        if record.read_only == Some(true) {
            entry.read_only = true;
        }
        if let Some(kind) = record.field_kind {
            let presentable = match entry.field_kind {
                None | Some(FieldKind::ChoiceList) => false,
                Some(_) => kind != FieldKind::ChoiceList,
            };
            if presentable {
                entry.field_kind = Some(kind);
            }
        }
        if let Some(default) = &record.default_value {
            let term = if entry.node_kind.is_resource() {
                self.prefixes
                    .expand(default)
                    .map(Term::iri)
                    .unwrap_or_else(|| Term::iri(default.clone()))
            } else {
                Term::Literal(Literal::plain(default.clone()))
            };
            self.set_default(entry, Some(&term));
        }
    }

    /// Template categories the schema does not define.
    fn add_local_categories(&mut self, entries: &mut Vec<SchemaEntry>) {
        let local: Vec<(CategoryPath, &TemplateRecord)> = self
            .records
            .iter()
            .filter(|(path, _)| !contains_path(entries, path))
            .map(|(path, record)| (path.clone(), *record))
            .collect();

        for (path, record) in local {
            let entry = self.local_entry(path.clone(), record);
            match path.parent() {
                None => entries.push(entry),
                Some(parent) => match find_entry_mut(entries, &parent) {
                    Some(owner) if owner.node_kind.is_resource() && owner.class.is_some() => {
                        owner.children.push(entry)
                    }
                    _ => tracing::warn!(path = %path.render(&self.prefixes), "ignoring local category outside a nested resource"),
                },
            }
        }
    }

    fn local_entry(&self, path: CategoryPath, record: &TemplateRecord) -> SchemaEntry {
        let datatype = record
            .datatype
            .as_deref()
            .map(|dt| self.prefixes.expand(dt).unwrap_or_else(|| dt.to_string()))
            .unwrap_or_else(|| XSD_STRING.to_string());
        let language_taggable = datatype == RDF_LANG_STRING;
        let field_kind = record
            .field_kind
            .filter(|k| *k != FieldKind::ChoiceList)
            .unwrap_or_else(|| FieldKind::for_datatype(&datatype));
        let label = record
            .label
            .clone()
            .unwrap_or_else(|| local_name(path.predicate()).to_string());
        let tab = if path.depth() == 1 {
            record.tab.clone()
        } else {
            None
        };
        SchemaEntry {
            path,
            node_kind: NodeKind::Literal,
            field_kind: Some(field_kind),
            label,
            help: record.help.clone(),
            placeholder: record.placeholder.clone(),
            pattern: record.pattern.clone(),
            min_count: None,
            max_count: None,
            repeatable: record.multiple.unwrap_or(false),
            mandatory: record.mandatory.unwrap_or(false),
            read_only: record.read_only.unwrap_or(false),
            default_value: record.default_value.clone(),
            default_source: None,
            datatype: Some(datatype),
            language_taggable,
            unique_lang: false,
            order: record.order,
            tab,
            row_span: record.row_span,
            class: None,
            transform: None,
            sources: Vec::new(),
            manual_entry: false,
            local: true,
            in_template: true,
            children: Vec::new(),
        }
    }
}

fn contains_path(entries: &[SchemaEntry], path: &CategoryPath) -> bool {
    entries
        .iter()
        .any(|e| &e.path == path || contains_path(&e.children, path))
}

fn find_entry_mut<'a>(entries: &'a mut [SchemaEntry], path: &CategoryPath) -> Option<&'a mut SchemaEntry> {
    for entry in entries.iter_mut() {
        if &entry.path == path {
            return Some(entry);
        }
        if path.predicates().starts_with(entry.path.predicates()) {
            return find_entry_mut(&mut entry.children, path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use metatree_rdf::parse_turtle;

    const SHAPES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix snum: <http://snum.scenari-community.org/Metadata/Vocabulaire/#> .
@prefix dcat: <http://www.w3.org/ns/dcat#> .
@prefix dct: <http://purl.org/dc/terms/> .
@prefix vcard: <http://www.w3.org/2006/vcard/ns#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.org/> .

ex:DatasetShape sh:targetClass dcat:Dataset ;
  sh:property [ sh:path dct:title ; sh:name "Libellé"@fr, "Title"@en ; sh:order 0 ;
                sh:datatype rdf:langString ; sh:uniqueLang true ; sh:minCount 1 ; sh:nodeKind sh:Literal ] ,
              [ sh:path dcat:keyword ; sh:name "Mots-clés"@fr ; sh:order 2 ; sh:datatype rdf:langString ;
                sh:nodeKind sh:Literal ] ,
              [ sh:path dcat:theme ; sh:name "Thème"@fr ; sh:order 3 ; sh:nodeKind sh:IRI ;
                snum:ontology ex:themes, ex:empty ] ,
              [ sh:path dct:modified ; sh:name "Date de modification"@fr ; sh:datatype xsd:date ;
                sh:maxCount 1 ; sh:nodeKind sh:Literal ] ,
              [ sh:path dcat:contactPoint ; sh:name "Point de contact"@fr ; sh:order 5 ;
                sh:nodeKind sh:BlankNode ; sh:class vcard:Kind ] .

ex:KindShape sh:targetClass vcard:Kind ;
  sh:property [ sh:path vcard:fn ; sh:name "Nom"@fr ; sh:order 0 ; sh:maxCount 1 ; sh:nodeKind sh:Literal ] ,
              [ sh:path vcard:hasEmail ; sh:name "Courriel"@fr ; sh:order 1 ; sh:maxCount 1 ;
                sh:nodeKind sh:IRI ; snum:transform "email" ] .
"#;

    const VOCAB: &str = r#"
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix ex: <http://example.org/> .
ex:themes a skos:ConceptScheme ; skos:prefLabel "Thèmes"@fr .
ex:transport skos:inScheme ex:themes ; skos:prefLabel "Transport"@fr .
ex:empty a skos:ConceptScheme ; skos:prefLabel "Vide"@fr .
"#;

    fn resolved(template: Option<&Template>) -> ResolvedSchema {
        let shapes = parse_turtle(SHAPES).expect("shapes");
        let vocab = parse_turtle(VOCAB).expect("vocab");
        resolve(&shapes, &vocab, template, &BuildOptions::default()).expect("resolve")
    }

    fn entry<'a>(schema: &'a ResolvedSchema, path: &str) -> &'a SchemaEntry {
        let path = CategoryPath::parse(path, &schema.prefixes).expect("path");
        schema.entry(&path).expect("entry")
    }

    #[test]
    fn reads_shapes_in_presentation_order() {
        let schema = resolved(None);
        let order: Vec<String> = schema
            .entries
            .iter()
            .map(|e| e.path.render(&schema.prefixes))
            .collect();
        // Unordered categories come last.
        assert_eq!(
            order,
            vec!["dct:title", "dcat:keyword", "dcat:theme", "dcat:contactPoint", "dct:modified"]
        );
        let title = entry(&schema, "dct:title");
        assert_eq!(title.label, "Libellé");
        assert!(title.mandatory && title.unique_lang && title.language_taggable);
        assert!(!title.repeatable);
        assert!(entry(&schema, "dcat:keyword").repeatable);
        assert_eq!(entry(&schema, "dct:modified").field_kind, Some(FieldKind::Date));
    }

    #[test]
    fn nested_shapes_become_children() {
        let schema = resolved(None);
        let contact = entry(&schema, "dcat:contactPoint");
        assert_eq!(contact.field_kind, None);
        assert_eq!(contact.children.len(), 2);
        let email = entry(&schema, "dcat:contactPoint / vcard:hasEmail");
        assert_eq!(email.transform, Some(Transform::Email));
        assert_eq!(email.sources, vec![Source::FreeUri]);
    }

    #[test]
    fn schemes_without_concepts_are_dropped() {
        let schema = resolved(None);
        let theme = entry(&schema, "dcat:theme");
        assert_eq!(
            theme.sources,
            vec![Source::Scheme("http://example.org/themes".into())]
        );
        assert_eq!(theme.field_kind, Some(FieldKind::ChoiceList));
        assert_eq!(
            schema.source_label(&theme.sources[0]),
            "Thèmes".to_string()
        );
    }

    #[test]
    fn template_tightens_but_never_loosens() {
        let template = Template::default()
            .with_category(
                "dct:title",
                TemplateRecord {
                    mandatory: Some(false),
                    multiple: Some(true),
                    label: Some("Nom du jeu".into()),
                    ..TemplateRecord::default()
                },
            )
            .with_category(
                "dct:modified",
                TemplateRecord {
                    mandatory: Some(true),
                    read_only: Some(true),
                    order: Some(1),
                    ..TemplateRecord::default()
                },
            );
        let schema = resolved(Some(&template));
        let title = entry(&schema, "dct:title");
        assert!(title.mandatory);
        assert!(!title.repeatable);
        assert_eq!(title.label, "Nom du jeu");
        let modified = entry(&schema, "dct:modified");
        assert!(modified.mandatory && modified.read_only);
        assert_eq!(modified.order, Some(1));
        assert!(!entry(&schema, "dcat:keyword").in_template);
    }

    #[test]
    fn template_adds_local_categories() {
        let template = Template::default()
            .with_category(
                "<urn:example:note>",
                TemplateRecord {
                    label: Some("Note interne".into()),
                    multiple: Some(true),
                    ..TemplateRecord::default()
                },
            )
            .with_category("dcat:contactPoint / <urn:example:role>", TemplateRecord::default())
            .with_category("dct:title / <urn:example:bad>", TemplateRecord::default());
        let schema = resolved(Some(&template));
        let note = schema
            .entry(&CategoryPath::single("urn:example:note"))
            .expect("local");
        assert!(note.local && note.repeatable);
        assert_eq!(note.label, "Note interne");
        assert!(entry(&schema, "dcat:contactPoint / <urn:example:role>").local);
        let bad = CategoryPath::parse("dct:title / <urn:example:bad>", &schema.prefixes).expect("path");
        assert!(schema.entry(&bad).is_none());
    }

    #[test]
    fn invalid_templates_are_rejected() {
        let shapes = parse_turtle(SHAPES).expect("shapes");
        let vocab = parse_turtle(VOCAB).expect("vocab");
        let template = Template::default().with_category(
            "dct:title",
            TemplateRecord {
                tab: Some("Nowhere".into()),
                ..TemplateRecord::default()
            },
        );
        assert!(resolve(&shapes, &vocab, Some(&template), &BuildOptions::default()).is_err());
    }

    #[test]
    fn transforms_map_both_ways() {
        assert_eq!(Transform::Email.strip("mailto:a@b.fr"), "a@b.fr");
        assert_eq!(Transform::Email.apply("a@b.fr"), "mailto:a@b.fr");
        assert_eq!(Transform::Phone.apply("+33 1 23.45-67"), "tel:+331234567");
        assert_eq!(Transform::Phone.apply("tel:+331"), "tel:+331");
    }
}
