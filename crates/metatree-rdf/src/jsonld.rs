//! JSON-LD codec for metadata graphs.
//!
//! Output is the flat expanded form (an array of node objects with absolute
//! IRIs). Input accepts that form as well as documents with an `@context` of
//! prefix and term definitions (with `@type`, `@language` and
//! `@container: @language`), a default `@language`, `@graph`, and embedded
//! node objects. Remote contexts and `@list` values are not supported; such
//! entries are dropped with a warning rather than failing the whole document.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RdfError, RdfResult};
use crate::graph::Graph;
use crate::namespace::{RDF_TYPE, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER};
use crate::term::{Literal, Node, Term, Triple};

// ============================================================================
// Encoding
// ============================================================================

fn node_id(node: &Node) -> String {
    match node {
        Node::Iri(iri) => iri.clone(),
        Node::Blank(label) => format!("_:{label}"),
    }
}

fn term_value(term: &Term) -> Value {
    match term {
        Term::Node(node) => json!({ "@id": node_id(node) }),
        Term::Literal(lit) => {
            let mut obj = Map::new();
            obj.insert("@value".into(), Value::String(lit.lexical.clone()));
            if let Some(lang) = &lit.language {
                obj.insert("@language".into(), Value::String(lang.clone()));
            } else if let Some(dt) = &lit.datatype {
                obj.insert("@type".into(), Value::String(dt.clone()));
            }
            Value::Object(obj)
        }
    }
}

pub fn graph_to_jsonld_value(graph: &Graph) -> Value {
    let mut nodes: BTreeMap<&Node, Map<String, Value>> = BTreeMap::new();
    for t in graph.iter() {
        let entry = nodes.entry(&t.subject).or_insert_with(|| {
            let mut obj = Map::new();
            obj.insert("@id".into(), Value::String(node_id(&t.subject)));
            obj
        });
        if t.predicate == RDF_TYPE {
            if let Some(iri) = t.object.as_iri() {
                push_value(entry, "@type", Value::String(iri.to_string()));
                continue;
            }
        }
        push_value(entry, &t.predicate, term_value(&t.object));
    }
    Value::Array(nodes.into_values().map(Value::Object).collect())
}

fn push_value(obj: &mut Map<String, Value>, key: &str, value: Value) {
    match obj.get_mut(key) {
        Some(Value::Array(values)) => values.push(value),
        _ => {
            obj.insert(key.to_string(), Value::Array(vec![value]));
        }
    }
}

pub fn graph_to_jsonld(graph: &Graph) -> RdfResult<String> {
    Ok(serde_json::to_string_pretty(&graph_to_jsonld_value(graph))?)
}

// ============================================================================
// Decoding
// ============================================================================

#[derive(Debug, Default, Clone)]
struct TermDefinition {
    iri: String,
    coerce: Option<String>,
    /// `Some(None)` is an explicit `"@language": null`.
    language: Option<Option<String>>,
    language_map: bool,
}

#[derive(Debug, Default, Clone)]
struct Context {
    terms: BTreeMap<String, TermDefinition>,
    vocab: Option<String>,
    language: Option<String>,
}

fn language_of(value: &Value) -> Option<String> {
    value.as_str().map(str::to_lowercase)
}

impl Context {
    fn merge(&mut self, value: &Value) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| self.merge(item)),
            Value::Object(map) => {
                for (key, def) in map {
                    if key == "@vocab" {
                        self.vocab = def.as_str().map(str::to_string);
                        continue;
                    }
                    if key == "@language" {
                        self.language = language_of(def);
                        continue;
                    }
                    if key.starts_with('@') {
                        continue;
                    }
                    match def {
                        Value::String(iri) => {
                            self.terms.insert(
                                key.clone(),
                                TermDefinition {
                                    iri: iri.clone(),
                                    ..TermDefinition::default()
                                },
                            );
                        }
                        Value::Object(obj) => {
                            let definition = TermDefinition {
                                iri: obj
                                    .get("@id")
                                    .and_then(Value::as_str)
                                    .map(str::to_string)
                                    .unwrap_or_else(|| key.clone()),
                                coerce: obj.get("@type").and_then(Value::as_str).map(str::to_string),
                                language: obj.get("@language").map(language_of),
                                language_map: obj.get("@container").is_some_and(|c| {
                                    as_values(c).iter().any(|v| v.as_str() == Some("@language"))
                                }),
                            };
                            self.terms.insert(key.clone(), definition);
                        }
                        other => {
                            tracing::warn!(term = %key, definition = %other, "ignoring JSON-LD term definition");
                        }
                    }
                }
            }
            Value::String(url) => {
                tracing::warn!(context = %url, "remote JSON-LD contexts are not fetched");
            }
            _ => {}
        }
    }

    /// Expand a term, compact IRI or absolute IRI. `vocab_relative` applies
    /// `@vocab` to bare words (properties and types, not `@id` values).
    fn expand(&self, name: &str, vocab_relative: bool) -> Option<String> {
        if let Some(def) = self.terms.get(name) {
            return self
                .expand_compact(&def.iri)
                .or_else(|| self.vocab.as_ref().map(|v| format!("{v}{}", def.iri)));
        }
        if let Some(iri) = self.expand_compact(name) {
            return Some(iri);
        }
        if vocab_relative {
            return self.vocab.as_ref().map(|v| format!("{v}{name}"));
        }
        None
    }

    /// Blank node ids, compact IRIs and absolute IRIs; no term lookup.
    fn expand_compact(&self, name: &str) -> Option<String> {
        if name.starts_with("_:") {
            return Some(name.to_string());
        }
        if let Some((prefix, local)) = name.split_once(':') {
            if !local.starts_with("//") {
                if let Some(def) = self.terms.get(prefix) {
                    return Some(format!("{}{local}", def.iri));
                }
            }
            return Some(name.to_string());
        }
        None
    }

    fn coercion(&self, key: &str) -> Option<&str> {
        self.terms.get(key).and_then(|d| d.coerce.as_deref())
    }

    /// Language given to plain strings of property `key`.
    fn string_language(&self, key: &str) -> Option<&str> {
        match self.terms.get(key).and_then(|d| d.language.as_ref()) {
            Some(language) => language.as_deref(),
            None => self.language.as_deref(),
        }
    }

    fn is_language_map(&self, key: &str) -> bool {
        self.terms.get(key).is_some_and(|d| d.language_map)
    }
}

/// Every `_:` label written anywhere in the document, so that generated
/// labels never collide with explicit ones.
fn explicit_blank_labels(value: &Value, labels: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if let Some(label) = s.strip_prefix("_:") {
                labels.insert(label.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| explicit_blank_labels(v, labels)),
        Value::Object(map) => map.values().for_each(|v| explicit_blank_labels(v, labels)),
        _ => {}
    }
}

/// Native JSON numbers and booleans, typed the way JSON-LD maps them to RDF.
fn native_literal(value: &Value) -> Option<Literal> {
    match value {
        Value::Bool(b) => Some(Literal::typed(b.to_string(), XSD_BOOLEAN)),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => Some(Literal::typed(canonical_double(f), XSD_DOUBLE)),
            _ => Some(Literal::typed(n.to_string(), XSD_INTEGER)),
        },
        _ => None,
    }
}

/// `xsd:double` canonical form: mantissa with a fractional part, `E` exponent.
fn canonical_double(f: f64) -> String {
    let text = format!("{f:E}");
    match text.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{mantissa}.0E{exponent}")
        }
        _ => text,
    }
}

struct Decoder {
    graph: Graph,
    reserved: BTreeSet<String>,
    next_blank: usize,
}

impl Decoder {
    fn new(document: &Value) -> Self {
        let mut reserved = BTreeSet::new();
        explicit_blank_labels(document, &mut reserved);
        Self {
            graph: Graph::new(),
            reserved,
            next_blank: 0,
        }
    }

    fn fresh_blank(&mut self) -> Node {
        loop {
            let label = format!("jld{}", self.next_blank);
            self.next_blank += 1;
            if !self.reserved.contains(&label) {
                return Node::Blank(label);
            }
        }
    }

    fn node_ref(&self, ctx: &Context, id: &str) -> Option<Node> {
        if let Some(label) = id.strip_prefix("_:") {
            return Some(Node::blank(label));
        }
        ctx.expand(id, false).map(Node::Iri)
    }

    /// Decode one node object and return its subject.
    fn node_object(&mut self, ctx: &Context, obj: &Map<String, Value>) -> Option<Node> {
        let mut ctx = ctx.clone();
        if let Some(local) = obj.get("@context") {
            ctx.merge(local);
        }
        let subject = match obj.get("@id").and_then(Value::as_str) {
            Some(id) => match self.node_ref(&ctx, id) {
                Some(node) => node,
                None => {
                    tracing::warn!(id = %id, "dropping JSON-LD node with unresolvable @id");
                    return None;
                }
            },
            None => self.fresh_blank(),
        };

        if let Some(graph) = obj.get("@graph") {
            self.graph_value(&ctx, graph);
        }

        for (key, value) in obj {
            if key == "@type" {
                for ty in as_values(value) {
                    match ty.as_str().and_then(|t| ctx.expand(t, true)) {
                        Some(iri) => self.graph.add(subject.clone(), RDF_TYPE, Term::iri(iri)),
                        None => tracing::warn!(value = %ty, "dropping unresolvable @type"),
                    }
                }
                continue;
            }
            if key.starts_with('@') {
                continue;
            }
            let Some(predicate) = ctx.expand(key, true) else {
                tracing::warn!(property = %key, "dropping JSON-LD property with no IRI mapping");
                continue;
            };
            if ctx.is_language_map(key) {
                if let Value::Object(map) = value {
                    for object in language_map(map) {
                        self.graph.add(subject.clone(), predicate.clone(), object);
                    }
                    continue;
                }
            }
            let coerce = ctx.coercion(key).map(str::to_string);
            let language = ctx.string_language(key).map(str::to_string);
            for item in as_values(value) {
                match self.value_object(&ctx, item, coerce.as_deref(), language.as_deref()) {
                    Some(object) => {
                        self.graph
                            .insert(Triple::new(subject.clone(), predicate.clone(), object));
                    }
                    None => {
                        tracing::warn!(property = %predicate, value = %item, "dropping malformed JSON-LD value");
                    }
                }
            }
        }
        Some(subject)
    }

    fn value_object(
        &mut self,
        ctx: &Context,
        value: &Value,
        coerce: Option<&str>,
        language: Option<&str>,
    ) -> Option<Term> {
        match value {
            Value::String(s) => match (coerce, language) {
                (Some("@id") | Some("@vocab"), _) => self.node_ref(ctx, s).map(Term::Node),
                (Some(dt), _) => Some(Term::Literal(Literal::typed(s.clone(), ctx.expand(dt, true)?))),
                (None, Some(lang)) => Some(Term::Literal(Literal::lang(s.clone(), lang))),
                (None, None) => Some(Term::Literal(Literal::plain(s.clone()))),
            },
            Value::Bool(_) | Value::Number(_) => native_literal(value).map(Term::Literal),
            Value::Object(obj) => {
                if let Some(raw) = obj.get("@value") {
                    let typed = obj.get("@type").and_then(Value::as_str);
                    let lexical = match raw {
                        Value::String(s) => s.clone(),
                        Value::Bool(_) | Value::Number(_) if typed.is_none() => {
                            return native_literal(raw).map(Term::Literal);
                        }
                        Value::Bool(_) | Value::Number(_) => raw.to_string(),
                        _ => return None,
                    };
                    if let Some(lang) = obj.get("@language").and_then(Value::as_str) {
                        return Some(Term::Literal(Literal::lang(lexical, lang)));
                    }
                    if let Some(dt) = typed {
                        return Some(Term::Literal(Literal::typed(lexical, ctx.expand(dt, true)?)));
                    }
                    return Some(Term::Literal(Literal::plain(lexical)));
                }
                if obj.contains_key("@list") {
                    return None;
                }
                let only_id = obj.keys().all(|k| k == "@id");
                if only_id {
                    let id = obj.get("@id").and_then(Value::as_str)?;
                    return self.node_ref(ctx, id).map(Term::Node);
                }
                self.node_object(ctx, obj).map(Term::Node)
            }
            Value::Null | Value::Array(_) => None,
        }
    }

    fn graph_value(&mut self, ctx: &Context, value: &Value) {
        for item in as_values(value) {
            match item {
                Value::Object(obj) => {
                    self.node_object(ctx, obj);
                }
                other => tracing::warn!(value = %other, "dropping non-object JSON-LD graph entry"),
            }
        }
    }
}

/// Values of a `@container: @language` map. `@none` holds untagged strings.
fn language_map(map: &Map<String, Value>) -> Vec<Term> {
    let mut out = Vec::new();
    for (language, values) in map {
        for item in as_values(values) {
            let Some(text) = item.as_str() else {
                tracing::warn!(language = %language, value = %item, "dropping non-string language map value");
                continue;
            };
            let literal = if language == "@none" {
                Literal::plain(text)
            } else {
                Literal::lang(text, language.as_str())
            };
            out.push(Term::Literal(literal));
        }
    }
    out
}

fn as_values(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item.as_object().and_then(|o| o.get("@set")) {
                Some(set) => as_values(set),
                None => vec![item],
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Decode a JSON-LD document. Invalid JSON and non-document top-level values
/// are errors; individual malformed nodes or values are dropped.
pub fn graph_from_jsonld(text: &str) -> RdfResult<Graph> {
    let value: Value = serde_json::from_str(text)?;
    graph_from_jsonld_value(&value)
}

pub fn graph_from_jsonld_value(value: &Value) -> RdfResult<Graph> {
    let mut decoder = Decoder::new(value);
    let ctx = Context::default();
    match value {
        Value::Array(_) => decoder.graph_value(&ctx, value),
        Value::Object(obj) => {
            let is_node = obj.keys().any(|k| !matches!(k.as_str(), "@context" | "@graph"));
            if is_node {
                decoder.node_object(&ctx, obj);
            } else {
                let mut ctx = ctx;
                if let Some(local) = obj.get("@context") {
                    ctx.merge(local);
                }
                if let Some(graph) = obj.get("@graph") {
                    decoder.graph_value(&ctx, graph);
                }
            }
        }
        other => {
            return Err(RdfError::InvalidJsonLd(format!(
                "expected an object or an array at top level, found {other}"
            )))
        }
    }
    Ok(decoder.graph)
}
