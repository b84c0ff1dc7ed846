//! Graph Serializer: the form model back to RDF.
//!
//! Hidden nodes, inactive twins and their descendants are skipped whatever
//! stale value they still hold. A property group contributes its link and
//! class only when something below it was written.

use metatree_rdf::namespace::{DCAT_DATASET, RDF_TYPE};
use metatree_rdf::skos::concept_from_label;
use metatree_rdf::{Graph, GraphRead, Literal, Node, Term};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::Mode;
use crate::error::SerializeError;
use crate::key::NodeKey;
use crate::model::FormModel;
use crate::node::{FormNode, ObjectKind, Source};

fn forbidden_iri_chars() -> &'static Regex {
    static FORBIDDEN: OnceLock<Regex> = OnceLock::new();
    FORBIDDEN.get_or_init(|| {
        Regex::new(r#"[<>"{}|\\^`\s]"#).expect("IRI character class is valid")
    })
}

fn checked_iri(value: &str) -> Result<Term, SerializeError> {
    let invalid = value.is_empty() || forbidden_iri_chars().is_match(value);
    if invalid {
        return Err(SerializeError::InvalidIri {
            value: value.to_string(),
        });
    }
    Ok(Term::iri(value))
}

/// Rebuild the metagraph of an edit-mode model.
pub fn serialize(model: &FormModel, vocabulary: &dyn GraphRead) -> Result<Graph, SerializeError> {
    if model.mode() == Mode::Read {
        return Err(SerializeError::ReadOnlyMode);
    }
    let mut graph = Graph::with_prefixes(model.schema().prefixes.clone());
    let subject = model.subject().clone();
    graph.add(subject.clone(), RDF_TYPE, Term::iri(DCAT_DATASET));

    let writer = Writer { model, vocabulary };
    writer.emit_children(&NodeKey::root(), &subject, &mut graph)?;
    tracing::debug!(triples = graph.len(), subject = %subject, "form model serialized");
    Ok(graph)
}

struct Writer<'a> {
    model: &'a FormModel,
    vocabulary: &'a dyn GraphRead,
}

impl Writer<'_> {
    /// Returns whether anything was written.
    fn emit_children(&self, container: &NodeKey, subject: &Node, graph: &mut Graph) -> Result<bool, SerializeError> {
        let mut emitted = false;
        for key in self.model.children(container) {
            let Some(node) = self.model.get(key) else {
                continue;
            };
            if node.hidden || self.model.is_hidden_manual(key) {
                continue;
            }
            emitted |= match node.kind {
                ObjectKind::Tab | ObjectKind::RepeatGroup | ObjectKind::TranslationGroup => {
                    self.emit_children(key, subject, graph)?
                }
                ObjectKind::PropertyGroup => self.emit_group(key, node, subject, graph)?,
                ObjectKind::Field => self.emit_field(key, node, subject, graph)?,
                ObjectKind::Root | ObjectKind::AddButton | ObjectKind::TranslationButton => false,
            };
        }
        Ok(emitted)
    }

    fn emit_group(
        &self,
        key: &NodeKey,
        node: &FormNode,
        subject: &Node,
        graph: &mut Graph,
    ) -> Result<bool, SerializeError> {
        let (Some(path), Some(resource)) = (&node.path, &node.subject) else {
            return Ok(false);
        };
        let mut inner = Graph::new();
        if !self.emit_children(key, resource, &mut inner)? {
            return Ok(false);
        }
        graph.add(subject.clone(), path.predicate(), resource.clone());
        if let Some(class) = self.model.entry_for(key).and_then(|e| e.class.as_deref()) {
            graph.add(resource.clone(), RDF_TYPE, Term::iri(class));
        }
        graph.extend(&inner);
        Ok(true)
    }

    fn emit_field(
        &self,
        key: &NodeKey,
        node: &FormNode,
        subject: &Node,
        graph: &mut Graph,
    ) -> Result<bool, SerializeError> {
        let (Some(path), Some(value)) = (&node.path, node.value.as_deref()) else {
            return Ok(false);
        };
        if value.is_empty() {
            return Ok(false);
        }
        let object = self.object(key, node, value)?;
        graph.add(subject.clone(), path.predicate(), object);
        Ok(true)
    }

    fn object(&self, key: &NodeKey, node: &FormNode, value: &str) -> Result<Term, SerializeError> {
        let entry = self.model.entry_for(key);
        let transform = entry.and_then(|e| e.transform);
        let as_iri = |value: &str| match transform {
            Some(t) => checked_iri(&t.apply(value)),
            None => checked_iri(value.trim()),
        };

        if key.is_manual() {
            return as_iri(value);
        }
        match self.model.current_source(key) {
            Some(Source::Scheme(scheme)) => {
                concept_from_label(self.vocabulary, &scheme, value, self.model.language())
                    .map(Term::iri)
                    .ok_or(SerializeError::UnknownConcept {
                        label: value.to_string(),
                        scheme,
                    })
            }
            Some(Source::FreeUri | Source::Unlisted | Source::Manual) => as_iri(value),
            None => {
                let literal = match entry {
                    Some(e) if e.language_taggable => match &node.language {
                        Some(language) => Literal::lang(value, language.clone()),
                        None => Literal::plain(value),
                    },
                    Some(e) => match &e.datatype {
                        Some(datatype) => Literal::typed(value, datatype.clone()),
                        None => Literal::plain(value),
                    },
                    None => Literal::plain(value),
                };
                Ok(Term::Literal(literal))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iri_check_rejects_forbidden_characters() {
        assert!(checked_iri("http://example.org/a").is_ok());
        for bad in ["", "http://example.org/a b", "<http://x>", "http://x/{y}", "a\"b", "a`b"] {
            assert!(
                matches!(checked_iri(bad), Err(SerializeError::InvalidIri { .. })),
                "{bad:?} accepted"
            );
        }
    }
}
