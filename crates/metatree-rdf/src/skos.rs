//! Controlled-vocabulary lookups over a SKOS graph.
//!
//! Concepts belong to a scheme through `skos:inScheme` and are presented by
//! their `skos:prefLabel` in the active language.

use crate::graph::GraphRead;
use crate::term::{Literal, Node, Term};

pub const SKOS_IN_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#inScheme";
pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";

/// Language used when the requested one has no label.
pub const FALLBACK_LANGUAGE: &str = "fr";

/// Requested language, else the fallback language, else the first label.
pub fn pick_translation<'a>(labels: &[&'a Literal], language: &str) -> Option<&'a Literal> {
    let language = language.to_lowercase();
    labels
        .iter()
        .find(|l| l.language.as_deref() == Some(language.as_str()))
        .or_else(|| {
            labels
                .iter()
                .find(|l| l.language.as_deref() == Some(FALLBACK_LANGUAGE))
        })
        .or_else(|| labels.first())
        .copied()
}

fn pref_labels<'g>(vocabulary: &'g dyn GraphRead, node: &Node) -> Vec<&'g Literal> {
    vocabulary
        .objects(node, SKOS_PREF_LABEL)
        .into_iter()
        .filter_map(Term::as_literal)
        .collect()
}

pub fn pref_label(vocabulary: &dyn GraphRead, iri: &str, language: &str) -> Option<String> {
    let node = Node::iri(iri);
    pick_translation(&pref_labels(vocabulary, &node), language).map(|l| l.lexical.clone())
}

/// Concept IRIs of a scheme, in graph order.
pub fn scheme_concepts<'g>(vocabulary: &'g dyn GraphRead, scheme: &str) -> Vec<&'g str> {
    vocabulary
        .subjects(SKOS_IN_SCHEME, &Term::iri(scheme))
        .into_iter()
        .filter_map(Node::as_iri)
        .collect()
}

pub fn has_concepts(vocabulary: &dyn GraphRead, scheme: &str) -> bool {
    !scheme_concepts(vocabulary, scheme).is_empty()
}

/// Display label of a scheme, falling back to the IRI itself.
pub fn scheme_label(vocabulary: &dyn GraphRead, scheme: &str, language: &str) -> String {
    pref_label(vocabulary, scheme, language).unwrap_or_else(|| scheme.to_string())
}

/// Sorted concept labels of a scheme, with a leading empty entry for "no
/// value". This is what a choice-list offers.
pub fn concept_labels(vocabulary: &dyn GraphRead, scheme: &str, language: &str) -> Vec<String> {
    let mut labels: Vec<String> = scheme_concepts(vocabulary, scheme)
        .into_iter()
        .filter_map(|c| pref_label(vocabulary, c, language))
        .collect();
    labels.sort();
    labels.dedup();
    labels.insert(0, String::new());
    labels
}

/// Concept of `scheme` whose label (in `language`) is `label`. Labels in
/// other languages are tried next, so a value typed under another active
/// language still resolves.
pub fn concept_from_label(
    vocabulary: &dyn GraphRead,
    scheme: &str,
    label: &str,
    language: &str,
) -> Option<String> {
    let concepts = scheme_concepts(vocabulary, scheme);
    concepts
        .iter()
        .find(|c| pref_label(vocabulary, c, language).as_deref() == Some(label))
        .or_else(|| {
            concepts.iter().find(|c| {
                pref_labels(vocabulary, &Node::iri(**c))
                    .iter()
                    .any(|l| l.lexical == label)
            })
        })
        .map(|c| c.to_string())
}

/// Label and scheme of a concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptLabel {
    pub label: String,
    pub scheme: String,
}

/// Label of `concept` within one of `schemes` (first matching scheme wins).
pub fn label_of_concept(
    vocabulary: &dyn GraphRead,
    concept: &str,
    schemes: &[&str],
    language: &str,
) -> Option<ConceptLabel> {
    let node = Node::iri(concept);
    let in_schemes: Vec<&str> = vocabulary
        .objects(&node, SKOS_IN_SCHEME)
        .into_iter()
        .filter_map(Term::as_iri)
        .collect();
    let scheme = schemes.iter().find(|s| in_schemes.contains(*s))?;
    let label = pick_translation(&pref_labels(vocabulary, &node), language)?;
    Some(ConceptLabel {
        label: label.lexical.clone(),
        scheme: scheme.to_string(),
    })
}
