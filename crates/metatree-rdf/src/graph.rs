//! In-memory graph and the read capability the engine consumes.

use sophia::api::term::{BnodeId, LanguageTag, SimpleTerm};
use sophia::api::MownStr;
use sophia::isomorphism::isomorphic_graphs;
use sophia::iri::IriRef;
use std::collections::BTreeSet;

use crate::namespace::{PrefixMap, XSD_STRING};
use crate::term::{Node, Term, Triple};

// ============================================================================
// Read capability
// ============================================================================

/// What the engine needs from a graph: iterate triples and resolve prefixed
/// names. Everything else is derived.
pub trait GraphRead {
    fn triples(&self) -> Box<dyn Iterator<Item = &Triple> + '_>;

    fn prefixes(&self) -> &PrefixMap;

    fn objects(&self, subject: &Node, predicate: &str) -> Vec<&Term> {
        self.triples()
            .filter(|t| &t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
            .collect()
    }

    /// First object, in graph order.
    fn object(&self, subject: &Node, predicate: &str) -> Option<&Term> {
        self.triples()
            .find(|t| &t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    fn subjects(&self, predicate: &str, object: &Term) -> Vec<&Node> {
        self.triples()
            .filter(|t| t.predicate == predicate && &t.object == object)
            .map(|t| &t.subject)
            .collect()
    }

    fn predicate_objects(&self, subject: &Node) -> Vec<(&str, &Term)> {
        self.triples()
            .filter(|t| &t.subject == subject)
            .map(|t| (t.predicate.as_str(), &t.object))
            .collect()
    }

    fn contains(&self, triple: &Triple) -> bool {
        self.triples().any(|t| t == triple)
    }

    fn expand(&self, name: &str) -> Option<String> {
        self.prefixes().expand(name)
    }
}

// ============================================================================
// Graph
// ============================================================================

/// A set of triples plus the prefixes used to read and print it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
    prefixes: PrefixMap,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefixes(prefixes: PrefixMap) -> Self {
        Self {
            triples: BTreeSet::new(),
            prefixes,
        }
    }

    pub fn prefixes_mut(&mut self) -> &mut PrefixMap {
        &mut self.prefixes
    }

    /// Returns `false` when the triple was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn add(&mut self, subject: Node, predicate: impl Into<String>, object: impl Into<Term>) {
        self.triples.insert(Triple::new(subject, predicate, object));
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn extend(&mut self, other: &Graph) {
        self.triples.extend(other.triples.iter().cloned());
    }

    /// Distinct subjects, in term order.
    pub fn subject_nodes(&self) -> Vec<&Node> {
        let mut seen = BTreeSet::new();
        for t in &self.triples {
            seen.insert(&t.subject);
        }
        seen.into_iter().collect()
    }

    /// Rewrite every occurrence of `from` (as subject or object) into `to`.
    pub fn rename_node(&mut self, from: &Node, to: &Node) {
        let renamed: BTreeSet<Triple> = std::mem::take(&mut self.triples)
            .into_iter()
            .map(|mut t| {
                if &t.subject == from {
                    t.subject = to.clone();
                }
                if t.object.as_node() == Some(from) {
                    t.object = Term::Node(to.clone());
                }
                t
            })
            .collect();
        self.triples = renamed;
    }

    /// Blank-node-aware equality: the two graphs are equal up to a bijective
    /// renaming of blank node labels.
    pub fn is_isomorphic(&self, other: &Graph) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let left = self.to_sophia();
        let right = other.to_sophia();
        matches!(isomorphic_graphs(&left, &right), Ok(true))
    }

    fn to_sophia(&self) -> Vec<[SimpleTerm<'_>; 3]> {
        self.triples
            .iter()
            .map(|t| {
                [
                    sophia_node(&t.subject),
                    SimpleTerm::Iri(IriRef::new_unchecked(MownStr::from(t.predicate.as_str()))),
                    sophia_term(&t.object),
                ]
            })
            .collect()
    }
}

impl GraphRead for Graph {
    fn triples(&self) -> Box<dyn Iterator<Item = &Triple> + '_> {
        Box::new(self.triples.iter())
    }

    fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
            prefixes: PrefixMap::default(),
        }
    }
}

// ============================================================================
// Sophia bridge
// ============================================================================

fn sophia_node(node: &Node) -> SimpleTerm<'_> {
    match node {
        Node::Iri(iri) => SimpleTerm::Iri(IriRef::new_unchecked(MownStr::from(iri.as_str()))),
        Node::Blank(label) => {
            SimpleTerm::BlankNode(BnodeId::new_unchecked(MownStr::from(label.as_str())))
        }
    }
}

fn sophia_term(term: &Term) -> SimpleTerm<'_> {
    match term {
        Term::Node(node) => sophia_node(node),
        Term::Literal(lit) => {
            let lexical = MownStr::from(lit.lexical.as_str());
            match (&lit.language, &lit.datatype) {
                (Some(lang), _) => SimpleTerm::LiteralLanguage(
                    lexical,
                    LanguageTag::new_unchecked(MownStr::from(lang.as_str())),
                ),
                (None, datatype) => SimpleTerm::LiteralDatatype(
                    lexical,
                    IriRef::new_unchecked(MownStr::from(
                        datatype.as_deref().unwrap_or(XSD_STRING),
                    )),
                ),
            }
        }
    }
}
