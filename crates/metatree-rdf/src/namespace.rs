//! Well-known vocabularies and prefixed-name resolution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const SH: &str = "http://www.w3.org/ns/shacl#";
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const DCAT: &str = "http://www.w3.org/ns/dcat#";
pub const DCT: &str = "http://purl.org/dc/terms/";
pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const VCARD: &str = "http://www.w3.org/2006/vcard/ns#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
/// Presentation hints layered on top of SHACL (widget, placeholder, sources...).
pub const SNUM: &str = "http://snum.scenari-community.org/Metadata/Vocabulaire/#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_TIME: &str = "http://www.w3.org/2001/XMLSchema#time";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

pub const DCAT_DATASET: &str = "http://www.w3.org/ns/dcat#Dataset";
pub const DCT_IDENTIFIER: &str = "http://purl.org/dc/terms/identifier";

/// Prefix → namespace IRI table used to read and write `prefix:local` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixMap {
    prefixes: BTreeMap<String, String>,
}

impl Default for PrefixMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for (prefix, ns) in [
            ("rdf", RDF),
            ("xsd", XSD),
            ("sh", SH),
            ("skos", SKOS),
            ("dcat", DCAT),
            ("dct", DCT),
            ("foaf", FOAF),
            ("vcard", VCARD),
            ("owl", OWL),
            ("snum", SNUM),
        ] {
            map.insert(prefix, ns);
        }
        map
    }
}

impl PrefixMap {
    pub fn empty() -> Self {
        Self {
            prefixes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// `dct:title` → full IRI. Returns `None` for unknown prefixes and for
    /// strings that are not prefixed names.
    pub fn expand(&self, name: &str) -> Option<String> {
        let (prefix, local) = name.split_once(':')?;
        if local.starts_with("//") {
            return None;
        }
        let ns = self.namespace(prefix)?;
        Some(format!("{ns}{local}"))
    }

    /// Full IRI → `prefix:local`, choosing the longest matching namespace.
    /// IRIs outside every namespace are returned as `<iri>`.
    pub fn compact(&self, iri: &str) -> String {
        self.prefixes
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()) && iri.len() > ns.len())
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{prefix}:{}", &iri[ns.len()..]))
            .unwrap_or_else(|| format!("<{iri}>"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_and_compact_are_inverse_for_known_prefixes() {
        let map = PrefixMap::default();
        let iri = map.expand("dct:title").expect("known prefix");
        assert_eq!(iri, "http://purl.org/dc/terms/title");
        assert_eq!(map.compact(&iri), "dct:title");
    }

    #[test]
    fn unknown_prefixes_and_absolute_iris_are_not_expanded() {
        let map = PrefixMap::default();
        assert_eq!(map.expand("nope:title"), None);
        assert_eq!(map.expand("http://example.org/x"), None);
        assert_eq!(map.compact("http://example.org/x"), "<http://example.org/x>");
    }
}
