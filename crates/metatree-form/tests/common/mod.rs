//! Shared fixtures: a small DCAT-style shape graph, a SKOS vocabulary and a
//! metagraph exercising every category kind.

#![allow(dead_code)]

use metatree_form::{FormModel, NodeKey, ObjectKind};
use metatree_rdf::{parse_turtle, Graph};

pub const PREFIXES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix snum: <http://snum.scenari-community.org/Metadata/Vocabulaire/#> .
@prefix dcat: <http://www.w3.org/ns/dcat#> .
@prefix dct: <http://purl.org/dc/terms/> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix vcard: <http://www.w3.org/2006/vcard/ns#> .
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.org/> .
"#;

pub const SHAPES: &str = r#"
ex:DatasetShape sh:targetClass dcat:Dataset ;
  sh:property
    [ sh:path dct:title ; sh:name "Libellé"@fr, "Title"@en ; sh:order 0 ; sh:nodeKind sh:Literal ;
      sh:datatype rdf:langString ; sh:uniqueLang true ; sh:minCount 1 ] ,
    [ sh:path dct:description ; sh:name "Description"@fr ; sh:order 1 ; sh:nodeKind sh:Literal ;
      sh:datatype rdf:langString ; sh:uniqueLang true ; snum:widget "QTextEdit" ; snum:rowSpan 4 ] ,
    [ sh:path dcat:keyword ; sh:name "Mots-clés"@fr ; sh:order 2 ; sh:nodeKind sh:Literal ;
      sh:datatype rdf:langString ] ,
    [ sh:path dcat:theme ; sh:name "Thème"@fr ; sh:order 3 ; sh:nodeKind sh:IRI ;
      snum:ontology ex:themes, ex:empty ] ,
    [ sh:path dct:spatial ; sh:name "Couverture géographique"@fr ; sh:order 4 ;
      sh:nodeKind sh:BlankNodeOrIRI ; sh:class dct:Location ; snum:ontology ex:places ] ,
    [ sh:path dct:publisher ; sh:name "Éditeur"@fr ; sh:order 5 ; sh:maxCount 1 ;
      sh:nodeKind sh:BlankNodeOrIRI ; sh:class foaf:Organization ] ,
    [ sh:path dcat:contactPoint ; sh:name "Point de contact"@fr ; sh:order 6 ;
      sh:nodeKind sh:BlankNode ; sh:class vcard:Kind ] ,
    [ sh:path dct:modified ; sh:name "Dernière modification"@fr ; sh:order 7 ; sh:maxCount 1 ;
      sh:nodeKind sh:Literal ; sh:datatype xsd:date ] ,
    [ sh:path dct:identifier ; sh:name "Identifiant"@fr ; sh:order 8 ; sh:maxCount 1 ;
      sh:nodeKind sh:Literal ] .

ex:KindShape sh:targetClass vcard:Kind ;
  sh:property
    [ sh:path vcard:fn ; sh:name "Nom"@fr ; sh:order 0 ; sh:maxCount 1 ; sh:nodeKind sh:Literal ] ,
    [ sh:path vcard:hasEmail ; sh:name "Courriel"@fr ; sh:order 1 ; sh:maxCount 1 ;
      sh:nodeKind sh:IRI ; snum:transform "email" ] .

ex:OrganizationShape sh:targetClass foaf:Organization ;
  sh:property
    [ sh:path foaf:name ; sh:name "Nom"@fr ; sh:order 0 ; sh:maxCount 1 ; sh:nodeKind sh:Literal ] .
"#;

pub const VOCABULARY: &str = r#"
ex:themes a skos:ConceptScheme ; skos:prefLabel "Thèmes"@fr, "Themes"@en .
ex:transport skos:inScheme ex:themes ; skos:prefLabel "Transport"@fr, "Transportation"@en .
ex:environment skos:inScheme ex:themes ; skos:prefLabel "Environnement"@fr, "Environment"@en .
ex:places a skos:ConceptScheme ; skos:prefLabel "Territoires"@fr .
ex:lyon skos:inScheme ex:places ; skos:prefLabel "Lyon"@fr .
ex:grenoble skos:inScheme ex:places ; skos:prefLabel "Grenoble"@fr .
ex:empty a skos:ConceptScheme ; skos:prefLabel "Vide"@fr .
"#;

pub const DATASET_IRI: &str = "urn:uuid:479fd670-32c5-4ade-a26d-0268b0ce5046";

/// A record using every kind of category.
pub const METAGRAPH: &str = r#"
<urn:uuid:479fd670-32c5-4ade-a26d-0268b0ce5046> a dcat:Dataset ;
  dct:identifier "479fd670-32c5-4ade-a26d-0268b0ce5046" ;
  dct:title "Réseau routier"@fr, "Road network"@en ;
  dct:description "Tronçons du réseau routier départemental."@fr ;
  dcat:keyword "route"@fr, "voirie"@fr ;
  dcat:theme ex:transport ;
  dct:spatial ex:lyon, <http://example.org/elsewhere> ;
  dct:publisher [ a foaf:Organization ; foaf:name "DREAL" ] ;
  dcat:contactPoint [ a vcard:Kind ; vcard:fn "Service SIG" ; vcard:hasEmail <mailto:sig@example.org> ] ;
  dct:modified "2024-01-02"^^xsd:date .
"#;

fn turtle(body: &str) -> Graph {
    parse_turtle(&format!("{PREFIXES}{body}")).expect("fixture turtle")
}

pub fn shapes() -> Graph {
    turtle(SHAPES)
}

pub fn vocabulary() -> Graph {
    turtle(VOCABULARY)
}

pub fn metagraph() -> Graph {
    turtle(METAGRAPH)
}

pub fn graph(body: &str) -> Graph {
    turtle(body)
}

pub fn keys_of(model: &FormModel, path: &str, kind: ObjectKind) -> Vec<NodeKey> {
    model
        .find(path)
        .into_iter()
        .filter(|(_, n)| n.kind == kind)
        .map(|(k, _)| k.clone())
        .collect()
}

pub fn button(model: &FormModel, path: &str) -> NodeKey {
    model
        .find(path)
        .into_iter()
        .find(|(_, n)| n.kind.is_button())
        .map(|(k, _)| k.clone())
        .expect("button")
}

/// `(row, kind)` of a container's children, sorted by row; twins once.
pub fn layout(model: &FormModel, container: &NodeKey) -> Vec<(usize, ObjectKind)> {
    let mut rows: Vec<(usize, ObjectKind)> = model
        .children(container)
        .into_iter()
        .filter(|k| !k.is_manual())
        .filter_map(|k| model.get(k).map(|n| (n.row, n.kind)))
        .collect();
    rows.sort_by_key(|(row, _)| *row);
    rows
}
