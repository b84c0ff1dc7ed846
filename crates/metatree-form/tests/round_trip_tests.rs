mod common;

use common::*;
use metatree_form::{
    build, build_from_description, serialize, BuildOptions, FormModel, ObjectKind,
    SerializeError, Source,
};
use metatree_rdf::namespace::{DCAT_DATASET, RDF_TYPE};
use metatree_rdf::{update_description, Graph, GraphRead, Literal, Node, Term};

const DCT: &str = "http://purl.org/dc/terms/";
const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";

fn edit(metagraph: &Graph) -> FormModel {
    build(metagraph, &shapes(), &vocabulary(), None, &BuildOptions::default()).expect("build")
}

fn assert_isomorphic(left: &Graph, right: &Graph) {
    assert!(
        left.is_isomorphic(right),
        "graphs differ:\n{:#?}\n---\n{:#?}",
        left.iter().collect::<Vec<_>>(),
        right.iter().collect::<Vec<_>>()
    );
}

// ============================================================================
// Lossless round trips
// ============================================================================

#[test]
fn test_untouched_record_serializes_back_to_itself() {
    let metagraph = metagraph();
    let model = edit(&metagraph);
    model.check_invariants().expect("invariants");
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert_isomorphic(&graph, &metagraph);
}

#[test]
fn test_translation_mode_round_trip() {
    let metagraph = metagraph();
    let model = build(
        &metagraph,
        &shapes(),
        &vocabulary(),
        None,
        &BuildOptions::translation(),
    )
    .expect("build");
    assert_eq!(
        keys_of(&model, "dct:title", ObjectKind::TranslationGroup).len(),
        1
    );
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert_isomorphic(&graph, &metagraph);
}

#[test]
fn test_round_trip_through_a_description() {
    let metagraph = metagraph();
    let description = update_description("Routes départementales.", &metagraph).expect("encode");
    let model = build_from_description(
        &description,
        &shapes(),
        &vocabulary(),
        None,
        &BuildOptions::default(),
    )
    .expect("build");
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert_isomorphic(&graph, &metagraph);

    let rewritten = update_description(&description, &graph).expect("re-encode");
    assert!(rewritten.starts_with("Routes départementales."));
    assert_eq!(rewritten.matches("<METADATA>").count(), 1);
}

#[test]
fn test_predicates_unknown_to_the_schema_are_kept() {
    let metagraph = graph(
        "<http://example.org/ds> a dcat:Dataset ;
           ex:note \"libre\" ;
           ex:seeAlso <http://example.org/other> .",
    );
    let model = edit(&metagraph);
    let note = keys_of(&model, "ex:note", ObjectKind::Field);
    assert_eq!(note.len(), 1);
    let tab = note[0].ancestors().find(|a| a.generation() == 1).expect("tab");
    assert_eq!(
        model.get(&tab).and_then(|n| n.label.as_deref()),
        Some("Other")
    );
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert_isomorphic(&graph, &metagraph);
}

#[test]
fn test_unlisted_concept_survives_saving() {
    let metagraph = graph(
        "<http://example.org/ds> a dcat:Dataset ; dcat:theme <http://example.org/unknown-theme> .",
    );
    let model = edit(&metagraph);
    assert_eq!(model.warnings().len(), 1);
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert_isomorphic(&graph, &metagraph);
}

// ============================================================================
// Edits reaching the graph
// ============================================================================

#[test]
fn test_fresh_record_gets_a_uuid_and_its_identifier() {
    let mut model = edit(&Graph::new());
    let title = keys_of(&model, "dct:title", ObjectKind::Field)
        .pop()
        .expect("title");
    model
        .update_value(&title, Some("Réseau cyclable"))
        .expect("type a title");
    let graph = serialize(&model, &vocabulary()).expect("serialize");

    let subject = model.subject().clone();
    let uuid = subject
        .as_iri()
        .and_then(|iri| iri.strip_prefix("urn:uuid:"))
        .expect("uuid subject");
    assert!(graph
        .objects(&subject, &format!("{DCT}identifier"))
        .contains(&&Term::Literal(Literal::plain(uuid))));
    assert!(graph
        .objects(&subject, &format!("{DCT}title"))
        .contains(&&Term::Literal(Literal::lang("Réseau cyclable", "fr"))));
    assert_eq!(
        graph.subjects(RDF_TYPE, &Term::iri(DCAT_DATASET)),
        vec![&subject]
    );
}

#[test]
fn test_replaced_identifier_moves_every_triple() {
    let mut model = edit(&metagraph());
    let report = model
        .replace_identifier("urn:uuid:00000000-0000-4000-8000-000000000001")
        .expect("replace");
    assert_eq!(report.refresh_values.len(), 1);
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    let old = Node::iri(DATASET_IRI);
    assert!(graph.iter().all(|t| t.subject != old));
    let new = Node::iri("urn:uuid:00000000-0000-4000-8000-000000000001");
    assert!(graph
        .objects(&new, &format!("{DCT}identifier"))
        .contains(&&Term::Literal(Literal::plain("00000000-0000-4000-8000-000000000001"))));
}

#[test]
fn test_switching_publisher_to_an_iri_drops_the_nested_description() {
    let mut model = edit(&metagraph());
    let real = keys_of(&model, "dct:publisher", ObjectKind::Field)
        .pop()
        .expect("publisher");
    model.change_source(&real, Source::FreeUri).expect("switch");
    model
        .update_value(&real, Some("http://example.org/dreal"))
        .expect("type the IRI");
    let graph = serialize(&model, &vocabulary()).expect("serialize");

    let subject = Node::iri(DATASET_IRI);
    assert_eq!(
        graph.objects(&subject, &format!("{DCT}publisher")),
        vec![&Term::iri("http://example.org/dreal")]
    );
    assert!(graph.iter().all(|t| t.predicate != FOAF_NAME));
}

#[test]
fn test_choosing_a_concept_writes_its_iri() {
    let mut model = edit(&metagraph());
    let theme = keys_of(&model, "dcat:theme", ObjectKind::Field)
        .pop()
        .expect("theme");
    model
        .update_value(&theme, Some("Environnement"))
        .expect("pick a concept");
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert_eq!(
        graph.objects(&Node::iri(DATASET_IRI), "http://www.w3.org/ns/dcat#theme"),
        vec![&Term::iri("http://example.org/environment")]
    );
}

#[test]
fn test_emptied_nested_group_leaves_no_link() {
    let mut model = edit(&metagraph());
    for key in keys_of(&model, "dcat:contactPoint / vcard:fn", ObjectKind::Field)
        .into_iter()
        .chain(keys_of(&model, "dcat:contactPoint / vcard:hasEmail", ObjectKind::Field))
    {
        model.update_value(&key, None).expect("clear");
    }
    let graph = serialize(&model, &vocabulary()).expect("serialize");
    assert!(graph
        .iter()
        .all(|t| t.predicate != "http://www.w3.org/ns/dcat#contactPoint"));
    assert!(graph
        .iter()
        .all(|t| t.object != Term::iri("http://www.w3.org/2006/vcard/ns#Kind")));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_read_mode_model_cannot_be_saved() {
    let model = build(
        &metagraph(),
        &shapes(),
        &vocabulary(),
        None,
        &BuildOptions::read(),
    )
    .expect("build");
    assert_eq!(
        serialize(&model, &vocabulary()),
        Err(SerializeError::ReadOnlyMode)
    );
}

#[test]
fn test_label_outside_the_scheme_is_refused() {
    let mut model = edit(&metagraph());
    let theme = keys_of(&model, "dcat:theme", ObjectKind::Field)
        .pop()
        .expect("theme");
    model
        .update_value(&theme, Some("Agriculture"))
        .expect("free text");
    assert!(matches!(
        serialize(&model, &vocabulary()),
        Err(SerializeError::UnknownConcept { label, .. }) if label == "Agriculture"
    ));
}

#[test]
fn test_malformed_manual_iri_is_refused() {
    let mut model = edit(&metagraph());
    let twin = keys_of(&model, "dct:spatial", ObjectKind::Field)
        .into_iter()
        .find(|k| k.is_manual() && model.is_visible(k))
        .expect("visible twin");
    model
        .update_value(&twin, Some("not an iri"))
        .expect("free text");
    assert_eq!(
        serialize(&model, &vocabulary()),
        Err(SerializeError::InvalidIri {
            value: "not an iri".into()
        })
    );
}
