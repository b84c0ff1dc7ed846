mod common;

use common::*;
use metatree_form::{
    build, build_from_description, BuildError, BuildOptions, MutationError, NodeKey, ObjectKind,
    Source, SourceState, Template, TemplateRecord,
};
use metatree_rdf::{parse_turtle, Graph};

const PLACES: &str = "http://example.org/places";
const THEMES: &str = "http://example.org/themes";

fn edit_model(body: &str) -> metatree_form::FormModel {
    build(
        &graph(body),
        &shapes(),
        &vocabulary(),
        None,
        &BuildOptions::default(),
    )
    .expect("build")
}

fn pair(model: &metatree_form::FormModel, path: &str) -> (NodeKey, NodeKey) {
    let real = keys_of(model, path, ObjectKind::Field)
        .into_iter()
        .find(|k| !k.is_manual())
        .expect("real key");
    let twin = real.twin().expect("twin");
    (real, twin)
}

// ============================================================================
// Title and keywords
// ============================================================================

#[test]
fn test_mandatory_title_and_repeatable_keywords() {
    let shapes = parse_turtle(&format!(
        "{PREFIXES}
ex:S sh:targetClass dcat:Dataset ;
  sh:property [ sh:path dct:title ; sh:name \"title\" ; sh:order 0 ; sh:minCount 1 ; sh:maxCount 1 ;
                sh:nodeKind sh:Literal ] ,
              [ sh:path dcat:keyword ; sh:name \"keyword\" ; sh:order 1 ; sh:nodeKind sh:Literal ] ."
    ))
    .expect("shapes");
    let mut model = build(
        &Graph::new(),
        &shapes,
        &Graph::new(),
        None,
        &BuildOptions::default(),
    )
    .expect("build");

    let titles = keys_of(&model, "dct:title", ObjectKind::Field);
    assert_eq!(titles.len(), 1);
    let title = model.get(&titles[0]).expect("title");
    assert!(title.mandatory);
    assert_eq!((title.row, title.value.as_deref()), (0, None));

    let group = keys_of(&model, "dcat:keyword", ObjectKind::RepeatGroup)
        .pop()
        .expect("keyword group");
    assert_eq!(model.get(&group).map(|n| n.row), Some(1));
    assert_eq!(
        layout(&model, &group),
        vec![(1, ObjectKind::Field), (2, ObjectKind::AddButton)]
    );

    let add = button(&model, "dcat:keyword");
    model.add(&add).expect("first add");
    model.add(&add).expect("second add");
    assert_eq!(
        layout(&model, &group),
        vec![
            (1, ObjectKind::Field),
            (2, ObjectKind::Field),
            (3, ObjectKind::Field),
            (4, ObjectKind::AddButton)
        ]
    );

    let middle = model
        .value_children(&group)
        .into_iter()
        .find(|k| model.get(k).is_some_and(|n| n.row == 2))
        .expect("middle keyword");
    let report = model.drop(&middle).expect("drop");
    assert_eq!(report.deleted_keys, vec![middle]);
    assert_eq!(
        layout(&model, &group),
        vec![
            (1, ObjectKind::Field),
            (2, ObjectKind::Field),
            (3, ObjectKind::AddButton)
        ]
    );
    model.check_invariants().expect("invariants");
}

// ============================================================================
// Sources and manual twins
// ============================================================================

#[test]
fn test_unknown_place_falls_back_to_manual_twin() {
    let mut model = edit_model(
        "<http://example.org/ds> a dcat:Dataset ; dct:spatial <http://example.org/elsewhere> .",
    );
    let (real, twin) = pair(&model, "dct:spatial");

    assert_eq!(model.current_source(&real), Some(Source::Manual));
    assert!(model.is_hidden_manual(&real));
    assert!(model.is_visible(&twin));
    assert_eq!(model.get(&real).and_then(|n| n.value.clone()), None);
    assert_eq!(
        model.get(&twin).and_then(|n| n.value.as_deref()),
        Some("http://example.org/elsewhere")
    );

    let report = model
        .change_source(&twin, Source::Scheme(PLACES.into()))
        .expect("change source");
    assert!(model.is_visible(&real));
    assert!(model.is_hidden_manual(&twin));
    assert_eq!(model.get(&twin).and_then(|n| n.value.clone()), None);
    assert_eq!(report.empty_nodes, vec![twin.clone()]);
    assert_eq!(report.hide_nodes, vec![twin.clone()]);
    assert_eq!(report.show_nodes, vec![real.clone()]);
    assert_eq!(report.concepts_list_to_refresh, vec![real.clone()]);
    assert_eq!(
        model.choices(&real, &vocabulary()),
        vec!["".to_string(), "Grenoble".into(), "Lyon".into()]
    );
    model.check_invariants().expect("invariants");
}

#[test]
fn test_known_place_uses_its_scheme() {
    let model = edit_model("<http://example.org/ds> a dcat:Dataset ; dct:spatial ex:lyon .");
    let (real, twin) = pair(&model, "dct:spatial");
    assert_eq!(
        model.get(&real).and_then(|n| n.source_state.clone()),
        Some(SourceState::Active(Source::Scheme(PLACES.into())))
    );
    assert_eq!(model.get(&real).and_then(|n| n.value.as_deref()), Some("Lyon"));
    assert!(!model.is_visible(&twin));
    assert_eq!(
        model.sources(&real),
        &[Source::Scheme(PLACES.into()), Source::Manual]
    );
}

#[test]
fn test_change_source_to_current_is_a_no_op() {
    let mut model = edit_model("<http://example.org/ds> a dcat:Dataset ; dct:spatial ex:lyon .");
    let (real, _) = pair(&model, "dct:spatial");
    let report = model
        .change_source(&real, Source::Scheme(PLACES.into()))
        .expect("no-op");
    assert!(report.is_empty());
    assert!(matches!(
        model.change_source(&real, Source::Scheme(THEMES.into())),
        Err(MutationError::UnknownSource { .. })
    ));
}

#[test]
fn test_hidden_twin_can_only_be_cleared() {
    let mut model = edit_model("<http://example.org/ds> a dcat:Dataset ; dct:spatial ex:lyon .");
    let (_, twin) = pair(&model, "dct:spatial");
    assert_eq!(
        model.update_value(&twin, Some("http://example.org/x")),
        Err(MutationError::HiddenNode(twin.clone()))
    );
    model.update_value(&twin, None).expect("clearing is allowed");
    model.update_value(&twin, Some("")).expect("empty string clears");
}

#[test]
fn test_drop_removes_both_halves_of_a_pair() {
    let mut model = edit_model(
        "<http://example.org/ds> a dcat:Dataset ; dct:spatial ex:lyon, <http://example.org/elsewhere> .",
    );
    let group = keys_of(&model, "dct:spatial", ObjectKind::RepeatGroup)
        .pop()
        .expect("group");
    assert_eq!(model.value_children(&group).len(), 2);
    let (real, twin) = pair(&model, "dct:spatial");
    let report = model.drop(&twin).expect("drop through the twin");
    assert!(report.deleted_keys.contains(&real));
    assert!(report.deleted_keys.contains(&twin));
    assert!(!model.contains(&real) && !model.contains(&twin));
    assert_eq!(report.remove_buttons_to_hide.len(), 1);
    model.check_invariants().expect("invariants");
}

#[test]
fn test_unlisted_concept_is_reported_and_leaves_the_source_list() {
    let mut model = edit_model(
        "<http://example.org/ds> a dcat:Dataset ; dcat:theme <http://example.org/unknown-theme> .",
    );
    let real = keys_of(&model, "dcat:theme", ObjectKind::Field)
        .pop()
        .expect("theme");
    assert_eq!(model.current_source(&real), Some(Source::Unlisted));
    let warnings = model.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].iri, "http://example.org/unknown-theme");

    let report = model
        .change_source(&real, Source::Scheme(THEMES.into()))
        .expect("change source");
    assert_eq!(report.refresh_source_menu, vec![real.clone()]);
    assert!(!model.sources(&real).contains(&Source::Unlisted));
    assert!(model.warnings().is_empty());
}

#[test]
fn test_group_twin_holds_a_nested_publisher() {
    let mut model = edit_model(
        "<http://example.org/ds> a dcat:Dataset ; dct:publisher [ a foaf:Organization ; foaf:name \"DREAL\" ] .",
    );
    let (real, twin) = pair(&model, "dct:publisher");
    assert_eq!(model.get(&twin).map(|n| n.kind), Some(ObjectKind::PropertyGroup));
    assert_eq!(model.current_source(&real), Some(Source::Manual));
    let name = keys_of(&model, "dct:publisher / foaf:name", ObjectKind::Field)
        .pop()
        .expect("name");
    assert!(twin.is_ancestor_of(&name));
    assert!(model.is_visible(&name));

    let report = model
        .change_source(&real, Source::FreeUri)
        .expect("switch to IRI");
    assert_eq!(report.empty_nodes, vec![name.clone()]);
    assert!(report.concepts_list_to_refresh.is_empty());
    assert!(model.is_hidden_manual(&name));
    model.check_invariants().expect("invariants");
}

#[test]
fn test_contact_email_is_shown_without_scheme() {
    let model = edit_model(
        "<http://example.org/ds> a dcat:Dataset ; dcat:contactPoint [ a vcard:Kind ; vcard:hasEmail <mailto:sig@example.org> ] .",
    );
    let email = keys_of(&model, "dcat:contactPoint / vcard:hasEmail", ObjectKind::Field)
        .pop()
        .expect("email");
    assert_eq!(
        model.get(&email).and_then(|n| n.value.as_deref()),
        Some("sig@example.org")
    );
}

#[test]
fn test_fields_inside_an_inactive_twin_refuse_source_and_language_changes() {
    let shapes = parse_turtle(&format!(
        "{PREFIXES}
ex:S sh:targetClass dcat:Dataset ;
  sh:property [ sh:path dct:publisher ; sh:name \"publisher\" ; sh:maxCount 1 ;
                sh:nodeKind sh:BlankNodeOrIRI ; sh:class foaf:Organization ] .
ex:O sh:targetClass foaf:Organization ;
  sh:property [ sh:path foaf:name ; sh:order 0 ; sh:nodeKind sh:Literal ; sh:datatype rdf:langString ] ,
              [ sh:path foaf:homepage ; sh:order 1 ; sh:maxCount 1 ; sh:nodeKind sh:IRI ] ."
    ))
    .expect("shapes");
    let options = BuildOptions {
        languages: vec!["fr".into(), "en".into()],
        ..BuildOptions::translation()
    };
    let mut model = build(
        &graph("<http://example.org/ds> a dcat:Dataset ; dct:publisher ex:dreal ."),
        &shapes,
        &Graph::new(),
        None,
        &options,
    )
    .expect("build");
    let (real, _) = pair(&model, "dct:publisher");
    let name = keys_of(&model, "dct:publisher / foaf:name", ObjectKind::Field)
        .pop()
        .expect("name");
    let homepage = keys_of(&model, "dct:publisher / foaf:homepage", ObjectKind::Field)
        .pop()
        .expect("homepage");
    assert!(model.is_hidden_manual(&name));

    assert_eq!(
        model.change_language(&name, "en"),
        Err(MutationError::HiddenNode(name.clone()))
    );
    assert_eq!(
        model.change_source(&homepage, Source::FreeUri),
        Err(MutationError::HiddenNode(homepage.clone()))
    );

    model.change_source(&real, Source::Manual).expect("describe the publisher");
    model.change_language(&name, "en").expect("visible now");
    model.check_invariants().expect("invariants");
}

// ============================================================================
// Templates, tabs and options
// ============================================================================

#[test]
fn test_template_tabs_and_extra_tab() {
    let template = Template::default()
        .with_tabs(["Général", "Contacts"])
        .with_category(
            "dct:title",
            TemplateRecord {
                tab: Some("Général".into()),
                order: Some(0),
                ..TemplateRecord::default()
            },
        )
        .with_category(
            "dcat:contactPoint",
            TemplateRecord {
                tab: Some("Contacts".into()),
                ..TemplateRecord::default()
            },
        )
        .with_category("dcat:contactPoint / vcard:fn", TemplateRecord::default());
    let model = build(
        &metagraph(),
        &shapes(),
        &vocabulary(),
        Some(&template),
        &BuildOptions::default(),
    )
    .expect("build");
    model.check_invariants().expect("invariants");

    let tab_of = |path: &str, kind: ObjectKind| {
        let key = keys_of(&model, path, kind).pop().expect(path);
        let tab = key
            .ancestors()
            .find(|a| a.generation() == 1)
            .expect("tab ancestor");
        model.get(&tab).and_then(|n| n.label.clone()).expect("tab label")
    };
    assert_eq!(tab_of("dct:title", ObjectKind::RepeatGroup), "Général");
    assert_eq!(tab_of("dcat:contactPoint / vcard:fn", ObjectKind::Field), "Contacts");
    // Data outside the template is kept, in the extra tab.
    assert_eq!(tab_of("dct:modified", ObjectKind::Field), "Other");
    // Nested categories outside the template still show when they hold data.
    assert_eq!(
        keys_of(&model, "dcat:contactPoint / vcard:hasEmail", ObjectKind::Field).len(),
        1
    );
}

#[test]
fn test_added_contact_copies_the_shape_of_its_sibling() {
    let template = Template::default()
        .with_category("dct:title", TemplateRecord::default())
        .with_category("dcat:contactPoint", TemplateRecord::default());
    let mut model = build(
        &metagraph(),
        &shapes(),
        &vocabulary(),
        Some(&template),
        &BuildOptions::default(),
    )
    .expect("build");
    let existing = keys_of(&model, "dcat:contactPoint", ObjectKind::PropertyGroup)
        .pop()
        .expect("contact group");

    let report = model
        .add(&button(&model, "dcat:contactPoint"))
        .expect("add a contact");
    model.check_invariants().expect("invariants after add");

    let added = report.new_keys.first().cloned().expect("new contact");
    assert_eq!(model.get(&added).map(|n| n.kind), Some(ObjectKind::PropertyGroup));
    assert_ne!(
        model.get(&added).and_then(|n| n.subject.clone()),
        model.get(&existing).and_then(|n| n.subject.clone())
    );
    for path in ["dcat:contactPoint / vcard:fn", "dcat:contactPoint / vcard:hasEmail"] {
        let copied: Vec<NodeKey> = keys_of(&model, path, ObjectKind::Field)
            .into_iter()
            .filter(|k| added.is_ancestor_of(k))
            .collect();
        assert_eq!(copied.len(), 1, "{path} not copied");
        assert_eq!(model.get(&copied[0]).and_then(|n| n.value.clone()), None);
    }

    model.drop(&added).expect("drop the new contact");
    model.check_invariants().expect("invariants after drop");
}

#[test]
fn test_added_spatial_value_starts_from_its_first_source() {
    let mut model = edit_model(
        "<http://example.org/ds> a dcat:Dataset ;
           dct:spatial <http://example.org/elsewhere> .",
    );
    let (real, twin) = pair(&model, "dct:spatial");
    assert_eq!(model.current_source(&real), Some(Source::Manual));

    let report = model.add(&button(&model, "dct:spatial")).expect("add");
    model.check_invariants().expect("invariants");
    let added = report.new_keys.first().cloned().expect("new value");
    assert_ne!(added, real);
    assert_eq!(
        model.current_source(&added),
        Some(Source::Scheme(PLACES.into()))
    );
    assert!(model.is_visible(&added));
    assert!(model.contains(&added.twin().expect("twin")));
    assert!(!model.is_visible(&added.twin().expect("twin")));
    assert!(model.is_visible(&twin));
}

#[test]
fn test_read_mode_leaves_out_unlisted_categories() {
    let template = Template::default().with_category("dct:title", TemplateRecord::default());
    let model = build(
        &metagraph(),
        &shapes(),
        &vocabulary(),
        Some(&template),
        &BuildOptions::read(),
    )
    .expect("build");
    assert_eq!(keys_of(&model, "dct:title", ObjectKind::Field).len(), 1);
    assert!(model.find("dct:modified").is_empty());
    assert_eq!(model.children(&NodeKey::root()).len(), 1);
}

#[test]
fn test_invalid_template_aborts_the_build() {
    let template = Template::default()
        .with_category(
            "dct:title",
            TemplateRecord {
                order: Some(1),
                ..TemplateRecord::default()
            },
        )
        .with_category(
            "dct:modified",
            TemplateRecord {
                order: Some(1),
                ..TemplateRecord::default()
            },
        );
    let result = build(
        &metagraph(),
        &shapes(),
        &vocabulary(),
        Some(&template),
        &BuildOptions::default(),
    );
    assert!(matches!(result, Err(BuildError::InvalidTemplate(_))));
}

#[test]
fn test_invalid_options_abort_the_build() {
    let options = BuildOptions {
        language: "it".into(),
        ..BuildOptions::default()
    };
    let result = build(&metagraph(), &shapes(), &vocabulary(), None, &options);
    assert!(matches!(result, Err(BuildError::InvalidOptions(_))));
}

#[test]
fn test_malformed_json_payload_is_a_decode_error() {
    let result = build_from_description(
        "Some text <METADATA>{ not json</METADATA>",
        &shapes(),
        &vocabulary(),
        None,
        &BuildOptions::default(),
    );
    assert!(matches!(result, Err(BuildError::Decode(_))));
}

#[test]
fn test_description_without_block_builds_a_fresh_record() {
    let model = build_from_description(
        "Couche des routes.",
        &shapes(),
        &vocabulary(),
        None,
        &BuildOptions::default(),
    )
    .expect("build");
    assert!(model
        .subject()
        .as_iri()
        .is_some_and(|iri| iri.starts_with("urn:uuid:")));
    assert_eq!(keys_of(&model, "dct:title", ObjectKind::Field).len(), 1);
    model.check_invariants().expect("invariants");
}
