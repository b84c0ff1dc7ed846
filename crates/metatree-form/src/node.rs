//! The record stored for every key of a form model.

use metatree_rdf::Node;
use serde::{Deserialize, Serialize};

use crate::schema::{CategoryPath, FieldKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// The form itself; holds the tabs.
    Root,
    Tab,
    Field,
    /// Several values of one category.
    RepeatGroup,
    /// The sub-properties of one nested resource.
    PropertyGroup,
    /// Per-language values of one category.
    TranslationGroup,
    AddButton,
    TranslationButton,
}

impl ObjectKind {
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ObjectKind::Root
                | ObjectKind::Tab
                | ObjectKind::RepeatGroup
                | ObjectKind::PropertyGroup
                | ObjectKind::TranslationGroup
        )
    }

    pub fn is_button(self) -> bool {
        matches!(self, ObjectKind::AddButton | ObjectKind::TranslationButton)
    }

    /// Repeat and translation groups: the containers whose values can be
    /// added and dropped.
    pub fn is_value_group(self) -> bool {
        matches!(self, ObjectKind::RepeatGroup | ObjectKind::TranslationGroup)
    }
}

/// Where the value of a field comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A SKOS concept scheme, by IRI.
    Scheme(String),
    /// Free IRI entry, without a concept list.
    FreeUri,
    /// The manual-entry twin.
    Manual,
    /// A stored IRI that no configured scheme knows.
    Unlisted,
}

impl Source {
    pub fn scheme(&self) -> Option<&str> {
        match self {
            Source::Scheme(iri) => Some(iri),
            _ => None,
        }
    }

    /// Sources whose field offers a concept list.
    pub fn has_concepts(&self) -> bool {
        matches!(self, Source::Scheme(_))
    }
}

/// Shared state of a real/manual pair, stored once on the real key. Which
/// twin is visible follows from it, so both can never be shown at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Active(Source),
    Manual,
}

impl SourceState {
    pub fn source(&self) -> Source {
        match self {
            SourceState::Active(source) => source.clone(),
            SourceState::Manual => Source::Manual,
        }
    }

    pub fn from_source(source: Source) -> Self {
        match source {
            Source::Manual => SourceState::Manual,
            other => SourceState::Active(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormNode {
    pub kind: ObjectKind,
    /// Category this node presents; `None` for the root and tabs.
    pub path: Option<CategoryPath>,
    pub label: Option<String>,
    pub help: Option<String>,
    pub row: usize,
    pub row_span: usize,
    /// Row of a label placed above the field, in the same grid as `row`.
    pub label_row: Option<usize>,
    pub field_kind: Option<FieldKind>,
    pub value: Option<String>,
    pub language: Option<String>,
    pub authorized_languages: Option<Vec<String>>,
    /// Admissible sources. Kept on the real key of a pair.
    pub sources: Vec<Source>,
    /// Set on sourced fields; for a pair, on the real key only.
    pub source_state: Option<SourceState>,
    pub hidden: bool,
    pub mandatory: bool,
    pub read_only: bool,
    pub pattern: Option<String>,
    pub placeholder: Option<String>,
    /// Resource described by a root, tab or property group.
    pub subject: Option<Node>,
    /// Next unused child index of a container.
    pub next_child: usize,
    pub has_remove_button: bool,
    pub remove_button_hidden: bool,
}

impl FormNode {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            path: None,
            label: None,
            help: None,
            row: 0,
            row_span: 1,
            label_row: None,
            field_kind: None,
            value: None,
            language: None,
            authorized_languages: None,
            sources: Vec::new(),
            source_state: None,
            hidden: false,
            mandatory: false,
            read_only: false,
            pattern: None,
            placeholder: None,
            subject: None,
            next_child: 0,
            has_remove_button: false,
            remove_button_hidden: false,
        }
    }

    /// First row of the node's own grid free for children: labelled groups
    /// keep row 0 for their caption.
    pub fn first_child_row(&self) -> usize {
        let captioned = matches!(
            self.kind,
            ObjectKind::RepeatGroup | ObjectKind::PropertyGroup | ObjectKind::TranslationGroup
        ) && self.label.is_some();
        usize::from(captioned)
    }

    /// Rows taken in the parent grid, label row included.
    pub fn top_row(&self) -> usize {
        self.label_row.unwrap_or(self.row)
    }

    pub fn bottom_row(&self) -> usize {
        self.row + self.row_span.max(1)
    }

    pub fn height(&self) -> usize {
        self.bottom_row() - self.top_row()
    }

    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub(crate) fn shift_rows(&mut self, delta: isize) {
        self.row = self.row.saturating_add_signed(delta);
        if let Some(label_row) = self.label_row.as_mut() {
            *label_row = label_row.saturating_add_signed(delta);
        }
    }
}
