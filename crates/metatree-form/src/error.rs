//! Error types of the form engine.

use metatree_rdf::RdfError;
use thiserror::Error;

use crate::key::NodeKey;
use crate::node::Source;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("{ancestor} is not an ancestor of {key}")]
    InvalidAncestor { key: NodeKey, ancestor: NodeKey },
    #[error("cannot substitute {new} for {old}: generation or manual tag differs")]
    GenerationMismatch { old: NodeKey, new: NodeKey },
    #[error("malformed node key: {0:?}")]
    Malformed(String),
}

/// An internally inconsistent template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("order {order} is used by both {first} and {second}")]
    DuplicateOrder {
        order: i64,
        first: String,
        second: String,
    },
    #[error("{path} refers to unknown tab {tab:?}")]
    UnknownTab { path: String, tab: String },
    #[error("tab {0:?} is declared twice")]
    DuplicateTab(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] TemplateError),
    #[error("invalid build options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Decode(#[from] RdfError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The mutation would break a model invariant.
    Structural,
    /// The requested value, language or source is not valid for the node.
    Domain,
}

/// A rejected mutation. The model is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("the root node cannot be added to or removed")]
    RootOperation,
    #[error("{0} is not inside a repeat or translation group")]
    OutsideGroup(NodeKey),
    #[error("{0} is the last value of its group")]
    LastOfItsKind(NodeKey),
    #[error("{0} is not an add button")]
    NotAButtonTarget(NodeKey),
    #[error("{0} has no more entries or languages to offer")]
    ExhaustedButton(NodeKey),
    #[error("no node {0} in this form")]
    UnknownKey(NodeKey),
    #[error("the form is read-only")]
    ReadOnlyMode,

    #[error("{requested:?} is not an admissible source for {key}")]
    UnknownSource { key: NodeKey, requested: Source },
    #[error("{0} does not hold a language-tagged string")]
    NotLanguageTaggable(NodeKey),
    #[error("language {language:?} is not available for {key}")]
    LanguageNotAuthorized { key: NodeKey, language: String },
    #[error("{0} is hidden and can only be cleared")]
    HiddenNode(NodeKey),
    #[error("{0} is not a field")]
    NotAField(NodeKey),
}

impl MutationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MutationError::RootOperation
            | MutationError::OutsideGroup(_)
            | MutationError::LastOfItsKind(_)
            | MutationError::NotAButtonTarget(_)
            | MutationError::ExhaustedButton(_)
            | MutationError::UnknownKey(_)
            | MutationError::ReadOnlyMode => ErrorKind::Structural,
            MutationError::UnknownSource { .. }
            | MutationError::NotLanguageTaggable(_)
            | MutationError::LanguageNotAuthorized { .. }
            | MutationError::HiddenNode(_)
            | MutationError::NotAField(_) => ErrorKind::Domain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("read-only forms are not serialized")]
    ReadOnlyMode,
    #[error("{label:?} is not a concept of {scheme}")]
    UnknownConcept { label: String, scheme: String },
    #[error("{value:?} is not a valid IRI")]
    InvalidIri { value: String },
}
