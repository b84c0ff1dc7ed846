//! # metatree-form
//!
//! The metadata form-tree engine. A dataset's metadata graph, checked against
//! a SHACL-like schema of admissible categories and laid out by an optional
//! user template, is projected into a [`FormModel`]: an ordered arena of
//! [`FormNode`]s addressed by hierarchical [`NodeKey`]s.
//!
//! The model then goes through user edits and is written back to RDF:
//!
//! ```text
//! schema + vocabulary + template ──resolve──► ResolvedSchema
//! metagraph ──build──► FormModel ──add / drop / change_source /
//!                                  change_language / update_value──► FormModel
//! FormModel ──serialize──► Graph
//! ```
//!
//! Every mutation either restores all model invariants (row contiguity,
//! twin exclusivity, button visibility, language partition, no ghost
//! groups) or fails without changing anything. See
//! [`FormModel::check_invariants`].
//!
//! The engine never renders anything. Each mutation returns an
//! [`ActionReport`] telling the presentation layer which of its controls to
//! show, hide, move, empty or refresh.

pub mod builder;
pub mod config;
pub mod error;
pub mod invariants;
pub mod key;
pub mod model;
pub mod mutation;
pub mod node;
pub mod schema;
pub mod serializer;
pub mod template;

pub use builder::{build, build_from_description};
pub use config::{BuildOptions, Mode};
pub use error::{BuildError, ErrorKind, KeyError, MutationError, SerializeError, TemplateError};
pub use invariants::InvariantViolation;
pub use key::{is_ancestor, is_older, is_root, replace_ancestor, NodeKey};
pub use model::{FormModel, UnlistedReference};
pub use mutation::ActionReport;
pub use node::{FormNode, ObjectKind, Source, SourceState};
pub use schema::{
    resolve, CategoryPath, FieldKind, NodeKind, ResolvedSchema, SchemaEntry, Transform,
};
pub use serializer::serialize;
pub use template::{Template, TemplateRecord};
