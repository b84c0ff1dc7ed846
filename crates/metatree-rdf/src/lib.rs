//! RDF boundary for the metatree engine.
//!
//! This crate owns everything that touches serialized RDF or the shape of a
//! graph:
//!
//! - a small owned term model and an in-memory [`Graph`] exposing the
//!   [`GraphRead`] capability the engine consumes,
//! - Sophia-backed loading of Turtle / N-Triples / RDF-XML (schemas and
//!   vocabularies are usually shipped as Turtle),
//! - the JSON-LD codec used for metadata embedded in free text, and the
//!   `<METADATA>` marker helpers around it,
//! - SKOS lookups (scheme contents, labels, label ↔ concept resolution).
//!
//! The form engine (`metatree-form`) never parses RDF text itself.

pub mod description;
pub mod error;
pub mod graph;
pub mod jsonld;
pub mod namespace;
pub mod parse;
pub mod skos;
pub mod term;

pub use description::{
    description_without_metadata, metadata_payload, metagraph_from_description,
    update_description,
};
pub use error::{RdfError, RdfResult};
pub use graph::{Graph, GraphRead};
pub use jsonld::{graph_from_jsonld, graph_to_jsonld};
pub use namespace::PrefixMap;
pub use parse::{parse_graph, parse_graph_file, parse_turtle, RdfFormat};
pub use term::{local_name, Literal, Node, Term, Triple};
