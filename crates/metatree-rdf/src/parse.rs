//! Loading serialized RDF into a [`Graph`] with Sophia.
//!
//! The engine itself never parses RDF text: callers load the schema and the
//! vocabulary here (or build graphs by hand) and hand the parsed graphs over.
//! Supported:
//! - N-Triples (`.nt`)
//! - Turtle (`.ttl`)
//! - RDF/XML (`.rdf`, `.xml`)

use regex::Regex;
use sophia::api::prelude::*;
use sophia::api::triple::Triple as _;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{RdfError, RdfResult};
use crate::graph::Graph;
use crate::namespace::PrefixMap;
use crate::term::{parse_node_display, parse_term_display, Node, Triple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    NTriples,
    Turtle,
    RdfXml,
}

impl RdfFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "nt" | "ntriples" => Some(Self::NTriples),
            "ttl" | "turtle" => Some(Self::Turtle),
            "rdf" | "xml" | "owl" => Some(Self::RdfXml),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::NTriples => "N-Triples",
            Self::Turtle => "Turtle",
            Self::RdfXml => "RDF/XML",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct GraphSinkError {
    message: String,
}

impl From<anyhow::Error> for GraphSinkError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

fn push_display_triple(
    graph: &mut Graph,
    s: String,
    p: String,
    o: String,
) -> Result<(), GraphSinkError> {
    let subject = parse_node_display(&s)?;
    let Node::Iri(predicate) = parse_node_display(&p)? else {
        return Ok(());
    };
    let object = parse_term_display(&o)?;
    graph.insert(Triple::new(subject, predicate, object));
    Ok(())
}

macro_rules! collect_triples {
    ($parser:expr, $graph:expr, $format:expr) => {{
        let mut parser = $parser;
        parser
            .try_for_each_triple(|t| -> Result<(), GraphSinkError> {
                push_display_triple(
                    &mut $graph,
                    t.s().to_string(),
                    t.p().to_string(),
                    t.o().to_string(),
                )
            })
            .map_err(|e| RdfError::Parse {
                format: $format.name(),
                message: e.to_string(),
            })
    }};
}

/// Parse `text` in the given format. Prefix declarations found in Turtle
/// input are added to the graph's prefix map.
pub fn parse_graph(text: &str, format: RdfFormat) -> RdfResult<Graph> {
    let mut graph = Graph::with_prefixes(PrefixMap::default());
    let reader = std::io::BufReader::new(std::io::Cursor::new(text.as_bytes()));

    match format {
        RdfFormat::NTriples => {
            collect_triples!(
                sophia::turtle::parser::nt::parse_bufread(reader),
                graph,
                format
            )?;
        }
        RdfFormat::Turtle => {
            collect_triples!(
                sophia::turtle::parser::turtle::parse_bufread(reader),
                graph,
                format
            )?;
            for (prefix, ns) in turtle_prefixes(text) {
                graph.prefixes_mut().insert(prefix, ns);
            }
        }
        RdfFormat::RdfXml => {
            collect_triples!(sophia::xml::parser::parse_bufread(reader), graph, format)?;
        }
    }
    Ok(graph)
}

pub fn parse_turtle(text: &str) -> RdfResult<Graph> {
    parse_graph(text, RdfFormat::Turtle)
}

pub fn parse_graph_file(path: &Path) -> RdfResult<Graph> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let format = RdfFormat::from_extension(ext).ok_or_else(|| RdfError::Parse {
        format: "RDF",
        message: format!("unsupported RDF format: .{ext}"),
    })?;
    let text = std::fs::read_to_string(path).map_err(|e| RdfError::Parse {
        format: format.name(),
        message: format!("{}: {e}", path.display()),
    })?;
    parse_graph(&text, format)
}

fn turtle_prefixes(text: &str) -> Vec<(String, String)> {
    static PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    let re = PREFIX_RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*@?prefix\s+([A-Za-z][\w.-]*)?:\s*<([^>]*)>")
            .expect("prefix pattern is valid")
    });
    re.captures_iter(text)
        .map(|c| {
            let prefix = c.get(1).map(|m| m.as_str()).unwrap_or_default();
            (prefix.to_string(), c[2].to_string())
        })
        .collect()
}
