//! Metadata embedded in free text between `<METADATA>` markers.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::RdfResult;
use crate::graph::Graph;
use crate::jsonld::{graph_from_jsonld, graph_to_jsonld};

pub const OPEN_MARKER: &str = "<METADATA>";
pub const CLOSE_MARKER: &str = "</METADATA>";

fn payload_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Greedy prefix: the last opening marker that still has a closing one after it.
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(?:.*)<METADATA>(.*?)</METADATA>").expect("marker pattern is valid")
    })
}

/// Raw payload between the last opening marker and the first closing marker
/// after it, if any.
pub fn metadata_payload(description: &str) -> Option<&str> {
    payload_regex()
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Decode the embedded JSON-LD. Missing markers or an empty payload give an
/// empty graph; malformed JSON is an error.
pub fn metagraph_from_description(description: &str) -> RdfResult<Graph> {
    match metadata_payload(description).map(str::trim) {
        Some(payload) if !payload.is_empty() => graph_from_jsonld(payload),
        _ => Ok(Graph::new()),
    }
}

/// Byte range of the first `<METADATA>...</METADATA>` pair, markers included.
fn first_block(description: &str) -> Option<(usize, usize)> {
    let start = description.find(OPEN_MARKER)?;
    let after = start + OPEN_MARKER.len();
    let close = description[after..].find(CLOSE_MARKER)?;
    Some((start, after + close + CLOSE_MARKER.len()))
}

/// Write `graph` into the description. The first marker pair has its content
/// replaced; without one, a block is appended after a blank line. An empty
/// graph leaves the description untouched.
pub fn update_description(description: &str, graph: &Graph) -> RdfResult<String> {
    if graph.is_empty() {
        return Ok(description.to_string());
    }
    let payload = graph_to_jsonld(graph)?;
    let block = format!("{OPEN_MARKER}\n{payload}\n{CLOSE_MARKER}");

    Ok(match first_block(description) {
        Some((start, end)) => {
            format!("{}{block}{}", &description[..start], &description[end..])
        }
        None if description.is_empty() => format!("{block}\n"),
        None => format!("{description}\n\n{block}\n"),
    })
}

/// The free text with the first metadata block removed.
pub fn description_without_metadata(description: &str) -> String {
    match first_block(description) {
        Some((start, end)) => {
            let head = description[..start].trim_end();
            let tail = description[end..].trim_start();
            match (head.is_empty(), tail.is_empty()) {
                (true, _) => tail.to_string(),
                (_, true) => head.to_string(),
                _ => format!("{head}\n\n{tail}"),
            }
        }
        None => description.to_string(),
    }
}
