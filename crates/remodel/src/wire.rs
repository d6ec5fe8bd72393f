//! JSON text entry points wrapping the core engine.

use crate::engine;
use crate::error::MapError;
use crate::node::Node;
use crate::options::Mapping;

fn parse_source(text: &str) -> Result<Node, MapError> {
    if text.trim().is_empty() {
        return Err(MapError::MissingSource);
    }
    let value: serde_json::Value = serde_json::from_str(text)?;
    Ok(Node::from(value))
}

/// Parse JSON text and materialize it.
pub fn materialize_json(text: &str, mapping: &Mapping) -> Result<Node, MapError> {
    engine::materialize(&parse_source(text)?, mapping)
}

/// Parse JSON text and materialize it onto an existing mapped graph.
pub fn materialize_json_into(
    text: &str,
    mapping: &Mapping,
    target: &Node,
) -> Result<Node, MapError> {
    engine::materialize_into(&parse_source(text)?, mapping, target)
}

/// Dematerialize a mapped graph and serialize the result.
pub fn dematerialize_json(node: &Node, mapping: &Mapping) -> Result<String, MapError> {
    let plain = engine::dematerialize(node, mapping)?;
    serde_json::to_string(&plain.to_value()).map_err(MapError::from)
}

/// As [`dematerialize_json`], formatted for humans.
pub fn dematerialize_json_pretty(node: &Node, mapping: &Mapping) -> Result<String, MapError> {
    let plain = engine::dematerialize(node, mapping)?;
    serde_json::to_string_pretty(&plain.to_value()).map_err(MapError::from)
}
