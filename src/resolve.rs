//! Post-compile `$ref` resolution.
//!
//! Each recorded ref is walked as a sequence of `/`-separated tokens from the
//! root. Selection state ($defs / properties / items) is carried in a local
//! cursor, so concurrent compilations and re-entrant walks cannot interfere.
//! An unresolvable ref is left unresolved; it contributes nothing during
//! validation and is not a compile error.

use tracing::debug;

use crate::node::{NodeId, NodeKind, Schema};

/// Resolve every non-empty `ref` in the tree into a node index. The arena
/// holds each node exactly once, so one sweep over it visits the whole tree.
pub fn resolve_references(schema: &mut Schema) {
    for index in 0..schema.len() {
        let id = NodeId::new(index);
        let ref_ = schema.node(id).header.ref_.clone();
        if ref_.is_empty() {
            continue;
        }

        let target = resolve_ref(schema, &ref_);
        if target.is_none() {
            debug!(ref_ = %ref_, "reference did not resolve");
        }
        schema.nodes[id.index()].header.reference = target;
    }
}

/// Walker state between tokens: either at a node, or about to select inside
/// one of its keyed collections.
#[derive(Clone, Copy)]
enum Cursor {
    Node(NodeId),
    Defs(NodeId),
    Properties(NodeId),
    Items(NodeId),
}

/// Walk a pointer-style ref from the root. Returns the target node, or
/// `None` as soon as a token cannot be followed.
pub fn resolve_ref(schema: &Schema, ref_: &str) -> Option<NodeId> {
    let mut cursor = Cursor::Node(schema.root());

    for raw_token in ref_.split('/') {
        let token = unescape_token(raw_token);
        cursor = step(schema, cursor, &token)?;
    }

    match cursor {
        Cursor::Node(id) => Some(id),
        // a trailing selector without its key selects nothing
        _ => None,
    }
}

fn step(schema: &Schema, cursor: Cursor, token: &str) -> Option<Cursor> {
    match cursor {
        Cursor::Node(current) => {
            if token == "#" && current == schema.root() {
                return Some(Cursor::Node(current));
            }
            if let Some(anchor) = token.strip_prefix('#') {
                return schema.anchor(anchor).map(Cursor::Node);
            }
            if token == "$defs" {
                return Some(Cursor::Defs(current));
            }
            let node = schema.node(current);
            if token == "properties" && matches!(node.kind, NodeKind::Object(_)) {
                return Some(Cursor::Properties(current));
            }
            if token == "items" && matches!(node.kind, NodeKind::Array(_)) {
                return Some(Cursor::Items(current));
            }
            if !token.is_empty() && token == node.header.id {
                return Some(Cursor::Node(current));
            }
            None
        }
        Cursor::Defs(current) => schema
            .node(current)
            .header
            .defs
            .iter()
            .find(|(name, _)| name == token)
            .map(|&(_, id)| Cursor::Node(id)),
        Cursor::Properties(current) => match &schema.node(current).kind {
            NodeKind::Object(object) => object.property(token).map(Cursor::Node),
            _ => None,
        },
        Cursor::Items(current) => match &schema.node(current).kind {
            NodeKind::Array(array) => {
                let index: usize = token.parse().ok()?;
                array.items.get(index).copied().map(Cursor::Node)
            }
            _ => None,
        },
    }
}

/// JSON-pointer token unescaping: `~1` → `/`, then `~0` → `~`.
fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use serde_json::json;

    #[test]
    fn resolves_into_defs() {
        let schema = compile(&json!({
            "type": "object",
            "$defs": {"pos": {"type": "integer", "minimum": 1}},
            "properties": {"n": {"$ref": "#/$defs/pos"}},
        }))
        .expect("compiles");

        let n = match &schema.node(schema.root()).kind {
            NodeKind::Object(object) => object.property("n").unwrap(),
            other => panic!("expected object node, got {other:?}"),
        };
        let target = schema.node(n).header.reference.expect("ref resolved");
        let pos = schema.node(schema.root()).header.defs[0].1;
        assert_eq!(target, pos);
    }

    #[test]
    fn resolves_into_properties_and_items() {
        let schema = compile(&json!({
            "type": "object",
            "properties": {
                "list": {"type": "array", "items": [{"type": "string"}, {"type": "number"}]},
                "same": {"$ref": "#/properties/list/items/1"},
            },
        }))
        .expect("compiles");

        let (list, same) = match &schema.node(schema.root()).kind {
            NodeKind::Object(object) => (
                object.property("list").unwrap(),
                object.property("same").unwrap(),
            ),
            other => panic!("expected object node, got {other:?}"),
        };
        let second = match &schema.node(list).kind {
            NodeKind::Array(array) => array.items[1],
            other => panic!("expected array node, got {other:?}"),
        };
        assert_eq!(schema.node(same).header.reference, Some(second));
    }

    #[test]
    fn bare_hash_selects_the_root() {
        let schema = compile(&json!({
            "type": "object",
            "properties": {"self": {"$ref": "#"}},
        }))
        .expect("compiles");

        let child = match &schema.node(schema.root()).kind {
            NodeKind::Object(object) => object.property("self").unwrap(),
            other => panic!("expected object node, got {other:?}"),
        };
        assert_eq!(schema.node(child).header.reference, Some(schema.root()));
    }

    #[test]
    fn anchor_refs_resolve() {
        let schema = compile(&json!({
            "type": "object",
            "$defs": {"name": {"$anchor": "name", "type": "string"}},
            "properties": {"first": {"$ref": "#name"}},
        }))
        .expect("compiles");

        let first = match &schema.node(schema.root()).kind {
            NodeKind::Object(object) => object.property("first").unwrap(),
            other => panic!("expected object node, got {other:?}"),
        };
        let name = schema.node(schema.root()).header.defs[0].1;
        assert_eq!(schema.node(first).header.reference, Some(name));
    }

    #[test]
    fn escaped_tokens_are_unescaped_per_token() {
        let schema = compile(&json!({
            "type": "object",
            "$defs": {"a/b": {"type": "null"}},
            "properties": {"x": {"$ref": "#/$defs/a~1b"}},
        }))
        .expect("compiles");

        let x = match &schema.node(schema.root()).kind {
            NodeKind::Object(object) => object.property("x").unwrap(),
            other => panic!("expected object node, got {other:?}"),
        };
        let def = schema.node(schema.root()).header.defs[0].1;
        assert_eq!(schema.node(x).header.reference, Some(def));
    }

    #[test]
    fn unknown_tokens_leave_the_ref_unresolved() {
        let schema = compile(&json!({
            "type": "object",
            "properties": {"x": {"$ref": "#/$defs/missing"}},
        }))
        .expect("compiles");

        let x = match &schema.node(schema.root()).kind {
            NodeKind::Object(object) => object.property("x").unwrap(),
            other => panic!("expected object node, got {other:?}"),
        };
        assert_eq!(schema.node(x).header.reference, None);
    }
}
