//! Schema compiler: JSON document → schema tree.
//!
//! One pass over the schema document. Each sub-schema is classified by its
//! `type` keyword or, failing that, by the presence of shape-specific
//! keywords, then populated variant by variant. Combinators, `$defs`, `enum`
//! and `$ref` are recorded on every object-shaped sub-schema. Parser errors
//! accumulate; a non-empty list fails the compilation as a whole.

use serde_json::{Map, Value};
use tracing::debug;

use crate::matcher::Matcher;
use crate::node::{
    ArrayNode, BooleanNode, InstanceType, NodeId, NodeKind, NumberNode, ObjectNode, Schema,
    SchemaNode, StringNode,
};

/// The only dialect accepted in `$schema`.
pub const DIALECT: &str = "https://json-schema.org/draft/2019-09/schema";

// ————————————————————————————————————————————————————————————————————————————
// CLASSIFICATION HINTS
// ————————————————————————————————————————————————————————————————————————————

const NUMBER_HINTS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

const ARRAY_HINTS: &[&str] = &[
    "items",
    "additionalItems",
    "unevaluatedItems",
    "maxItems",
    "minItems",
    "uniqueItems",
    "contains",
    "maxContains",
    "minContains",
];

const STRING_HINTS: &[&str] = &["maxLength", "minLength", "pattern"];

const OBJECT_HINTS: &[&str] = &[
    "properties",
    "additionalProperties",
    "patternProperties",
    "minProperties",
    "maxProperties",
    "required",
    "dependentRequired",
    "dependentSchemas",
];

fn has_any(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| map.contains_key(*key))
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

/// Compile a schema document into a tree, or return the accumulated parser
/// errors. `$ref` targets are resolved before the tree is returned.
pub fn compile(schema_json: &Value) -> Result<Schema, Vec<String>> {
    let mut compiler = Compiler::default();
    let root = compiler.compile_root(schema_json);

    if !compiler.errors.is_empty() {
        return Err(compiler.errors);
    }

    let mut schema = Schema {
        nodes: compiler.nodes,
        root,
        anchors: compiler.anchors,
    };
    crate::resolve::resolve_references(&mut schema);

    debug!(nodes = schema.len(), "schema compiled");
    Ok(schema)
}

#[derive(Default)]
struct Compiler {
    nodes: Vec<SchemaNode>,
    anchors: Vec<(String, NodeId)>,
    errors: Vec<String>,
}

impl Compiler {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Push a placeholder so children compiled below it can link upwards.
    /// The slot is overwritten once the variant is known.
    fn reserve(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(SchemaNode::placeholder(parent));
        id
    }

    fn compile_root(&mut self, json: &Value) -> NodeId {
        match json {
            // a bare true/false is a complete schema
            Value::Bool(value) => {
                let id = self.reserve(None);
                let node = &mut self.nodes[id.index()];
                node.header.ty = InstanceType::Boolean;
                node.kind = NodeKind::Boolean(BooleanNode {
                    value: Some(*value),
                });
                id
            }
            Value::Object(map) => {
                if let Some(dialect) = map.get("$schema") {
                    if dialect.as_str() != Some(DIALECT) {
                        self.error(format!(
                            "unknown schema dialect, only \"{DIALECT}\" is supported for $schema"
                        ));
                    }
                }
                self.compile_node(json, None)
            }
            _ => {
                self.error("root schema is not of type object");
                self.reserve(None)
            }
        }
    }

    fn compile_node(&mut self, json: &Value, parent: Option<NodeId>) -> NodeId {
        let id = self.reserve(parent);

        match json {
            // an array in schema position is a tuple of sub-schemas
            Value::Array(elements) => {
                let items = elements
                    .iter()
                    .map(|element| self.compile_node(element, Some(id)))
                    .collect();
                let node = &mut self.nodes[id.index()];
                node.header.ty = InstanceType::Array;
                node.kind = NodeKind::Array(ArrayNode {
                    items,
                    items_is_array: true,
                    ..ArrayNode::default()
                });
            }
            Value::Bool(value) => {
                let node = &mut self.nodes[id.index()];
                node.header.ty = InstanceType::Boolean;
                node.kind = NodeKind::Boolean(BooleanNode {
                    value: Some(*value),
                });
            }
            Value::Null => {
                let node = &mut self.nodes[id.index()];
                node.header.ty = InstanceType::Null;
                node.kind = NodeKind::Null;
            }
            Value::Object(map) => self.compile_object(id, map),
            other => {
                self.error(format!(
                    "sub-schema is not an object, array or boolean: {other}"
                ));
            }
        }

        id
    }

    // ————————————————————————————————————————————————————————————————————————
    // OBJECT SUB-SCHEMAS
    // ————————————————————————————————————————————————————————————————————————

    fn compile_object(&mut self, id: NodeId, map: &Map<String, Value>) {
        let id_str = map
            .get("$id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let type_value = map.get("type");
        if matches!(type_value, Some(Value::Array(_))) {
            self.error("multiple types for one sub-schema are not supported");
        }
        let type_str = type_value
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let kind = self.classify(id, &type_str, map);

        // common post-population, shared by every variant
        let all_of = self.compile_schema_list("allOf", map, id);
        let any_of = self.compile_schema_list("anyOf", map, id);
        let one_of = self.compile_schema_list("oneOf", map, id);
        let not = map.get("not").map(|value| self.compile_node(value, Some(id)));
        let defs = self.compile_defs(map, id);
        let enum_items = self.compile_enum(map);
        let const_value = map.get("const").cloned();
        let default_value = map.get("default").cloned();

        let ref_ = match map.get("$ref") {
            Some(Value::String(raw)) if !raw.is_empty() => decode_ref(raw),
            _ => String::new(),
        };

        if let Some(anchor) = map.get("$anchor") {
            match anchor.as_str() {
                Some(name) => {
                    if self.anchors.iter().any(|(existing, _)| existing == name) {
                        self.error(format!("duplicate $anchor \"{name}\""));
                    } else {
                        self.anchors.push((name.to_string(), id));
                    }
                }
                None => self.error("$anchor value is not a string"),
            }
        }

        let node = &mut self.nodes[id.index()];
        node.header.id = id_str;
        node.header.ty = kind.instance_type();
        node.header.type_str = type_str;
        node.header.default_value = default_value;
        node.header.enum_items = enum_items;
        node.header.const_value = const_value;
        node.header.ref_ = ref_;
        node.header.all_of = all_of;
        node.header.any_of = any_of;
        node.header.one_of = one_of;
        node.header.not = not;
        node.header.defs = defs;
        node.kind = kind;
    }

    /// The central shape decision. First matching rule wins; `type` is
    /// authoritative, keyword hints fill in when `type` is absent.
    fn classify(&mut self, id: NodeId, type_str: &str, map: &Map<String, Value>) -> NodeKind {
        if type_str == "null" {
            return NodeKind::Null;
        }
        if type_str == "boolean" {
            return NodeKind::Boolean(BooleanNode::default());
        }
        if type_str == "number" || type_str == "integer" || has_any(map, NUMBER_HINTS) {
            return NodeKind::Number(self.compile_number(map));
        }
        if type_str == "array" || has_any(map, ARRAY_HINTS) {
            return NodeKind::Array(self.compile_array(id, map));
        }
        if type_str == "string" || has_any(map, STRING_HINTS) {
            return NodeKind::String(self.compile_string(map));
        }
        if map.is_empty() {
            // {} accepts everything
            return NodeKind::Boolean(BooleanNode { value: Some(true) });
        }
        if type_str == "object" || has_any(map, OBJECT_HINTS) {
            return NodeKind::Object(self.compile_object_members(id, map));
        }
        NodeKind::Undefined
    }

    fn compile_number(&mut self, map: &Map<String, Value>) -> NumberNode {
        NumberNode {
            minimum: self.number_keyword(map, "minimum"),
            maximum: self.number_keyword(map, "maximum"),
            exclusive_minimum: self.number_keyword(map, "exclusiveMinimum"),
            exclusive_maximum: self.number_keyword(map, "exclusiveMaximum"),
            // a non-positive multipleOf carries no constraint
            multiple_of: self
                .number_keyword(map, "multipleOf")
                .filter(|factor| *factor > 0.0),
        }
    }

    fn compile_string(&mut self, map: &Map<String, Value>) -> StringNode {
        let mut node = StringNode {
            min_length: self.count_keyword(map, "minLength"),
            max_length: self.count_keyword(map, "maxLength"),
            pattern: None,
        };
        if let Some(pattern) = map.get("pattern") {
            match pattern.as_str() {
                Some(source) => node.pattern = Some(self.compile_pattern(source)),
                None => self.error("pattern value is not a string"),
            }
        }
        node
    }

    fn compile_array(&mut self, id: NodeId, map: &Map<String, Value>) -> ArrayNode {
        let mut node = ArrayNode {
            min_items: self.count_keyword(map, "minItems"),
            max_items: self.count_keyword(map, "maxItems"),
            ..ArrayNode::default()
        };

        if let Some(unique) = map.get("uniqueItems") {
            match unique.as_bool() {
                Some(flag) => node.unique_items = flag,
                None => self.error("uniqueItems value is not a boolean"),
            }
        }

        if let Some(additional) = map.get("additionalItems") {
            node.additional_items = Some(self.compile_node(additional, Some(id)));
        }
        if let Some(contains) = map.get("contains") {
            node.contains = Some(self.compile_node(contains, Some(id)));
        }

        match map.get("items") {
            None => {}
            Some(Value::Array(elements)) => {
                node.items_is_array = true;
                for element in elements {
                    let child = self.compile_node(element, Some(id));
                    node.items.push(child);
                }
            }
            Some(single @ (Value::Object(_) | Value::Bool(_))) => {
                node.items.push(self.compile_node(single, Some(id)));
            }
            Some(other) => {
                self.error(format!(
                    "items value is not an object, array or boolean: {other}"
                ));
            }
        }

        node
    }

    fn compile_object_members(&mut self, id: NodeId, map: &Map<String, Value>) -> ObjectNode {
        let mut node = ObjectNode {
            min_properties: self.count_keyword(map, "minProperties"),
            max_properties: self.count_keyword(map, "maxProperties"),
            ..ObjectNode::default()
        };

        match map.get("properties") {
            None => {}
            Some(Value::Object(properties)) => {
                for (name, value) in properties {
                    let child = self.compile_node(value, Some(id));
                    node.properties.push((name.clone(), child));
                }
            }
            Some(_) => self.error("properties value is not a JSON object"),
        }

        match map.get("patternProperties") {
            None => {}
            Some(Value::Object(patterns)) => {
                for (pattern, value) in patterns {
                    if !value.is_object() {
                        self.error("patternProperties entry is not a JSON object");
                        continue;
                    }
                    let child = self.compile_node(value, Some(id));
                    self.nodes[child.index()].header.identified_by_pattern = true;
                    let matcher = self.compile_pattern(pattern);
                    node.pattern_properties.push((matcher, child));
                }
            }
            Some(_) => self.error("patternProperties value is not a JSON object"),
        }

        if let Some(additional) = map.get("additionalProperties") {
            node.additional_properties = Some(self.compile_node(additional, Some(id)));
        }
        if let Some(names) = map.get("propertyNames") {
            node.property_names = Some(self.compile_node(names, Some(id)));
        }

        match map.get("required") {
            None => {}
            Some(Value::Array(entries)) => {
                for entry in entries {
                    let Some(name) = entry.as_str() else {
                        self.error("required entry is not a string");
                        continue;
                    };
                    // mark declared properties for error messaging
                    if let Some(child) = node.property(name) {
                        self.nodes[child.index()].header.required = true;
                    }
                    if !node.required.iter().any(|existing| existing == name) {
                        node.required.push(name.to_string());
                    }
                }
            }
            Some(_) => self.error("required value is not a JSON array"),
        }

        match map.get("dependentRequired") {
            None => {}
            Some(Value::Object(entries)) => {
                for (name, deps) in entries {
                    let mut dependencies: Vec<String> = Vec::new();
                    match deps {
                        Value::Array(values) => {
                            for value in values {
                                match value.as_str() {
                                    Some(dep) => {
                                        if !dependencies.iter().any(|existing| existing == dep) {
                                            dependencies.push(dep.to_string());
                                        }
                                    }
                                    None => {
                                        self.error("dependentRequired dependency is not a string")
                                    }
                                }
                            }
                        }
                        _ => self.error("dependentRequired entry is not a JSON array"),
                    }
                    node.dependent_required.push((name.clone(), dependencies));
                }
            }
            Some(_) => self.error("dependentRequired value is not a JSON object"),
        }

        match map.get("dependentSchemas") {
            None => {}
            Some(Value::Object(entries)) => {
                for (name, value) in entries {
                    let child = self.compile_node(value, Some(id));
                    node.dependent_schemas.push((name.clone(), child));
                }
            }
            Some(_) => self.error("dependentSchemas value is not a JSON object"),
        }

        node
    }

    // ————————————————————————————————————————————————————————————————————————
    // SHARED KEYWORD HELPERS
    // ————————————————————————————————————————————————————————————————————————

    fn compile_schema_list(
        &mut self,
        key: &str,
        map: &Map<String, Value>,
        parent: NodeId,
    ) -> Vec<NodeId> {
        match map.get(key) {
            None => Vec::new(),
            Some(Value::Array(elements)) => elements
                .iter()
                .map(|element| self.compile_node(element, Some(parent)))
                .collect(),
            Some(other) => {
                self.error(format!("{key} value is not a JSON array: {other}"));
                Vec::new()
            }
        }
    }

    fn compile_defs(&mut self, map: &Map<String, Value>, parent: NodeId) -> Vec<(String, NodeId)> {
        match map.get("$defs") {
            None => Vec::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(name, value)| (name.clone(), self.compile_node(value, Some(parent))))
                .collect(),
            Some(_) => {
                self.error("$defs value is not a JSON object");
                Vec::new()
            }
        }
    }

    fn compile_enum(&mut self, map: &Map<String, Value>) -> Vec<Value> {
        match map.get("enum") {
            None => Vec::new(),
            Some(Value::Array(entries)) => {
                let mut items: Vec<Value> = Vec::new();
                for entry in entries {
                    // duplicates are silently dropped
                    if !items.contains(entry) {
                        items.push(entry.clone());
                    }
                }
                items
            }
            Some(_) => {
                self.error("enum value is not a JSON array");
                Vec::new()
            }
        }
    }

    fn compile_pattern(&mut self, source: &str) -> Matcher {
        match Matcher::compile(source) {
            Ok(matcher) => matcher,
            Err(error) => {
                self.error(format!("pattern \"{source}\" did not compile: {error}"));
                Matcher::rejecting(source)
            }
        }
    }

    fn number_keyword(&mut self, map: &Map<String, Value>, key: &str) -> Option<f64> {
        match map.get(key) {
            None => None,
            Some(Value::Number(number)) => number.as_f64(),
            Some(other) => {
                self.error(format!("{key} value is not a number: {other}"));
                None
            }
        }
    }

    fn count_keyword(&mut self, map: &Map<String, Value>, key: &str) -> Option<u64> {
        match map.get(key) {
            None => None,
            Some(value) => match value.as_u64() {
                Some(count) => Some(count),
                None => {
                    self.error(format!("{key} value is not a non-negative integer: {value}"));
                    None
                }
            },
        }
    }
}

/// Decode percent-encoded octets inside a `$ref`, except the two that have a
/// JSON-pointer escape: `%2F` stays `~1` and `%7E` stays `~0`, so pointer
/// token splitting keeps working.
fn decode_ref(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(position) = rest.find('%') {
        out.push_str(&rest[..position]);
        let hex = rest
            .get(position + 1..position + 3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()));
        match hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
            Some(0x2F) => {
                out.push_str("~1");
                rest = &rest[position + 3..];
            }
            Some(0x7E) => {
                out.push_str("~0");
                rest = &rest[position + 3..];
            }
            Some(octet) => {
                out.push(octet as char);
                rest = &rest[position + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[position + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}
