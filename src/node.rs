//! Compiled schema tree.
//!
//! Nodes live in an arena owned by [`Schema`]; children are held by index.
//! `reference`, `parent`, and anchor entries are plain index back-edges, so
//! the owning structure stays a tree even when `$ref` links form cycles.
//! Nodes are immutable after the resolver pass fills in `reference`.

use serde_json::Value;

use crate::matcher::Matcher;

/// Handle into a [`Schema`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The JSON type a node asserts. `Undefined` disables the assertion;
/// `Number` covers integer and floating-point instances; the `Boolean` slot
/// matches any instance (the literal true/false value decides acceptance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    Undefined,
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
}

impl Default for InstanceType {
    fn default() -> Self {
        InstanceType::Undefined
    }
}

impl InstanceType {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceType::Undefined => "undefined",
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::String => "string",
        }
    }

    /// Type gate check. The boolean slot matches always (acceptance is
    /// decided by the literal value), and `Undefined` matches anything.
    pub fn matches(self, instance: Option<&Value>) -> bool {
        match self {
            InstanceType::Undefined | InstanceType::Boolean => true,
            InstanceType::Null => matches!(instance, Some(Value::Null)),
            InstanceType::Object => matches!(instance, Some(Value::Object(_))),
            InstanceType::Array => matches!(instance, Some(Value::Array(_))),
            InstanceType::Number => matches!(instance, Some(Value::Number(_))),
            InstanceType::String => matches!(instance, Some(Value::String(_))),
        }
    }
}

/// Fields shared by every node variant.
#[derive(Debug, Default)]
pub struct Header {
    /// The `$id` string, empty when absent.
    pub id: String,
    /// Type used by the type assertion; `Undefined` disables it.
    pub ty: InstanceType,
    /// Original `type` keyword text, empty when absent. Distinguishes
    /// `"integer"` from `"number"`.
    pub type_str: String,
    /// Set by the parent object for declared properties listed in `required`.
    pub required: bool,
    /// The `default` annotation, recorded verbatim.
    pub default_value: Option<Value>,
    /// `enum` entries in schema order, duplicates dropped. Empty = no constraint.
    pub enum_items: Vec<Value>,
    /// The `const` value, when present.
    pub const_value: Option<Value>,
    /// Unresolved `$ref` text (percent-decoded), empty when absent.
    pub ref_: String,
    /// Resolved `$ref` target, filled by the resolver pass.
    pub reference: Option<NodeId>,
    /// Upward link for pointer computation; `None` at the root.
    pub parent: Option<NodeId>,
    pub all_of: Vec<NodeId>,
    pub any_of: Vec<NodeId>,
    pub one_of: Vec<NodeId>,
    pub not: Option<NodeId>,
    /// `$defs` entries in schema order.
    pub defs: Vec<(String, NodeId)>,
    /// Marks a child of `patternProperties` (its pointer slot is named by
    /// the pattern source, not a property name).
    pub identified_by_pattern: bool,
}

#[derive(Debug)]
pub enum NodeKind {
    Object(ObjectNode),
    Array(ArrayNode),
    String(StringNode),
    Number(NumberNode),
    Boolean(BooleanNode),
    Null,
    Undefined,
}

impl NodeKind {
    pub fn instance_type(&self) -> InstanceType {
        match self {
            NodeKind::Object(_) => InstanceType::Object,
            NodeKind::Array(_) => InstanceType::Array,
            NodeKind::String(_) => InstanceType::String,
            NodeKind::Number(_) => InstanceType::Number,
            NodeKind::Boolean(_) => InstanceType::Boolean,
            NodeKind::Null => InstanceType::Null,
            NodeKind::Undefined => InstanceType::Undefined,
        }
    }
}

#[derive(Debug, Default)]
pub struct StringNode {
    pub pattern: Option<Matcher>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
}

#[derive(Debug, Default)]
pub struct NumberNode {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Default)]
pub struct BooleanNode {
    /// Literal true/false schema value. Set: unconditional accept/reject.
    /// Unset: asserts the instance is a boolean.
    pub value: Option<bool>,
}

#[derive(Debug, Default)]
pub struct ObjectNode {
    /// `properties` in schema order.
    pub properties: Vec<(String, NodeId)>,
    /// `patternProperties` children in schema order, each with its compiled key.
    pub pattern_properties: Vec<(Matcher, NodeId)>,
    /// Absent = permissive: unmatched members are accepted.
    pub additional_properties: Option<NodeId>,
    pub property_names: Option<NodeId>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    /// `required` names in schema order, duplicates dropped. Not necessarily
    /// a subset of declared properties.
    pub required: Vec<String>,
    /// `dependentRequired`: trigger name to its set of required names.
    pub dependent_required: Vec<(String, Vec<String>)>,
    pub dependent_schemas: Vec<(String, NodeId)>,
}

impl ObjectNode {
    pub fn property(&self, name: &str) -> Option<NodeId> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|&(_, id)| id)
    }
}

#[derive(Debug, Default)]
pub struct ArrayNode {
    /// One child in single-schema mode, many in tuple mode.
    pub items: Vec<NodeId>,
    pub items_is_array: bool,
    pub additional_items: Option<NodeId>,
    pub contains: Option<NodeId>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

#[derive(Debug)]
pub struct SchemaNode {
    pub header: Header,
    pub kind: NodeKind,
}

impl SchemaNode {
    pub(crate) fn placeholder(parent: Option<NodeId>) -> Self {
        SchemaNode {
            header: Header {
                parent,
                ..Header::default()
            },
            kind: NodeKind::Undefined,
        }
    }
}

/// A compiled schema: node arena, root handle, and the root-level anchor map
/// collected from `$anchor` keywords.
#[derive(Debug)]
pub struct Schema {
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) root: NodeId,
    pub(crate) anchors: Vec<(String, NodeId)>,
}

impl Schema {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// All node handles, in compilation order. The root comes first.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::new)
    }

    pub fn anchor(&self, name: &str) -> Option<NodeId> {
        self.anchors
            .iter()
            .find(|(anchor, _)| anchor == name)
            .map(|&(_, id)| id)
    }

    /// JSON pointer of a node relative to the root, for error messages.
    /// Built by climbing parent links and asking each parent which slot
    /// holds the child. Children of `patternProperties` are named by their
    /// pattern source.
    pub fn json_pointer(&self, id: NodeId) -> String {
        match self.node(id).header.parent {
            None => "#".to_string(),
            Some(parent) => {
                let mut pointer = self.json_pointer(parent);
                pointer.push('/');
                pointer.push_str(&self.slot_of(parent, id));
                pointer
            }
        }
    }

    /// Name of the slot in `parent` that holds `child`.
    fn slot_of(&self, parent: NodeId, child: NodeId) -> String {
        let node = self.node(parent);

        match &node.kind {
            NodeKind::Object(object) => {
                if self.node(child).header.identified_by_pattern {
                    for (matcher, id) in &object.pattern_properties {
                        if *id == child {
                            return format!("patternProperties/{}", matcher.source());
                        }
                    }
                }
                for (name, id) in &object.properties {
                    if *id == child {
                        return format!("properties/{name}");
                    }
                }
                for (name, id) in &object.dependent_schemas {
                    if *id == child {
                        return format!("dependentSchemas/{name}");
                    }
                }
                if object.additional_properties == Some(child) {
                    return "additionalProperties".to_string();
                }
                if object.property_names == Some(child) {
                    return "propertyNames".to_string();
                }
            }
            NodeKind::Array(array) => {
                for (index, id) in array.items.iter().enumerate() {
                    if *id == child {
                        return format!("items/{index}");
                    }
                }
                if array.contains == Some(child) {
                    return "contains".to_string();
                }
                if array.additional_items == Some(child) {
                    return "additionalItems".to_string();
                }
            }
            _ => {}
        }

        let header = &node.header;
        for (index, id) in header.all_of.iter().enumerate() {
            if *id == child {
                return format!("allOf/{index}");
            }
        }
        for (index, id) in header.any_of.iter().enumerate() {
            if *id == child {
                return format!("anyOf/{index}");
            }
        }
        for (index, id) in header.one_of.iter().enumerate() {
            if *id == child {
                return format!("oneOf/{index}");
            }
        }
        if header.not == Some(child) {
            return "not".to_string();
        }
        for (name, id) in &header.defs {
            if *id == child {
                return format!("$defs/{name}");
            }
        }

        // not reachable for compiler-built trees
        "?".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_gate_accepts_and_rejects() {
        let number = serde_json::json!(4.5);
        let text = serde_json::json!("4.5");

        assert!(InstanceType::Number.matches(Some(&number)));
        assert!(!InstanceType::Number.matches(Some(&text)));
        assert!(!InstanceType::Number.matches(None));

        // the boolean slot and the unconstrained type match anything
        assert!(InstanceType::Boolean.matches(Some(&text)));
        assert!(InstanceType::Boolean.matches(None));
        assert!(InstanceType::Undefined.matches(None));
    }

    #[test]
    fn pointer_of_root_is_hash() {
        let schema = Schema {
            nodes: vec![SchemaNode::placeholder(None)],
            root: NodeId::new(0),
            anchors: Vec::new(),
        };
        assert_eq!(schema.json_pointer(schema.root()), "#");
    }
}
