//! Schema validation.
//!
//! Depth-first interpretation of the compiled tree against an instance.
//! Every node runs the shared header logic (type gate, combinators, `$ref`,
//! `enum`), then its variant's assertions. Child failures never abort the
//! parent; errors accumulate so one run reports every violation. `anyOf`,
//! `oneOf`, `not` and `contains` explore alternatives with scratch buffers
//! that are only surfaced when the enclosing check fails.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Errors, ValidationResult};
use crate::node::{ArrayNode, BooleanNode, NodeId, NodeKind, NumberNode, ObjectNode, Schema, StringNode};

/// Recursion bound per validation. `$ref` chains may cycle; exceeding the
/// bound records a "schema recursion limit" error instead of overflowing the
/// stack. serde_json refuses to parse documents anywhere near this deep, so
/// well-formed inputs never hit it.
pub const MAX_DEPTH: usize = 256;

/// Validate an instance against a compiled schema.
pub fn validate(schema: &Schema, instance: &Value) -> ValidationResult {
    let mut errors = Errors::new();
    let mut validator = Validator { schema, depth: 0 };
    let success = validator.validate_node(schema.root(), Some(instance), &mut errors);

    debug!(success, errors = errors.messages().len(), "validation finished");
    ValidationResult {
        success,
        errors: errors.into_messages(),
    }
}

struct Validator<'a> {
    schema: &'a Schema,
    depth: usize,
}

impl<'a> Validator<'a> {
    /// `None` models the undefined instance: a required property that is
    /// absent from the validated object.
    fn validate_node(&mut self, id: NodeId, instance: Option<&Value>, e: &mut Errors) -> bool {
        if self.depth >= MAX_DEPTH {
            e.add(format!(
                "schema recursion limit reached at {}",
                self.schema.json_pointer(id)
            ));
            return false;
        }
        self.depth += 1;
        let valid = self.validate_inner(id, instance, e);
        self.depth -= 1;
        valid
    }

    fn validate_inner(&mut self, id: NodeId, instance: Option<&Value>, e: &mut Errors) -> bool {
        let schema = self.schema;
        let node = schema.node(id);
        let header = &node.header;

        // a required property that is absent fails before anything else, so
        // the message names the actual problem
        if header.required && instance.is_none() {
            e.add(format!(
                "item is required, but not present at {}",
                schema.json_pointer(id)
            ));
            return false;
        }

        // literal true/false schemas decide immediately
        if let NodeKind::Boolean(BooleanNode {
            value: Some(literal),
        }) = &node.kind
        {
            return *literal;
        }

        if !header.type_str.is_empty() && !header.ty.matches(instance) {
            e.add(format!(
                "type validation failed at {}: have {}, but expected type \"{}\"",
                schema.json_pointer(id),
                instance_repr(instance),
                header.ty.as_str(),
            ));
            return false;
        }

        let mut valid = true;

        for &child in &header.all_of {
            valid &= self.validate_node(child, instance, e);
        }

        if let Some(target) = header.reference {
            valid &= self.validate_node(target, instance, e);
        }

        let mut any = true;
        if !header.any_of.is_empty() {
            any = false;
            let mut scratch = Errors::new();
            for &child in &header.any_of {
                any |= self.validate_node(child, instance, &mut scratch);
            }
            if !any {
                e.add(format!(
                    "no item matched in anyOf at {}, {}",
                    schema.json_pointer(id),
                    instance_repr(instance)
                ));
            }
        }

        if let Some(negated) = header.not {
            let mut scratch = Errors::new();
            if self.validate_node(negated, instance, &mut scratch) {
                valid = false;
                e.add(format!(
                    "negated schema matched at {}, {}",
                    schema.json_pointer(id),
                    instance_repr(instance)
                ));
                e.append(scratch);
            }
        }

        let mut one = true;
        if !header.one_of.is_empty() {
            one = false;
            let mut scratch = Errors::new();
            for &child in &header.one_of {
                if self.validate_node(child, instance, &mut scratch) {
                    if one {
                        // second match: exactly-one is violated
                        one = false;
                        break;
                    }
                    one = true;
                }
            }
            if !one {
                e.add(format!(
                    "not exactly one item matched in oneOf at {}, {}",
                    schema.json_pointer(id),
                    instance_repr(instance)
                ));
            }
        }

        let mut enum_matched = true;
        if !header.enum_items.is_empty() {
            enum_matched = match instance {
                Some(value) => header.enum_items.iter().any(|item| item == value),
                None => false,
            };
            if !enum_matched {
                e.add(format!(
                    "no enum item matched at {}, {}",
                    schema.json_pointer(id),
                    instance_repr(instance)
                ));
            }
        }

        let mut const_matched = true;
        if let Some(expected) = &header.const_value {
            const_matched = instance == Some(expected);
            if !const_matched {
                e.add(format!(
                    "const mismatch at {}, {}",
                    schema.json_pointer(id),
                    instance_repr(instance)
                ));
            }
        }

        // variant assertions apply only when the instance has the matching
        // shape; a mismatch was already reported by the type gate when the
        // schema asserted a type
        match &node.kind {
            NodeKind::String(string) => {
                if let Some(Value::String(text)) = instance {
                    valid &= self.validate_string(id, string, text, e);
                }
            }
            NodeKind::Number(number) => {
                if let Some(Value::Number(value)) = instance {
                    let integer = header.type_str == "integer";
                    valid &= self.validate_number(id, number, integer, value, e);
                }
            }
            NodeKind::Object(object) => {
                if let Some(value @ Value::Object(members)) = instance {
                    valid &= self.validate_object(id, object, value, members, e);
                }
            }
            NodeKind::Array(array) => {
                if let Some(Value::Array(elements)) = instance {
                    valid &= self.validate_array(id, array, elements, e);
                }
            }
            NodeKind::Boolean(_) => {
                // literal booleans returned above; this slot asserts the
                // instance itself is a boolean
                if !matches!(instance, Some(Value::Bool(_))) {
                    e.add(format!(
                        "boolean value expected at {}, {}",
                        schema.json_pointer(id),
                        instance_repr(instance)
                    ));
                    valid = false;
                }
            }
            NodeKind::Null | NodeKind::Undefined => {}
        }

        valid && any && one && enum_matched && const_matched
    }

    fn validate_string(&mut self, id: NodeId, node: &StringNode, text: &str, e: &mut Errors) -> bool {
        let mut valid = true;

        if let Some(pattern) = &node.pattern {
            if !pattern.is_match(text) {
                e.add(format!(
                    "string pattern \"{}\" not matching at {}, \"{text}\"",
                    pattern.source(),
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }

        let length = text.chars().count() as u64;
        if let Some(max) = node.max_length {
            if length > max {
                e.add(format!(
                    "maxLength violation at {}: length {length} > {max}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }
        if let Some(min) = node.min_length {
            if length < min {
                e.add(format!(
                    "minLength violation at {}: length {length} < {min}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }

        valid
    }

    fn validate_number(
        &mut self,
        id: NodeId,
        node: &NumberNode,
        integer: bool,
        number: &serde_json::Number,
        e: &mut Errors,
    ) -> bool {
        let Some(value) = number.as_f64() else {
            return true;
        };
        let mut valid = true;

        if integer && value.fract() != 0.0 {
            e.add(format!(
                "number is not an integer value at {}, {value}",
                self.schema.json_pointer(id)
            ));
            valid = false;
        }

        if let Some(minimum) = node.minimum {
            if value < minimum {
                e.add(format!(
                    "minimum invalid: value is {value}, allowed is {minimum} at {}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }
        if let Some(maximum) = node.maximum {
            if value > maximum {
                e.add(format!(
                    "maximum invalid: value is {value}, allowed is {maximum} at {}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }
        if let Some(bound) = node.exclusive_minimum {
            if value <= bound {
                e.add(format!(
                    "exclusiveMinimum invalid: value is {value}, allowed is {bound} at {}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }
        if let Some(bound) = node.exclusive_maximum {
            if value >= bound {
                e.add(format!(
                    "exclusiveMaximum invalid: value is {value}, allowed is {bound} at {}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }
        if let Some(factor) = node.multiple_of {
            if (value / factor).fract() != 0.0 {
                e.add(format!(
                    "multipleOf invalid: value is {value}, allowed is multiples of {factor} at {}",
                    self.schema.json_pointer(id)
                ));
                valid = false;
            }
        }

        valid
    }

    fn validate_object(
        &mut self,
        id: NodeId,
        node: &ObjectNode,
        value: &Value,
        members: &Map<String, Value>,
        e: &mut Errors,
    ) -> bool {
        let pointer = self.schema.json_pointer(id);
        let mut valid = true;

        if let Some(min) = node.min_properties {
            if (members.len() as u64) < min {
                e.add(format!(
                    "minProperties value of {min} not met with {} members at {pointer}",
                    members.len()
                ));
                valid = false;
            }
        }
        if let Some(max) = node.max_properties {
            if (members.len() as u64) > max {
                e.add(format!(
                    "maxProperties value of {max} exceeded with {} members at {pointer}",
                    members.len()
                ));
                valid = false;
            }
        }

        for name in &node.required {
            if members.contains_key(name) {
                continue;
            }
            match node.property(name) {
                // a declared property reports through its own header
                Some(child) => valid &= self.validate_node(child, None, e),
                None => {
                    e.add(format!("required value \"{name}\" not found at {pointer}"));
                    valid = false;
                }
            }
        }

        for (trigger, dependencies) in &node.dependent_required {
            if !members.contains_key(trigger) {
                continue;
            }
            for dependency in dependencies {
                if !members.contains_key(dependency) {
                    e.add(format!(
                        "dependentRequired dependency \"{dependency}\" of \"{trigger}\" not found at {pointer}"
                    ));
                    valid = false;
                }
            }
        }

        for &(ref trigger, subschema) in &node.dependent_schemas {
            if !members.contains_key(trigger) {
                continue;
            }
            let ok = self.validate_node(subschema, Some(value), e);
            valid &= ok;
            if !ok {
                e.add(format!(
                    "dependentSchemas entry \"{trigger}\" not valid at {pointer}"
                ));
            }
        }

        for (key, member) in members {
            if let Some(child) = node.property(key) {
                valid &= self.validate_node(child, Some(member), e);
            } else {
                let mut matched = false;
                for &(ref matcher, child) in &node.pattern_properties {
                    if matcher.is_match(key) {
                        matched = true;
                        valid &= self.validate_node(child, Some(member), e);
                    }
                }
                if !matched {
                    if let Some(additional) = node.additional_properties {
                        let ok = self.validate_node(additional, Some(member), e);
                        valid &= ok;
                        if !ok {
                            e.add(format!(
                                "additional property \"{key}\" not valid at {pointer}"
                            ));
                        }
                    }
                    // absent additionalProperties accepts the member
                }
            }

            if let Some(names) = node.property_names {
                let key_value = Value::String(key.clone());
                let ok = self.validate_node(names, Some(&key_value), e);
                valid &= ok;
                if !ok {
                    e.add(format!("propertyNames not valid for \"{key}\" at {pointer}"));
                }
            }
        }

        valid
    }

    fn validate_array(
        &mut self,
        id: NodeId,
        node: &ArrayNode,
        elements: &[Value],
        e: &mut Errors,
    ) -> bool {
        let pointer = self.schema.json_pointer(id);
        let size = elements.len() as u64;

        if let Some(min) = node.min_items {
            if size < min {
                e.add(format!("minItems violation at {pointer}: {size} < {min}"));
                return false;
            }
        }
        if let Some(max) = node.max_items {
            if size > max {
                e.add(format!("maxItems violation at {pointer}: {size} > {max}"));
                return false;
            }
        }

        let mut valid = true;
        let mut seen = HashSet::new();
        let mut contains_valid = false;
        let mut contains_scratch = Errors::new();

        for (index, element) in elements.iter().enumerate() {
            if node.unique_items && !seen.insert(canonical_string(element)) {
                e.add(format!(
                    "uniqueItems violation with duplicate item {element} at {pointer}"
                ));
                valid = false;
            }

            if node.items_is_array {
                if let Some(&child) = node.items.get(index) {
                    valid &= self.validate_node(child, Some(element), e);
                } else if let Some(additional) = node.additional_items {
                    valid &= self.validate_node(additional, Some(element), e);
                }
            } else if let Some(&only) = node.items.first() {
                valid &= self.validate_node(only, Some(element), e);
            }

            if let Some(contains) = node.contains {
                // scratch buffer: failed candidates are not violations
                if !contains_valid {
                    contains_valid =
                        self.validate_node(contains, Some(element), &mut contains_scratch);
                }
            }
        }

        if node.contains.is_some() && !contains_valid {
            e.add(format!("array contains violation at {pointer}"));
            valid = false;
        }

        valid
    }
}

fn instance_repr(instance: Option<&Value>) -> String {
    match instance {
        Some(value) => value.to_string(),
        None => "undefined".to_string(),
    }
}

/// Canonical compact form for `uniqueItems`: object keys sorted recursively,
/// so two elements collide exactly when they are JSON-equal.
fn canonical_string(value: &Value) -> String {
    match value {
        Value::Array(elements) => {
            let inner: Vec<String> = elements.iter().map(canonical_string).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Object(members) => {
            let mut entries: Vec<(&String, &Value)> = members.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let inner: Vec<String> = entries
                .iter()
                .map(|(key, member)| {
                    format!("{}:{}", Value::String((*key).clone()), canonical_string(member))
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        leaf => leaf.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use serde_json::json;

    fn check(schema: &Value, instance: &Value) -> ValidationResult {
        let compiled = compile(schema).expect("schema should compile");
        validate(&compiled, instance)
    }

    #[test]
    fn string_length_bounds() {
        let schema = json!({"type": "string", "minLength": 3});
        assert!(!check(&schema, &json!("hi")).success);
        assert!(check(&schema, &json!("hey")).success);
    }

    #[test]
    fn integer_bounds_and_multiple_of() {
        let schema = json!({
            "type": "integer",
            "minimum": 0,
            "exclusiveMaximum": 10,
            "multipleOf": 2,
        });
        assert!(check(&schema, &json!(4)).success);
        assert!(!check(&schema, &json!(10)).success);
        assert!(!check(&schema, &json!(3)).success);
        assert!(!check(&schema, &json!(-2)).success);
    }

    #[test]
    fn object_required_and_additional_properties() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}},
            "required": ["a"],
            "additionalProperties": false,
        });
        assert!(check(&schema, &json!({"a": 1})).success);

        let missing = check(&schema, &json!({}));
        assert!(!missing.success);
        assert!(missing.errors[0].contains("required"));

        let extra = check(&schema, &json!({"a": 1, "b": 2}));
        assert!(!extra.success);
        assert!(extra.errors.iter().any(|m| m.contains("additional property")));
    }

    #[test]
    fn tuple_items_with_closed_tail() {
        let schema = json!({
            "type": "array",
            "items": [{"type": "string"}, {"type": "number"}],
            "additionalItems": false,
        });
        assert!(check(&schema, &json!(["x", 1])).success);
        assert!(!check(&schema, &json!(["x", 1, true])).success);
        assert!(!check(&schema, &json!([1, "x"])).success);
    }

    #[test]
    fn all_of_with_negation() {
        let schema = json!({
            "allOf": [{"type": "number"}, {"minimum": 5}],
            "not": {"maximum": 10},
        });
        assert!(!check(&schema, &json!(7)).success);
        assert!(check(&schema, &json!(15)).success);
        assert!(!check(&schema, &json!("5")).success);
    }

    #[test]
    fn ref_into_defs() {
        let schema = json!({
            "$defs": {"pos": {"type": "integer", "minimum": 1}},
            "properties": {"n": {"$ref": "#/$defs/pos"}},
            "type": "object",
        });
        assert!(check(&schema, &json!({"n": 3})).success);
        assert!(!check(&schema, &json!({"n": 0})).success);
        assert!(!check(&schema, &json!({"n": "x"})).success);
    }

    #[test]
    fn cyclic_ref_hits_the_recursion_limit() {
        // every object has a child "next" that loops back to the root
        let schema = json!({
            "type": "object",
            "properties": {"next": {"$ref": "#"}},
            "required": ["next"],
        });

        // a conforming instance would have to be infinitely deep
        let result = check(&schema, &json!({"next": {"next": {}}}));
        assert!(!result.success);

        let looping = check(&schema, &json!({"next": {}}));
        assert!(!looping.success);
        assert!(!looping
            .errors
            .iter()
            .any(|m| m.contains("schema recursion limit")));
    }

    #[test]
    fn deep_ref_recursion_reports_limit_error() {
        // a ref chain that consumes depth without consuming the instance
        let schema = json!({"$defs": {"loop": {"$ref": "#"}}, "$ref": "#/$defs/loop"});
        let result = check(&schema, &json!(1));
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|m| m.contains("schema recursion limit")));
    }

    #[test]
    fn unique_items_uses_json_equality() {
        let schema = json!({"type": "array", "uniqueItems": true});
        assert!(check(&schema, &json!([1, 2, 3])).success);
        assert!(!check(&schema, &json!([1, 2, 1])).success);
        // key order does not make objects distinct
        assert!(!check(&schema, &json!([{"a": 1, "b": 2}, {"b": 2, "a": 1}])).success);
    }

    #[test]
    fn errors_carry_json_pointers() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string", "minLength": 2}},
        });
        let result = check(&schema, &json!({"name": "x"}));
        assert!(!result.success);
        assert!(result.errors[0].contains("#/properties/name"));
    }

    #[test]
    fn validation_is_deterministic() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "minimum": 3},
                "b": {"type": "string"},
            },
            "required": ["a", "b", "c"],
        });
        let instance = json!({"a": 1, "b": 2});

        let first = check(&schema, &instance);
        let second = check(&schema, &instance);
        assert!(!first.success);
        assert_eq!(first.errors, second.errors);
    }
}
