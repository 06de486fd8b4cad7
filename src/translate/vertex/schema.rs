//! JSON-Schema -> Vertex `Schema` translation.
//!
//! Vertex accepts an OpenAPI 3.0 subset with upper-case type tokens and a
//! `nullable` flag instead of `"null"` in type unions. [`translate_schema`]
//! walks a caller-supplied schema recursively and builds a typed
//! [`SchemaNode`]; keywords Vertex does not understand are dropped and
//! malformed values degrade to "absent".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaKind {
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "string" => SchemaKind::String,
            "number" => SchemaKind::Number,
            "integer" => SchemaKind::Integer,
            "boolean" => SchemaKind::Boolean,
            "array" => SchemaKind::Array,
            "object" => SchemaKind::Object,
            "null" => SchemaKind::Null,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_ordering: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// Translate a tool's parameter schema. The top level is always an object:
/// a missing or non-object schema becomes an empty `OBJECT`.
pub fn translate_parameters(parameters: Option<&Value>) -> SchemaNode {
    let mut node = parameters.map(translate_schema).unwrap_or_default();
    if node.kind.is_none() {
        node.kind = Some(SchemaKind::Object);
    }
    node
}

/// Recursively translate one JSON-Schema value.
pub fn translate_schema(schema: &Value) -> SchemaNode {
    match schema {
        Value::Object(map) => translate_object(map),
        _ => SchemaNode::default(),
    }
}

fn translate_object(map: &Map<String, Value>) -> SchemaNode {
    let mut node = SchemaNode {
        format: string_field(map, "format"),
        title: string_field(map, "title"),
        description: string_field(map, "description"),
        nullable: map.get("nullable").and_then(Value::as_bool),
        enum_values: map.get("enum").and_then(Value::as_array).cloned(),
        property_ordering: string_list(map, "propertyOrdering"),
        required: string_list(map, "required"),
        minimum: map.get("minimum").and_then(Value::as_f64),
        maximum: map.get("maximum").and_then(Value::as_f64),
        min_length: count_field(map, "minLength"),
        max_length: count_field(map, "maxLength"),
        min_items: count_field(map, "minItems"),
        max_items: count_field(map, "maxItems"),
        min_properties: count_field(map, "minProperties"),
        max_properties: count_field(map, "maxProperties"),
        pattern: string_field(map, "pattern"),
        default: map.get("default").cloned(),
        example: map.get("example").cloned(),
        ..Default::default()
    };

    match map.get("type") {
        Some(Value::String(name)) => node.kind = SchemaKind::parse(name),
        Some(Value::Array(names)) => {
            let kinds: Vec<SchemaKind> = names
                .iter()
                .filter_map(Value::as_str)
                .filter_map(SchemaKind::parse)
                .collect();
            if kinds.contains(&SchemaKind::Null) {
                node.nullable = Some(true);
            }
            node.kind = kinds
                .iter()
                .copied()
                .find(|k| *k != SchemaKind::Null)
                .or(kinds.first().copied());
        }
        _ => {}
    }

    if node.enum_values.is_none() {
        if let Some(value) = map.get("const") {
            node.enum_values = Some(vec![value.clone()]);
        }
    }

    if let Some(props) = map.get("properties").and_then(Value::as_object) {
        node.properties = Some(
            props
                .iter()
                .map(|(name, prop)| (name.clone(), translate_schema(prop)))
                .collect(),
        );
    }

    node.items = match map.get("items") {
        Some(items @ Value::Object(_)) => Some(Box::new(translate_schema(items))),
        Some(Value::Array(tuple)) => tuple.first().map(|first| Box::new(translate_schema(first))),
        _ => None,
    };

    let variants = map
        .get("anyOf")
        .or_else(|| map.get("oneOf"))
        .and_then(Value::as_array);
    if let Some(variants) = variants {
        node = merge_any_of(node, variants);
    }

    if node.kind.is_none() {
        if node.properties.is_some() {
            node.kind = Some(SchemaKind::Object);
        } else if node.items.is_some() {
            node.kind = Some(SchemaKind::Array);
        }
    }

    node
}

/// `anyOf: [X, {"type": "null"}]` collapses into a nullable `X`; larger
/// unions keep their non-null variants.
fn merge_any_of(mut node: SchemaNode, variants: &[Value]) -> SchemaNode {
    let is_null = |v: &&Value| v.get("type").and_then(Value::as_str) == Some("null");
    let has_null = variants.iter().any(|v| is_null(&v));
    let mut translated: Vec<SchemaNode> = variants
        .iter()
        .filter(|v| !is_null(v))
        .map(translate_schema)
        .collect();

    if has_null {
        node.nullable = Some(true);
    }

    if translated.len() == 1 && node.kind.is_none() {
        let mut inner = translated.remove(0);
        inner.nullable = node.nullable.or(inner.nullable);
        inner.title = node.title.or(inner.title);
        inner.description = node.description.or(inner.description);
        inner.default = node.default.or(inner.default);
        return inner;
    }

    if !translated.is_empty() {
        node.any_of = Some(translated);
    }
    node
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(map: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let list = map.get(key)?.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

/// Non-negative integer bound, accepting the int64-as-string form too.
fn count_field(map: &Map<String, Value>, key: &str) -> Option<u64> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_object_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "City name"},
                "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]},
                "days": {"type": "integer", "minimum": 1, "maximum": 14},
                "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 5}
            },
            "required": ["location"],
            "additionalProperties": false,
            "$schema": "http://json-schema.org/draft-07/schema#"
        });

        let node = translate_schema(&schema);
        let out = serde_json::to_value(&node).unwrap();

        assert_eq!(out["type"], "OBJECT");
        assert_eq!(out["required"], json!(["location"]));
        assert_eq!(out["properties"]["location"]["type"], "STRING");
        assert_eq!(out["properties"]["location"]["description"], "City name");
        assert_eq!(out["properties"]["unit"]["enum"], json!(["celsius", "fahrenheit"]));
        assert_eq!(out["properties"]["days"]["type"], "INTEGER");
        assert_eq!(out["properties"]["days"]["minimum"], 1.0);
        assert_eq!(out["properties"]["tags"]["items"]["type"], "STRING");
        assert_eq!(out["properties"]["tags"]["maxItems"], 5);
        assert!(out.get("additionalProperties").is_none());
        assert!(out.get("$schema").is_none());
    }

    #[test]
    fn test_nullable_type_union() {
        let node = translate_schema(&json!({"type": ["string", "null"]}));
        assert_eq!(node.kind, Some(SchemaKind::String));
        assert_eq!(node.nullable, Some(true));

        let node = translate_schema(&json!({"type": ["null"]}));
        assert_eq!(node.kind, Some(SchemaKind::Null));
    }

    #[test]
    fn test_any_of_with_null_collapses() {
        let node = translate_schema(&json!({
            "description": "optional count",
            "anyOf": [{"type": "integer"}, {"type": "null"}]
        }));
        assert_eq!(node.kind, Some(SchemaKind::Integer));
        assert_eq!(node.nullable, Some(true));
        assert_eq!(node.description.as_deref(), Some("optional count"));
        assert!(node.any_of.is_none());
    }

    #[test]
    fn test_any_of_union_is_kept() {
        let node = translate_schema(&json!({
            "anyOf": [{"type": "string"}, {"type": "number"}]
        }));
        let variants = node.any_of.unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].kind, Some(SchemaKind::Number));
    }

    #[test]
    fn test_const_and_extras() {
        let node = translate_schema(&json!({
            "type": "string",
            "const": "fixed",
            "format": "date-time",
            "pattern": "^[0-9]+$",
            "default": "0",
            "example": "42",
            "minLength": "1",
            "maxLength": 10,
            "title": "Stamp"
        }));
        assert_eq!(node.enum_values, Some(vec![json!("fixed")]));
        assert_eq!(node.format.as_deref(), Some("date-time"));
        assert_eq!(node.pattern.as_deref(), Some("^[0-9]+$"));
        assert_eq!(node.default, Some(json!("0")));
        assert_eq!(node.example, Some(json!("42")));
        assert_eq!(node.min_length, Some(1));
        assert_eq!(node.max_length, Some(10));
        assert_eq!(node.title.as_deref(), Some("Stamp"));
    }

    #[test]
    fn test_property_ordering_and_inferred_kinds() {
        let node = translate_schema(&json!({
            "properties": {"b": {"items": {"type": "boolean"}}, "a": {}},
            "propertyOrdering": ["b", "a"],
            "minProperties": 1
        }));
        assert_eq!(node.kind, Some(SchemaKind::Object));
        assert_eq!(node.property_ordering, Some(vec!["b".to_string(), "a".to_string()]));
        assert_eq!(node.min_properties, Some(1));
        let props = node.properties.unwrap();
        assert_eq!(props["b"].kind, Some(SchemaKind::Array));
        assert_eq!(props["a"], SchemaNode::default());
    }

    #[test]
    fn test_parameters_default_to_object() {
        assert_eq!(translate_parameters(None).kind, Some(SchemaKind::Object));
        assert_eq!(
            translate_parameters(Some(&json!("not a schema"))).kind,
            Some(SchemaKind::Object)
        );
        let out = serde_json::to_value(translate_parameters(Some(&json!({"properties": {}})))).unwrap();
        assert_eq!(out, json!({"type": "OBJECT", "properties": {}}));
    }
}
