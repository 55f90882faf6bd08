//! Schema registry - declared resources and their field constraints.
//!
//! Each resource is described by a [`ResourceSchema`] whose fields carry the
//! constraints the [validator](crate::validate_record) walks before a write.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::types::CHEMICALS;

/// Maximum length of the chemicals string fields.
pub const MAX_TEXT_LENGTH: usize = 15;

/// Type a field value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Float,
}

impl FieldType {
    /// Type name used in error messages and schema documents.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Float => "float",
        }
    }

    /// Whether a JSON value has this type.
    ///
    /// JSON does not distinguish integers from floats, so any number passes
    /// as a float.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Float => value.is_number(),
        }
    }
}

/// Constraints declared for a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRule {
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    pub required: bool,
    /// Declared but not enforced by the validator.
    pub unique: bool,
}

impl FieldRule {
    /// A required field of the given type with no length bounds.
    pub fn new(field_type: FieldType, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            field_type,
            min_length: None,
            max_length: None,
            required: true,
            unique: false,
        }
    }

    /// Set inclusive length bounds (strings only).
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    /// Set whether the field must be present on create.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Declaration of one resource type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub name: String,
    /// Title used for single items in links and documentation.
    pub item_title: String,
    pub description: String,
    pub fields: IndexMap<String, FieldRule>,
}

impl ResourceSchema {
    pub fn new(
        name: impl Into<String>,
        item_title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            item_title: item_title.into(),
            description: description.into(),
            fields: IndexMap::new(),
        }
    }

    /// Declare a field. Order of declaration is kept for documentation.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// The `chemicals` resource.
    pub fn chemicals() -> Self {
        ResourceSchema::new(CHEMICALS, "chemical", "A store of chemical data.")
            .field(
                "formula",
                FieldRule::new(FieldType::String, "Chemical formula").length(1, MAX_TEXT_LENGTH),
            )
            .field(
                "band_gap",
                FieldRule::new(FieldType::Float, "Band gap of the chemical."),
            )
            .field(
                "color",
                FieldRule::new(FieldType::String, "Observed color of the chemical.")
                    .length(1, MAX_TEXT_LENGTH),
            )
    }

    /// Render the resource as a JSON Schema object for API documentation.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, rule) in &self.fields {
            let mut prop = Map::new();
            let json_type = match rule.field_type {
                FieldType::String => "string",
                FieldType::Float => "number",
            };
            prop.insert("type".into(), json!(json_type));
            prop.insert("description".into(), json!(rule.description));
            if let Some(min) = rule.min_length {
                prop.insert("minLength".into(), json!(min));
            }
            if let Some(max) = rule.max_length {
                prop.insert("maxLength".into(), json!(max));
            }
            if rule.field_type == FieldType::Float {
                prop.insert("format".into(), json!("float"));
            }
            properties.insert(name.clone(), Value::Object(prop));
            if rule.required {
                required.push(json!(name));
            }
        }

        json!({
            "type": "object",
            "description": self.description,
            "properties": properties,
            "required": required,
        })
    }
}

/// All resources served by the API, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    resources: IndexMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            resources: IndexMap::new(),
        }
    }

    /// Add (or replace) a resource declaration.
    pub fn register(mut self, schema: ResourceSchema) -> Self {
        self.resources.insert(schema.name.clone(), schema);
        self
    }

    pub fn get(&self, resource: &str) -> Option<&ResourceSchema> {
        self.resources.get(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.resources.values()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        SchemaRegistry::empty().register(ResourceSchema::chemicals())
    }
}
