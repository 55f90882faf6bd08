//! Core types shared by the service, store and client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the single resource exposed by the API.
pub const CHEMICALS: &str = "chemicals";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Formats a timestamp as an HTTP date (`Tue, 15 Nov 1994 08:12:31 GMT`).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// A stored chemical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chemical {
    #[serde(rename = "_id")]
    pub id: String,
    pub formula: String,
    pub band_gap: f64,
    pub color: String,
    #[serde(rename = "_created")]
    pub created: String,
    #[serde(rename = "_updated")]
    pub updated: String,
}

impl Chemical {
    /// Builds a stored record from a validated payload.
    pub fn from_new(id: String, new: NewChemical, at: DateTime<Utc>) -> Self {
        let stamp = http_date(at);
        Self {
            id,
            formula: new.formula,
            band_gap: new.band_gap,
            color: new.color,
            created: stamp.clone(),
            updated: stamp,
        }
    }

    /// Applies a validated partial update, bumping `_updated`.
    pub fn apply(&mut self, patch: ChemicalPatch, at: DateTime<Utc>) {
        if let Some(formula) = patch.formula {
            self.formula = formula;
        }
        if let Some(band_gap) = patch.band_gap {
            self.band_gap = band_gap;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        self.updated = http_date(at);
    }

    /// JSON document view used for filter evaluation.
    pub fn to_document(&self) -> Value {
        serde_json::json!({
            "_id": self.id,
            "formula": self.formula,
            "band_gap": self.band_gap,
            "color": self.color,
            "_created": self.created,
            "_updated": self.updated,
        })
    }
}

/// Payload for creating a chemical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChemical {
    pub formula: String,
    pub band_gap: f64,
    pub color: String,
}

/// Payload for a partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChemicalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_gap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// HTTP methods the resource endpoints understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a request targets the whole collection or one item in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Collection,
    Item,
}
