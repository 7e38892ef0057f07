//! Declarative JSON-to-JSON transformation engine.
//!
//! A [`MappingDef`] turns an inbound payload into the shape a customer
//! endpoint expects, either through ordered field rules (`field_map` mode)
//! or a `{{path}}` text template (`template` mode). The engine is pure:
//! it performs no I/O and never fails on bad *data* — malformed values
//! degrade to per-rule warnings. It fails only on a structurally invalid
//! mapping definition.

pub mod condition;
pub mod engine;
pub mod path;
pub mod template;
pub mod transform;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use engine::{apply, MappingOutput};
pub use transform::Transform;

/// Transformation mode of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    FieldMap,
    Template,
}

/// One ordered rule of a `field_map` mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    /// Dotted/indexed path resolved against the source payload.
    pub source_path: String,
    /// Dotted path written into the output object.
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Boolean DSL expression; the rule is skipped unless it holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A reusable transformation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDef {
    pub mode: MappingMode,
    #[serde(default)]
    pub rules: Vec<MappingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Object shallow-merged into the output after rules run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_fields: Option<Value>,
    /// Start from a shallow copy of the payload instead of `{}`.
    #[serde(default)]
    pub pass_through: bool,
}

/// Structural errors in the mapping definition itself.
///
/// Data problems (missing paths, coercion failures) never produce an error;
/// they surface as warnings on the [`MappingOutput`].
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Mapping: template mode requires a template")]
    MissingTemplate,

    #[error("Mapping: field_map mode does not take a template")]
    TemplateInFieldMap,

    #[error("Mapping: invalid source path '{0}'")]
    InvalidPath(String),

    #[error("Mapping: invalid condition '{expr}': {reason}")]
    InvalidCondition { expr: String, reason: String },

    #[error("Mapping: static_fields must be a JSON object")]
    StaticFieldsNotObject,
}
