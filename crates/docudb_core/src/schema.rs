//! Schema validation and normalization.
//!
//! A schema maps field names to declarative definitions: a type, a
//! required flag, a default (static or computed), a set of constraints,
//! and an optional transform. `Schema::validate` walks the definition in
//! field order and produces a normalized document or the first failure.
//!
//! Date fields are carried as RFC 3339 strings; validation parses them
//! and re-emits a canonical millisecond-precision form, which is how
//! dates are reconstructed after a round trip through storage.

use crate::document::{self, Document};
use crate::error::SchemaError;
use crate::id::IdType;
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Field types accepted by a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Finite number.
    Number,
    /// Boolean.
    Boolean,
    /// Point in time, carried as an RFC 3339 string.
    Date,
    /// Nested map.
    Object,
    /// Ordered list.
    Array,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// A computed default, called lazily with the original document and the
/// field name when the field is absent.
pub type ComputedDefault = Arc<dyn Fn(&Document, &str) -> Value + Send + Sync>;

/// A custom validator, called with the field value and the original
/// document.
pub type CustomValidator = Arc<dyn Fn(&Value, &Document) -> CustomOutcome + Send + Sync>;

/// A transform applied to a value after its constraints pass.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Outcome of a custom validator.
#[derive(Debug, Clone)]
pub enum CustomOutcome {
    /// The value is accepted.
    Pass,
    /// The value is rejected with a generic message.
    Fail,
    /// The value is rejected with a specific message.
    FailWith(String),
}

/// Default for an absent field.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value, deep-copied per use.
    Static(Value),
    /// A callback producing the value lazily.
    Computed(ComputedDefault),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Constraints applied when a field value is present and non-null.
#[derive(Clone, Default)]
pub struct Constraints {
    /// Minimum numeric value.
    pub min: Option<f64>,
    /// Maximum numeric value.
    pub max: Option<f64>,
    /// Minimum string/array length.
    pub min_length: Option<usize>,
    /// Maximum string/array length.
    pub max_length: Option<usize>,
    /// Pattern applied to strings exactly as written.
    pub pattern: Option<Regex>,
    /// Allowed values, matched by deep equality.
    pub enum_values: Option<Vec<Value>>,
    /// Custom validator.
    pub custom: Option<CustomValidator>,
    /// Overrides generated failure text for this field.
    pub message: Option<String>,
}

impl fmt::Debug for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraints")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("enum_values", &self.enum_values)
            .field("custom", &self.custom.is_some())
            .field("message", &self.message)
            .finish()
    }
}

impl Constraints {
    /// Creates an empty constraint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum numeric value.
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the maximum numeric value.
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets the minimum string/array length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Sets the maximum string/array length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Sets the string pattern.
    #[must_use]
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Sets the allowed values.
    #[must_use]
    pub fn enum_values(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Sets the custom validator.
    #[must_use]
    pub fn custom(
        mut self,
        f: impl Fn(&Value, &Document) -> CustomOutcome + Send + Sync + 'static,
    ) -> Self {
        self.custom = Some(Arc::new(f));
        self
    }

    /// Sets the failure message override.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn text(&self, generated: String) -> String {
        self.message.clone().unwrap_or(generated)
    }
}

/// Definition of a single schema field.
#[derive(Clone)]
pub struct FieldDefinition {
    /// Expected type.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Default applied when the field is absent.
    pub default: Option<DefaultValue>,
    /// Constraints applied when the field is present.
    pub validate: Option<Constraints>,
    /// Transform applied after constraints pass.
    pub transform: Option<Transform>,
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validate", &self.validate)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl FieldDefinition {
    /// Creates a definition of the given type.
    #[must_use]
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
            validate: None,
            transform: None,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a static default value.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Static(value));
        self
    }

    /// Sets a computed default.
    #[must_use]
    pub fn default_fn(
        mut self,
        f: impl Fn(&Document, &str) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(DefaultValue::Computed(Arc::new(f)));
        self
    }

    /// Sets the constraint set.
    #[must_use]
    pub fn validate(mut self, constraints: Constraints) -> Self {
        self.validate = Some(constraints);
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn transform(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }
}

/// Schema-wide options.
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Reject unknown non-underscore top-level fields.
    pub strict: bool,
    /// Maintain `_createdAt`/`_updatedAt` on validation.
    pub timestamps: bool,
    /// Identifier format override for this schema's collection.
    pub id_type: Option<IdType>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            strict: true,
            timestamps: false,
            id_type: None,
        }
    }
}

/// A compiled schema.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<(String, FieldDefinition)>,
    options: SchemaOptions,
    owns_id_validation: bool,
}

impl Schema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            fields: Vec::new(),
            options: SchemaOptions::default(),
        }
    }

    /// Returns the schema options.
    #[must_use]
    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// True when the schema defines `_id` with its own pattern, taking
    /// over identifier format validation from the collection.
    #[must_use]
    pub fn owns_id_validation(&self) -> bool {
        self.owns_id_validation
    }

    /// Looks up a field definition.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def)
    }

    /// Validates and normalizes a document.
    ///
    /// Walks schema fields in definition order: required check, default
    /// application, type check, constraints, transform. Unknown
    /// non-underscore fields are rejected in strict mode and passed
    /// through otherwise.
    pub fn validate(&self, doc: &Document) -> Result<Document, SchemaError> {
        let mut out = Document::new();

        for (name, def) in &self.fields {
            match doc.get(name) {
                None => {
                    if def.required {
                        return Err(SchemaError::RequiredField {
                            field: name.clone(),
                        });
                    }
                    match &def.default {
                        Some(DefaultValue::Static(value)) => {
                            // Deep copy so stored defaults never share state.
                            out.insert(name.clone(), value.clone());
                        }
                        Some(DefaultValue::Computed(f)) => {
                            out.insert(name.clone(), f(doc, name));
                        }
                        None => {}
                    }
                }
                Some(Value::Null) => {
                    // Null is a value, not absence: it satisfies required
                    // and bypasses type checks and constraints.
                    out.insert(name.clone(), Value::Null);
                }
                Some(value) => {
                    let normalized = self.check_type(name, def, value)?;
                    if let Some(constraints) = &def.validate {
                        check_constraints(name, constraints, &normalized, doc)?;
                    }
                    let stored = match &def.transform {
                        Some(f) => f(normalized),
                        None => normalized,
                    };
                    out.insert(name.clone(), stored);
                }
            }
        }

        // Extra fields: underscore keys always pass through; others only
        // when the schema is not strict.
        for (key, value) in doc {
            if self.fields.iter().any(|(n, _)| n == key) {
                continue;
            }
            if !key.starts_with('_') && self.options.strict {
                return Err(SchemaError::InvalidField { field: key.clone() });
            }
            out.insert(key.clone(), value.clone());
        }

        if self.options.timestamps {
            let now = document::now_millis();
            let created = doc
                .get("_createdAt")
                .cloned()
                .unwrap_or_else(|| Value::String(now.clone()));
            out.insert("_createdAt".to_string(), created);
            out.insert("_updatedAt".to_string(), Value::String(now));
        }

        Ok(out)
    }

    /// Type-checks a present, non-null value, canonicalizing dates.
    fn check_type(
        &self,
        name: &str,
        def: &FieldDefinition,
        value: &Value,
    ) -> Result<Value, SchemaError> {
        let mismatch = |expected: FieldType| SchemaError::InvalidType {
            field: name.to_string(),
            message: format!(
                "expected {expected}, got {}",
                document::type_name(value)
            ),
        };

        match def.field_type {
            FieldType::String => value
                .is_string()
                .then(|| value.clone())
                .ok_or_else(|| mismatch(FieldType::String)),
            FieldType::Number => match value.as_f64() {
                Some(n) if n.is_finite() => Ok(value.clone()),
                _ => Err(mismatch(FieldType::Number)),
            },
            FieldType::Boolean => value
                .is_boolean()
                .then(|| value.clone())
                .ok_or_else(|| mismatch(FieldType::Boolean)),
            FieldType::Date => {
                let parsed = value.as_str().and_then(document::parse_datetime);
                match parsed {
                    Some(instant) => Ok(Value::String(
                        instant
                            .with_timezone(&Utc)
                            .to_rfc3339_opts(SecondsFormat::Millis, true),
                    )),
                    None => Err(mismatch(FieldType::Date)),
                }
            }
            FieldType::Object => value
                .is_object()
                .then(|| value.clone())
                .ok_or_else(|| mismatch(FieldType::Object)),
            FieldType::Array => value
                .is_array()
                .then(|| value.clone())
                .ok_or_else(|| mismatch(FieldType::Array)),
        }
    }
}

/// Runs the constraint pipeline: bounds, lengths, pattern, enum, custom.
fn check_constraints(
    name: &str,
    constraints: &Constraints,
    value: &Value,
    doc: &Document,
) -> Result<(), SchemaError> {
    if let Some(min) = constraints.min {
        if let Some(n) = value.as_f64() {
            if n < min {
                return Err(SchemaError::InvalidValue {
                    field: name.to_string(),
                    value: value.clone(),
                    message: constraints.text(format!("value {n} is below minimum {min}")),
                });
            }
        }
    }
    if let Some(max) = constraints.max {
        if let Some(n) = value.as_f64() {
            if n > max {
                return Err(SchemaError::InvalidValue {
                    field: name.to_string(),
                    value: value.clone(),
                    message: constraints.text(format!("value {n} is above maximum {max}")),
                });
            }
        }
    }

    let length = match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    };
    if let (Some(len), Some(min)) = (length, constraints.min_length) {
        if len < min {
            return Err(SchemaError::InvalidLength {
                field: name.to_string(),
                value: value.clone(),
                message: constraints.text(format!("length {len} is below minimum {min}")),
            });
        }
    }
    if let (Some(len), Some(max)) = (length, constraints.max_length) {
        if len > max {
            return Err(SchemaError::InvalidLength {
                field: name.to_string(),
                value: value.clone(),
                message: constraints.text(format!("length {len} is above maximum {max}")),
            });
        }
    }

    if let (Some(pattern), Some(s)) = (&constraints.pattern, value.as_str()) {
        if !pattern.is_match(s) {
            return Err(SchemaError::InvalidRegex {
                field: name.to_string(),
                value: value.clone(),
                message: constraints.text(format!("value does not match pattern {pattern}")),
            });
        }
    }

    if let Some(allowed) = &constraints.enum_values {
        if !allowed.iter().any(|v| document::deep_equal(v, value)) {
            return Err(SchemaError::InvalidEnum {
                field: name.to_string(),
                value: value.clone(),
                message: constraints.text("value is not one of the allowed values".to_string()),
            });
        }
    }

    if let Some(custom) = &constraints.custom {
        match custom(value, doc) {
            CustomOutcome::Pass => {}
            CustomOutcome::Fail => {
                return Err(SchemaError::CustomValidation {
                    field: name.to_string(),
                    value: value.clone(),
                    message: constraints.text("custom validation failed".to_string()),
                });
            }
            CustomOutcome::FailWith(message) => {
                return Err(SchemaError::CustomValidation {
                    field: name.to_string(),
                    value: value.clone(),
                    message,
                });
            }
        }
    }

    Ok(())
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    fields: Vec<(String, FieldDefinition)>,
    options: SchemaOptions,
}

impl SchemaBuilder {
    /// Adds a field definition; fields validate in insertion order.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, def: FieldDefinition) -> Self {
        self.fields.push((name.into(), def));
        self
    }

    /// Sets strict mode.
    #[must_use]
    pub fn strict(mut self, value: bool) -> Self {
        self.options.strict = value;
        self
    }

    /// Enables `_createdAt`/`_updatedAt` maintenance.
    #[must_use]
    pub fn timestamps(mut self, value: bool) -> Self {
        self.options.timestamps = value;
        self
    }

    /// Sets the identifier format for this schema's collection.
    #[must_use]
    pub fn id_type(mut self, id_type: IdType) -> Self {
        self.options.id_type = Some(id_type);
        self
    }

    /// Compiles the schema.
    #[must_use]
    pub fn build(self) -> Schema {
        let owns_id_validation = self
            .fields
            .iter()
            .any(|(name, def)| {
                name == "_id"
                    && def
                        .validate
                        .as_ref()
                        .is_some_and(|c| c.pattern.is_some())
            });
        Schema {
            fields: self.fields,
            options: self.options,
            owns_id_validation,
        }
    }
}
