//! Error types for the docudb core engine.
//!
//! Each layer has its own taxonomy; lower-layer errors convert upward into
//! [`DbError`] so callers only ever see one error type at the public
//! surface while retaining the original kind for matching.

use docudb_storage::StorageError;
use serde_json::Value;
use thiserror::Error;

/// Result type for database and collection operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors from schema validation and normalization.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The input is not a document (JSON object).
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the problem.
        message: String,
    },

    /// A required field is absent.
    #[error("required field missing: {field}")]
    RequiredField {
        /// The missing field.
        field: String,
    },

    /// A field value has the wrong type.
    #[error("invalid type for field {field}: {message}")]
    InvalidType {
        /// The offending field.
        field: String,
        /// Description of the mismatch.
        message: String,
    },

    /// A numeric value is outside its min/max bounds.
    #[error("invalid value for field {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// The rejected value.
        value: Value,
        /// Failure text (possibly overridden by the field's message).
        message: String,
    },

    /// A string or array violates its length bounds.
    #[error("invalid length for field {field}: {message}")]
    InvalidLength {
        /// The offending field.
        field: String,
        /// The rejected value.
        value: Value,
        /// Failure text (possibly overridden by the field's message).
        message: String,
    },

    /// A string does not match the field's pattern.
    #[error("pattern mismatch for field {field}: {message}")]
    InvalidRegex {
        /// The offending field.
        field: String,
        /// The rejected value.
        value: Value,
        /// Failure text (possibly overridden by the field's message).
        message: String,
    },

    /// A value is not among the allowed enum members.
    #[error("invalid enum value for field {field}: {message}")]
    InvalidEnum {
        /// The offending field.
        field: String,
        /// The rejected value.
        value: Value,
        /// Failure text (possibly overridden by the field's message).
        message: String,
    },

    /// A custom validator rejected the value.
    #[error("validation failed for field {field}: {message}")]
    CustomValidation {
        /// The offending field.
        field: String,
        /// The rejected value.
        value: Value,
        /// Failure text from the validator or the field's message.
        message: String,
    },

    /// Strict mode rejected a field not present in the schema.
    #[error("unknown field not allowed by schema: {field}")]
    InvalidField {
        /// The unknown field.
        field: String,
    },
}

/// Errors from the index manager.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index directory could not be initialized.
    #[error("index init failed for {collection}: {message}")]
    Init {
        /// Collection whose index directory failed.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// Index creation failed.
    #[error("index create failed for {collection}.{field_spec}: {message}")]
    Create {
        /// Collection of the index.
        collection: String,
        /// Field spec of the index.
        field_spec: String,
        /// Description of the failure.
        message: String,
    },

    /// Index drop failed.
    #[error("index drop failed for {collection}.{field_spec}: {message}")]
    Drop {
        /// Collection of the index.
        collection: String,
        /// Field spec of the index.
        field_spec: String,
        /// Description of the failure.
        message: String,
    },

    /// Index update failed.
    #[error("index update failed for {collection}: {message}")]
    Update {
        /// Collection of the index.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// A unique index already holds this value for another document.
    #[error("unique constraint violated on {collection}.{field_spec} for value {key}")]
    UniqueViolation {
        /// Collection of the index.
        collection: String,
        /// Field spec of the violated index.
        field_spec: String,
        /// Normalized value key that collided.
        key: String,
    },

    /// Persisted index could not be loaded.
    #[error("index load failed for {collection}: {message}")]
    Load {
        /// Collection whose indexes failed to load.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// Index snapshot could not be written.
    #[error("index save failed for {collection}.{field_spec}: {message}")]
    Save {
        /// Collection of the index.
        collection: String,
        /// Field spec of the index.
        field_spec: String,
        /// Description of the failure.
        message: String,
    },

    /// An index was declared over an unusable field specification.
    #[error("invalid index field spec: {message}")]
    InvalidFieldType {
        /// Description of the problem.
        message: String,
    },
}

/// Errors from criteria compilation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// An unknown `$`-operator appeared in the criteria.
    #[error("invalid query operator: {operator}")]
    InvalidOperator {
        /// The unrecognized operator.
        operator: String,
    },

    /// The criteria value cannot be compiled.
    #[error("invalid criteria: {message}")]
    InvalidCriteria {
        /// Description of the problem.
        message: String,
    },
}

/// Top-level errors from collections and the database façade.
#[derive(Debug, Error)]
pub enum DbError {
    /// The database has not been initialized.
    #[error("database is not initialized")]
    NotInitialized,

    /// A database or collection name failed sanitization.
    #[error("invalid name: {message}")]
    InvalidName {
        /// Description of the rejection.
        message: String,
    },

    /// Database initialization failed.
    #[error("database init failed: {message}")]
    Init {
        /// Description of the failure.
        message: String,
    },

    /// Persisted state could not be loaded.
    #[error("load failed for {context}: {message}")]
    Load {
        /// Collection or file being loaded.
        context: String,
        /// Description of the failure.
        message: String,
    },

    /// The value is not a usable document.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the problem.
        message: String,
    },

    /// A document identifier has an invalid format.
    #[error("invalid document id: {id}")]
    InvalidId {
        /// The rejected id.
        id: String,
    },

    /// A document was not found.
    #[error("document not found: {id} in {collection}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Missing id.
        id: String,
    },

    /// An insert failed part-way.
    #[error("insert failed in {collection} at position {position}: {source}")]
    Insert {
        /// Collection being inserted into.
        collection: String,
        /// Zero-based position of the failing document.
        position: usize,
        /// The original failure.
        #[source]
        source: Box<DbError>,
    },

    /// An update object is malformed.
    #[error("invalid update: {message}")]
    InvalidUpdate {
        /// Description of the problem.
        message: String,
    },

    /// A value had the wrong type for the requested mutation.
    #[error("invalid type at {path}: {message}")]
    InvalidType {
        /// Dot path of the offending value.
        path: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The per-document lock could not be acquired.
    #[error("could not lock document {id} in {collection}")]
    Lock {
        /// Collection of the contended document.
        collection: String,
        /// Contended document id.
        id: String,
    },

    /// A position argument was out of range or the id is not ordered.
    #[error("invalid position: {message}")]
    InvalidPosition {
        /// Description of the problem.
        message: String,
    },

    /// Collection metadata could not be read or written.
    #[error("metadata error for {collection}: {message}")]
    Metadata {
        /// Collection whose metadata failed.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// Dropping a collection failed.
    #[error("drop failed for {collection}: {message}")]
    Drop {
        /// Collection being dropped.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// A collection-level operation failed.
    #[error("collection error for {collection}: {message}")]
    Collection {
        /// The collection.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// Schema validation rejected a document.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An index operation failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Criteria compilation failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DbError {
    /// Creates an invalid-name error.
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName {
            message: message.into(),
        }
    }

    /// Creates an invalid-document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an invalid-id error.
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId { id: id.into() }
    }

    /// Creates an invalid-update error.
    pub fn invalid_update(message: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            message: message.into(),
        }
    }

    /// Creates an invalid-position error.
    pub fn invalid_position(message: impl Into<String>) -> Self {
        Self::InvalidPosition {
            message: message.into(),
        }
    }

    /// Creates a metadata error.
    pub fn metadata(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Metadata {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Creates a load error.
    pub fn load(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            context: context.into(),
            message: message.into(),
        }
    }
}
