//! # docudb core
//!
//! Core engine for docudb, an embedded document-oriented storage engine.
//!
//! This crate provides:
//! - Identifier generation and validation (Mongo-style and UUIDv4)
//! - Schema validation and normalization
//! - Per-field and compound equality indexes with disk persistence
//! - A MongoDB-subset query evaluator
//! - Collection CRUD orchestration with per-document locking
//! - The database façade
//!
//! ```rust,ignore
//! use docudb_core::{Database, DatabaseConfig};
//! use serde_json::json;
//!
//! let db = Database::new(DatabaseConfig::default().data_dir("/tmp/demo"))?;
//! db.initialize()?;
//!
//! let products = db.collection("products")?;
//! products.insert_one(json!({"name": "Laptop", "price": 1000}))?;
//! let hits = products.find(&json!({"price": {"$gt": 50}}))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod id;
pub mod index;
pub mod name;
pub mod query;
pub mod schema;

pub use collection::{Collection, CollectionOptions};
pub use config::DatabaseConfig;
pub use database::Database;
pub use document::Document;
pub use error::{DbError, DbResult, IndexError, QueryError, SchemaError};
pub use id::IdType;
pub use index::{IndexManager, IndexOptions};
pub use query::Query;
pub use schema::{FieldDefinition, FieldType, Schema, SchemaOptions};
