//! Document identifier generation and validation.
//!
//! Two formats are supported: MongoDB-style 24-hex strings (12 random
//! bytes) and UUIDv4. Generated ids are always lowercase; validation of
//! UUIDs is case-insensitive.

use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;
use uuid::Uuid;

static MONGO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{24}$").expect("static pattern"));

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("static pattern")
});

/// Identifier format for generated `_id` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// MongoDB-style 24 lowercase hex characters.
    Mongo,
    /// UUID version 4.
    Uuid,
}

/// Generates a new identifier of the given type.
#[must_use]
pub fn generate(id_type: IdType) -> String {
    match id_type {
        IdType::Mongo => {
            let mut bytes = [0u8; 12];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes.iter().fold(String::with_capacity(24), |mut s, b| {
                let _ = write!(s, "{b:02x}");
                s
            })
        }
        IdType::Uuid => Uuid::new_v4().to_string(),
    }
}

/// Returns true iff `s` is a valid Mongo-style 24-hex identifier.
#[must_use]
pub fn is_valid_mongo_id(s: &str) -> bool {
    MONGO_ID_RE.is_match(s)
}

/// Returns true iff `s` is a valid UUIDv4.
///
/// Requires version nibble `4` and a variant nibble in `{8, 9, a, b}`.
#[must_use]
pub fn is_valid_uuid(s: &str) -> bool {
    UUID_RE.is_match(s)
}

/// Returns true iff `s` matches either supported identifier format.
#[must_use]
pub fn is_valid(s: &str) -> bool {
    is_valid_mongo_id(s) || is_valid_uuid(s)
}
