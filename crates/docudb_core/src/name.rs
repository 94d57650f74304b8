//! Name sanitization for database and collection directories.
//!
//! Names become directory components under the data directory, so they are
//! validated against traversal and injection before any path is built.

use crate::error::{DbError, DbResult};

/// Maximum accepted name length.
const MAX_NAME_LEN: usize = 64;

/// Names reserved by common filesystems.
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "lpt1", "lpt2", "lpt3",
];

/// Validates a database name for use as a directory component.
///
/// Rejects traversal sequences, absolute paths and separators, reserved
/// system names, overlong names, control characters, template-injection
/// syntax, and URL-encoded traversal.
pub fn validate_name(name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::invalid_name("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(DbError::invalid_name(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if name.contains("..") {
        return Err(DbError::invalid_name("name must not contain traversal"));
    }
    if name.starts_with('/') || name.starts_with('\\') || name.contains(':') {
        return Err(DbError::invalid_name("name must not be an absolute path"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DbError::invalid_name("name must not contain separators"));
    }
    if name.chars().any(char::is_control) {
        return Err(DbError::invalid_name(
            "name must not contain control characters",
        ));
    }
    if name.contains("${") || name.contains('`') || name.contains("{{") {
        return Err(DbError::invalid_name(
            "name must not contain template syntax",
        ));
    }
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("%2e") || lowered.contains("%2f") || lowered.contains("%5c") {
        return Err(DbError::invalid_name(
            "name must not contain encoded traversal",
        ));
    }
    if RESERVED_NAMES.contains(&lowered.as_str()) {
        return Err(DbError::invalid_name(format!("name is reserved: {name}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["docudb", "my-app", "app_data", "v2"] {
            assert!(validate_name(name).is_ok(), "{name} should pass");
        }
    }

    #[test]
    fn rejects_traversal() {
        for name in ["..", "../etc", "a/../b", "%2e%2e", "a%2Fb"] {
            assert!(
                matches!(validate_name(name), Err(DbError::InvalidName { .. })),
                "{name} should fail"
            );
        }
    }

    #[test]
    fn rejects_absolute_and_separators() {
        for name in ["/etc", "\\share", "a/b", "a\\b", "c:windows"] {
            assert!(validate_name(name).is_err(), "{name} should fail");
        }
    }

    #[test]
    fn rejects_template_syntax() {
        for name in ["${db}", "`rm`", "{{name}}"] {
            assert!(validate_name(name).is_err(), "{name} should fail");
        }
    }

    #[test]
    fn rejects_reserved_and_overlong() {
        assert!(validate_name("CON").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
        assert!(validate_name(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_name("a\x00b").is_err());
        assert!(validate_name("a\nb").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_name("").is_err());
    }
}
