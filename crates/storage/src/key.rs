//! Object key validation.
//!
//! Keys are always `/`-separated regardless of platform, and are never allowed
//! to climb out of their bucket. The local backend maps keys straight onto the
//! filesystem, so this is the only thing standing between an identifier and
//! `../../etc/passwd`.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an object key.
///
/// Empty segments and `.` are dropped, `..` pops the previous segment. A key
/// that would leave the bucket root, contains a null byte, or normalizes to
/// nothing is rejected with [`InvalidKey`](crate::error::ErrorKind::InvalidKey).
///
/// # Examples
///
/// ```
/// use speccy_storage::validate_key;
/// assert_eq!(validate_key("svc/apiSpec.json").unwrap(), "svc/apiSpec.json");
/// assert_eq!(validate_key("./svc//assets/../apiSpec.json").unwrap(), "svc/apiSpec.json");
/// assert!(validate_key("../apiSpec.json").is_err());
/// assert!(validate_key("svc\0/apiSpec.json").is_err());
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    if key.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    let mut segments = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate("valid/apiSpec.json").unwrap(), "valid/apiSpec.json");
        assert_eq!(validate("content.json").unwrap(), "content.json");
        assert_eq!(validate("a/b/c/d.json").unwrap(), "a/b/c/d.json");
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(validate("a//b//c").unwrap(), "a/b/c");
        assert_eq!(validate("/a/./b/").unwrap(), "a/b");
        assert_eq!(validate("a/b/..").unwrap(), "a");
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_empty_keys() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
        assert!(validate("a/..").is_err());
    }

    #[test]
    fn test_null_byte() {
        let err = validate("a\0b").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }
}
