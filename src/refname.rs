use crate::error::{Error, Result};

/// Validate a branch name before it is handed to git.
///
/// Follows git's `check-ref-format` rules for the characters and sequences
/// git rejects, and additionally refuses a leading `-` so the name can never
/// be read as an option.
///
/// # Errors
/// Returns [`Error::InvalidRefName`] if the name violates any rule.
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_ref_name("ref name must not be empty"));
    }

    if name.starts_with('-') {
        return Err(Error::invalid_ref_name(format!(
            "ref name must not start with '-': {}",
            name
        )));
    }

    for ch in name.chars() {
        match ch {
            ':' | ' ' | '\t' | '\n' | '\r' | '\\' | '^' | '~' | '?' | '*' | '[' => {
                return Err(Error::invalid_ref_name(format!(
                    "ref name contains invalid character: {:?}",
                    ch,
                )));
            }
            c if c.is_control() => {
                return Err(Error::invalid_ref_name(format!(
                    "ref name contains control character: {:?}",
                    c,
                )));
            }
            _ => {}
        }
    }

    if name.contains("..") {
        return Err(Error::invalid_ref_name("ref name must not contain '..'"));
    }

    if name.contains("@{") || name == "@" {
        return Err(Error::invalid_ref_name("ref name must not contain '@{'"));
    }

    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return Err(Error::invalid_ref_name(format!(
            "ref name has an empty path component: {}",
            name
        )));
    }

    if name.ends_with('.') {
        return Err(Error::invalid_ref_name("ref name must not end with '.'"));
    }

    if name.split('/').any(|part| part.starts_with('.') || part.ends_with(".lock")) {
        return Err(Error::invalid_ref_name(format!(
            "ref name component must not start with '.' or end with '.lock': {}",
            name
        )));
    }

    Ok(())
}
