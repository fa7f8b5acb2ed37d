use std::path::{Component, Path};

use crate::TransferError;

/// Validates that an announced file name is a single plain path component.
///
/// Rejects:
/// - Empty names
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Any directory separator or parent traversal (`..`)
/// - Control characters
pub fn validate_file_name(file_name: &str) -> Result<(), TransferError> {
    if file_name.trim().is_empty() {
        return Err(TransferError::InvalidFileName("empty name".into()));
    }

    if file_name.chars().any(char::is_control) {
        return Err(TransferError::InvalidFileName(format!(
            "control characters not allowed: {file_name:?}"
        )));
    }

    if file_name.contains(['/', '\\']) {
        return Err(TransferError::InvalidFileName(format!(
            "directory separators not allowed: {file_name}"
        )));
    }

    let path = Path::new(file_name);
    for component in path.components() {
        match component {
            Component::ParentDir | Component::CurDir => {
                return Err(TransferError::InvalidFileName(format!(
                    "relative directory names not allowed: {file_name}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidFileName(format!(
                    "absolute path not allowed: {file_name}"
                )));
            }
            Component::Normal(_) => {}
        }
    }

    Ok(())
}

/// Reduces an announced file name to something [`validate_file_name`] accepts.
///
/// Keeps the last path component and drops control characters. Returns
/// `None` when nothing usable is left.
pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().to_string();
    validate_file_name(&cleaned).ok().map(|()| cleaned)
}
