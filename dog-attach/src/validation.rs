//! Upload rules, checked in a fixed order: size, content type, extension.
//!
//! Only the first failing rule is reported, so the same input always yields
//! the same single error kind.

use std::path::Path;

use crate::config::{normalize_content_type, normalize_extension};
use crate::{AttacherConfig, ErrorKind, Uploadable};

/// Outcome of validating one upload: `Err` carries the ordered error kinds
pub type Validation = Result<(), Vec<ErrorKind>>;

/// Check `uploadable` against `config`.
///
/// `max_size` is the effective size limit (the config's own, or one
/// advertised by the cache backend).
pub fn validate(
    config: &AttacherConfig,
    max_size: Option<u64>,
    uploadable: &dyn Uploadable,
) -> Validation {
    match first_failure(config, max_size, uploadable) {
        Some(kind) => Err(vec![kind]),
        None => Ok(()),
    }
}

fn first_failure(
    config: &AttacherConfig,
    max_size: Option<u64>,
    uploadable: &dyn Uploadable,
) -> Option<ErrorKind> {
    if let Some(max) = max_size {
        if uploadable.size() > max {
            return Some(ErrorKind::TooLarge);
        }
    }

    if let Some(allowed) = config.allowed_content_types() {
        let declared = uploadable.content_type().map(normalize_content_type);
        let ok = declared.is_some_and(|ct| allowed.iter().any(|a| *a == ct));
        if !ok {
            return Some(ErrorKind::InvalidContentType);
        }
    }

    if !config.extensions.is_empty() {
        let ok = uploadable
            .original_filename()
            .and_then(extension_of)
            .is_some_and(|ext| config.extensions.contains(&ext));
        if !ok {
            return Some(ErrorKind::InvalidExtension);
        }
    }

    None
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .filter(|e| !e.is_empty())
}

/// Value for an HTML `accept` attribute.
///
/// Explicit content types win over extensions, which win over the file
/// type's built-in list. Empty when nothing is configured.
pub fn accept(config: &AttacherConfig) -> String {
    if !config.content_types.is_empty() {
        config.content_types.join(",")
    } else if !config.extensions.is_empty() {
        config
            .extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(",")
    } else if let Some(file_type) = config.file_type {
        file_type.content_types().join(",")
    } else {
        String::new()
    }
}
