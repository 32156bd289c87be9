use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use uuid::Uuid;

/// Stream of bytes for file content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Opaque identifier for content held by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id can be used as a single path component.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Source of fresh identifiers for uploaded content.
///
/// Uniqueness is probabilistic; implementations must be safe to call from
/// many tasks at once without coordination.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> FileId;
}

/// Default generator: two v4 UUIDs (244 random bits), hex without dashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> FileId {
        FileId(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique_and_path_safe() {
        let ids = RandomIdGenerator;
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = ids.next_id();
            assert_eq!(id.as_str().len(), 64);
            assert!(id.is_path_safe());
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_path_safety() {
        assert!(!FileId::from("../etc/passwd").is_path_safe());
        assert!(!FileId::from("a/b").is_path_safe());
        assert!(!FileId::from("").is_path_safe());
        assert!(FileId::from("abc_DEF-123").is_path_safe());
    }
}
