use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FileId;

/// Persisted attachment fields for one attribute of one record.
///
/// At rest at most one of `id` (store tier) and `cache_id` (cache tier) is
/// set; both empty means nothing is attached. A failed promotion leaves both
/// set, and loading such a state treats `id` as the copy to replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentState {
    pub id: Option<FileId>,
    pub cache_id: Option<FileId>,
    pub filename: Option<String>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

impl AttachmentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State pointing at content already in the store tier
    pub fn stored(id: FileId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// State pointing at content in the cache tier
    pub fn cached(cache_id: FileId) -> Self {
        Self {
            cache_id: Some(cache_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.cache_id.is_none()
    }

    /// Record columns for attribute `name`: `{name}_id`, `{name}_cache_id`,
    /// `{name}_filename`, `{name}_size`, `{name}_content_type`.
    pub fn to_columns(&self, name: &str) -> Map<String, Value> {
        let mut columns = Map::new();
        columns.insert(format!("{}_id", name), opt(self.id.as_ref().map(FileId::as_str)));
        columns.insert(
            format!("{}_cache_id", name),
            opt(self.cache_id.as_ref().map(FileId::as_str)),
        );
        columns.insert(format!("{}_filename", name), opt(self.filename.as_deref()));
        columns.insert(
            format!("{}_size", name),
            self.size.map(Value::from).unwrap_or(Value::Null),
        );
        columns.insert(
            format!("{}_content_type", name),
            opt(self.content_type.as_deref()),
        );
        columns
    }

    /// Inverse of [`to_columns`](Self::to_columns). Missing, null and empty
    /// values read as absent; sizes may be numbers or numeric strings.
    pub fn from_columns(name: &str, columns: &Map<String, Value>) -> Self {
        let text = |field: &str| {
            columns
                .get(&format!("{}_{}", name, field))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let size = columns
            .get(&format!("{}_size", name))
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            });

        Self {
            id: text("id").map(FileId::from),
            cache_id: text("cache_id").map(FileId::from),
            filename: text("filename"),
            size,
            content_type: text("content_type"),
        }
    }
}

fn opt(value: Option<&str>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}
