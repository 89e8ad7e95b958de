use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a person in the backing store: consultants, clients and
/// message senders all share the same uid space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A user document as stored in the `users` collection. Shapes are
/// inconsistent across documents, so every name field is optional and
/// resolution goes through `best_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uid,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
}

impl UserRecord {
    /// Best-effort display name: full name, then composed first+last,
    /// then display name. `None` means the caller falls back to the uid.
    pub fn best_name(&self) -> Option<String> {
        if let Some(name) = non_empty(&self.full_name) {
            return Some(name);
        }
        let composed = [&self.first_name, &self.last_name]
            .into_iter()
            .filter_map(non_empty)
            .collect::<Vec<_>>()
            .join(" ");
        if !composed.is_empty() {
            return Some(composed);
        }
        non_empty(&self.display_name)
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
