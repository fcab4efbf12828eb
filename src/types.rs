//! Core policy data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique group identifier
pub type GroupId = String;

/// A named policy unit: weighted, inheriting, holding pattern grants.
///
/// `permissions` maps a stored pattern to `true` (allow) or `false`
/// (explicit deny). Keys are unique within the group by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Parent group ids, in declaration order. Ordering affects trace
    /// display only, never the resolution outcome.
    #[serde(default)]
    pub inherits: Vec<GroupId>,

    /// Tie-break weight; higher wins. Also gates wildcard grants.
    #[serde(default)]
    pub weight: i64,

    /// Pattern -> allow/deny grants
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl Group {
    /// Create an empty group with the given weight
    pub fn with_weight(weight: i64) -> Self {
        Self {
            weight,
            ..Self::default()
        }
    }

    /// Add a parent, builder-style
    pub fn inheriting(mut self, parent: impl Into<GroupId>) -> Self {
        self.inherits.push(parent.into());
        self
    }

    /// Add a grant, builder-style
    pub fn granting(mut self, pattern: impl Into<String>, allow: bool) -> Self {
        self.permissions.insert(pattern.into(), allow);
        self
    }
}

/// Document timestamps, ISO-8601 on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl DocumentMeta {
    fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}

/// The full persisted policy state, the unit of atomic persistence.
///
/// `groups` and each group's `permissions` are ordered maps so that an
/// unmodified document serializes byte-identically on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub groups: BTreeMap<GroupId, Group>,
    pub meta: DocumentMeta,
}

impl PolicyDocument {
    /// Create an empty document stamped with the current time
    pub fn empty() -> Self {
        Self {
            groups: BTreeMap::new(),
            meta: DocumentMeta::now(),
        }
    }

    /// The default document used when no policy file exists yet:
    /// a minimal guest/user/admin hierarchy with weights 0/10/100.
    pub fn seeded() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("guest".to_string(), Group::with_weight(0));
        groups.insert("user".to_string(), Group::with_weight(10).inheriting("guest"));
        groups.insert("admin".to_string(), Group::with_weight(100).inheriting("user"));

        Self {
            groups,
            meta: DocumentMeta::now(),
        }
    }

    /// Look up a group by id
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Ids of every group whose `inherits` references `id`
    pub fn referencing(&self, id: &str) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|(gid, g)| gid.as_str() != id && g.inherits.iter().any(|p| p == id))
            .map(|(gid, _)| gid.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_hierarchy() {
        let doc = PolicyDocument::seeded();
        assert_eq!(doc.groups.len(), 3);
        assert_eq!(doc.group("guest").unwrap().weight, 0);
        assert_eq!(doc.group("user").unwrap().weight, 10);
        assert_eq!(doc.group("user").unwrap().inherits, vec!["guest"]);
        assert_eq!(doc.group("admin").unwrap().weight, 100);
        assert_eq!(doc.group("admin").unwrap().inherits, vec!["user"]);
    }

    #[test]
    fn test_wire_format_field_names() {
        let doc = PolicyDocument::seeded();
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json["groups"]["guest"].is_object());
        assert!(json["meta"]["createdAt"].is_string());
        assert!(json["meta"]["updatedAt"].is_string());
    }

    #[test]
    fn test_group_defaults_on_load() {
        // Hand-edited documents may omit any group field
        let group: Group = serde_json::from_str("{}").unwrap();
        assert_eq!(group.weight, 0);
        assert!(group.inherits.is_empty());
        assert!(group.permissions.is_empty());
    }

    #[test]
    fn test_referencing() {
        let doc = PolicyDocument::seeded();
        assert_eq!(doc.referencing("guest"), vec!["user".to_string()]);
        assert_eq!(doc.referencing("user"), vec!["admin".to_string()]);
        assert!(doc.referencing("admin").is_empty());
    }
}
